//! The declarative API tree.

use std::collections::BTreeMap;
use std::sync::Arc;

use spectree_server::{EndpointDescriptor, Handler};

use crate::compile::CompileError;

/// A tree entry: an endpoint under a `"<segment>_<verb>"` key, or a nested
/// tree under a path segment.
#[derive(Debug, Clone)]
pub enum SpecNode {
    Leaf(Arc<EndpointDescriptor>),
    Branch(SpecTree),
}

/// Endpoints and sub-trees by key, walked in key order.
///
/// ```rust,ignore
/// let tree = SpecTree::new()
///     .leaf("health_get", EndpointDescriptor::new(Schema::String, no_errors()))
///     .branch("users", SpecTree::new()
///         .leaf("list_get", list_users)
///         .leaf("{id}_delete", delete_user));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SpecTree {
    entries: BTreeMap<String, SpecNode>,
}

impl SpecTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf(mut self, key: impl Into<String>, descriptor: EndpointDescriptor) -> Self {
        self.entries
            .insert(key.into(), SpecNode::Leaf(Arc::new(descriptor)));
        self
    }

    pub fn branch(mut self, key: impl Into<String>, tree: SpecTree) -> Self {
        self.entries.insert(key.into(), SpecNode::Branch(tree));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, node: SpecNode) -> Option<SpecNode> {
        self.entries.insert(key.into(), node)
    }

    pub fn get(&self, key: &str) -> Option<&SpecNode> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SpecNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The descriptor at a `/`-separated key path such as `api/users/list_get`.
    pub fn descriptor(&self, path: &str) -> Option<&Arc<EndpointDescriptor>> {
        let mut keys = path.split('/').peekable();
        let mut tree = self;
        while let Some(key) = keys.next() {
            match (tree.entries.get(key)?, keys.peek()) {
                (SpecNode::Leaf(descriptor), None) => return Some(descriptor),
                (SpecNode::Branch(sub), Some(_)) => tree = sub,
                _ => return None,
            }
        }
        None
    }

    fn descriptor_mut(&mut self, path: &str) -> Option<&mut Arc<EndpointDescriptor>> {
        match path.split_once('/') {
            Some((key, rest)) => match self.entries.get_mut(key)? {
                SpecNode::Branch(sub) => sub.descriptor_mut(rest),
                SpecNode::Leaf(_) => None,
            },
            None => match self.entries.get_mut(path)? {
                SpecNode::Leaf(descriptor) => Some(descriptor),
                SpecNode::Branch(_) => None,
            },
        }
    }

    /// Attach `handler` to the leaf at `path`, replacing any previous one.
    ///
    /// Lets a tree be declared once (and shared with client-only code) and
    /// implemented separately on the server. Clones of the tree made before
    /// the call keep their own descriptors.
    pub fn implement(
        &mut self,
        path: &str,
        handler: impl Handler + 'static,
    ) -> Result<&mut Self, CompileError> {
        let descriptor = self
            .descriptor_mut(path)
            .ok_or_else(|| CompileError::UnknownLeaf(path.to_string()))?;
        Arc::make_mut(descriptor).handler = Some(Arc::new(handler));
        Ok(self)
    }
}
