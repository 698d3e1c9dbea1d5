//! The client-side mirror of an API tree.

use std::collections::BTreeMap;

use crate::{
    error::ClientError,
    remote::{ClientArgs, RemoteFn, Reply},
};

#[derive(Debug, Clone)]
pub enum ClientNode {
    Endpoint(RemoteFn),
    Branch(ClientTree),
}

/// Client functions keyed exactly like the API tree they were compiled
/// from: leaf keys (`users_get`) map to endpoints, branch keys to subtrees.
#[derive(Debug, Clone, Default)]
pub struct ClientTree {
    entries: BTreeMap<String, ClientNode>,
}

impl ClientTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, node: ClientNode) {
        self.entries.insert(key.into(), node);
    }

    pub fn get(&self, key: &str) -> Option<&ClientNode> {
        self.entries.get(key)
    }

    pub fn endpoint(&self, key: &str) -> Option<&RemoteFn> {
        match self.entries.get(key)? {
            ClientNode::Endpoint(f) => Some(f),
            ClientNode::Branch(_) => None,
        }
    }

    pub fn branch(&self, key: &str) -> Option<&ClientTree> {
        match self.entries.get(key)? {
            ClientNode::Branch(tree) => Some(tree),
            ClientNode::Endpoint(_) => None,
        }
    }

    /// Follow a `/`-separated key path, e.g. `api/users/by_id_get`.
    pub fn resolve(&self, path: &str) -> Option<&RemoteFn> {
        let (branches, leaf) = match path.rsplit_once('/') {
            Some((branches, leaf)) => (Some(branches), leaf),
            None => (None, path),
        };
        let mut tree = self;
        for key in branches.into_iter().flat_map(|b| b.split('/')) {
            tree = tree.branch(key)?;
        }
        tree.endpoint(leaf)
    }

    /// Call the endpoint at `path`.
    pub async fn call(&self, path: &str, args: ClientArgs) -> Result<Reply, ClientError> {
        self.resolve(path)
            .ok_or_else(|| ClientError::UnknownEndpoint(path.to_string()))?
            .call(args)
            .await
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClientNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every endpoint in the tree, depth first in key order.
    pub fn endpoints(&self) -> Vec<&RemoteFn> {
        let mut out = Vec::new();
        for node in self.entries.values() {
            match node {
                ClientNode::Endpoint(f) => out.push(f),
                ClientNode::Branch(tree) => out.extend(tree.endpoints()),
            }
        }
        out
    }
}
