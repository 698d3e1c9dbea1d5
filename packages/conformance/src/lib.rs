//! Shared helpers for the spectree conformance test suite.
//!
//! [`spawn_api`] binds a `TcpListener` on an ephemeral port, compiles a tree
//! into an axum router plus a client pointed at that port, and serves the
//! router in the background. Tests then talk to a real server either through
//! the compiled client or with a plain `reqwest` client.

use std::sync::Arc;

use spectree::{
    compile_api,
    demo::{notes_api, NoteStore},
    ApiOptions, AxumRegistrar, ClientTree, SpecTree,
};
use spectree_server::ControllerConfig;

/// Start an ephemeral in-process server for `tree` and return
/// `(base_url, client)`.
///
/// The server runs in a background `tokio` task bound to an OS-assigned port
/// on `127.0.0.1`; `base_url` looks like `http://127.0.0.1:51234`.
///
/// # Panics
///
/// Panics if the listener cannot be bound or the tree does not compile.
pub async fn spawn_api(tree: &SpecTree, config: ControllerConfig) -> (String, ClientTree) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://{addr}");

    let options = ApiOptions::new(base_url.clone()).controller(config);
    let api = compile_api(tree, &options, &AxumRegistrar).expect("compile API tree");

    let router = api.router;
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("conformance server error");
    });

    (base_url, api.client)
}

/// [`spawn_api`] over the demo notes API, also returning its store so tests
/// can seed or inspect notes without going through HTTP.
pub async fn spawn_notes(config: ControllerConfig) -> (String, ClientTree, Arc<NoteStore>) {
    let store = Arc::new(NoteStore::new());
    let tree = notes_api(Arc::clone(&store)).expect("implement notes API");
    let (base_url, client) = spawn_api(&tree, config).await;
    (base_url, client, store)
}
