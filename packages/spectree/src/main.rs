//! `spectree-demo`: serve, list or call the in-memory notes API.
//!
//! # Quick start
//!
//! ```sh
//! # Serve on the default address with response-contract checks on:
//! SPECTREE_ENV=dev spectree-demo serve
//!
//! # Print every route:
//! spectree-demo routes
//!
//! # Call the running server through the compiled client:
//! spectree-demo call notes/create_post --body '{"title":"hello"}'
//! spectree-demo call 'notes/{id}_get' --param id=n1
//! ```
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SPECTREE_BIND` | `127.0.0.1:3000` | Address `serve` listens on |
//! | `SPECTREE_BASE_URL` | `http://<bind>` | Base URL the client calls |
//! | `SPECTREE_ENV` | `production` | `dev`/`development` checks every response against its schema; see [`ControllerConfig::from_env`] |

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use spectree::{
    compile_api, compile_client,
    demo::{notes_api, notes_tree, NoteStore},
    ApiOptions, AxumRegistrar, ClientArgs, Reply, RouteTable,
};
use spectree_core::Value;
use spectree_server::ControllerConfig;
use tower_http::trace::TraceLayer;

/// spectree-demo: an API tree compiled into a server and a client
#[derive(Parser)]
#[command(name = "spectree-demo", version, about, long_about = None)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "SPECTREE_BIND", default_value = "127.0.0.1:3000", global = true)]
    bind: SocketAddr,

    /// Base URL for client calls. Defaults to `http://<bind>`.
    #[arg(long, env = "SPECTREE_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Check every response against its schema even when `SPECTREE_ENV`
    /// does not select development mode.
    #[arg(long, global = true)]
    dev: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the notes API.
    Serve,

    /// Print `VERB /path` for every endpoint.
    Routes,

    /// Call one endpoint through the compiled client and print the reply.
    ///
    /// Exits 0 on a data reply, 1 on an error envelope.
    Call {
        /// Key path of the endpoint, e.g. `notes/list_get`.
        path: String,

        /// JSON request body.
        #[arg(long)]
        body: Option<String>,

        /// Query parameter, repeatable.
        #[arg(long = "query", value_name = "KEY=VALUE", value_parser = parse_pair)]
        query: Vec<(String, String)>,

        /// Path parameter, repeatable.
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_pair)]
        params: Vec<(String, String)>,

        /// Extra request header, repeatable.
        #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_pair)]
        headers: Vec<(String, String)>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "spectree=info,spectree_demo=info,spectree_server=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ControllerConfig::from_env();
    if cli.dev {
        config.dev_mode = true;
    }
    let base_url = cli
        .base_url
        .clone()
        .unwrap_or_else(|| format!("http://{}", cli.bind));
    let options = ApiOptions::new(base_url).controller(config);

    match cli.command {
        Command::Serve => serve(cli.bind, &options).await,
        Command::Routes => {
            let api = compile_api(&notes_tree(), &options, &RouteTable::default())
                .unwrap_or_else(|e| fail(&e.to_string()));
            print!("{}", api.router);
        }
        Command::Call {
            path,
            body,
            query,
            params,
            headers,
        } => call(&options, &path, body, query, params, headers).await,
    }
}

async fn serve(bind: SocketAddr, options: &ApiOptions) {
    let tree = notes_api(Arc::new(NoteStore::new())).unwrap_or_else(|e| fail(&e.to_string()));
    let api = compile_api(&tree, options, &AxumRegistrar).unwrap_or_else(|e| fail(&e.to_string()));
    let app = api.router.layer(TraceLayer::new_for_http());

    tracing::info!(dev_mode = options.controller.dev_mode, "listening on {bind}");
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .unwrap_or_else(|e| fail(&format!("failed to bind {bind}: {e}")));

    if let Err(e) = axum::serve(listener, app).await {
        fail(&format!("server error: {e}"));
    }
}

async fn call(
    options: &ApiOptions,
    path: &str,
    body: Option<String>,
    query: Vec<(String, String)>,
    params: Vec<(String, String)>,
    headers: Vec<(String, String)>,
) {
    let client = compile_client(&notes_tree(), options).unwrap_or_else(|e| fail(&e.to_string()));

    let mut args = ClientArgs::new();
    if let Some(raw) = body {
        let json: serde_json::Value = serde_json::from_str(&raw)
            .unwrap_or_else(|e| fail(&format!("--body is not valid JSON: {e}")));
        args = args.body(Value::from(json));
    }
    for (key, value) in query {
        args = args.query(key, value);
    }
    for (key, value) in params {
        args = args.param(key, value);
    }
    for (name, value) in headers {
        args = args.header(name, value);
    }

    match client.call(path, args).await {
        Ok(Reply::Data(data)) => println!("{data}"),
        Ok(Reply::Error { status, error }) => {
            println!("{status} {error}");
            process::exit(1);
        }
        Err(e) => fail(&e.to_string()),
    }
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))
}

fn fail(msg: &str) -> ! {
    eprintln!("spectree-demo: {msg}");
    process::exit(2);
}
