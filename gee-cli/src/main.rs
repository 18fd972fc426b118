//! CLI for gee: run the demo server or print its route table.

use std::time::Instant;

use clap::{Parser, Subcommand};
use gee_core::config::{DEFAULT_HOST, DEFAULT_PORT};
use gee_core::{Context, Engine, EngineBuilder, GeeError, ServerConfig};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gee")]
#[command(about = "Gee demo server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the demo routes (HOST/PORT env, overridden by flags).
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print every registered route, grouped by method.
    Routes,
}

fn only_for_v2() -> impl Fn(&mut Context) + Send + Sync + 'static {
    |c: &mut Context| {
        let start = Instant::now();
        c.fail(500, "Internal Server Error");
        tracing::info!(
            status = c.status_code(),
            path = %c.path(),
            elapsed = ?start.elapsed(),
            "for group v2"
        );
    }
}

fn demo_engine() -> Result<Engine, GeeError> {
    let mut r = EngineBuilder::with_defaults();
    r.get("/", |c| c.html(200, "<h1>Hello Gee</h1>"))?;
    r.get("/assets/*filepath", |c| {
        let filepath = c.param("filepath").unwrap_or("").to_string();
        c.json(200, &json!({ "filepath": filepath }));
    })?;

    {
        let mut v1 = r.group("/v1");
        v1.get("/hello", |c| {
            let name = c.query("name").unwrap_or_default();
            let body = format!("hello {}, you're at {}\n", name, c.path());
            c.string(200, body);
        })?;
        v1.post("/login", |c| {
            let username = c.post_form("username").unwrap_or_default();
            let password = c.post_form("password").unwrap_or_default();
            c.json(200, &json!({ "username": username, "password": password }));
        })?;
    }

    {
        let mut v2 = r.group("/v2");
        v2.use_middleware(only_for_v2());
        v2.get("/hello/:name", |c| {
            let name = c.param("name").unwrap_or("").to_string();
            let body = format!("hello {}, you're at {}\n", name, c.path());
            c.string(200, body);
        })?;
    }

    Ok(r.build())
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gee=debug,gee_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let engine = demo_engine()?;
    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = ServerConfig::from_env(DEFAULT_HOST, DEFAULT_PORT);
            if let Some(h) = host {
                config.host = h;
            }
            if let Some(p) = port {
                config.port = p;
            }
            engine.run(&config)
        }
        Commands::Routes => {
            for method in engine.router().methods() {
                for node in engine.routes(method) {
                    println!("{:<6} {}", method, node.pattern());
                }
            }
            Ok(())
        }
    }
}
