//! Gee core: trie routing, route groups, middleware chain, HTTP server.

pub mod config;
pub mod context;
pub mod engine;
pub mod middleware;
pub mod router;
pub mod server;
pub mod trie;

pub use config::ServerConfig;
pub use context::Context;
pub use engine::{Engine, EngineBuilder, RouterGroup};
pub use router::{parse_pattern, Router};
pub use server::Application;
pub use trie::Node;

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeeError {
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("route {pattern:?} conflicts at segment {segment:?} with existing wildcard {existing:?}")]
    RouteConflict {
        pattern: String,
        segment: String,
        existing: String,
    },
    #[error("request body: {0}")]
    Body(String),
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("request path is not valid UTF-8 once decoded: {0}")]
    InvalidPath(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Handler and middleware share one shape: a callable over the per-request Context.
pub type HandlerFunc = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Inbound request as handed over by the transport.
#[derive(Clone, Debug, Default)]
pub struct Request {
    pub method: String,
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: &str, path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, q),
            None => (path, ""),
        };
        Self {
            method: method.to_uppercase(),
            path: path.to_owned(),
            query: query.to_owned(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Outbound response produced by the handler chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("")
    }
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status_code: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}
