//! Engine: route groups and request dispatch.
//!
//! Setup goes through `EngineBuilder` (groups, middleware, routes); `build()` freezes it into an
//! `Engine` that is shared read-only between connections.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ServerConfig;
use crate::context::Context;
use crate::middleware::{logger, recovery};
use crate::router::Router;
use crate::server::{self, Application};
use crate::trie::Node;
use crate::{GeeError, HandlerFunc, Request, Response};

/// Prefix scope with its middleware. The prefix is already joined with every parent prefix.
struct GroupScope {
    prefix: String,
    middlewares: Vec<HandlerFunc>,
}

/// Registration phase: collects groups and routes, then builds the serving `Engine`.
pub struct EngineBuilder {
    router: Router,
    groups: Vec<GroupScope>,
}

/// Handle to one group inside an `EngineBuilder`. Routes registered here get the group prefix.
pub struct RouterGroup<'a> {
    builder: &'a mut EngineBuilder,
    index: usize,
}

/// Serving phase: immutable router plus every group, in creation order.
pub struct Engine {
    router: Router,
    groups: Vec<GroupScope>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            groups: vec![GroupScope {
                prefix: String::new(),
                middlewares: Vec::new(),
            }],
        }
    }

    /// Builder with `logger()` and `recovery()` installed on the root group.
    pub fn with_defaults() -> Self {
        let mut builder = Self::new();
        builder.use_middleware(logger()).use_middleware(recovery());
        builder
    }

    fn new_group(&mut self, parent: usize, prefix: &str) -> usize {
        let prefix = format!("{}{}", self.groups[parent].prefix, prefix);
        tracing::debug!(prefix = %prefix, "route group created");
        self.groups.push(GroupScope {
            prefix,
            middlewares: Vec::new(),
        });
        self.groups.len() - 1
    }

    /// The implicit root group (empty prefix).
    pub fn root(&mut self) -> RouterGroup<'_> {
        RouterGroup {
            builder: self,
            index: 0,
        }
    }

    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        let index = self.new_group(0, prefix);
        RouterGroup {
            builder: self,
            index,
        }
    }

    pub fn use_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.root().use_middleware(middleware);
        self
    }

    pub fn add_route<F>(&mut self, method: &str, pattern: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.root().add_route(method, pattern, handler)
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route("GET", pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route("POST", pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route("PUT", pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route("DELETE", pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route("PATCH", pattern, handler)
    }

    pub fn build(self) -> Engine {
        Engine {
            router: self.router,
            groups: self.groups,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterGroup<'_> {
    /// Full prefix of this group.
    pub fn prefix(&self) -> &str {
        &self.builder.groups[self.index].prefix
    }

    /// Nested group; its prefix is this group's prefix followed by `prefix`.
    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        let index = self.builder.new_group(self.index, prefix);
        RouterGroup {
            builder: &mut *self.builder,
            index,
        }
    }

    /// Append middleware; group middleware runs in registration order.
    pub fn use_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.builder.groups[self.index]
            .middlewares
            .push(Arc::new(middleware));
        self
    }

    pub fn add_route<F>(&mut self, method: &str, comp: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        let pattern = format!("{}{}", self.prefix(), comp);
        tracing::info!(method = %method, pattern = %pattern, "route");
        self.builder
            .router
            .add_route(method, &pattern, Arc::new(handler))
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route("GET", pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route("POST", pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route("PUT", pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route("DELETE", pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> Result<(), GeeError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route("PATCH", pattern, handler)
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Dispatch one request: collect middleware of every group whose prefix starts the path,
    /// resolve the route and run the chain to completion.
    pub fn handle(&self, req: Request) -> Response {
        let middlewares: Vec<HandlerFunc> = self
            .groups
            .iter()
            .filter(|group| req.path.starts_with(&group.prefix))
            .flat_map(|group| group.middlewares.iter().cloned())
            .collect();
        let mut c = Context::new(req, middlewares);
        self.router.handle(&mut c);
        c.into_response()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Registered routes for `method`, for inspection.
    pub fn routes(&self, method: &str) -> Vec<&Node> {
        self.router.get_routes(method)
    }

    /// Prefixes of all groups in creation order; the root group is `""`.
    pub fn group_prefixes(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.prefix.as_str()).collect()
    }

    /// Serve on `config` until Ctrl-C. Blocks the calling thread.
    pub fn run(self, config: &ServerConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        server::run(Arc::new(self), config)
    }
}

#[async_trait]
impl Application for Engine {
    async fn call(&self, req: Request) -> Response {
        self.handle(req)
    }
}
