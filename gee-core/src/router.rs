//! Router: per-method tries plus a "METHOD-pattern" -> handler table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::Context;
use crate::trie::Node;
use crate::{GeeError, HandlerFunc};

/// Route registry. Mutated while the engine is being built, read-only while serving.
#[derive(Default)]
pub struct Router {
    roots: HashMap<String, Node>,
    handlers: HashMap<String, HandlerFunc>,
}

/// Split a pattern or request path on `/`, dropping empty segments.
/// Parsing stops after the first segment that starts with `*`.
pub fn parse_pattern(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for item in pattern.split('/').filter(|s| !s.is_empty()) {
        parts.push(item);
        if item.starts_with('*') {
            break;
        }
    }
    parts
}

fn handler_key(method: &str, pattern: &str) -> String {
    format!("{}-{}", method, pattern)
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(
        &mut self,
        method: &str,
        pattern: &str,
        handler: HandlerFunc,
    ) -> Result<(), GeeError> {
        let method = method.to_uppercase();
        let parts = parse_pattern(pattern);
        validate_pattern(pattern, &parts)?;

        self.roots
            .entry(method.clone())
            .or_default()
            .insert(pattern, &parts, 0)?;
        self.handlers.insert(handler_key(&method, pattern), handler);
        Ok(())
    }

    /// Resolve `path` to a registered node and the parameters bound by its pattern.
    pub fn get_route(&self, method: &str, path: &str) -> Option<(&Node, HashMap<String, String>)> {
        let search_parts = parse_pattern(path);
        let root = self.roots.get(&method.to_uppercase())?;
        let node = root.search(&search_parts, 0)?;

        let mut params = HashMap::new();
        for (index, part) in parse_pattern(node.pattern()).into_iter().enumerate() {
            if let Some(name) = part.strip_prefix(':') {
                params.insert(name.to_owned(), search_parts[index].to_owned());
            }
            if let Some(name) = part.strip_prefix('*') {
                if !name.is_empty() {
                    params.insert(name.to_owned(), search_parts[index..].join("/"));
                }
                break;
            }
        }
        Some((node, params))
    }

    /// Every registered route node for `method`, in trie pre-order.
    pub fn get_routes(&self, method: &str) -> Vec<&Node> {
        let mut nodes = Vec::new();
        if let Some(root) = self.roots.get(&method.to_uppercase()) {
            root.travel(&mut nodes);
        }
        nodes
    }

    /// Methods with at least one registered route, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.roots.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    /// Append the matched handler (or a 404 handler) to the chain and run it.
    pub fn handle(&self, c: &mut Context) {
        let resolved = self.get_route(c.method(), c.path()).and_then(|(node, params)| {
            let key = handler_key(&c.method().to_uppercase(), node.pattern());
            let handler = self.handlers.get(&key)?;
            Some((Arc::clone(handler), params))
        });

        match resolved {
            Some((handler, params)) => {
                c.set_params(params);
                c.push_handler(handler);
            }
            None => {
                tracing::debug!(method = %c.method(), path = %c.path(), "no route matched");
                c.push_handler(Arc::new(not_found));
            }
        }
        c.next();
    }
}

fn not_found(c: &mut Context) {
    let body = format!("404 NOT FOUND: {}\n", c.path());
    c.string(404, body);
}

fn validate_pattern(pattern: &str, parts: &[&str]) -> Result<(), GeeError> {
    let declared = pattern.split('/').filter(|s| !s.is_empty()).count();
    if declared > parts.len() {
        return Err(GeeError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: "segments after a wildcard are unreachable".into(),
        });
    }
    if parts.iter().any(|p| *p == ":") {
        return Err(GeeError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: "parameter segment without a name".into(),
        });
    }
    Ok(())
}
