//! Per-request state: route params, the resolved handler chain and the response being written.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use url::form_urlencoded;

use crate::{HandlerFunc, Request, Response};

/// Request context. Created by the engine for one request and dropped once the response is built.
pub struct Context {
    req: Request,
    params: HashMap<String, String>,
    status_code: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    handlers: Vec<HandlerFunc>,
    // Number of chain positions already entered.
    index: usize,
}

impl Context {
    pub fn new(req: Request, handlers: Vec<HandlerFunc>) -> Self {
        Self {
            req,
            params: HashMap::new(),
            status_code: 0,
            headers: Vec::new(),
            body: Vec::new(),
            handlers,
            index: 0,
        }
    }

    /// Run the rest of the chain. Called by dispatch once, and by middleware to wrap
    /// downstream handlers: code after `next()` runs once they have all returned.
    pub fn next(&mut self) {
        while self.index < self.handlers.len() {
            let handler = Arc::clone(&self.handlers[self.index]);
            self.index += 1;
            handler(self);
        }
    }

    /// Stop the chain and answer `{"message": message}` with `code`.
    /// Handlers not yet entered are skipped; the caller's own remaining code still runs.
    pub fn fail(&mut self, code: u16, message: &str) {
        self.index = self.handlers.len();
        self.json(code, &json!({ "message": message }));
    }

    pub fn method(&self) -> &str {
        &self.req.method
    }

    pub fn path(&self) -> &str {
        &self.req.path
    }

    pub fn request(&self) -> &Request {
        &self.req
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn push_handler(&mut self, handler: HandlerFunc) {
        self.handlers.push(handler);
    }

    /// Value bound by a `:name` or `*name` segment of the matched route.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// First value of `key` in the URL query string, percent-decoded.
    pub fn query(&self, key: &str) -> Option<String> {
        lookup_form(self.req.query.as_bytes(), key)
    }

    /// First value of `key` in a url-encoded form body, falling back to the query string.
    pub fn post_form(&self, key: &str) -> Option<String> {
        let is_form = self
            .req
            .header("content-type")
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        if is_form {
            if let Some(v) = lookup_form(&self.req.body, key) {
                return Some(v);
            }
        }
        self.query(key)
    }

    /// Request header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.req.header(name)
    }

    /// Status written so far; 0 until a handler sets one.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Status the response will carry: the written one, or 200 when none was written.
    pub fn effective_status(&self) -> u16 {
        if self.status_code == 0 {
            200
        } else {
            self.status_code
        }
    }

    pub fn status(&mut self, code: u16) {
        self.status_code = code;
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(entry) => entry.1 = value.to_owned(),
            None => self.headers.push((key.to_owned(), value.to_owned())),
        }
    }

    pub fn string(&mut self, code: u16, body: impl AsRef<str>) {
        self.set_header("Content-Type", "text/plain");
        self.status(code);
        self.body.extend_from_slice(body.as_ref().as_bytes());
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, code: u16, obj: &T) {
        match serde_json::to_vec(obj) {
            Ok(bytes) => {
                self.set_header("Content-Type", "application/json");
                self.status(code);
                self.body.extend_from_slice(&bytes);
            }
            Err(e) => {
                tracing::error!(error = %e, path = %self.req.path, "json encoding failed");
                self.string(500, e.to_string());
            }
        }
    }

    pub fn data(&mut self, code: u16, data: &[u8]) {
        self.status(code);
        self.body.extend_from_slice(data);
    }

    pub fn html(&mut self, code: u16, html: &str) {
        self.set_header("Content-Type", "text/html");
        self.status(code);
        self.body.extend_from_slice(html.as_bytes());
    }

    pub fn into_response(self) -> Response {
        Response {
            status_code: self.effective_status(),
            headers: self.headers,
            body: self.body,
        }
    }
}

fn lookup_form(input: &[u8], key: &str) -> Option<String> {
    form_urlencoded::parse(input)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
