//! Prefix tree over path segments. One tree per HTTP method, owned by the Router.

use std::fmt;

use crate::GeeError;

/// Trie node. `pattern` is set only on the terminal node of a registered route.
#[derive(Debug, Default)]
pub struct Node {
    pattern: String,
    part: String,
    children: Vec<Node>,
    is_wild: bool,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    fn child(part: &str) -> Self {
        Self {
            pattern: String::new(),
            part: part.to_owned(),
            children: Vec::new(),
            is_wild: is_wild_part(part),
        }
    }

    /// Full route pattern, empty unless this node terminates a registered route.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn part(&self) -> &str {
        &self.part
    }

    pub fn is_wild(&self) -> bool {
        self.is_wild
    }

    /// Insert `parts[height..]` below this node and mark the last node with `pattern`.
    pub fn insert(&mut self, pattern: &str, parts: &[&str], height: usize) -> Result<(), GeeError> {
        if parts.len() == height {
            if !self.pattern.is_empty() && self.pattern != pattern {
                tracing::warn!(
                    previous = %self.pattern,
                    pattern = %pattern,
                    "route pattern replaces an equivalent registration"
                );
            }
            self.pattern = pattern.to_owned();
            return Ok(());
        }

        let part = parts[height];
        let index = match self.match_child(pattern, part)? {
            Some(i) => i,
            None => {
                self.children.push(Node::child(part));
                self.children.len() - 1
            }
        };
        self.children[index].insert(pattern, parts, height + 1)
    }

    /// Depth-first lookup of the first registered node matching `parts`, in child order.
    pub fn search(&self, parts: &[&str], height: usize) -> Option<&Node> {
        if parts.len() == height || self.part.starts_with('*') {
            return (!self.pattern.is_empty()).then_some(self);
        }

        let part = parts[height];
        self.match_children(part)
            .into_iter()
            .find_map(|child| child.search(parts, height + 1))
    }

    /// Collect every node that terminates a registered route, pre-order.
    pub fn travel<'a>(&'a self, list: &mut Vec<&'a Node>) {
        if !self.pattern.is_empty() {
            list.push(self);
        }
        for child in &self.children {
            child.travel(list);
        }
    }

    // Two differently named wild segments under one parent would make one of them unreachable.
    fn match_child(&self, pattern: &str, part: &str) -> Result<Option<usize>, GeeError> {
        for (i, child) in self.children.iter().enumerate() {
            if child.part == part {
                return Ok(Some(i));
            }
            if child.is_wild && is_wild_part(part) {
                return Err(GeeError::RouteConflict {
                    pattern: pattern.to_owned(),
                    segment: part.to_owned(),
                    existing: child.part.clone(),
                });
            }
        }
        Ok(None)
    }

    fn match_children(&self, part: &str) -> Vec<&Node> {
        self.children
            .iter()
            .filter(|child| child.part == part || child.is_wild)
            .collect()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node{{pattern={}, part={}, is_wild={}}}",
            self.pattern, self.part, self.is_wild
        )
    }
}

fn is_wild_part(part: &str) -> bool {
    part.starts_with(':') || part.starts_with('*')
}
