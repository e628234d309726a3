//! Path-segment trie holding handler bindings.
//!
//! Responsibility:
//! - Registration: classify segments, reuse or create nodes, reject conflicts
//! - Lookup: priority walk with wildcard fallback
//! - Removal: drop bindings and prune nodes left empty
//!
//! Notes:
//! - Children are kept sorted by node rank, so the first matching child is the preferred one.
//! - Path parameters are collected into a per-lookup accumulator; nodes are never written
//!   during a lookup.
//! - Pruning runs while the removal recursion unwinds, which stands in for a parent pointer.

use std::collections::HashSet;

use axum::http::Method;

use crate::error::RegistrationError;
use crate::http::handler::HandlerBinding;
use crate::routing::node::PathNode;

/// Strip one leading and one trailing `/` and split on the rest.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').collect()
    }
}

fn parse_route(path: &str) -> Result<Vec<PathNode>, RegistrationError> {
    let segments = split_path(path);
    let mut nodes = Vec::with_capacity(segments.len());
    let mut parameters = HashSet::new();

    for (index, segment) in segments.iter().enumerate() {
        let node = PathNode::parse(path, index, segment)?;

        if node.is_wildcard() && index + 1 != segments.len() {
            return Err(RegistrationError::WildcardNotLast {
                path: path.to_string(),
            });
        }

        if let PathNode::Dynamic(name) = &node {
            if !parameters.insert(name.clone()) {
                return Err(RegistrationError::DuplicateParameter {
                    path: path.to_string(),
                    name: name.clone(),
                });
            }
        }

        nodes.push(node);
    }

    Ok(nodes)
}

#[derive(Debug, Clone, Default)]
pub struct HandlerTreeNode {
    path_node: Option<PathNode>,
    bindings: Vec<HandlerBinding>,
    children: Vec<HandlerTreeNode>,
}

impl HandlerTreeNode {
    fn with_path_node(path_node: PathNode) -> Self {
        Self {
            path_node: Some(path_node),
            ..Self::default()
        }
    }

    /// `None` for the root.
    pub fn path_node(&self) -> Option<&PathNode> {
        self.path_node.as_ref()
    }

    pub fn bindings(&self) -> &[HandlerBinding] {
        &self.bindings
    }

    pub fn children(&self) -> &[HandlerTreeNode] {
        &self.children
    }

    pub fn binding_for(&self, method: &Method) -> Option<&HandlerBinding> {
        self.bindings.iter().find(|b| b.method() == method)
    }

    fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.children.is_empty()
    }

    fn rank(&self) -> u8 {
        self.path_node.as_ref().map_or(0, PathNode::rank)
    }

    fn matches(&self, segment: &str) -> bool {
        self.path_node.as_ref().is_some_and(|n| n.matches(segment))
    }

    fn wildcard_child(&self) -> Option<&HandlerTreeNode> {
        self.children
            .iter()
            .find(|c| c.path_node.as_ref().is_some_and(PathNode::is_wildcard))
    }

    fn descend_or_create(
        &mut self,
        node: PathNode,
        path: &str,
    ) -> Result<&mut HandlerTreeNode, RegistrationError> {
        if let PathNode::Dynamic(name) = &node {
            let existing = self.children.iter().find_map(|c| match &c.path_node {
                Some(PathNode::Dynamic(other)) if other != name => Some(other),
                _ => None,
            });
            if let Some(existing) = existing {
                return Err(RegistrationError::ConflictingParameter {
                    path: path.to_string(),
                    name: name.clone(),
                    existing: existing.clone(),
                });
            }
        }

        let found = self
            .children
            .iter()
            .position(|c| c.path_node.as_ref().is_some_and(|p| p.same_identity(&node)));
        let index = match found {
            Some(index) => index,
            None => {
                let rank = node.rank();
                let index = self
                    .children
                    .iter()
                    .position(|c| c.rank() > rank)
                    .unwrap_or(self.children.len());
                self.children.insert(index, Self::with_path_node(node));
                index
            }
        };

        Ok(&mut self.children[index])
    }

    fn remove_where(&mut self, predicate: &dyn Fn(&HandlerBinding) -> bool) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|b| !predicate(b));
        let mut removed = before - self.bindings.len();

        self.children.retain_mut(|child| {
            let removed_below = child.remove_where(predicate);
            removed += removed_below;
            !(removed_below > 0 && child.is_empty())
        });

        removed
    }

    fn collect<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a HandlerBinding)>) {
        let path = match &self.path_node {
            Some(node) if prefix == "/" => format!("/{}", node),
            Some(node) => format!("{}/{}", prefix, node),
            None => "/".to_string(),
        };

        for binding in &self.bindings {
            out.push((path.clone(), binding));
        }
        for child in &self.children {
            child.collect(&path, out);
        }
    }
}

#[derive(Debug, Clone)]
struct Capture {
    depth: usize,
    name: String,
    value: String,
}

/// Result of a tree lookup, borrowing the matched node.
#[derive(Debug)]
pub struct TreeMatch<'a> {
    pub node: &'a HandlerTreeNode,
    trail: Vec<&'a PathNode>,
    captures: Vec<Capture>,
}

impl<'a> TreeMatch<'a> {
    /// Registered shape of the matched route, e.g. `/api/test/{name}`.
    pub fn tree_path(&self) -> String {
        let mut out = String::new();
        for node in &self.trail {
            out.push('/');
            out.push_str(&node.to_string());
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    pub fn into_path_params(self) -> impl Iterator<Item = (String, String)> {
        self.captures.into_iter().map(|c| (c.name, c.value))
    }
}

#[derive(Debug, Clone, Default)]
pub struct HandlerTree {
    root: HandlerTreeNode,
}

impl HandlerTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &HandlerTreeNode {
        &self.root
    }

    /// Bind `binding` at `path`. Conflicts can only surface on nodes that already exist, so a
    /// failed registration leaves the tree unchanged.
    pub fn register(&mut self, path: &str, binding: HandlerBinding) -> Result<(), RegistrationError> {
        let nodes = parse_route(path)?;

        let mut current = &mut self.root;
        for node in nodes {
            current = current.descend_or_create(node, path)?;
        }

        if current.binding_for(binding.method()).is_some() {
            return Err(RegistrationError::DuplicateHandler {
                path: path.to_string(),
                method: binding.method().to_string(),
            });
        }

        current.bindings.push(binding);
        Ok(())
    }

    pub fn find(&self, path: &str) -> Option<TreeMatch<'_>> {
        let segments = split_path(path);

        let mut current = &self.root;
        let mut trail: Vec<&PathNode> = Vec::with_capacity(segments.len());
        let mut captures: Vec<Capture> = Vec::new();
        // deepest wildcard seen so far and the depth of the segment it would consume
        let mut fallback: Option<(&HandlerTreeNode, usize)> = None;

        for (depth, segment) in segments.iter().enumerate() {
            if let Some(wildcard) = current.wildcard_child() {
                fallback = Some((wildcard, depth));
            }

            let Some(child) = current.children.iter().find(|c| c.matches(segment)) else {
                return fallback.map(|(node, depth)| {
                    captures.retain(|c| c.depth < depth);
                    trail.truncate(depth);
                    trail.extend(node.path_node.as_ref());
                    TreeMatch {
                        node,
                        trail,
                        captures,
                    }
                });
            };

            let Some(path_node) = child.path_node.as_ref() else {
                return None;
            };
            trail.push(path_node);

            match path_node {
                PathNode::Dynamic(name) => captures.push(Capture {
                    depth,
                    name: name.clone(),
                    value: (*segment).to_string(),
                }),
                PathNode::Wildcard => {
                    return Some(TreeMatch {
                        node: child,
                        trail,
                        captures,
                    });
                }
                PathNode::Static(_) => {}
            }

            current = child;
        }

        Some(TreeMatch {
            node: current,
            trail,
            captures,
        })
    }

    /// Remove every binding matching `predicate`, pruning nodes left without bindings and
    /// children. The root is never removed. Returns the number of removed bindings.
    pub fn remove_where(&mut self, predicate: impl Fn(&HandlerBinding) -> bool) -> usize {
        self.root.remove_where(&predicate)
    }

    pub fn clear(&mut self) {
        self.root.bindings.clear();
        self.root.children.clear();
    }

    /// Every binding with the registered shape of its route.
    pub fn bindings(&self) -> Vec<(String, &HandlerBinding)> {
        let mut out = Vec::new();
        self.root.collect("", &mut out);
        out
    }
}
