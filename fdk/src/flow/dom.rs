//! Retained element tree the flow view renders into

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// An element with classes, attributes, optional text and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    pub tag: String,
    pub classes: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Depth-first search for nodes carrying `class`
    pub fn find_by_class<'a>(&'a self, class: &str, found: &mut Vec<&'a Node>) {
        if self.has_class(class) {
            found.push(self);
        }
        for child in &self.children {
            child.find_by_class(class, found);
        }
    }

    fn write_outline(&self, depth: usize, out: &mut String) {
        let _ = write!(out, "{}<{}", "  ".repeat(depth), self.tag);
        if !self.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", self.classes.join(" "));
        }
        for (name, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", name, value);
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        out.push('\n');
        for child in &self.children {
            child.write_outline(depth + 1, out);
        }
    }
}

/// Named containers, each holding a list of root nodes
///
/// A node inside a container is addressed by its index path: `[2, 0]` is the
/// first child of the container's third root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    containers: BTreeMap<String, Vec<Node>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty container; an existing one is left untouched
    pub fn create_container(&mut self, id: &str) {
        self.containers.entry(id.to_string()).or_default();
    }

    pub fn has_container(&self, id: &str) -> bool {
        self.containers.contains_key(id)
    }

    /// Replace every child of a container; false when it does not exist
    pub fn replace_children(&mut self, id: &str, children: Vec<Node>) -> bool {
        match self.containers.get_mut(id) {
            Some(existing) => {
                *existing = children;
                true
            }
            None => false,
        }
    }

    pub fn children(&self, id: &str) -> Option<&[Node]> {
        self.containers.get(id).map(Vec::as_slice)
    }

    pub fn node(&self, id: &str, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.containers.get(id)?.get(*first)?;
        for index in rest {
            node = node.children.get(*index)?;
        }
        Some(node)
    }

    /// The node at `path` and its ancestors up to the container, closest first
    ///
    /// Empty when the container or path does not exist.
    pub fn ancestors(&self, id: &str, path: &[usize]) -> Vec<&Node> {
        let mut chain = Vec::with_capacity(path.len());
        for depth in 1..=path.len() {
            match self.node(id, &path[..depth]) {
                Some(node) => chain.push(node),
                None => return Vec::new(),
            }
        }
        chain.reverse();
        chain
    }

    /// Index path of every node carrying `class`, in document order
    pub fn paths_by_class(&self, id: &str, class: &str) -> Vec<Vec<usize>> {
        fn walk(nodes: &[Node], class: &str, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
            for (i, node) in nodes.iter().enumerate() {
                prefix.push(i);
                if node.has_class(class) {
                    out.push(prefix.clone());
                }
                walk(&node.children, class, prefix, out);
                prefix.pop();
            }
        }
        let mut out = Vec::new();
        if let Some(roots) = self.containers.get(id) {
            walk(roots, class, &mut Vec::new(), &mut out);
        }
        out
    }

    /// Indented outline of a container, one element per line
    pub fn render_text(&self, id: &str) -> Option<String> {
        let roots = self.containers.get(id)?;
        let mut out = String::new();
        for node in roots {
            node.write_outline(0, &mut out);
        }
        Some(out)
    }
}
