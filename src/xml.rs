//! Owned XML node tree built with quick-xml.
//!
//! Every element keeps its resolved qualified name, its attributes in
//! document order and a shared handle to the namespace bindings in scope, so
//! prefixed values such as unit measures and type references can be resolved
//! after parsing.

use crate::namespaces::{NamespaceBindings, NamespaceManager, QualifiedName, XML_NS};
use crate::{Error, Result};
use compact_str::CompactString;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualifiedName,
    pub value: String,
}

impl Attribute {
    pub fn namespace_uri(&self) -> &str {
        &self.name.namespace_uri
    }

    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }

    pub fn prefix(&self) -> &str {
        &self.name.prefix
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: QualifiedName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub text: String,
    /// `xmlns` declarations made on this element, as (prefix, uri). The
    /// default namespace uses the empty prefix.
    pub namespace_declarations: Vec<(CompactString, CompactString)>,
    scope: Arc<NamespaceBindings>,
}

impl Node {
    pub fn namespace_uri(&self) -> &str {
        &self.name.namespace_uri
    }

    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }

    pub fn is(&self, namespace_uri: &str, local_name: &str) -> bool {
        self.name.is(namespace_uri, local_name)
    }

    pub fn attribute(&self, namespace_uri: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(namespace_uri, local_name))
            .map(|a| a.value.as_str())
    }

    /// Unqualified attribute lookup.
    pub fn attr(&self, local_name: &str) -> Option<&str> {
        self.attribute("", local_name)
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter()
    }

    pub fn children_named<'a>(
        &'a self,
        namespace_uri: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        self.children
            .iter()
            .filter(move |c| c.is(namespace_uri, local_name))
    }

    pub fn first_child(&self, namespace_uri: &str, local_name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.is(namespace_uri, local_name))
    }

    /// Trimmed direct text of the element.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Text of the element and all of its descendants, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.trim().to_string()
    }

    fn collect_text(&self, out: &mut String) {
        if !self.text.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(self.text.trim());
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    pub fn namespace_scope(&self) -> &NamespaceBindings {
        &self.scope
    }

    /// Resolves a `prefix:local` value against the bindings in scope at this
    /// node. Unprefixed values take the default namespace. Returns `None` when
    /// the prefix is not bound.
    pub fn resolve_qname(&self, value: &str) -> Option<QualifiedName> {
        let value = value.trim();
        match value.split_once(':') {
            Some((prefix, local)) => {
                let uri = self.scope.lookup(prefix)?;
                Some(QualifiedName::with_prefix(uri, local, prefix))
            }
            None => Some(QualifiedName::new(
                self.scope.default_namespace().unwrap_or(""),
                value,
            )),
        }
    }

    /// All descendants in document order, excluding the node itself.
    pub fn descendants(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        for child in &self.children {
            child.push_self_and_descendants(&mut out);
        }
        out
    }

    fn push_self_and_descendants<'a>(&'a self, out: &mut Vec<&'a Node>) {
        out.push(self);
        for child in &self.children {
            child.push_self_and_descendants(out);
        }
    }

    /// Evaluates a small path language: `//p:a` selects every matching node
    /// at or below this one, `p:a/p:b` walks child steps, `*` matches any
    /// element. Prefixes are resolved through `namespaces`; an unknown prefix
    /// selects nothing.
    pub fn select_nodes(&self, path: &str, namespaces: &NamespaceManager) -> Vec<&Node> {
        let (descendant, rest) = match path.strip_prefix("//") {
            Some(rest) => (true, rest),
            None => (false, path.trim_start_matches('/')),
        };

        let mut steps = Vec::new();
        for step in rest.split('/').filter(|s| !s.is_empty()) {
            match NameTest::parse(step, namespaces) {
                Some(test) => steps.push(test),
                None => return Vec::new(),
            }
        }
        let Some((first, tail)) = steps.split_first() else {
            return Vec::new();
        };

        let mut current: Vec<&Node> = if descendant {
            let mut all = Vec::new();
            self.push_self_and_descendants(&mut all);
            all.into_iter().filter(|n| first.matches(n)).collect()
        } else {
            self.children.iter().filter(|n| first.matches(n)).collect()
        };

        for step in tail {
            current = current
                .into_iter()
                .flat_map(|n| n.children.iter())
                .filter(|n| step.matches(n))
                .collect();
        }
        current
    }
}

enum NameTest<'a> {
    Any,
    Name { uri: CompactString, local: &'a str },
}

impl<'a> NameTest<'a> {
    fn parse(step: &'a str, namespaces: &NamespaceManager) -> Option<Self> {
        if step == "*" {
            return Some(NameTest::Any);
        }
        match step.split_once(':') {
            Some((prefix, local)) => {
                let uri = namespaces.lookup_namespace(prefix)?;
                Some(NameTest::Name {
                    uri: CompactString::from(uri),
                    local,
                })
            }
            None => Some(NameTest::Name {
                uri: CompactString::default(),
                local: step,
            }),
        }
    }

    fn matches(&self, node: &Node) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Name { uri, local } => node.is(uri, local),
        }
    }
}

/// A parsed XML document and the location it was read from.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub root: Node,
    pub location: Option<String>,
}

impl XmlDocument {
    pub fn parse_str(text: &str, location: Option<&str>) -> Result<Self> {
        Self::parse(text.as_bytes(), location)
    }

    pub fn parse(data: &[u8], location: Option<&str>) -> Result<Self> {
        // Skip BOM if present
        let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

        let mut reader = Reader::from_reader(data);
        reader.config_mut().trim_text(true);

        let root_scope = Arc::new(NamespaceBindings::new());
        let mut stack: Vec<Node> = Vec::new();
        let mut root: Option<Node> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let parent_scope = stack.last().map(|n| &n.scope).unwrap_or(&root_scope);
                    let node = build_node(&e, parent_scope)?;
                    stack.push(node);
                }
                Ok(Event::Empty(e)) => {
                    let parent_scope = stack.last().map(|n| &n.scope).unwrap_or(&root_scope);
                    let node = build_node(&e, parent_scope)?;
                    attach(&mut stack, &mut root, node);
                }
                Ok(Event::End(_)) => {
                    if let Some(node) = stack.pop() {
                        attach(&mut stack, &mut root, node);
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = stack.last_mut() {
                        let text = e.unescape().map_err(|err| {
                            Error::Xml(format!("failed to unescape text: {err}"))
                        })?;
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => {
                    return Err(Error::Xml(format!(
                        "error at position {}: {}",
                        reader.buffer_position(),
                        err
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(Error::Xml("unexpected end of document".to_string()));
        }
        let root = root.ok_or_else(|| Error::Xml("document has no root element".to_string()))?;

        Ok(Self {
            root,
            location: location.map(str::to_string),
        })
    }
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

fn build_node(start: &BytesStart, parent_scope: &Arc<NamespaceBindings>) -> Result<Node> {
    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| Error::Xml(format!("invalid element name: {e}")))?
        .to_string();

    let mut declarations = Vec::new();
    let mut raw_attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Xml(format!("malformed attribute: {e}")))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::Xml(format!("invalid attribute name: {e}")))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("failed to unescape attribute value: {e}")))?
            .to_string();

        if key == "xmlns" {
            declarations.push((CompactString::default(), CompactString::from(value)));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push((CompactString::from(prefix), CompactString::from(value)));
        } else {
            raw_attributes.push((key, value));
        }
    }

    let scope = if declarations.is_empty() {
        Arc::clone(parent_scope)
    } else {
        let mut bindings = NamespaceBindings::clone(parent_scope);
        for (prefix, uri) in &declarations {
            bindings.bind(prefix, uri);
        }
        Arc::new(bindings)
    };

    let name = match raw_name.split_once(':') {
        Some((prefix, local)) => QualifiedName::with_prefix(
            scope.lookup(prefix).unwrap_or(""),
            local,
            prefix,
        ),
        None => QualifiedName::new(scope.default_namespace().unwrap_or(""), &raw_name),
    };

    let attributes = raw_attributes
        .into_iter()
        .map(|(key, value)| {
            let name = match key.split_once(':') {
                Some(("xml", local)) => QualifiedName::with_prefix(XML_NS, local, "xml"),
                Some((prefix, local)) => QualifiedName::with_prefix(
                    scope.lookup(prefix).unwrap_or(""),
                    local,
                    prefix,
                ),
                // Unprefixed attributes are in no namespace
                None => QualifiedName::new("", &key),
            };
            Attribute { name, value }
        })
        .collect();

    Ok(Node {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
        namespace_declarations: declarations,
        scope,
    })
}
