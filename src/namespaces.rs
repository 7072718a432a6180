// Namespace URIs, qualified names and prefix bookkeeping
use ahash::AHashMap;
use compact_str::CompactString;
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const XBRLI_NS: &str = "http://www.xbrl.org/2003/instance";
pub const LINK_NS: &str = "http://www.xbrl.org/2003/linkbase";
pub const XL_NS: &str = "http://www.xbrl.org/2003/XLink";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const ISO4217_NS: &str = "http://www.xbrl.org/2003/iso4217";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

pub const FACT_FOOTNOTE_ARCROLE: &str = "http://www.xbrl.org/2003/arcrole/fact-footnote";

/// Namespaces whose attributes a tuple must never carry (XBRL 2.1 §4.9).
pub const TUPLE_RESERVED_NAMESPACES: [&str; 4] = [XBRLI_NS, LINK_NS, XL_NS, XLINK_NS];

/// Namespace-qualified name. Equality and hashing ignore the prefix.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualifiedName {
    pub namespace_uri: CompactString,
    pub local_name: CompactString,
    pub prefix: CompactString,
}

impl QualifiedName {
    pub fn new(namespace_uri: &str, local_name: &str) -> Self {
        Self {
            namespace_uri: CompactString::from(namespace_uri),
            local_name: CompactString::from(local_name),
            prefix: CompactString::default(),
        }
    }

    pub fn with_prefix(namespace_uri: &str, local_name: &str, prefix: &str) -> Self {
        Self {
            namespace_uri: CompactString::from(namespace_uri),
            local_name: CompactString::from(local_name),
            prefix: CompactString::from(prefix),
        }
    }

    pub fn is(&self, namespace_uri: &str, local_name: &str) -> bool {
        self.namespace_uri == namespace_uri && self.local_name == local_name
    }

    /// `{namespace}local` notation.
    pub fn clark(&self) -> String {
        if self.namespace_uri.is_empty() {
            self.local_name.to_string()
        } else {
            format!("{{{}}}{}", self.namespace_uri, self.local_name)
        }
    }
}

impl PartialEq for QualifiedName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace_uri == other.namespace_uri && self.local_name == other.local_name
    }
}

impl Eq for QualifiedName {}

impl Hash for QualifiedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace_uri.hash(state);
        self.local_name.hash(state);
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{}:{}", self.prefix, self.local_name)
        }
    }
}

/// Prefix bindings in scope at one node. The empty prefix is the default namespace.
#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    map: AHashMap<CompactString, CompactString>,
}

impl NamespaceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, prefix: &str, uri: &str) {
        self.map
            .insert(CompactString::from(prefix), CompactString::from(uri));
    }

    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NS);
        }
        self.map.get(prefix).map(|uri| uri.as_str())
    }

    pub fn default_namespace(&self) -> Option<&str> {
        self.map
            .get("")
            .map(|uri| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }
}

/// Two-way prefix/URI registry used to build path expressions.
#[derive(Debug, Clone, Default)]
pub struct NamespaceManager {
    by_prefix: AHashMap<CompactString, CompactString>,
    by_uri: AHashMap<CompactString, CompactString>,
}

impl NamespaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a binding. The first prefix registered for a URI stays its
    /// preferred prefix.
    pub fn add_namespace(&mut self, prefix: &str, uri: &str) {
        self.by_prefix
            .insert(CompactString::from(prefix), CompactString::from(uri));
        self.by_uri
            .entry(CompactString::from(uri))
            .or_insert_with(|| CompactString::from(prefix));
    }

    pub fn lookup_namespace(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(prefix).map(|uri| uri.as_str())
    }

    pub fn lookup_prefix(&self, uri: &str) -> Option<&str> {
        self.by_uri.get(uri).map(|prefix| prefix.as_str())
    }

    /// Returns a prefix bound to `uri`, registering `preferred` (or a numbered
    /// variant of it) when the URI has no binding yet.
    pub fn ensure_prefix(&mut self, uri: &str, preferred: &str) -> CompactString {
        if let Some(prefix) = self.lookup_prefix(uri).filter(|p| !p.is_empty()) {
            return CompactString::from(prefix);
        }
        let mut candidate = CompactString::from(preferred);
        let mut n = 0;
        while self.by_prefix.contains_key(candidate.as_str()) {
            n += 1;
            candidate = CompactString::from(format!("{preferred}{n}"));
        }
        self.by_prefix
            .insert(candidate.clone(), CompactString::from(uri));
        self.by_uri.insert(CompactString::from(uri), candidate.clone());
        candidate
    }
}
