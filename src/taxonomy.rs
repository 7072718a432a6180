//! The set of schemas and linkbases reachable from a fragment.
//!
//! Schemas live in an arena indexed by [`SchemaId`] and are deduplicated by
//! target namespace: the first schema registered for a namespace wins and
//! later ones are dropped without being walked. That rule is also what makes
//! loading terminate on cyclic imports.

use crate::cache::SchemaCache;
use crate::linkbase::{LinkKind, LinkbaseDocument};
use crate::loader::{resolve_location, DocumentLoader};
use crate::namespaces::{QualifiedName, XBRLI_NS, XSI_NS};
use crate::schema::{ArcroleType, Element, RoleType, Schema, SchemaId, TypeRef};
use crate::types::{BuiltinType, TypeClass};
use crate::xml::Attribute;
use crate::Result;
use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use std::sync::Arc;

/// Upper bound on substitution group and type derivation walks.
const MAX_CHAIN_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstitutionGroup {
    Item,
    Tuple,
    Other,
}

#[derive(Debug, Default)]
pub struct Taxonomy {
    schemas: Vec<Arc<Schema>>,
    by_namespace: AHashMap<CompactString, SchemaId>,
    linkbases: Vec<Arc<LinkbaseDocument>>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema unless its target namespace is already present.
    pub fn register(&mut self, schema: Arc<Schema>) -> Option<SchemaId> {
        if self.by_namespace.contains_key(schema.target_namespace.as_str()) {
            return None;
        }
        let id = SchemaId(self.schemas.len());
        self.by_namespace.insert(schema.target_namespace.clone(), id);
        self.schemas.push(schema);
        Some(id)
    }

    pub fn add_linkbase(&mut self, linkbase: Arc<LinkbaseDocument>) {
        if !self.linkbases.iter().any(|l| Arc::ptr_eq(l, &linkbase)) {
            self.linkbases.push(linkbase);
        }
    }

    pub fn contains_namespace(&self, namespace: &str) -> bool {
        self.by_namespace.contains_key(namespace)
    }

    /// A taxonomy is defined once at least one schema is loaded.
    pub fn is_defined(&self) -> bool {
        !self.schemas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn schema(&self, id: SchemaId) -> Option<&Schema> {
        self.schemas.get(id.0).map(|s| s.as_ref())
    }

    pub fn schemas(&self) -> impl Iterator<Item = (SchemaId, &Schema)> {
        self.schemas
            .iter()
            .enumerate()
            .map(|(i, s)| (SchemaId(i), s.as_ref()))
    }

    pub fn schema_for_namespace(&self, namespace: &str) -> Option<&Schema> {
        self.by_namespace
            .get(namespace)
            .and_then(|&id| self.schema(id))
    }

    pub fn linkbases(&self) -> &[Arc<LinkbaseDocument>] {
        &self.linkbases
    }

    pub fn calculation_linkbases(&self) -> impl Iterator<Item = &LinkbaseDocument> {
        self.linkbases_with(LinkKind::Calculation)
    }

    pub fn definition_linkbases(&self) -> impl Iterator<Item = &LinkbaseDocument> {
        self.linkbases_with(LinkKind::Definition)
    }

    pub fn presentation_linkbases(&self) -> impl Iterator<Item = &LinkbaseDocument> {
        self.linkbases_with(LinkKind::Presentation)
    }

    fn linkbases_with(&self, kind: LinkKind) -> impl Iterator<Item = &LinkbaseDocument> {
        self.linkbases
            .iter()
            .map(|l| l.as_ref())
            .filter(move |l| l.has_links(kind))
    }

    // ------------------------------------------------------------------------
    // Element and type resolution
    // ------------------------------------------------------------------------

    pub fn element(&self, name: &QualifiedName) -> Option<&Element> {
        self.schema_for_namespace(&name.namespace_uri)?
            .element(&name.local_name)
    }

    /// Follows the substitution group chain to `xbrli:item` or `xbrli:tuple`.
    pub fn substitution_group(&self, element: &Element) -> SubstitutionGroup {
        let mut current = element;
        for _ in 0..MAX_CHAIN_DEPTH {
            let Some(head) = current.substitution_group.as_ref() else {
                return SubstitutionGroup::Other;
            };
            if head.is(XBRLI_NS, "item") {
                return SubstitutionGroup::Item;
            }
            if head.is(XBRLI_NS, "tuple") {
                return SubstitutionGroup::Tuple;
            }
            match self.element(head) {
                Some(next) => current = next,
                None => return SubstitutionGroup::Other,
            }
        }
        SubstitutionGroup::Other
    }

    pub fn is_item_declaration(&self, element: &Element) -> bool {
        self.substitution_group(element) == SubstitutionGroup::Item
    }

    pub fn is_tuple_declaration(&self, element: &Element) -> bool {
        self.substitution_group(element) == SubstitutionGroup::Tuple
    }

    /// Walks the derivation chain of `type_ref` down to a built-in type.
    pub fn resolve_type(&self, type_ref: &TypeRef) -> Option<BuiltinType> {
        let mut name = match type_ref {
            TypeRef::Named(name) => name,
            TypeRef::Anonymous(base) => base.as_ref()?,
        };
        for _ in 0..MAX_CHAIN_DEPTH {
            if let Some(builtin) = BuiltinType::from_qname(name) {
                return Some(builtin);
            }
            name = self
                .schema_for_namespace(&name.namespace_uri)?
                .type_definition(&name.local_name)?
                .base
                .as_ref()?;
        }
        None
    }

    pub fn element_type(&self, element: &Element) -> Option<BuiltinType> {
        self.resolve_type(element.type_ref.as_ref()?)
    }

    pub fn element_type_class(&self, element: &Element) -> Option<TypeClass> {
        self.element_type(element).map(BuiltinType::class)
    }

    /// Classification of the element declared for `name`; `None` when the
    /// element or its type chain cannot be resolved.
    pub fn resolve_element_type(&self, name: &QualifiedName) -> Option<TypeClass> {
        self.element_type_class(self.element(name)?)
    }

    /// Type of an attribute on a fact. Unqualified XBRL attributes have fixed
    /// types; qualified ones resolve through global attribute declarations.
    pub fn resolve_attribute_type(&self, attribute: &Attribute) -> Option<BuiltinType> {
        let ns = attribute.namespace_uri();
        if ns.is_empty() {
            return match attribute.local_name() {
                "precision" => Some(BuiltinType::Precision),
                "decimals" => Some(BuiltinType::Decimals),
                "contextRef" | "unitRef" => Some(BuiltinType::NcName),
                "id" => Some(BuiltinType::Id),
                _ => None,
            };
        }
        if ns == XSI_NS {
            return (attribute.local_name() == "nil").then_some(BuiltinType::Boolean);
        }
        let declaration = self.schema_for_namespace(ns)?.attribute(attribute.local_name())?;
        self.resolve_type(declaration.type_ref.as_ref()?)
    }

    pub fn role_type(&self, id: &str) -> Option<&RoleType> {
        self.schemas
            .iter()
            .flat_map(|s| s.role_types.iter())
            .find(|r| r.id.as_deref() == Some(id))
    }

    pub fn arcrole_type(&self, id: &str) -> Option<&ArcroleType> {
        self.schemas
            .iter()
            .flat_map(|s| s.arcrole_types.iter())
            .find(|r| r.id.as_deref() == Some(id))
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Loads schemas and linkbases into a taxonomy through a loader and the
/// shared cache. Load failures are absorbed: the referenced document simply
/// does not contribute.
pub struct SchemaResolver<'a> {
    loader: &'a dyn DocumentLoader,
    cache: &'a SchemaCache,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(loader: &'a dyn DocumentLoader, cache: &'a SchemaCache) -> Self {
        Self { loader, cache }
    }

    /// Loads the schema at `href` (relative to `base`) and everything it
    /// imports. When `namespace` is given and already present, nothing is
    /// loaded.
    pub fn load_schema(
        &self,
        taxonomy: &mut Taxonomy,
        base: Option<&str>,
        href: &str,
        namespace: Option<&str>,
    ) -> Option<SchemaId> {
        if namespace.is_some_and(|ns| taxonomy.contains_namespace(ns)) {
            return None;
        }
        let location = resolve_location(base, href);
        let schema = self
            .cache
            .schema(&location, || self.read_schema(&location, &mut AHashSet::new()))?;
        let id = taxonomy.register(Arc::clone(&schema))?;

        let base = schema.location.as_deref();
        for import in &schema.imports {
            if let Some(schema_location) = import.schema_location.as_deref() {
                self.load_schema(taxonomy, base, schema_location, import.namespace.as_deref());
            }
        }
        for linkbase_ref in &schema.linkbase_refs {
            self.load_linkbase(taxonomy, base, &linkbase_ref.href);
        }
        Some(id)
    }

    pub fn load_linkbase(&self, taxonomy: &mut Taxonomy, base: Option<&str>, href: &str) {
        let location = resolve_location(base, href);
        let linkbase = self.cache.linkbase(&location, || {
            let doc = self.loader.load(&location)?;
            LinkbaseDocument::parse(&doc)
        });
        if let Some(linkbase) = linkbase {
            taxonomy.add_linkbase(linkbase);
        }
    }

    /// Parses one schema document with its `xs:include`s merged in.
    fn read_schema(&self, location: &str, visited: &mut AHashSet<String>) -> Result<Schema> {
        visited.insert(location.to_string());
        let doc = self.loader.load(location)?;
        let mut schema = Schema::parse(&doc)?;

        let includes = std::mem::take(&mut schema.includes);
        for include in &includes {
            let target = resolve_location(Some(location), include);
            if visited.contains(&target) {
                continue;
            }
            if let Ok(included) = self.read_schema(&target, visited) {
                schema.merge(included);
            }
        }
        schema.includes = includes;
        Ok(schema)
    }
}
