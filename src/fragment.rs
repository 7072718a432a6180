//! Fragment assembly: one `xbrl` element turned into contexts, units, facts
//! and references, then validated.
//!
//! Assembly is permissive. A schema that cannot be loaded contributes
//! nothing, a fact whose element has no declaration is skipped, and a
//! `contextRef`/`unitRef` that matches nothing leaves the link empty.

use crate::cache::SchemaCache;
use crate::linkbase::{FootnoteLink, Resource};
use crate::loader::DocumentLoader;
use crate::model::{
    ArcroleReference, Context, ContextId, Fact, FactId, Item, RoleReference, Tuple, Unit, UnitId,
};
use crate::namespaces::{NamespaceManager, LINK_NS, XBRLI_NS, XLINK_NS, XSI_NS};
use crate::schema::{RoleType, Schema};
use crate::taxonomy::{SchemaResolver, SubstitutionGroup, Taxonomy};
use crate::validator::{Diagnostics, ValidationConfig, ValidationError, XbrlValidator};
use crate::xml::Node;
use ahash::AHashMap;
use compact_str::CompactString;

/// Lifecycle hooks for fragment construction. Both default to no-ops.
pub trait FragmentEvents: Send + Sync {
    /// The fragment is assembled but not yet validated.
    fn loaded(&self, _fragment: &Fragment) {}

    fn validated(&self, _fragment: &Fragment) {}
}

#[derive(Debug)]
pub struct Fragment {
    location: Option<String>,
    namespaces: NamespaceManager,
    taxonomy: Taxonomy,
    contexts: Vec<Context>,
    units: Vec<Unit>,
    facts: Vec<Fact>,
    top_level: Vec<FactId>,
    role_references: Vec<RoleReference>,
    arcrole_references: Vec<ArcroleReference>,
    footnote_links: Vec<FootnoteLink>,
    diagnostics: Diagnostics,
}

impl Fragment {
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn namespaces(&self) -> &NamespaceManager {
        &self.namespaces
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Every fact in document pre-order, tuple members included.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Facts that are direct children of the `xbrl` element.
    pub fn top_level_facts(&self) -> impl Iterator<Item = &Fact> {
        self.top_level.iter().filter_map(|&id| self.fact(id))
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.facts.iter().filter_map(Fact::as_item)
    }

    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.facts.iter().filter_map(Fact::as_tuple)
    }

    pub fn fact(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(id.0)
    }

    pub fn role_references(&self) -> &[RoleReference] {
        &self.role_references
    }

    pub fn arcrole_references(&self) -> &[ArcroleReference] {
        &self.arcrole_references
    }

    pub fn footnote_links(&self) -> &[FootnoteLink] {
        &self.footnote_links
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn validation_errors(&self) -> &[ValidationError] {
        self.diagnostics.as_slice()
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn get_context(&self, id: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.id == id)
    }

    pub fn get_unit(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Finds a fact by its `id` attribute.
    pub fn get_fact(&self, id: &str) -> Option<&Fact> {
        self.facts.iter().find(|f| f.id() == Some(id))
    }

    pub fn item_context(&self, item: &Item) -> Option<&Context> {
        item.context.and_then(|id| self.contexts.get(id.0))
    }

    pub fn item_unit(&self, item: &Item) -> Option<&Unit> {
        item.unit.and_then(|id| self.units.get(id.0))
    }

    pub fn uri_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.namespaces.lookup_namespace(prefix)
    }

    pub fn prefix_for_uri(&self, uri: &str) -> Option<&str> {
        self.namespaces.lookup_prefix(uri)
    }

    pub fn schema_for_prefix(&self, prefix: &str) -> Option<&Schema> {
        self.taxonomy
            .schema_for_namespace(self.uri_for_prefix(prefix)?)
    }

    pub fn role_type(&self, id: &str) -> Option<&RoleType> {
        self.taxonomy.role_type(id)
    }

    /// Footnotes attached to the fact with the given `id` attribute, across
    /// all footnote links.
    pub fn footnotes_for(&self, fact_id: &str) -> Vec<&Resource> {
        self.footnote_links
            .iter()
            .flat_map(|link| link.footnotes_for(fact_id))
            .collect()
    }
}

/// Builds fragments from `xbrl` nodes.
pub struct Assembler<'a> {
    loader: &'a dyn DocumentLoader,
    cache: &'a SchemaCache,
    config: ValidationConfig,
    validate: bool,
    events: Option<&'a dyn FragmentEvents>,
}

impl<'a> Assembler<'a> {
    pub fn new(loader: &'a dyn DocumentLoader, cache: &'a SchemaCache) -> Self {
        Self {
            loader,
            cache,
            config: ValidationConfig::default(),
            validate: true,
            events: None,
        }
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_events(mut self, events: &'a dyn FragmentEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Assembles the fragment rooted at `root`; `location` is the document
    /// the node came from and the base for relative schema references.
    pub fn assemble(&self, root: &Node, location: Option<&str>) -> Fragment {
        let namespaces = namespace_manager(root);
        let mut query = namespaces.clone();
        let link = query.ensure_prefix(LINK_NS, "link");
        let xbrli = query.ensure_prefix(XBRLI_NS, "xbrli");
        let select = move |prefix: &CompactString, local: &str| {
            root.select_nodes(&format!("{prefix}:{local}"), &query)
        };

        // Referenced schemas and linkbases
        let mut taxonomy = Taxonomy::new();
        let resolver = SchemaResolver::new(self.loader, self.cache);
        if let Some(pairs) = root.attribute(XSI_NS, "schemaLocation") {
            let tokens: Vec<&str> = pairs.split_whitespace().collect();
            for pair in tokens.chunks_exact(2) {
                resolver.load_schema(&mut taxonomy, location, pair[1], Some(pair[0]));
            }
        }
        for schema_ref in select(&link, "schemaRef") {
            if let Some(href) = schema_ref.attribute(XLINK_NS, "href") {
                resolver.load_schema(&mut taxonomy, location, href, None);
            }
        }
        for linkbase_ref in select(&link, "linkbaseRef") {
            if let Some(href) = linkbase_ref.attribute(XLINK_NS, "href") {
                resolver.load_linkbase(&mut taxonomy, location, href);
            }
        }

        let role_references = select(&link, "roleRef")
            .into_iter()
            .map(|node| RoleReference {
                role_uri: CompactString::from(node.attr("roleURI").unwrap_or_default()),
                href: CompactString::from(node.attribute(XLINK_NS, "href").unwrap_or_default()),
            })
            .collect();
        let arcrole_references = select(&link, "arcroleRef")
            .into_iter()
            .map(|node| ArcroleReference {
                arcrole_uri: CompactString::from(node.attr("arcroleURI").unwrap_or_default()),
                href: CompactString::from(node.attribute(XLINK_NS, "href").unwrap_or_default()),
            })
            .collect();

        let contexts: Vec<Context> = select(&xbrli, "context")
            .into_iter()
            .map(Context::from_node)
            .collect();
        let units: Vec<Unit> = select(&xbrli, "unit")
            .into_iter()
            .map(Unit::from_node)
            .collect();

        let mut builder = FactBuilder {
            taxonomy: &taxonomy,
            context_ids: index_by_id(contexts.iter().map(|c| c.id.as_str())),
            unit_ids: index_by_id(units.iter().map(|u| u.id.as_str())),
            facts: Vec::new(),
        };
        let top_level = root
            .children()
            .filter_map(|child| builder.build(child))
            .collect();
        let facts = builder.facts;

        let footnote_links = select(&link, "footnoteLink")
            .into_iter()
            .filter_map(FootnoteLink::from_node)
            .collect();

        let mut fragment = Fragment {
            location: location.map(str::to_string),
            namespaces,
            taxonomy,
            contexts,
            units,
            facts,
            top_level,
            role_references,
            arcrole_references,
            footnote_links,
            diagnostics: Diagnostics::new(),
        };

        if let Some(events) = self.events {
            events.loaded(&fragment);
        }
        if self.validate {
            fragment.diagnostics = XbrlValidator::new(self.config).validate(
                &fragment.taxonomy,
                &fragment.facts,
                &fragment.units,
            );
            if let Some(events) = self.events {
                events.validated(&fragment);
            }
        }
        fragment
    }
}

/// Declarations on the root come first, in document order, so they win the
/// preferred prefix for their URI.
fn namespace_manager(root: &Node) -> NamespaceManager {
    let mut manager = NamespaceManager::new();
    for (prefix, uri) in &root.namespace_declarations {
        manager.add_namespace(prefix, uri);
    }
    let mut inherited: Vec<(&str, &str)> = root
        .namespace_scope()
        .iter()
        .filter(|(prefix, _)| manager.lookup_namespace(prefix).is_none())
        .collect();
    inherited.sort_unstable();
    for (prefix, uri) in inherited {
        manager.add_namespace(prefix, uri);
    }
    manager
}

/// First occurrence wins for duplicate ids.
fn index_by_id<'s>(ids: impl Iterator<Item = &'s str>) -> AHashMap<CompactString, usize> {
    let mut index = AHashMap::new();
    for (position, id) in ids.enumerate() {
        index.entry(CompactString::from(id)).or_insert(position);
    }
    index
}

struct FactBuilder<'t> {
    taxonomy: &'t Taxonomy,
    context_ids: AHashMap<CompactString, usize>,
    unit_ids: AHashMap<CompactString, usize>,
    facts: Vec<Fact>,
}

impl FactBuilder<'_> {
    fn build(&mut self, node: &Node) -> Option<FactId> {
        let element = self.taxonomy.element(&node.name)?;
        match self.taxonomy.substitution_group(element) {
            SubstitutionGroup::Item => {
                let item = self.item(node);
                Some(self.push(Fact::Item(item)))
            }
            SubstitutionGroup::Tuple => {
                // Reserve the slot first to keep pre-order
                let id = self.push(Fact::Tuple(Tuple {
                    id: node.attr("id").map(CompactString::from),
                    name: node.name.clone(),
                    attributes: node.attributes.clone(),
                    children: Vec::new(),
                }));
                let children = node
                    .children()
                    .filter_map(|child| self.build(child))
                    .collect();
                if let Some(Fact::Tuple(tuple)) = self.facts.get_mut(id.0) {
                    tuple.children = children;
                }
                Some(id)
            }
            SubstitutionGroup::Other => None,
        }
    }

    fn push(&mut self, fact: Fact) -> FactId {
        self.facts.push(fact);
        FactId(self.facts.len() - 1)
    }

    fn item(&self, node: &Node) -> Item {
        let context_ref = node.attr("contextRef").map(|r| CompactString::from(r.trim()));
        let unit_ref = node.attr("unitRef").map(|r| CompactString::from(r.trim()));
        Item {
            id: node.attr("id").map(CompactString::from),
            name: node.name.clone(),
            attributes: node.attributes.clone(),
            context: context_ref
                .as_ref()
                .and_then(|r| self.context_ids.get(r))
                .map(|&i| ContextId(i)),
            unit: unit_ref
                .as_ref()
                .and_then(|r| self.unit_ids.get(r))
                .map(|&i| UnitId(i)),
            context_ref,
            unit_ref,
            nil: node
                .attribute(XSI_NS, "nil")
                .is_some_and(|v| matches!(v.trim(), "true" | "1")),
            precision: node.attr("precision").map(CompactString::from),
            decimals: node.attr("decimals").map(CompactString::from),
            value: node.text_content(),
        }
    }
}
