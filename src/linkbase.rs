// Linkbase processing for XBRL
use crate::namespaces::{FACT_FOOTNOTE_ARCROLE, LINK_NS, XLINK_NS, XML_NS};
use crate::xml::{Node, XmlDocument};
use crate::{Error, Result};
use compact_str::CompactString;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LinkKind {
    Presentation,
    Calculation,
    Definition,
    Label,
    Reference,
    Footnote,
}

impl LinkKind {
    fn from_local_name(name: &str) -> Option<Self> {
        Some(match name {
            "presentationLink" => LinkKind::Presentation,
            "calculationLink" => LinkKind::Calculation,
            "definitionLink" => LinkKind::Definition,
            "labelLink" => LinkKind::Label,
            "referenceLink" => LinkKind::Reference,
            "footnoteLink" => LinkKind::Footnote,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Locator {
    pub label: CompactString,
    pub href: CompactString,
}

impl Locator {
    /// Document part of the href, without the fragment identifier.
    pub fn document(&self) -> &str {
        self.href.split_once('#').map_or(self.href.as_str(), |(doc, _)| doc)
    }

    /// Fragment identifier of the href: an element id in a taxonomy
    /// linkbase, a fact id in a footnote link.
    pub fn fragment(&self) -> Option<&str> {
        self.href.split_once('#').map(|(_, id)| id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub label: CompactString,
    pub role: Option<CompactString>,
    pub lang: Option<CompactString>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkArc {
    pub from: CompactString,
    pub to: CompactString,
    pub arcrole: CompactString,
    pub order: f32,
    pub weight: Option<f32>,
    pub priority: i32,
    pub prohibited: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtendedLink {
    pub kind: LinkKind,
    pub role: Option<CompactString>,
    pub locators: Vec<Locator>,
    pub resources: Vec<Resource>,
    pub arcs: Vec<LinkArc>,
}

impl ExtendedLink {
    pub fn from_node(node: &Node) -> Option<Self> {
        let kind = LinkKind::from_local_name(node.local_name())?;
        let mut link = Self {
            kind,
            role: node.attribute(XLINK_NS, "role").map(CompactString::from),
            locators: Vec::new(),
            resources: Vec::new(),
            arcs: Vec::new(),
        };

        for child in node.children() {
            let label = CompactString::from(child.attribute(XLINK_NS, "label").unwrap_or_default());
            match child.attribute(XLINK_NS, "type") {
                Some("locator") => link.locators.push(Locator {
                    label,
                    href: CompactString::from(child.attribute(XLINK_NS, "href").unwrap_or_default()),
                }),
                Some("resource") => link.resources.push(Resource {
                    label,
                    role: child.attribute(XLINK_NS, "role").map(CompactString::from),
                    lang: child.attribute(XML_NS, "lang").map(CompactString::from),
                    text: child.text_content(),
                }),
                Some("arc") => link.arcs.push(read_arc(child)),
                _ => {}
            }
        }
        Some(link)
    }

    /// Arcs leaving `from`, sorted by `order`.
    pub fn arcs_from(&self, from: &str) -> Vec<&LinkArc> {
        let mut arcs: Vec<&LinkArc> = self
            .arcs
            .iter()
            .filter(|arc| arc.from == from && !arc.prohibited)
            .collect();
        arcs.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(Ordering::Equal));
        arcs
    }

    pub fn locators_labelled<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Locator> + 'a {
        self.locators.iter().filter(move |l| l.label == label)
    }

    pub fn resources_labelled<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources.iter().filter(move |r| r.label == label)
    }
}

fn read_arc(node: &Node) -> LinkArc {
    let number = |name: &str| node.attr(name).and_then(|v| v.trim().parse::<f32>().ok());
    LinkArc {
        from: CompactString::from(node.attribute(XLINK_NS, "from").unwrap_or_default()),
        to: CompactString::from(node.attribute(XLINK_NS, "to").unwrap_or_default()),
        arcrole: CompactString::from(node.attribute(XLINK_NS, "arcrole").unwrap_or_default()),
        order: number("order").unwrap_or(1.0),
        weight: number("weight"),
        priority: node
            .attr("priority")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0),
        prohibited: node.attr("use") == Some("prohibited"),
    }
}

/// A parsed linkbase document. Arc semantics beyond what is stored here are
/// left to consumers.
#[derive(Debug, Clone, Serialize)]
pub struct LinkbaseDocument {
    pub location: Option<String>,
    pub links: Vec<ExtendedLink>,
}

impl LinkbaseDocument {
    pub fn parse(doc: &XmlDocument) -> Result<Self> {
        if !doc.root.is(LINK_NS, "linkbase") {
            return Err(Error::Parse(format!(
                "expected link:linkbase root, found {}",
                doc.root.name
            )));
        }
        Ok(Self {
            location: doc.location.clone(),
            links: doc
                .root
                .children()
                .filter(|c| c.namespace_uri() == LINK_NS)
                .filter_map(ExtendedLink::from_node)
                .collect(),
        })
    }

    pub fn links_of(&self, kind: LinkKind) -> impl Iterator<Item = &ExtendedLink> {
        self.links.iter().filter(move |l| l.kind == kind)
    }

    pub fn has_links(&self, kind: LinkKind) -> bool {
        self.links_of(kind).next().is_some()
    }
}

// ============================================================================
// Instance footnotes
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FootnoteLink {
    pub role: Option<CompactString>,
    pub locators: Vec<Locator>,
    pub footnotes: Vec<Resource>,
    pub arcs: Vec<LinkArc>,
}

impl FootnoteLink {
    pub fn from_node(node: &Node) -> Option<Self> {
        let link = ExtendedLink::from_node(node).filter(|l| l.kind == LinkKind::Footnote)?;
        Some(Self {
            role: link.role,
            locators: link.locators,
            footnotes: link.resources,
            arcs: link.arcs,
        })
    }

    /// Footnotes attached to the fact whose `id` is `fact_id` through
    /// `fact-footnote` arcs.
    pub fn footnotes_for(&self, fact_id: &str) -> Vec<&Resource> {
        let mut out = Vec::new();
        for locator in self.locators.iter().filter(|l| l.fragment() == Some(fact_id)) {
            let arcs = self.arcs.iter().filter(|a| {
                a.from == locator.label && a.arcrole == FACT_FOOTNOTE_ARCROLE && !a.prohibited
            });
            for arc in arcs {
                for footnote in self.footnotes.iter().filter(|f| f.label == arc.to) {
                    out.push(footnote);
                }
            }
        }
        out
    }
}
