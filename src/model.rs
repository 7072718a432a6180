use crate::namespaces::{QualifiedName, XBRLI_NS};
use crate::types::{parse_date, parse_date_time};
use crate::xml::{Attribute, Node};
use chrono::NaiveDateTime;
use compact_str::CompactString;
use serde::Serialize;

// ============================================================================
// Arena handles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ContextId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UnitId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FactId(pub usize);

// ============================================================================
// Contexts
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Context {
    pub id: CompactString,
    pub entity: Entity,
    pub period: Option<Period>,
    pub scenario: Option<Scenario>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Entity {
    pub identifier: CompactString,
    pub scheme: CompactString,
    pub segment: Option<Segment>,
}

// Dimensional data support
#[derive(Debug, Clone, Default, Serialize)]
pub struct Segment {
    pub explicit_members: Vec<DimensionMember>,
    pub typed_members: Vec<TypedMember>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DimensionMember {
    pub dimension: CompactString,
    pub member: CompactString,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypedMember {
    pub dimension: CompactString,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Scenario {
    pub explicit_members: Vec<DimensionMember>,
    pub typed_members: Vec<TypedMember>,
}

// Period with forever support
#[derive(Debug, Clone, Serialize)]
pub enum Period {
    Instant { date: CompactString },
    Duration { start: CompactString, end: CompactString },
    Forever,
}

impl Period {
    /// Start of the period; `None` for instants and forever.
    pub fn start(&self) -> Option<NaiveDateTime> {
        match self {
            Period::Duration { start, .. } => period_date(start),
            _ => None,
        }
    }

    /// End of the period, or the instant itself.
    pub fn end(&self) -> Option<NaiveDateTime> {
        match self {
            Period::Instant { date } => period_date(date),
            Period::Duration { end, .. } => period_date(end),
            Period::Forever => None,
        }
    }
}

/// XBRL period dates are either `xs:date` (midnight) or `xs:dateTime`.
fn period_date(value: &str) -> Option<NaiveDateTime> {
    parse_date_time(value).or_else(|| parse_date(value).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

impl Context {
    pub fn from_node(node: &Node) -> Self {
        let mut entity = Entity::default();
        if let Some(entity_node) = node.first_child(XBRLI_NS, "entity") {
            if let Some(identifier) = entity_node.first_child(XBRLI_NS, "identifier") {
                entity.identifier = CompactString::from(identifier.text());
                entity.scheme = CompactString::from(identifier.attr("scheme").unwrap_or_default());
            }
            entity.segment = entity_node.first_child(XBRLI_NS, "segment").map(|segment| {
                let (explicit_members, typed_members) = read_dimensions(segment);
                Segment {
                    explicit_members,
                    typed_members,
                }
            });
        }

        let scenario = node.first_child(XBRLI_NS, "scenario").map(|scenario| {
            let (explicit_members, typed_members) = read_dimensions(scenario);
            Scenario {
                explicit_members,
                typed_members,
            }
        });

        Self {
            id: CompactString::from(node.attr("id").unwrap_or_default()),
            entity,
            period: node.first_child(XBRLI_NS, "period").and_then(read_period),
            scenario,
        }
    }
}

fn read_period(node: &Node) -> Option<Period> {
    if let Some(instant) = node.first_child(XBRLI_NS, "instant") {
        return Some(Period::Instant {
            date: CompactString::from(instant.text()),
        });
    }
    if node.first_child(XBRLI_NS, "forever").is_some() {
        return Some(Period::Forever);
    }
    let start = node.first_child(XBRLI_NS, "startDate")?;
    let end = node.first_child(XBRLI_NS, "endDate")?;
    Some(Period::Duration {
        start: CompactString::from(start.text()),
        end: CompactString::from(end.text()),
    })
}

fn read_dimensions(node: &Node) -> (Vec<DimensionMember>, Vec<TypedMember>) {
    let mut explicit_members = Vec::new();
    let mut typed_members = Vec::new();
    for child in node.children() {
        let dimension = CompactString::from(child.attr("dimension").unwrap_or_default());
        match child.local_name() {
            "explicitMember" => explicit_members.push(DimensionMember {
                dimension,
                member: CompactString::from(child.text()),
            }),
            "typedMember" => typed_members.push(TypedMember {
                dimension,
                value: child.text_content(),
            }),
            _ => {}
        }
    }
    (explicit_members, typed_members)
}

// ============================================================================
// Units
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Unit {
    pub id: CompactString,
    pub unit_type: UnitType,
}

#[derive(Debug, Clone, Serialize)]
pub enum UnitType {
    Simple(Vec<Measure>),
    Divide {
        numerator: Vec<Measure>,
        denominator: Vec<Measure>,
    },
}

/// A unit measure. `namespace_uri` is `None` when the measure's prefix is
/// not bound, and empty when the measure is in no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Measure {
    pub namespace_uri: Option<CompactString>,
    pub local_name: CompactString,
    pub prefix: CompactString,
}

impl Measure {
    pub fn from_node(node: &Node) -> Self {
        let text = node.text();
        match node.resolve_qname(text) {
            Some(qname) => Self {
                namespace_uri: Some(qname.namespace_uri),
                local_name: qname.local_name,
                prefix: qname.prefix,
            },
            None => {
                let (prefix, local) = text.split_once(':').unwrap_or(("", text));
                Self {
                    namespace_uri: None,
                    local_name: CompactString::from(local),
                    prefix: CompactString::from(prefix),
                }
            }
        }
    }
}

impl Unit {
    pub fn from_node(node: &Node) -> Self {
        let measures = |parent: &Node| -> Vec<Measure> {
            parent
                .children_named(XBRLI_NS, "measure")
                .map(Measure::from_node)
                .collect()
        };

        let unit_type = match node.first_child(XBRLI_NS, "divide") {
            Some(divide) => UnitType::Divide {
                numerator: divide
                    .first_child(XBRLI_NS, "unitNumerator")
                    .map(measures)
                    .unwrap_or_default(),
                denominator: divide
                    .first_child(XBRLI_NS, "unitDenominator")
                    .map(measures)
                    .unwrap_or_default(),
            },
            None => UnitType::Simple(measures(node)),
        };

        Self {
            id: CompactString::from(node.attr("id").unwrap_or_default()),
            unit_type,
        }
    }

    pub fn is_ratio(&self) -> bool {
        matches!(self.unit_type, UnitType::Divide { .. })
    }

    /// The flat measure list; empty for ratio units.
    pub fn measures(&self) -> &[Measure] {
        match &self.unit_type {
            UnitType::Simple(measures) => measures,
            UnitType::Divide { .. } => &[],
        }
    }
}

// ============================================================================
// Facts
// ============================================================================

#[derive(Debug, Clone)]
pub struct Item {
    pub id: Option<CompactString>,
    pub name: QualifiedName,
    pub attributes: Vec<Attribute>,
    pub context_ref: Option<CompactString>,
    pub unit_ref: Option<CompactString>,
    /// Resolved `contextRef`; `None` when no context has that id.
    pub context: Option<ContextId>,
    /// Resolved `unitRef`; `None` when absent or dangling.
    pub unit: Option<UnitId>,
    pub nil: bool,
    pub precision: Option<CompactString>,
    pub decimals: Option<CompactString>,
    pub value: String,
}

impl Item {
    pub fn precision_specified(&self) -> bool {
        self.precision.is_some()
    }

    pub fn decimals_specified(&self) -> bool {
        self.decimals.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Tuple {
    pub id: Option<CompactString>,
    pub name: QualifiedName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<FactId>,
}

#[derive(Debug, Clone)]
pub enum Fact {
    Item(Item),
    Tuple(Tuple),
}

impl Fact {
    pub fn name(&self) -> &QualifiedName {
        match self {
            Fact::Item(item) => &item.name,
            Fact::Tuple(tuple) => &tuple.name,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Fact::Item(item) => item.id.as_deref(),
            Fact::Tuple(tuple) => tuple.id.as_deref(),
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        match self {
            Fact::Item(item) => &item.attributes,
            Fact::Tuple(tuple) => &tuple.attributes,
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Fact::Item(item) => Some(item),
            Fact::Tuple(_) => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Fact::Tuple(tuple) => Some(tuple),
            Fact::Item(_) => None,
        }
    }

    /// The id when present, otherwise the element name.
    pub fn label(&self) -> String {
        match self.id() {
            Some(id) => format!("{} (id {})", self.name(), id),
            None => self.name().to_string(),
        }
    }
}

// ============================================================================
// Role and arcrole references
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RoleReference {
    pub role_uri: CompactString,
    pub href: CompactString,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArcroleReference {
    pub arcrole_uri: CompactString,
    pub href: CompactString,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::ISO4217_NS;
    use crate::xml::XmlDocument;

    fn parse(text: &str) -> Node {
        XmlDocument::parse_str(text, None).unwrap().root
    }

    #[test]
    fn reads_context_with_segment_and_duration() {
        let node = parse(
            r#"<context id="c1" xmlns="http://www.xbrl.org/2003/instance"
                        xmlns:xbrldi="http://xbrl.org/2006/xbrldi">
                 <entity>
                   <identifier scheme="http://www.sec.gov/CIK">0000320193</identifier>
                   <segment><xbrldi:explicitMember dimension="us-gaap:SegmentAxis">us-gaap:AmericasMember</xbrldi:explicitMember></segment>
                 </entity>
                 <period><startDate>2023-01-01</startDate><endDate>2023-12-31</endDate></period>
               </context>"#,
        );
        let ctx = Context::from_node(&node);
        assert_eq!(ctx.id, "c1");
        assert_eq!(ctx.entity.scheme, "http://www.sec.gov/CIK");
        let segment = ctx.entity.segment.unwrap();
        assert_eq!(segment.explicit_members[0].member, "us-gaap:AmericasMember");

        let period = ctx.period.unwrap();
        assert_eq!(
            period.end(),
            chrono::NaiveDate::from_ymd_opt(2023, 12, 31).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert!(period.start().is_some());
    }

    #[test]
    fn reads_simple_and_ratio_units() {
        let simple = Unit::from_node(&parse(
            r#"<unit id="usd" xmlns="http://www.xbrl.org/2003/instance"
                     xmlns:iso4217="http://www.xbrl.org/2003/iso4217"><measure>iso4217:USD</measure></unit>"#,
        ));
        assert!(!simple.is_ratio());
        assert_eq!(simple.measures()[0].namespace_uri.as_deref(), Some(ISO4217_NS));

        let ratio = Unit::from_node(&parse(
            r#"<unit id="eps" xmlns="http://www.xbrl.org/2003/instance"
                     xmlns:iso4217="http://www.xbrl.org/2003/iso4217">
                 <divide>
                   <unitNumerator><measure>iso4217:USD</measure></unitNumerator>
                   <unitDenominator><measure>shares</measure></unitDenominator>
                 </divide>
               </unit>"#,
        ));
        assert!(ratio.is_ratio());
        assert!(ratio.measures().is_empty());
    }

    #[test]
    fn unbound_measure_prefix_has_no_namespace() {
        let unit = Unit::from_node(&parse(
            r#"<unit id="u" xmlns="http://www.xbrl.org/2003/instance"><measure>foo:USD</measure></unit>"#,
        ));
        let measure = &unit.measures()[0];
        assert_eq!(measure.namespace_uri, None);
        assert_eq!(measure.local_name, "USD");
        assert_eq!(measure.prefix, "foo");
    }
}
