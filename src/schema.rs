// Schema loading and element validation for XBRL
use crate::namespaces::{QualifiedName, LINK_NS, XBRLI_NS, XLINK_NS, XS_NS};
use crate::taxonomy::Taxonomy;
use crate::types::TypeClass;
use crate::validator::{Diagnostics, EntityRef, ErrorKind, ValidationError};
use crate::xml::{Node, XmlDocument};
use crate::{Error, Result};
use ahash::AHashMap;
use compact_str::CompactString;
use serde::Serialize;

/// Index of a schema in the taxonomy arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SchemaId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Balance {
    Debit,
    Credit,
    /// Any other literal. The attribute is still present for rule purposes.
    Other(CompactString),
}

impl Balance {
    fn parse(value: &str) -> Self {
        match value.trim() {
            "debit" => Balance::Debit,
            "credit" => Balance::Credit,
            other => Balance::Other(CompactString::from(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    Instant,
    Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(QualifiedName),
    /// Inline type definition, by its derivation base when it has one.
    Anonymous(Option<QualifiedName>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    Restriction,
    Extension,
    List,
    Union,
}

#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub name: QualifiedName,
    pub base: Option<QualifiedName>,
    pub derivation: Option<Derivation>,
    pub complex: bool,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: QualifiedName,
    pub id: Option<CompactString>,
    pub type_ref: Option<TypeRef>,
    pub substitution_group: Option<QualifiedName>,
    pub balance: Option<Balance>,
    pub period_type: Option<PeriodType>,
    pub is_abstract: bool,
    pub nillable: bool,
}

#[derive(Debug, Clone)]
pub struct AttributeDeclaration {
    pub name: QualifiedName,
    pub type_ref: Option<TypeRef>,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub namespace: Option<CompactString>,
    pub schema_location: Option<CompactString>,
}

#[derive(Debug, Clone)]
pub struct LinkbaseRef {
    pub href: CompactString,
    pub role: Option<CompactString>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleType {
    pub id: Option<CompactString>,
    pub role_uri: CompactString,
    pub definition: Option<String>,
    pub used_on: Vec<QualifiedName>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArcroleType {
    pub id: Option<CompactString>,
    pub arcrole_uri: CompactString,
    pub cycles_allowed: CompactString,
    pub definition: Option<String>,
    pub used_on: Vec<QualifiedName>,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub target_namespace: CompactString,
    pub location: Option<String>,
    /// Prefix bindings declared on the `xs:schema` element.
    pub namespaces: Vec<(CompactString, CompactString)>,
    pub elements: Vec<Element>,
    element_index: AHashMap<CompactString, usize>,
    pub types: AHashMap<CompactString, TypeDefinition>,
    pub attributes: AHashMap<CompactString, AttributeDeclaration>,
    pub imports: Vec<Import>,
    pub includes: Vec<CompactString>,
    pub linkbase_refs: Vec<LinkbaseRef>,
    pub role_types: Vec<RoleType>,
    pub arcrole_types: Vec<ArcroleType>,
}

impl Schema {
    pub fn parse(doc: &XmlDocument) -> Result<Self> {
        let root = &doc.root;
        if !root.is(XS_NS, "schema") {
            return Err(Error::Parse(format!(
                "expected xs:schema root, found {}",
                root.name
            )));
        }

        let target_namespace = CompactString::from(root.attr("targetNamespace").unwrap_or_default());
        let mut schema = Schema {
            target_namespace,
            location: doc.location.clone(),
            namespaces: root
                .namespace_scope()
                .iter()
                .map(|(p, u)| (CompactString::from(p), CompactString::from(u)))
                .collect(),
            ..Default::default()
        };
        let prefix = schema.prefix_for_target().unwrap_or_default();

        for child in root.children() {
            if child.namespace_uri() != XS_NS {
                continue;
            }
            match child.local_name() {
                "element" => {
                    if let Some(element) = schema.read_element(child, &prefix) {
                        schema.add_element(element);
                    }
                }
                "simpleType" | "complexType" => {
                    if let Some(name) = child.attr("name") {
                        let (base, derivation) = derivation_of(child);
                        schema.types.insert(
                            CompactString::from(name),
                            TypeDefinition {
                                name: QualifiedName::with_prefix(&schema.target_namespace, name, &prefix),
                                base,
                                derivation,
                                complex: child.local_name() == "complexType",
                            },
                        );
                    }
                }
                "attribute" => {
                    if let Some(name) = child.attr("name") {
                        schema.attributes.insert(
                            CompactString::from(name),
                            AttributeDeclaration {
                                name: QualifiedName::with_prefix(&schema.target_namespace, name, &prefix),
                                type_ref: type_ref_of(child),
                            },
                        );
                    }
                }
                "import" => schema.imports.push(Import {
                    namespace: child.attr("namespace").map(CompactString::from),
                    schema_location: child.attr("schemaLocation").map(CompactString::from),
                }),
                "include" => {
                    if let Some(location) = child.attr("schemaLocation") {
                        schema.includes.push(CompactString::from(location));
                    }
                }
                "annotation" => schema.read_annotation(child),
                _ => {}
            }
        }

        Ok(schema)
    }

    fn prefix_for_target(&self) -> Option<CompactString> {
        self.namespaces
            .iter()
            .find(|(p, u)| !p.is_empty() && *u == self.target_namespace)
            .map(|(p, _)| p.clone())
    }

    fn read_element(&self, node: &Node, prefix: &str) -> Option<Element> {
        let name = node.attr("name")?;
        Some(Element {
            name: QualifiedName::with_prefix(&self.target_namespace, name, prefix),
            id: node.attr("id").map(CompactString::from),
            type_ref: type_ref_of(node),
            substitution_group: node
                .attr("substitutionGroup")
                .and_then(|sg| node.resolve_qname(sg)),
            balance: node.attribute(XBRLI_NS, "balance").map(Balance::parse),
            period_type: node
                .attribute(XBRLI_NS, "periodType")
                .and_then(|pt| match pt.trim() {
                    "instant" => Some(PeriodType::Instant),
                    "duration" => Some(PeriodType::Duration),
                    _ => None,
                }),
            is_abstract: node.attr("abstract").is_some_and(is_true),
            nillable: node.attr("nillable").is_some_and(is_true),
        })
    }

    fn read_annotation(&mut self, annotation: &Node) {
        for appinfo in annotation.children_named(XS_NS, "appinfo") {
            for node in appinfo.children() {
                if node.is(LINK_NS, "linkbaseRef") {
                    if let Some(href) = node.attribute(XLINK_NS, "href") {
                        self.linkbase_refs.push(LinkbaseRef {
                            href: CompactString::from(href),
                            role: node.attribute(XLINK_NS, "role").map(CompactString::from),
                        });
                    }
                } else if node.is(LINK_NS, "roleType") {
                    self.role_types.push(RoleType {
                        id: node.attr("id").map(CompactString::from),
                        role_uri: CompactString::from(node.attr("roleURI").unwrap_or_default()),
                        definition: definition_of(node),
                        used_on: used_on(node),
                    });
                } else if node.is(LINK_NS, "arcroleType") {
                    self.arcrole_types.push(ArcroleType {
                        id: node.attr("id").map(CompactString::from),
                        arcrole_uri: CompactString::from(node.attr("arcroleURI").unwrap_or_default()),
                        cycles_allowed: CompactString::from(node.attr("cyclesAllowed").unwrap_or("any")),
                        definition: definition_of(node),
                        used_on: used_on(node),
                    });
                }
            }
        }
    }

    fn add_element(&mut self, element: Element) {
        if self.element_index.contains_key(element.name.local_name.as_str()) {
            return;
        }
        self.element_index
            .insert(element.name.local_name.clone(), self.elements.len());
        self.elements.push(element);
    }

    pub fn element(&self, local_name: &str) -> Option<&Element> {
        self.element_index
            .get(local_name)
            .and_then(|&idx| self.elements.get(idx))
    }

    pub fn type_definition(&self, local_name: &str) -> Option<&TypeDefinition> {
        self.types.get(local_name)
    }

    pub fn attribute(&self, local_name: &str) -> Option<&AttributeDeclaration> {
        self.attributes.get(local_name)
    }

    /// Folds an included schema into this one. Declarations already present
    /// win; a schema without a target namespace adopts this one's.
    pub fn merge(&mut self, mut included: Schema) {
        if included.target_namespace.is_empty() {
            included.adopt_namespace(&self.target_namespace);
        }

        for element in included.elements.drain(..) {
            self.add_element(element);
        }
        for (key, definition) in included.types.drain() {
            self.types.entry(key).or_insert(definition);
        }
        for (key, attribute) in included.attributes.drain() {
            self.attributes.entry(key).or_insert(attribute);
        }
        self.imports.append(&mut included.imports);
        self.linkbase_refs.append(&mut included.linkbase_refs);
        self.role_types.append(&mut included.role_types);
        self.arcrole_types.append(&mut included.arcrole_types);
        for binding in included.namespaces {
            if !self.namespaces.iter().any(|(p, _)| *p == binding.0) {
                self.namespaces.push(binding);
            }
        }
    }
}

impl Schema {
    /// Moves declarations and every no-namespace reference into `namespace`.
    fn adopt_namespace(&mut self, namespace: &CompactString) {
        let adopt = |name: &mut QualifiedName| {
            if name.namespace_uri.is_empty() {
                name.namespace_uri = namespace.clone();
            }
        };
        let adopt_type = |type_ref: &mut TypeRef| match type_ref {
            TypeRef::Named(name) | TypeRef::Anonymous(Some(name)) => adopt(name),
            TypeRef::Anonymous(None) => {}
        };

        for element in &mut self.elements {
            adopt(&mut element.name);
            if let Some(type_ref) = &mut element.type_ref {
                adopt_type(type_ref);
            }
            if let Some(group) = &mut element.substitution_group {
                adopt(group);
            }
        }
        for definition in self.types.values_mut() {
            adopt(&mut definition.name);
            if let Some(base) = &mut definition.base {
                adopt(base);
            }
        }
        for attribute in self.attributes.values_mut() {
            adopt(&mut attribute.name);
            if let Some(type_ref) = &mut attribute.type_ref {
                adopt_type(type_ref);
            }
        }
        self.target_namespace = namespace.clone();
    }
}

fn is_true(value: &str) -> bool {
    matches!(value.trim(), "true" | "1")
}

fn type_ref_of(node: &Node) -> Option<TypeRef> {
    if let Some(name) = node.attr("type") {
        return node.resolve_qname(name).map(TypeRef::Named);
    }
    node.children()
        .find(|c| c.is(XS_NS, "simpleType") || c.is(XS_NS, "complexType"))
        .map(|inline| TypeRef::Anonymous(derivation_of(inline).0))
}

/// Finds the base type of a simple or complex type definition.
fn derivation_of(definition: &Node) -> (Option<QualifiedName>, Option<Derivation>) {
    let content = definition
        .children()
        .find(|c| c.is(XS_NS, "simpleContent") || c.is(XS_NS, "complexContent"))
        .unwrap_or(definition);

    for step in content.children() {
        if step.namespace_uri() != XS_NS {
            continue;
        }
        let derivation = match step.local_name() {
            "restriction" => Derivation::Restriction,
            "extension" => Derivation::Extension,
            "list" => return (None, Some(Derivation::List)),
            "union" => return (None, Some(Derivation::Union)),
            _ => continue,
        };
        let base = step.attr("base").and_then(|b| step.resolve_qname(b));
        return (base, Some(derivation));
    }
    (None, None)
}

fn definition_of(node: &Node) -> Option<String> {
    node.first_child(LINK_NS, "definition")
        .map(|d| d.text().to_string())
}

fn used_on(node: &Node) -> Vec<QualifiedName> {
    node.children_named(LINK_NS, "usedOn")
        .filter_map(|u| u.resolve_qname(u.text()))
        .collect()
}

// ============================================================================
// Element rules
// ============================================================================

const RULE_105_01: &str = "105.01 - If Element has balance attribute, type MUST be monetaryItemType.";
const RULE_105_02: &str =
    "105.02 - Elements where the substitutionGroup attribute value is tuple MUST NOT have a balance attribute.";

/// Checks element declarations for balance and substitution group
/// compatibility.
pub struct SchemaValidator<'a> {
    taxonomy: &'a Taxonomy,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(taxonomy: &'a Taxonomy) -> Self {
        Self { taxonomy }
    }

    pub fn validate(&self, diagnostics: &mut Diagnostics) {
        for (schema_id, schema) in self.taxonomy.schemas() {
            for element in &schema.elements {
                self.validate_element(schema_id, element, diagnostics);
            }
        }
    }

    pub fn validate_element(&self, schema: SchemaId, element: &Element, diagnostics: &mut Diagnostics) {
        if element.balance.is_none() {
            return;
        }
        let entity = || EntityRef::Element {
            schema,
            name: element.name.clone(),
        };

        if self.taxonomy.is_item_declaration(element)
            && self.taxonomy.element_type_class(element) != Some(TypeClass::Monetary)
        {
            diagnostics.push(ValidationError::new(ErrorKind::Element, entity(), RULE_105_01));
        }
        if self.taxonomy.is_tuple_declaration(element) {
            diagnostics.push(ValidationError::new(ErrorKind::Element, entity(), RULE_105_02));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:xbrli="http://www.xbrl.org/2003/instance"
           xmlns:link="http://www.xbrl.org/2003/linkbase"
           xmlns:xlink="http://www.w3.org/1999/xlink"
           xmlns:ex="http://example.com/ex"
           targetNamespace="http://example.com/ex">
  <xs:annotation>
    <xs:appinfo>
      <link:linkbaseRef xlink:type="simple" xlink:href="ex-cal.xml"
          xlink:role="http://www.xbrl.org/2003/role/calculationLinkbaseRef"/>
      <link:roleType id="BalanceSheet" roleURI="http://example.com/role/BalanceSheet">
        <link:definition>Balance sheet</link:definition>
        <link:usedOn>link:presentationLink</link:usedOn>
      </link:roleType>
      <link:arcroleType id="explains" arcroleURI="http://example.com/arcrole/explains" cyclesAllowed="none">
        <link:definition>Explanatory fact</link:definition>
        <link:usedOn>link:definitionArc</link:usedOn>
      </link:arcroleType>
    </xs:appinfo>
  </xs:annotation>
  <xs:import namespace="http://www.xbrl.org/2003/instance"
             schemaLocation="http://www.xbrl.org/2003/xbrl-instance-2003-12-31.xsd"/>
  <xs:element name="Cash" id="ex_Cash" type="xbrli:monetaryItemType"
              substitutionGroup="xbrli:item" xbrli:balance="debit" xbrli:periodType="instant"/>
  <xs:element name="Holding" substitutionGroup="xbrli:tuple" nillable="true">
    <xs:complexType><xs:sequence/></xs:complexType>
  </xs:element>
  <xs:complexType name="percentItemType">
    <xs:simpleContent>
      <xs:restriction base="xbrli:pureItemType"/>
    </xs:simpleContent>
  </xs:complexType>
</xs:schema>"#;

    fn parse(text: &str) -> Schema {
        Schema::parse(&XmlDocument::parse_str(text, Some("ex.xsd")).unwrap()).unwrap()
    }

    #[test]
    fn reads_element_declarations() {
        let schema = parse(SCHEMA);
        assert_eq!(schema.target_namespace, "http://example.com/ex");

        let cash = schema.element("Cash").unwrap();
        assert_eq!(cash.name.prefix, "ex");
        assert_eq!(cash.balance, Some(Balance::Debit));
        assert_eq!(cash.period_type, Some(PeriodType::Instant));
        assert_eq!(
            cash.type_ref,
            Some(TypeRef::Named(QualifiedName::new(XBRLI_NS, "monetaryItemType")))
        );
        assert!(cash
            .substitution_group
            .as_ref()
            .is_some_and(|sg| sg.is(XBRLI_NS, "item")));

        let holding = schema.element("Holding").unwrap();
        assert!(holding.nillable);
        assert_eq!(holding.type_ref, Some(TypeRef::Anonymous(None)));
    }

    #[test]
    fn reads_type_derivation() {
        let schema = parse(SCHEMA);
        let percent = schema.type_definition("percentItemType").unwrap();
        assert!(percent.complex);
        assert_eq!(percent.derivation, Some(Derivation::Restriction));
        assert_eq!(percent.base, Some(QualifiedName::new(XBRLI_NS, "pureItemType")));
    }

    #[test]
    fn reads_annotations_and_imports() {
        let schema = parse(SCHEMA);
        assert_eq!(schema.imports.len(), 1);
        assert_eq!(schema.linkbase_refs[0].href, "ex-cal.xml");
        let role = &schema.role_types[0];
        assert_eq!(role.id.as_deref(), Some("BalanceSheet"));
        assert_eq!(role.definition.as_deref(), Some("Balance sheet"));
        assert!(role.used_on[0].is(LINK_NS, "presentationLink"));

        let arcrole = &schema.arcrole_types[0];
        assert_eq!(arcrole.id.as_deref(), Some("explains"));
        assert_eq!(arcrole.arcrole_uri, "http://example.com/arcrole/explains");
        assert_eq!(arcrole.cycles_allowed, "none");
        assert_eq!(arcrole.definition.as_deref(), Some("Explanatory fact"));
        assert!(arcrole.used_on[0].is(LINK_NS, "definitionArc"));
    }

    #[test]
    fn unknown_balance_literal_is_kept() {
        let schema = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          xmlns:xbrli="http://www.xbrl.org/2003/instance"
                          targetNamespace="urn:t">
                 <xs:element name="A" type="xbrli:stringItemType" substitutionGroup="xbrli:item" xbrli:balance="both"/>
               </xs:schema>"#,
        );
        assert_eq!(
            schema.element("A").unwrap().balance,
            Some(Balance::Other(CompactString::from("both")))
        );
    }

    #[test]
    fn merge_keeps_existing_declarations() {
        let mut schema = parse(SCHEMA);
        let included = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="Cash" type="xs:string"/>
                 <xs:element name="Extra" type="xs:string"/>
               </xs:schema>"#,
        );
        schema.merge(included);

        assert!(matches!(
            schema.element("Cash").unwrap().type_ref,
            Some(TypeRef::Named(ref n)) if n.local_name == "monetaryItemType"
        ));
        let extra = schema.element("Extra").unwrap();
        assert_eq!(extra.name.namespace_uri, "http://example.com/ex");
    }

    #[test]
    fn chameleon_include_adopts_unqualified_references() {
        let mut schema = parse(SCHEMA);
        let included = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          xmlns:xbrli="http://www.xbrl.org/2003/instance">
                 <xs:complexType name="moneyType">
                   <xs:simpleContent><xs:restriction base="xbrli:monetaryItemType"/></xs:simpleContent>
                 </xs:complexType>
                 <xs:complexType name="cashType">
                   <xs:simpleContent><xs:restriction base="moneyType"/></xs:simpleContent>
                 </xs:complexType>
                 <xs:element name="Petty" type="cashType" substitutionGroup="Cash"/>
               </xs:schema>"#,
        );
        schema.merge(included);

        let ex = |local: &str| QualifiedName::new("http://example.com/ex", local);
        let petty = schema.element("Petty").unwrap();
        assert_eq!(petty.type_ref, Some(TypeRef::Named(ex("cashType"))));
        assert_eq!(petty.substitution_group, Some(ex("Cash")));
        assert_eq!(schema.type_definition("cashType").unwrap().base, Some(ex("moneyType")));
        assert_eq!(
            schema.type_definition("moneyType").unwrap().base,
            Some(QualifiedName::new(XBRLI_NS, "monetaryItemType"))
        );
    }

    #[test]
    fn rejects_non_schema_documents() {
        let doc = XmlDocument::parse_str("<xbrl/>", None).unwrap();
        assert!(matches!(Schema::parse(&doc), Err(Error::Parse(_))));
    }
}
