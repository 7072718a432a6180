use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use xbrlint::{Document, EntityRef, ErrorKind, Parser, ValidationConfig};

const TAXONOMY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:xbrli="http://www.xbrl.org/2003/instance"
           xmlns:ex="http://example.com/ex"
           targetNamespace="http://example.com/ex">
  <xs:element name="Cash" type="xbrli:monetaryItemType" substitutionGroup="xbrli:item" xbrli:balance="debit"/>
  <xs:element name="SharesIssued" type="xbrli:sharesItemType" substitutionGroup="xbrli:item"/>
  <xs:element name="Ratio" type="ex:percentItemType" substitutionGroup="xbrli:item"/>
  <xs:element name="Headcount" type="xbrli:integerItemType" substitutionGroup="xbrli:item"/>
  <xs:element name="Note" type="xbrli:stringItemType" substitutionGroup="xbrli:item"/>
  <xs:element name="Holding" substitutionGroup="xbrli:tuple"><xs:complexType/></xs:element>
  <xs:complexType name="percentItemType">
    <xs:simpleContent><xs:restriction base="xbrli:pureItemType"/></xs:simpleContent>
  </xs:complexType>
</xs:schema>"#;

const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xbrl xmlns="http://www.xbrl.org/2003/instance"
      xmlns:link="http://www.xbrl.org/2003/linkbase"
      xmlns:xlink="http://www.w3.org/1999/xlink"
      xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
      xmlns:iso4217="http://www.xbrl.org/2003/iso4217"
      xmlns:ex="http://example.com/ex">
  <link:schemaRef xlink:type="simple" xlink:href="ex.xsd"/>
  <context id="c1">
    <entity><identifier scheme="http://example.com">ACME</identifier></entity>
    <period><startDate>2024-01-01</startDate><endDate>2024-12-31</endDate></period>
  </context>
  <unit id="usd"><measure>iso4217:USD</measure></unit>
  <unit id="eps">
    <divide>
      <unitNumerator><measure>iso4217:USD</measure></unitNumerator>
      <unitDenominator><measure>shares</measure></unitDenominator>
    </divide>
  </unit>
  <unit id="shares"><measure>shares</measure></unit>
  <unit id="badshares"><measure>Shares</measure></unit>
  <unit id="pure"><measure>pure</measure></unit>
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ex.xsd"), TAXONOMY).unwrap();
        Self { dir }
    }

    fn write(&self, name: &str, content: &str) {
        fs::write(self.dir.path().join(name), content).unwrap();
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn parse_facts(&self, facts: &str) -> Document {
        self.parse_with(facts, Parser::new())
    }

    fn parse_with(&self, facts: &str, parser: Parser) -> Document {
        let instance = format!("{HEADER}{facts}\n</xbrl>\n");
        self.write("instance.xml", &instance);
        parser.parse_file(self.path("instance.xml")).unwrap()
    }
}

fn messages(doc: &Document) -> Vec<String> {
    doc.validation_errors().map(|e| e.message.clone()).collect()
}

fn fact_messages(doc: &Document) -> Vec<String> {
    doc.validation_errors()
        .filter(|e| e.kind != ErrorKind::Element)
        .map(|e| e.message.clone())
        .collect()
}

#[test]
fn monetary_item_with_iso_unit_is_valid() {
    let fixture = Fixture::new();
    let doc = fixture.parse_facts(r#"<ex:Cash contextRef="c1" unitRef="usd" decimals="0">100</ex:Cash>"#);
    assert_eq!(fact_messages(&doc), Vec::<String>::new());
    assert_eq!(doc.fact_count(), 1);
}

#[test]
fn monetary_item_with_ratio_unit() {
    let fixture = Fixture::new();
    let doc = fixture.parse_facts(r#"<ex:Cash contextRef="c1" unitRef="eps" decimals="2">1.5</ex:Cash>"#);
    let found = fact_messages(&doc);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("ratio found in monetary item unit"), "{found:?}");

    let error = doc.validation_errors().next().unwrap();
    assert_eq!(error.kind, ErrorKind::Item);
    assert!(matches!(error.entity, EntityRef::Fact { .. }));
}

#[test]
fn shares_item_with_wrong_case_measure() {
    let fixture = Fixture::new();
    let doc = fixture.parse_facts(
        r#"<ex:SharesIssued contextRef="c1" unitRef="badshares" decimals="0">10</ex:SharesIssued>"#,
    );
    let found = fact_messages(&doc);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("shares item type unit local name not shares"));

    let ok = fixture.parse_facts(
        r#"<ex:SharesIssued contextRef="c1" unitRef="shares" decimals="0">10</ex:SharesIssued>"#,
    );
    assert!(fact_messages(&ok).is_empty());
}

#[test]
fn numeric_item_without_precision_or_decimals() {
    let fixture = Fixture::new();
    let doc = fixture.parse_facts(r#"<ex:Headcount contextRef="c1" unitRef="pure">12</ex:Headcount>"#);
    let found = fact_messages(&doc);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("without specified precision or decimals"));
}

#[test]
fn pure_item_also_gets_decimal_rules() {
    let fixture = Fixture::new();
    let doc = fixture.parse_facts(
        r#"<ex:Ratio contextRef="c1" unitRef="usd" precision="2" decimals="2">0.5</ex:Ratio>"#,
    );
    let found = fact_messages(&doc);
    assert_eq!(found.len(), 2);
    assert!(found[0].contains("pure item type unit local name not pure"));
    assert!(found[1].contains("with both precision and decimals specified"));
}

#[test]
fn nil_numeric_item_with_decimals() {
    let fixture = Fixture::new();
    let doc = fixture.parse_facts(
        r#"<ex:Headcount contextRef="c1" unitRef="pure" xsi:nil="true" decimals="0"/>"#,
    );
    let found = fact_messages(&doc);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("nil numeric item"));
}

#[test]
fn tuple_with_xlink_attribute() {
    let fixture = Fixture::new();
    let doc = fixture.parse_facts(
        r#"<ex:Holding xlink:type="resource">
             <ex:Note contextRef="c1">inside</ex:Note>
           </ex:Holding>"#,
    );
    let errors: Vec<_> = doc
        .validation_errors()
        .filter(|e| e.kind == ErrorKind::Fact)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("http://www.w3.org/1999/xlink"));
    assert_eq!(doc.fact_count(), 2);
}

#[test]
fn tuple_reports_each_reserved_attribute() {
    let fixture = Fixture::new();
    let doc = fixture.parse_facts(
        r#"<ex:Holding xlink:type="resource" link:role="http://example.com/role" id="h1">
             <ex:Note contextRef="c1">inside</ex:Note>
           </ex:Holding>"#,
    );
    let errors: Vec<_> = doc
        .validation_errors()
        .filter(|e| e.kind == ErrorKind::Fact)
        .map(|e| e.message.clone())
        .collect();
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors[0].contains("http://www.w3.org/1999/xlink"));
    assert!(errors[1].contains("http://www.xbrl.org/2003/linkbase"));
}

#[test]
fn balance_on_non_monetary_item_declaration() {
    let fixture = Fixture::new();
    fixture.write(
        "ex.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                      xmlns:xbrli="http://www.xbrl.org/2003/instance"
                      targetNamespace="http://example.com/ex">
             <xs:element name="Cash" type="xbrli:monetaryItemType" substitutionGroup="xbrli:item" xbrli:balance="debit"/>
             <xs:element name="Count" type="xbrli:integerItemType" substitutionGroup="xbrli:item" xbrli:balance="debit"/>
             <xs:element name="Holding" substitutionGroup="xbrli:tuple" xbrli:balance="credit"><xs:complexType/></xs:element>
           </xs:schema>"#,
    );
    let doc = fixture.parse_facts("");
    let elements: Vec<_> = doc
        .validation_errors()
        .filter(|e| e.kind == ErrorKind::Element)
        .map(|e| (e.entity.name().local_name.to_string(), e.message[..6].to_string()))
        .collect();
    assert_eq!(
        elements,
        vec![
            ("Count".to_string(), "105.01".to_string()),
            ("Holding".to_string(), "105.02".to_string()),
        ]
    );
}

#[test]
fn duplicate_schema_references_register_one_schema() {
    let fixture = Fixture::new();
    fs::create_dir(fixture.path("copy")).unwrap();
    fs::write(fixture.path("copy/ex.xsd"), TAXONOMY).unwrap();

    let instance = HEADER.replace(
        r#"<link:schemaRef xlink:type="simple" xlink:href="ex.xsd"/>"#,
        r#"<link:schemaRef xlink:type="simple" xlink:href="ex.xsd"/>
  <link:schemaRef xlink:type="simple" xlink:href="copy/ex.xsd"/>"#,
    );
    fixture.write("instance.xml", &format!("{instance}</xbrl>"));
    let doc = Parser::new().parse_file(fixture.path("instance.xml")).unwrap();

    let fragment = &doc.fragments()[0];
    assert_eq!(fragment.taxonomy().len(), 1);
    let schema = fragment.schema_for_prefix("ex").unwrap();
    assert!(schema
        .location
        .as_deref()
        .is_some_and(|l| !l.contains("copy")));
}

#[test]
fn schema_location_and_schema_ref_share_a_namespace() {
    let fixture = Fixture::new();
    let instance = HEADER.replace(
        r#"xmlns:ex="http://example.com/ex">"#,
        r#"xmlns:ex="http://example.com/ex"
      xsi:schemaLocation="http://example.com/ex ex.xsd">"#,
    );
    fixture.write("instance.xml", &format!("{instance}</xbrl>"));
    let doc = Parser::new().parse_file(fixture.path("instance.xml")).unwrap();
    assert_eq!(doc.schema_count(), 1);
}

#[test]
fn unreachable_schema_drops_facts_silently() {
    let fixture = Fixture::new();
    fs::remove_file(fixture.path("ex.xsd")).unwrap();
    let doc = fixture.parse_facts(r#"<ex:Cash contextRef="c1" unitRef="eps">1</ex:Cash>"#);
    assert_eq!(doc.fact_count(), 0);
    assert_eq!(doc.context_count(), 1);
    assert!(doc.is_valid());
}

#[test]
fn remote_schema_served_from_schema_dir() {
    let fixture = Fixture::new();
    let instance = HEADER.replace(
        r#"xlink:href="ex.xsd""#,
        r#"xlink:href="http://example.com/taxonomy/ex.xsd""#,
    );
    fixture.write("instance.xml", &format!("{instance}<ex:Cash contextRef=\"c1\" unitRef=\"eps\" decimals=\"0\">1</ex:Cash></xbrl>"));

    let offline = Parser::new().parse_file(fixture.path("instance.xml")).unwrap();
    assert_eq!(offline.fact_count(), 0);

    let local = Parser::new()
        .with_schema_dir(fixture.dir.path())
        .parse_file(fixture.path("instance.xml"))
        .unwrap();
    assert_eq!(local.fact_count(), 1);
    assert!(!local.is_valid());
}

#[test]
fn profiles_select_rule_groups() {
    let fixture = Fixture::new();
    let facts = r#"<ex:Cash contextRef="c1" unitRef="eps">1</ex:Cash>"#;
    fixture.write(
        "ex.xsd",
        &TAXONOMY.replace(
            r#"name="Headcount" type="xbrli:integerItemType""#,
            r#"name="Headcount" type="xbrli:integerItemType" xbrli:balance="debit""#,
        ),
    );

    let schema_only = fixture.parse_with(facts, Parser::new().with_config(ValidationConfig::schema()));
    assert!(schema_only
        .validation_errors()
        .all(|e| e.kind == ErrorKind::Element));
    assert_eq!(schema_only.validation_errors().count(), 1);

    let facts_only = fixture.parse_with(facts, Parser::new().with_config(ValidationConfig::facts()));
    assert!(facts_only
        .validation_errors()
        .all(|e| e.kind != ErrorKind::Element));
    assert_eq!(facts_only.validation_errors().count(), 1);

    let unvalidated = fixture.parse_with(facts, Parser::new().with_validation(false));
    assert!(messages(&unvalidated).is_empty());
}

#[test]
fn validation_errors_serialize_to_json() {
    let fixture = Fixture::new();
    let doc = fixture.parse_facts(r#"<ex:Cash contextRef="c1" unitRef="eps" decimals="0">1</ex:Cash>"#);
    let errors: Vec<_> = doc.validation_errors().collect();
    let json = serde_json::to_value(&errors).unwrap();
    assert_eq!(json[0]["kind"], "item");
    assert_eq!(json[0]["entity"]["entity"], "fact");
    assert_eq!(json[0]["entity"]["name"]["local_name"], "Cash");
}

#[test]
fn parses_fixture_directory_paths() {
    let fixture = Fixture::new();
    let doc = fixture.parse_facts(r#"<ex:Note contextRef="c1">hello</ex:Note>"#);
    let location = doc.location().unwrap();
    assert!(Path::new(location).ends_with("instance.xml"));
    let fragment = &doc.fragments()[0];
    let note = fragment.items().next().unwrap();
    assert_eq!(note.value, "hello");
    let period = fragment.item_context(note).and_then(|c| c.period.as_ref()).unwrap();
    assert!(period.start().is_some());
}
