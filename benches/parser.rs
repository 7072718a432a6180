use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use std::sync::Arc;
use xbrlint::{MemoryLoader, Parser};

const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:xbrli="http://www.xbrl.org/2003/instance"
           targetNamespace="http://example.com/bench">
  <xs:element name="Revenue" type="xbrli:monetaryItemType" substitutionGroup="xbrli:item" xbrli:balance="credit"/>
  <xs:element name="SharesOutstanding" type="xbrli:sharesItemType" substitutionGroup="xbrli:item"/>
  <xs:element name="Margin" type="xbrli:pureItemType" substitutionGroup="xbrli:item"/>
</xs:schema>"#;

fn instance(facts: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xbrl xmlns="http://www.xbrl.org/2003/instance"
      xmlns:link="http://www.xbrl.org/2003/linkbase"
      xmlns:xlink="http://www.w3.org/1999/xlink"
      xmlns:iso4217="http://www.xbrl.org/2003/iso4217"
      xmlns:b="http://example.com/bench">
  <link:schemaRef xlink:type="simple" xlink:href="bench.xsd"/>
  <context id="ctx1">
    <entity><identifier scheme="http://www.sec.gov/CIK">0000000000</identifier></entity>
    <period><instant>2023-12-31</instant></period>
  </context>
  <unit id="usd"><measure>iso4217:USD</measure></unit>
  <unit id="shares"><measure>shares</measure></unit>
  <unit id="pure"><measure>pure</measure></unit>
"#,
    );
    for i in 0..facts {
        let _ = match i % 3 {
            0 => writeln!(xml, r#"  <b:Revenue contextRef="ctx1" unitRef="usd" decimals="-3">{i}000</b:Revenue>"#),
            1 => writeln!(xml, r#"  <b:SharesOutstanding contextRef="ctx1" unitRef="shares" decimals="0">{i}</b:SharesOutstanding>"#),
            _ => writeln!(xml, r#"  <b:Margin contextRef="ctx1" unitRef="pure" precision="3">0.{i}</b:Margin>"#),
        };
    }
    xml.push_str("</xbrl>\n");
    xml
}

fn parse_and_validate(c: &mut Criterion) {
    let loader = Arc::new(MemoryLoader::new().with_document("bench.xsd", SCHEMA));
    let parser = Parser::new().with_loader(loader.clone());
    let unvalidated = Parser::new().with_loader(loader).with_validation(false);
    let small = instance(100);
    let large = instance(10_000);

    c.bench_function("parse_validate_100", |b| {
        b.iter(|| parser.parse_str(black_box(&small)));
    });
    c.bench_function("parse_validate_10k", |b| {
        b.iter(|| parser.parse_str(black_box(&large)));
    });
    c.bench_function("parse_only_10k", |b| {
        b.iter(|| unvalidated.parse_str(black_box(&large)));
    });
}

criterion_group!(benches, parse_and_validate);
criterion_main!(benches);
