// XBRL 2.1 fact validation rules and the diagnostics they produce
use crate::model::{Fact, FactId, Item, Measure, Tuple, Unit};
use crate::namespaces::{QualifiedName, ISO4217_NS, TUPLE_RESERVED_NAMESPACES, XBRLI_NS};
use crate::schema::{SchemaId, SchemaValidator};
use crate::taxonomy::Taxonomy;
use crate::types::{is_iso4217_code, TypeClass};
use crate::{Error, Result};
use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

bitflags! {
    /// Rule groups that can be switched on or off.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RuleSet: u8 {
        const ATTRIBUTE_TYPES = 1 << 0;
        const ITEM_TYPES = 1 << 1;
        const TUPLE_ATTRIBUTES = 1 << 2;
        const ELEMENT_BALANCE = 1 << 3;

        const FACTS = Self::ATTRIBUTE_TYPES.bits()
            | Self::ITEM_TYPES.bits()
            | Self::TUPLE_ATTRIBUTES.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    pub rules: RuleSet,
    /// Also report `contextRef`/`unitRef` values that match no context or
    /// unit in the fragment. Off by default.
    pub strict: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::full()
    }
}

impl ValidationConfig {
    pub fn full() -> Self {
        Self {
            rules: RuleSet::all(),
            strict: false,
        }
    }

    pub fn facts() -> Self {
        Self {
            rules: RuleSet::FACTS,
            strict: false,
        }
    }

    pub fn schema() -> Self {
        Self {
            rules: RuleSet::ELEMENT_BALANCE,
            strict: false,
        }
    }

    /// Looks up a named profile: `full`, `facts` or `schema`.
    pub fn profile(name: &str) -> Result<Self> {
        match name {
            "full" => Ok(Self::full()),
            "facts" => Ok(Self::facts()),
            "schema" => Ok(Self::schema()),
            other => Err(Error::NotFound(format!("validation profile {other}"))),
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Item,
    Attribute,
    Element,
    Fact,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Item => "item",
            ErrorKind::Attribute => "attribute",
            ErrorKind::Element => "element",
            ErrorKind::Fact => "fact",
        };
        f.write_str(name)
    }
}

/// The entity a diagnostic is about, by index rather than by ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum EntityRef {
    Fact { fact: FactId, name: QualifiedName },
    Element { schema: SchemaId, name: QualifiedName },
}

impl EntityRef {
    pub fn name(&self) -> &QualifiedName {
        match self {
            EntityRef::Fact { name, .. } | EntityRef::Element { name, .. } => name,
        }
    }

    fn fact(id: FactId, fact: &Fact) -> Self {
        EntityRef::Fact {
            fact: id,
            name: fact.name().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub kind: ErrorKind,
    pub entity: EntityRef,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, entity: EntityRef, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Append-only log of validation errors, in detection order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    errors: Vec<ValidationError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }

    pub fn as_slice(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

// ============================================================================
// Fact rules
// ============================================================================

/// Rule engine over assembled facts. Item rules dispatch on the type
/// classification of the item's element declaration.
pub struct FactValidator<'a> {
    taxonomy: &'a Taxonomy,
    units: &'a [Unit],
    config: ValidationConfig,
}

impl<'a> FactValidator<'a> {
    pub fn new(taxonomy: &'a Taxonomy, units: &'a [Unit], config: ValidationConfig) -> Self {
        Self {
            taxonomy,
            units,
            config,
        }
    }

    pub fn validate(&self, id: FactId, fact: &Fact, diagnostics: &mut Diagnostics) {
        if self.config.rules.contains(RuleSet::ATTRIBUTE_TYPES) {
            self.validate_attributes(id, fact, diagnostics);
        }
        match fact {
            Fact::Item(item) => {
                if self.config.rules.contains(RuleSet::ITEM_TYPES) {
                    self.validate_item(id, fact, item, diagnostics);
                }
                if self.config.strict {
                    self.validate_references(id, fact, item, diagnostics);
                }
            }
            Fact::Tuple(tuple) => {
                if self.config.rules.contains(RuleSet::TUPLE_ATTRIBUTES) {
                    self.validate_tuple(id, fact, tuple, diagnostics);
                }
            }
        }
    }

    fn validate_attributes(&self, id: FactId, fact: &Fact, diagnostics: &mut Diagnostics) {
        for attribute in fact.attributes() {
            let Some(attribute_type) = self.taxonomy.resolve_attribute_type(attribute) else {
                continue;
            };
            if !attribute_type.can_convert(&attribute.value) {
                diagnostics.push(ValidationError::new(
                    ErrorKind::Attribute,
                    EntityRef::fact(id, fact),
                    format!(
                        "attribute {} of fact {} has value {:?} that cannot be converted to {:?}",
                        attribute.name,
                        fact.label(),
                        attribute.value,
                        attribute_type
                    ),
                ));
            }
        }
    }

    /// Tuples must not carry attributes from XBRL-defined namespaces.
    fn validate_tuple(&self, id: FactId, fact: &Fact, tuple: &Tuple, diagnostics: &mut Diagnostics) {
        for attribute in &tuple.attributes {
            if TUPLE_RESERVED_NAMESPACES.contains(&attribute.namespace_uri()) {
                diagnostics.push(ValidationError::new(
                    ErrorKind::Fact,
                    EntityRef::fact(id, fact),
                    format!(
                        "tuple {} has attribute {} in XBRL spec defined namespace {}",
                        tuple.name,
                        attribute.name,
                        attribute.namespace_uri()
                    ),
                ));
            }
        }
    }

    fn validate_item(&self, id: FactId, fact: &Fact, item: &Item, diagnostics: &mut Diagnostics) {
        let Some(class) = self.taxonomy.resolve_element_type(&item.name) else {
            return;
        };
        let mut report = |message: String| {
            diagnostics.push(ValidationError::new(
                ErrorKind::Item,
                EntityRef::fact(id, fact),
                message,
            ))
        };
        let unit = item.unit.and_then(|u| self.units.get(u.0));

        match class {
            TypeClass::Monetary => {
                if let Some(unit) = unit {
                    check_monetary(item, unit, &mut report);
                }
            }
            TypeClass::Shares => {
                if let Some(unit) = unit {
                    check_shares(item, unit, &mut report);
                }
            }
            TypeClass::Pure => {
                if let Some(unit) = unit {
                    check_pure(item, unit, &mut report);
                }
                check_decimal(item, &mut report);
            }
            TypeClass::Decimal => check_decimal(item, &mut report),
            TypeClass::Other => {}
        }
    }

    fn validate_references(&self, id: FactId, fact: &Fact, item: &Item, diagnostics: &mut Diagnostics) {
        if let (Some(context_ref), None) = (&item.context_ref, item.context) {
            diagnostics.push(ValidationError::new(
                ErrorKind::Item,
                EntityRef::fact(id, fact),
                format!("item {} refers to undefined context {}", item.name, context_ref),
            ));
        }
        if let (Some(unit_ref), None) = (&item.unit_ref, item.unit) {
            diagnostics.push(ValidationError::new(
                ErrorKind::Item,
                EntityRef::fact(id, fact),
                format!("item {} refers to undefined unit {}", item.name, unit_ref),
            ));
        }
    }
}

/// Each failing condition ends the monetary checks for the item.
fn check_monetary(item: &Item, unit: &Unit, report: &mut dyn FnMut(String)) {
    if unit.is_ratio() {
        report(format!(
            "ratio found in monetary item unit (item {}, unit {})",
            item.name, unit.id
        ));
        return;
    }
    let Some(measure) = unit.measures().first() else {
        return;
    };
    match measure.namespace_uri.as_deref() {
        None => {
            report(format!(
                "wrong measure namespace for monetary item {} in unit {}: unspecified",
                item.name, unit.id
            ));
            return;
        }
        Some(uri) if !uri.is_empty() && uri != ISO4217_NS => {
            report(format!(
                "wrong measure namespace for monetary item {} in unit {}: {}",
                item.name, unit.id, uri
            ));
            return;
        }
        Some(_) => {}
    }
    if !is_iso4217_code(&measure.local_name) {
        report(format!(
            "unsupported ISO 4217 code {} for monetary item {} in unit {}",
            measure.local_name, item.name, unit.id
        ));
    }
}

fn single_measure(unit: &Unit) -> Option<&Measure> {
    match unit.measures() {
        [measure] => Some(measure),
        _ => None,
    }
}

fn check_shares(item: &Item, unit: &Unit, report: &mut dyn FnMut(String)) {
    let Some(measure) = single_measure(unit) else {
        report(format!(
            "shares item type unit local name not shares (item {}, unit {}, measure count {})",
            item.name,
            unit.id,
            unit.measures().len()
        ));
        return;
    };
    if measure.local_name != "shares" {
        report(format!(
            "shares item type unit local name not shares (item {}, unit {}, measure {})",
            item.name, unit.id, measure.local_name
        ));
    }
    if measure.namespace_uri.as_deref() != Some(XBRLI_NS) {
        report(format!(
            "wrong measure namespace for shares item {} in unit {}: {}",
            item.name,
            unit.id,
            measure.namespace_uri.as_deref().unwrap_or("unspecified")
        ));
    }
}

fn check_pure(item: &Item, unit: &Unit, report: &mut dyn FnMut(String)) {
    let local_name = single_measure(unit).map(|m| m.local_name.as_str());
    if local_name != Some("pure") {
        report(format!(
            "pure item type unit local name not pure (item {}, unit {}, measure {})",
            item.name,
            unit.id,
            local_name.unwrap_or("")
        ));
    }
}

fn check_decimal(item: &Item, report: &mut dyn FnMut(String)) {
    if item.nil {
        for (attribute, specified) in [
            ("precision", item.precision_specified()),
            ("decimals", item.decimals_specified()),
        ] {
            if specified {
                report(format!("nil numeric item {} specifies {}", item.name, attribute));
            }
        }
        return;
    }
    match (item.precision_specified(), item.decimals_specified()) {
        (false, false) => report(format!(
            "numeric item {} without specified precision or decimals",
            item.name
        )),
        (true, true) => report(format!(
            "numeric item {} with both precision and decimals specified",
            item.name
        )),
        _ => {}
    }
}

// ============================================================================
// Orchestration
// ============================================================================

/// Runs the enabled fact and element rules over one fragment's facts.
pub struct XbrlValidator {
    config: ValidationConfig,
}

impl XbrlValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, taxonomy: &Taxonomy, facts: &[Fact], units: &[Unit]) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();

        if self.config.strict || self.config.rules.intersects(RuleSet::FACTS) {
            let fact_validator = FactValidator::new(taxonomy, units, self.config);
            for (idx, fact) in facts.iter().enumerate() {
                fact_validator.validate(FactId(idx), fact, &mut diagnostics);
            }
        }

        if self.config.rules.contains(RuleSet::ELEMENT_BALANCE) {
            SchemaValidator::new(taxonomy).validate(&mut diagnostics);
        }

        diagnostics
    }
}
