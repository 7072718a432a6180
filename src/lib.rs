//! xbrlint - XBRL 2.1 instance loader and rule-based validator
//!
//! Licensed under AGPL-3.0

pub mod cache;
pub mod fragment;
pub mod instance;
pub mod linkbase;
pub mod loader;
pub mod model;
pub mod namespaces;
pub mod parser;
pub mod schema;
pub mod taxonomy;
pub mod types;
pub mod validator;
pub mod xml;

pub use parser::Parser;

// Re-export main types
pub use cache::SchemaCache;
pub use fragment::{Assembler, Fragment, FragmentEvents};
pub use instance::Document;
pub use loader::{DocumentLoader, FileLoader, MemoryLoader};
pub use model::{Context, Fact, FactId, Item, Tuple, Unit};
pub use taxonomy::Taxonomy;
pub use types::TypeClass;
pub use validator::{
    Diagnostics, EntityRef, ErrorKind, RuleSet, ValidationConfig, ValidationError,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
