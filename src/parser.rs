// XBRL instance parser: XML tree, fragment assembly and validation
use crate::cache::SchemaCache;
use crate::fragment::{Assembler, FragmentEvents};
use crate::instance::Document;
use crate::loader::{read_file, DocumentLoader, FileLoader};
use crate::validator::ValidationConfig;
use crate::xml::XmlDocument;
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Parser {
    validate: bool,
    parallel: bool,
    loader: Arc<dyn DocumentLoader>,
    cache: Arc<SchemaCache>,
    config: ValidationConfig,
    events: Option<Arc<dyn FragmentEvents>>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            validate: true,
            parallel: true,
            loader: Arc::new(FileLoader::new()),
            cache: Arc::new(SchemaCache::new()),
            config: ValidationConfig::default(),
            events: None,
        }
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Serves `http(s)` schema references from a local directory. Replaces
    /// any loader set earlier.
    pub fn with_schema_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.loader = Arc::new(FileLoader::new().with_schema_dir(dir));
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Shares a schema cache with other parsers.
    pub fn with_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn FragmentEvents>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Document> {
        let path = path.as_ref();
        let content = read_file(path)?;
        self.parse_bytes_at(&content, Some(&path.to_string_lossy()))
    }

    pub fn parse_bytes(&self, data: &[u8]) -> Result<Document> {
        self.parse_bytes_at(data, None)
    }

    pub fn parse_str(&self, text: &str) -> Result<Document> {
        self.parse_bytes_at(text.as_bytes(), None)
    }

    /// Parses `data` as if read from `location`, which anchors relative
    /// schema and linkbase references.
    pub fn parse_bytes_at(&self, data: &[u8], location: Option<&str>) -> Result<Document> {
        let xml = XmlDocument::parse(data, location)?;
        let mut assembler = Assembler::new(self.loader.as_ref(), &self.cache)
            .with_config(self.config)
            .with_validation(self.validate);
        if let Some(events) = self.events.as_deref() {
            assembler = assembler.with_events(events);
        }
        Ok(Document::assemble(&xml, &assembler, self.parallel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::Error;

    #[test]
    fn strips_bom_and_parses() {
        let parser = Parser::new().with_loader(Arc::new(MemoryLoader::new()));
        let mut data = vec![0xEF, 0xBB, 0xBF];
        data.extend_from_slice(br#"<xbrl xmlns="http://www.xbrl.org/2003/instance"/>"#);
        let doc = parser.parse_bytes(&data).unwrap();
        assert_eq!(doc.fragments().len(), 1);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let parser = Parser::new();
        assert!(matches!(parser.parse_str("<xbrl><unit></xbrl>"), Err(Error::Xml(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let parser = Parser::new();
        assert!(matches!(
            parser.parse_file("/definitely/not/here.xml"),
            Err(Error::Io(_))
        ));
    }
}
