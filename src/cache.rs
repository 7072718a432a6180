use crate::linkbase::LinkbaseDocument;
use crate::schema::Schema;
use crate::Result;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Process-wide memo of loaded schemas and linkbases, keyed by resolved
/// location. Failed loads are stored as `None` and never retried.
#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: Mutex<AHashMap<String, Option<Arc<Schema>>>>,
    linkbases: Mutex<AHashMap<String, Option<Arc<LinkbaseDocument>>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached schema for `location`, running `load` on a miss.
    /// The lock is not held while loading, so `load` may recurse into the
    /// cache for included documents.
    pub fn schema<F>(&self, location: &str, load: F) -> Option<Arc<Schema>>
    where
        F: FnOnce() -> Result<Schema>,
    {
        get_or_load(&self.schemas, location, load)
    }

    pub fn linkbase<F>(&self, location: &str, load: F) -> Option<Arc<LinkbaseDocument>>
    where
        F: FnOnce() -> Result<LinkbaseDocument>,
    {
        get_or_load(&self.linkbases, location, load)
    }

    pub fn contains_schema(&self, location: &str) -> bool {
        self.schemas.lock().contains_key(location)
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.lock().values().filter(|s| s.is_some()).count()
    }

    pub fn clear(&self) {
        self.schemas.lock().clear();
        self.linkbases.lock().clear();
    }
}

fn get_or_load<T, F>(
    map: &Mutex<AHashMap<String, Option<Arc<T>>>>,
    location: &str,
    load: F,
) -> Option<Arc<T>>
where
    F: FnOnce() -> Result<T>,
{
    if let Some(cached) = map.lock().get(location) {
        return cached.clone();
    }
    let loaded = load().ok().map(Arc::new);
    // First writer wins when two fragments load the same location at once
    map.lock()
        .entry(location.to_string())
        .or_insert(loaded)
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::cell::Cell;

    #[test]
    fn memoizes_failures() {
        let cache = SchemaCache::new();
        let calls = Cell::new(0);
        let fail = || {
            calls.set(calls.get() + 1);
            Err(Error::NotFound("a.xsd".to_string()))
        };

        assert!(cache.schema("a.xsd", fail).is_none());
        assert!(cache.schema("a.xsd", fail).is_none());
        assert_eq!(calls.get(), 1);
        assert!(cache.contains_schema("a.xsd"));
        assert_eq!(cache.schema_count(), 0);
    }

    #[test]
    fn returns_shared_instances() {
        let cache = SchemaCache::new();
        let first = cache.schema("b.xsd", || Ok(Schema::default())).unwrap();
        let second = cache
            .schema("b.xsd", || Err(Error::NotFound("b.xsd".to_string())))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
