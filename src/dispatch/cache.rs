use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::model::{PersistedRecord, RecordKey};

/// Cache for current-version reads. As-of reads always bypass it.
pub trait RecordCache: Send + Sync {
    fn get(&self, key: RecordKey) -> Option<PersistedRecord>;
    fn put(&self, record: &PersistedRecord);
    fn invalidate(&self, key: RecordKey);
}

pub struct LruRecordCache {
    inner: Mutex<LruCache<RecordKey, PersistedRecord>>,
}

impl LruRecordCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl RecordCache for LruRecordCache {
    fn get(&self, key: RecordKey) -> Option<PersistedRecord> {
        match self.inner.lock() {
            Ok(mut cache) => cache.get(&key).cloned(),
            Err(_) => None,
        }
    }

    fn put(&self, record: &PersistedRecord) {
        if let Ok(mut cache) = self.inner.lock() {
            let key = record.key();
            // A reader that composed before a concurrent update commits may
            // publish after the updater; never let it roll the entry back.
            if let Some(cached) = cache.peek(&key) {
                if cached.sequence() > record.sequence() {
                    return;
                }
            }
            cache.put(key, record.clone());
        }
    }

    fn invalidate(&self, key: RecordKey) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.pop(&key);
        }
    }
}

/// Disables caching entirely; every read goes to the tables.
pub struct NoCache;

impl RecordCache for NoCache {
    fn get(&self, _key: RecordKey) -> Option<PersistedRecord> {
        None
    }

    fn put(&self, _record: &PersistedRecord) {}

    fn invalidate(&self, _key: RecordKey) {}
}
