// Short-TTL cache for raw API responses, keyed by request path. Keeps a
// poll cycle from hitting the same endpoint twice.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

pub struct SnapshotCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Value)>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() <= self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: &str, value: Value) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (Instant::now(), value));
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}
