use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::util::{read_json, sha256_hex, write_json_pretty};

/// Storage for responses of expensive external calls.
pub trait ResponseCache {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn put(&self, key: &str, value: &Value) -> Result<()>;
}

/// One pretty-printed JSON file per key under a directory.
pub struct JsonFileCache {
    root: PathBuf,
}

impl JsonFileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl ResponseCache for JsonFileCache {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    fn put(&self, key: &str, value: &Value) -> Result<()> {
        write_json_pretty(&self.entry_path(key), value)
    }
}

/// Stable key for a request: `<namespace>-<sha256 of namespace and payload>`.
pub fn cache_key<T: Serialize>(namespace: &str, payload: &T) -> Result<String> {
    let body = serde_json::to_vec(payload)
        .with_context(|| format!("failed to serialize cache payload for {namespace}"))?;
    let mut input = Vec::with_capacity(namespace.len() + 1 + body.len());
    input.extend_from_slice(namespace.as_bytes());
    input.push(b'|');
    input.extend_from_slice(&body);
    Ok(format!("{namespace}-{}", sha256_hex(&input)))
}

/// Returns the cached value for `key`, calling `compute` only on a miss or
/// when `refresh` is set. Fresh values are written back before returning.
pub fn memoized(
    cache: &dyn ResponseCache,
    key: &str,
    refresh: bool,
    compute: impl FnOnce() -> Result<Value>,
) -> Result<Value> {
    if !refresh {
        if let Some(value) = cache.get(key)? {
            info!(key, "reusing cached response");
            return Ok(value);
        }
    }

    let value = compute()?;
    cache.put(key, &value)?;
    info!(key, "stored fresh response");
    Ok(value)
}
