//! Persisted discovery results.
//!
//! File: cache.json, a JSON object mapping a cache key to
//! `{ connections, deep_connections, timestamp }`.
//!
//! Scores and distances are stored as bare numbers and timestamps as RFC 3339
//! strings. Loading treats the file as plain data: every entry is hydrated back
//! into value objects through their `from_value` constructors, and an entry that
//! fails hydration is dropped as a cache miss.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        Connection, ConnectionType, DeepConnection, DomainDistance, NoteDomain, SerendipityScore,
    },
    note_id::NoteId,
    storage::StorageManager,
};

const CACHE_FILE: &str = "cache.json";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot hydrate cached entry: {0}")]
    Hydration(String),
}

/// Plain-data form of a [`Connection`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedConnection {
    pub source: NoteDomain,
    pub target: NoteDomain,
    pub score: f64,
    pub domain_distance: f64,
    pub similarity: f64,
    pub connection_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub discovered_at: String,
}

/// Plain-data form of a [`DeepConnection`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedDeepConnection {
    pub source: NoteDomain,
    pub target: NoteDomain,
    pub quality_score: f64,
    pub explanation: String,
    pub domain_distance: f64,
    pub discovered_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntry {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    connections: Vec<PersistedConnection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    deep_connections: Vec<PersistedDeepConnection>,
    timestamp: String,
}

impl From<&Connection> for PersistedConnection {
    fn from(c: &Connection) -> Self {
        Self {
            source: c.source.clone(),
            target: c.target.clone(),
            score: c.score.value(),
            domain_distance: c.domain_distance.value(),
            similarity: c.similarity,
            connection_type: c.connection_type.label().to_string(),
            explanation: c.explanation().map(|e| e.to_string()),
            discovered_at: c.discovered_at.to_rfc3339(),
        }
    }
}

impl From<&DeepConnection> for PersistedDeepConnection {
    fn from(c: &DeepConnection) -> Self {
        Self {
            source: c.source.clone(),
            target: c.target.clone(),
            quality_score: c.quality_score,
            explanation: c.explanation.clone(),
            domain_distance: c.domain_distance.value(),
            discovered_at: c.discovered_at.to_rfc3339(),
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CacheError::Hydration(format!("bad timestamp '{raw}': {e}")))
}

fn check_pair(source: &NoteDomain, target: &NoteDomain) -> Result<(), CacheError> {
    if source.id.is_empty() || target.id.is_empty() {
        return Err(CacheError::Hydration("empty note id".to_string()));
    }
    if source.id == target.id {
        return Err(CacheError::Hydration(format!(
            "connection from {} to itself",
            source.id
        )));
    }
    Ok(())
}

fn check_number(name: &str, value: f64) -> Result<f64, CacheError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CacheError::Hydration(format!("{name} is not a finite number")))
    }
}

impl PersistedConnection {
    pub fn hydrate(self) -> Result<Connection, CacheError> {
        check_pair(&self.source, &self.target)?;

        let connection_type: ConnectionType = self
            .connection_type
            .parse()
            .map_err(CacheError::Hydration)?;

        let mut connection = Connection::new(
            self.source,
            self.target,
            SerendipityScore::from_value(check_number("score", self.score)?),
            DomainDistance::from_value(check_number("domain_distance", self.domain_distance)?),
            check_number("similarity", self.similarity)?,
            connection_type,
            parse_timestamp(&self.discovered_at)?,
        );

        if let Some(explanation) = self.explanation {
            connection.attach_explanation(explanation);
        }

        Ok(connection)
    }
}

impl PersistedDeepConnection {
    pub fn hydrate(self) -> Result<DeepConnection, CacheError> {
        check_pair(&self.source, &self.target)?;

        Ok(DeepConnection {
            source: self.source,
            target: self.target,
            quality_score: check_number("quality_score", self.quality_score)?.clamp(0.0, 1.0),
            explanation: self.explanation,
            domain_distance: DomainDistance::from_value(check_number(
                "domain_distance",
                self.domain_distance,
            )?),
            discovered_at: parse_timestamp(&self.discovered_at)?,
        })
    }
}

/// Cache of discovery results keyed by request.
pub struct ConnectionCache {
    store: Arc<dyn StorageManager>,
    /// `None` = entries never expire
    ttl: Option<Duration>,
}

impl ConnectionCache {
    pub fn new(store: Arc<dyn StorageManager>, ttl_minutes: u64) -> Self {
        let ttl = (ttl_minutes > 0).then(|| Duration::minutes(ttl_minutes as i64));
        Self { store, ttl }
    }

    pub fn discover_key(id: &NoteId) -> String {
        format!("discover:{id}")
    }

    pub fn top_key(limit: usize) -> String {
        format!("top:{limit}")
    }

    pub fn deep_key() -> String {
        "deep".to_string()
    }

    /// Raw entries. A missing or unreadable file is an empty cache.
    fn load_raw(&self) -> BTreeMap<String, serde_json::Value> {
        if !self.store.exists(CACHE_FILE) {
            return BTreeMap::new();
        }

        let parsed = self
            .store
            .read(CACHE_FILE)
            .map_err(CacheError::from)
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(CacheError::from));

        match parsed {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("ignoring unreadable cache file: {e}");
                BTreeMap::new()
            }
        }
    }

    fn save_raw(&self, entries: &BTreeMap<String, serde_json::Value>) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        self.store.write(CACHE_FILE, &bytes)?;
        Ok(())
    }

    /// A fresh, well-formed entry for `key`.
    fn entry(&self, key: &str) -> Option<PersistedEntry> {
        let raw = self.load_raw().remove(key)?;

        let entry: PersistedEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("cache key={key} outcome=miss reason=malformed err={e}");
                return None;
            }
        };

        let cached_at = match parse_timestamp(&entry.timestamp) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("cache key={key} outcome=miss err={e}");
                return None;
            }
        };

        if let Some(ttl) = self.ttl {
            if Utc::now() - cached_at > ttl {
                log::debug!("cache key={key} outcome=miss reason=expired");
                return None;
            }
        }

        Some(entry)
    }

    pub fn get_connections(&self, key: &str) -> Option<Vec<Connection>> {
        let entry = self.entry(key)?;

        match entry
            .connections
            .into_iter()
            .map(PersistedConnection::hydrate)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(connections) => {
                log::debug!("cache key={key} outcome=hit connections={}", connections.len());
                Some(connections)
            }
            Err(e) => {
                log::warn!("cache key={key} outcome=miss err={e}");
                None
            }
        }
    }

    pub fn get_deep_connections(&self, key: &str) -> Option<Vec<DeepConnection>> {
        let entry = self.entry(key)?;

        match entry
            .deep_connections
            .into_iter()
            .map(PersistedDeepConnection::hydrate)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(connections) => Some(connections),
            Err(e) => {
                log::warn!("cache key={key} outcome=miss err={e}");
                None
            }
        }
    }

    pub fn put_connections(&self, key: &str, connections: &[Connection]) -> Result<(), CacheError> {
        self.put(
            key,
            PersistedEntry {
                connections: connections.iter().map(PersistedConnection::from).collect(),
                deep_connections: vec![],
                timestamp: Utc::now().to_rfc3339(),
            },
        )
    }

    pub fn put_deep_connections(
        &self,
        key: &str,
        connections: &[DeepConnection],
    ) -> Result<(), CacheError> {
        self.put(
            key,
            PersistedEntry {
                connections: vec![],
                deep_connections: connections.iter().map(PersistedDeepConnection::from).collect(),
                timestamp: Utc::now().to_rfc3339(),
            },
        )
    }

    fn put(&self, key: &str, entry: PersistedEntry) -> Result<(), CacheError> {
        let mut entries = self.load_raw();
        entries.insert(key.to_string(), serde_json::to_value(entry)?);
        self.save_raw(&entries)
    }

    /// Remove every cached entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let count = self.load_raw().len();
        if self.store.exists(CACHE_FILE) {
            self.store.delete(CACHE_FILE)?;
        }
        Ok(count)
    }
}
