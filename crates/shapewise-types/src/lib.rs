//! # shapewise-types: Core types for `Shapewise`
//!
//! This crate contains the shared data model of the query-settings store:
//! - Version stamps ([`Version`]) and logical time ([`ClusterTime`])
//! - Query addressing ([`Namespace`], [`ShapeKey`], [`RepresentativeQuery`])
//! - The opaque settings payload ([`QuerySettings`])
//! - Entries ([`QueryShapeConfiguration`]) and the cluster-wide
//!   [`ConfigurationDocument`] that holds them

use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// ============================================================================
// Version & Cluster Time - Copy (8-byte values)
// ============================================================================

/// Version stamp of the configuration document.
///
/// Strictly increases by exactly one on every accepted compare-and-swap.
/// A freshly created document starts at [`Version::ZERO`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub const ZERO: Version = Version(0);

    pub fn new(version: u64) -> Self {
        Self(version)
    }

    /// Returns the version that a successful swap from `self` produces.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// Logical timestamp attached to every accepted swap.
///
/// Values come from an injected clock and are only compared with each
/// other; they carry no wall-clock meaning inside the store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ClusterTime(u64);

impl ClusterTime {
    pub const ZERO: ClusterTime = ClusterTime(0);

    pub fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the smallest time strictly after `self`.
    pub fn successor(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Display for ClusterTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClusterTime {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ClusterTime> for u64 {
    fn from(time: ClusterTime) -> Self {
        time.0
    }
}

// ============================================================================
// Namespace
// ============================================================================

/// Databases whose collections never accept query settings.
pub const INTERNAL_DATABASES: [&str; 3] = ["admin", "config", "local"];

/// A `{db, coll}` pair naming the collection a query runs against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub db: String,
    pub coll: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }

    /// Returns true if the namespace lives in a database reserved for the server.
    pub fn is_internal(&self) -> bool {
        INTERNAL_DATABASES.contains(&self.db.as_str())
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

impl FromStr for Namespace {
    type Err = ParseNamespaceError;

    /// Parses `"db.coll"`. The collection part may itself contain dots.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Self::new(db, coll)),
            _ => Err(ParseNamespaceError(s.to_string())),
        }
    }
}

/// Returned when a string is not of the form `db.coll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNamespaceError(String);

impl Display for ParseNamespaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid namespace '{}': expected 'db.coll'", self.0)
    }
}

impl std::error::Error for ParseNamespaceError {}

// ============================================================================
// Shape Key - Copy (fixed 32-byte digest)
// ============================================================================

/// Length of a shape key digest in bytes.
pub const SHAPE_KEY_LENGTH: usize = 32;

/// Normalized identity of a query's structural shape within a namespace.
///
/// Two queries that differ only in literal values map to the same key.
/// Derivation lives in `shapewise-shape`; this type only stores the digest.
/// Rendered and serialized as an upper-case hex string, the "query shape hash".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeKey([u8; SHAPE_KEY_LENGTH]);

impl ShapeKey {
    pub fn from_bytes(bytes: [u8; SHAPE_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHAPE_KEY_LENGTH] {
        &self.0
    }

    /// Returns the 64-character upper-case hex form.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl Debug for ShapeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 8 bytes are enough to tell keys apart in logs
        write!(f, "ShapeKey(")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02X}")?;
        }
        write!(f, "...)")
    }
}

impl Display for ShapeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl FromStr for ShapeKey {
    type Err = ParseShapeKeyError;

    /// Parses a 64-character hex string (either case).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Digits first: from_str_radix alone would accept a leading '+'
        if let Some(bad) = s.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ParseShapeKeyError::InvalidDigit(bad));
        }
        if s.len() != SHAPE_KEY_LENGTH * 2 {
            return Err(ParseShapeKeyError::Length(s.len()));
        }

        let mut bytes = [0u8; SHAPE_KEY_LENGTH];
        for (byte, pair) in bytes.iter_mut().zip(s.as_bytes().chunks_exact(2)) {
            *byte = (hex_value(pair[0]) << 4) | hex_value(pair[1]);
        }
        Ok(Self(bytes))
    }
}

/// Value of one ASCII hex digit, already checked by the caller.
fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

impl Serialize for ShapeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ShapeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(serde::de::Error::custom)
    }
}

/// Returned when a string is not a valid shape hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseShapeKeyError {
    /// Input was not 64 hex characters long.
    Length(usize),
    /// Input contained a character that is not an ASCII hex digit.
    InvalidDigit(char),
}

impl Display for ParseShapeKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Length(len) => write!(
                f,
                "shape hash must be {} hex characters, got {len}",
                SHAPE_KEY_LENGTH * 2
            ),
            Self::InvalidDigit(c) => write!(f, "invalid hex digit {c:?} in shape hash"),
        }
    }
}

impl std::error::Error for ParseShapeKeyError {}

// ============================================================================
// Query Settings - opaque payload
// ============================================================================

/// Caller-defined settings attached to a query shape (index hints, etc.).
///
/// The store never interprets the contents beyond storing and returning
/// them, so settings schemas can evolve without touching the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuerySettings(Value);

impl QuerySettings {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for QuerySettings {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

// ============================================================================
// Representative Query
// ============================================================================

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// An example query whose shape the settings are attached to.
///
/// Literal values are irrelevant for addressing; only the structure and
/// namespace determine the [`ShapeKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum RepresentativeQuery {
    /// A `find` with optional sort and projection.
    Find {
        namespace: Namespace,
        #[serde(default = "empty_object")]
        filter: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sort: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        projection: Option<Value>,
    },
    /// An `aggregate` pipeline.
    Aggregate {
        namespace: Namespace,
        pipeline: Vec<Value>,
    },
    /// A `distinct` over one field path.
    Distinct {
        namespace: Namespace,
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<Value>,
    },
}

impl RepresentativeQuery {
    /// Creates a `find` query with the given filter and no sort or projection.
    pub fn find(namespace: Namespace, filter: Value) -> Self {
        Self::Find {
            namespace,
            filter,
            sort: None,
            projection: None,
        }
    }

    pub fn aggregate(namespace: Namespace, pipeline: Vec<Value>) -> Self {
        Self::Aggregate {
            namespace,
            pipeline,
        }
    }

    pub fn distinct(namespace: Namespace, key: impl Into<String>, query: Option<Value>) -> Self {
        Self::Distinct {
            namespace,
            key: key.into(),
            query,
        }
    }

    /// Sets the sort spec of a `find`. Other commands are returned unchanged.
    pub fn with_sort(mut self, spec: Value) -> Self {
        if let Self::Find { sort, .. } = &mut self {
            *sort = Some(spec);
        }
        self
    }

    /// Sets the projection of a `find`. Other commands are returned unchanged.
    pub fn with_projection(mut self, spec: Value) -> Self {
        if let Self::Find { projection, .. } = &mut self {
            *projection = Some(spec);
        }
        self
    }

    pub fn namespace(&self) -> &Namespace {
        match self {
            Self::Find { namespace, .. }
            | Self::Aggregate { namespace, .. }
            | Self::Distinct { namespace, .. } => namespace,
        }
    }

    /// Returns the command name (`find`, `aggregate` or `distinct`).
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::Find { .. } => "find",
            Self::Aggregate { .. } => "aggregate",
            Self::Distinct { .. } => "distinct",
        }
    }
}

// ============================================================================
// Entries & Configuration Document
// ============================================================================

/// One "query shape → settings" entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryShapeConfiguration {
    pub shape_key: ShapeKey,
    pub namespace: Namespace,
    pub settings: QuerySettings,
    /// Query the entry was last set through, kept for listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representative_query: Option<RepresentativeQuery>,
}

impl QueryShapeConfiguration {
    pub fn new(shape_key: ShapeKey, namespace: Namespace, settings: QuerySettings) -> Self {
        Self {
            shape_key,
            namespace,
            settings,
            representative_query: None,
        }
    }

    pub fn with_representative_query(mut self, query: RepresentativeQuery) -> Self {
        self.representative_query = Some(query);
        self
    }
}

/// The single cluster-wide document of query shape configurations.
///
/// Entries keep insertion order for readers; order carries no meaning.
/// At most one entry exists per [`ShapeKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationDocument {
    pub entries: Vec<QueryShapeConfiguration>,
    pub version: Version,
    pub cluster_time: ClusterTime,
}

impl ConfigurationDocument {
    /// Creates the empty document at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for a shape key, if present.
    pub fn get(&self, key: &ShapeKey) -> Option<&QueryShapeConfiguration> {
        self.entries.iter().find(|entry| entry.shape_key == *key)
    }

    pub fn contains(&self, key: &ShapeKey) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if no shape key appears twice.
    pub fn has_unique_keys(&self) -> bool {
        let mut keys: Vec<&ShapeKey> = self.entries.iter().map(|e| &e.shape_key).collect();
        keys.sort_unstable();
        keys.windows(2).all(|pair| pair[0] != pair[1])
    }
}
