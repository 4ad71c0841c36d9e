// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the store, the plugin contract, and the dispatcher.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use strum::{Display, EnumString};

use crate::error::PostblendError;

/// Unique identifier of a plugin (also the prefix of its data table).
pub type PluginId = String;

/// Identifier of a platform account (the `id` column of the plugin's table).
pub type AccountId = i64;

/// Autoincrement row identifier of a dynamic table.
pub type RowId = i64;

/// Accounts requested per plugin for one publish call.
pub type Targets = BTreeMap<PluginId, BTreeSet<AccountId>>;

/// Per-account outcome of one plugin's publish.
pub type AccountResults = BTreeMap<AccountId, PostResult>;

/// Aggregated outcome of a dispatch, keyed by plugin id then account id.
pub type PublishResults = BTreeMap<PluginId, AccountResults>;

// --- Plugin metadata ---

/// Plugin version in `major.minor.micro` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PluginVersion {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
}

impl PluginVersion {
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
        }
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

impl From<semver::Version> for PluginVersion {
    fn from(v: semver::Version) -> Self {
        Self::new(v.major, v.minor, v.patch)
    }
}

impl FromStr for PluginVersion {
    type Err = PostblendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        semver::Version::parse(s.trim())
            .map(Self::from)
            .map_err(|e| PostblendError::Config(format!("invalid plugin version `{s}`: {e}")))
    }
}

/// What a plugin is able to do once loaded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum Capability {
    /// Implements the platform contract and is eligible for dispatch.
    Platform,
    /// Loaded and initialized, but never dispatched to.
    Generic,
}

/// Immutable metadata describing a loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub id: PluginId,
    pub name: String,
    pub description: String,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub plugin_url: Option<String>,
    pub version: PluginVersion,
    pub release_date: Option<NaiveDate>,
    pub capability: Capability,
}

impl PluginDescriptor {
    /// Minimal descriptor with only the identifying fields set.
    pub fn new(id: impl Into<PluginId>, name: impl Into<String>, capability: Capability) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            author: None,
            author_url: None,
            plugin_url: None,
            version: PluginVersion::new(0, 1, 0),
            release_date: None,
            capability,
        }
    }

    pub fn is_platform(&self) -> bool {
        self.capability == Capability::Platform
    }

    pub fn display_version(&self) -> String {
        self.version.to_string()
    }
}

// --- Dynamic records ---

/// A single column value as stored in a dynamic table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Real(r) => write!(f, "{r}"),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Real(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Blob(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Ordered mapping of column name to value.
///
/// Rows read from the store keep the table's physical column order. Inserting
/// an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, keeping the original position if the key exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style [`Record::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The row's `id` column, if present and integral.
    pub fn id(&self) -> Option<RowId> {
        self.get("id").and_then(FieldValue::as_integer)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// --- Accounts and posts ---

/// Typed view of one row of a platform plugin's account table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformAccount {
    pub id: AccountId,
    pub name: String,
    /// The full row, including `id` and `name`.
    pub details: Record,
}

impl PlatformAccount {
    /// Build an account from a stored row. Returns `None` if the row has no integer id.
    pub fn from_record(record: Record) -> Option<Self> {
        let id = record.id()?;
        let name = record
            .get("name")
            .and_then(FieldValue::as_text)
            .unwrap_or_default()
            .to_string();
        Some(Self {
            id,
            name,
            details: record,
        })
    }
}

/// Content to publish. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub body: String,
}

impl Post {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Outcome category of publishing to one account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum PostResultStatus {
    Success,
    Unavailable,
    NetworkError,
    BadCredentials,
    BadAccount,
}

/// Result of publishing a post to one (plugin, account) target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostResult {
    pub status: PostResultStatus,
    /// Plugin-defined payload (remote post id, error body, ...).
    pub payload: serde_json::Value,
}

impl PostResult {
    pub fn new(status: PostResultStatus, payload: serde_json::Value) -> Self {
        Self { status, payload }
    }

    pub fn success(payload: serde_json::Value) -> Self {
        Self::new(PostResultStatus::Success, payload)
    }

    pub fn bad_account() -> Self {
        Self::new(PostResultStatus::BadAccount, serde_json::Value::Null)
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::new(
            PostResultStatus::Unavailable,
            serde_json::Value::String(reason.into()),
        )
    }

    pub fn is_success(&self) -> bool {
        self.status == PostResultStatus::Success
    }
}

// --- Schema declarations ---

/// SQLite column affinity a plugin may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum FieldType {
    Text,
    Integer,
    Real,
    Blob,
    Numeric,
}

/// Column constraint from the closed grammar accepted in declarations.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldConstraint {
    NotNull,
    Unique,
    Default(FieldValue),
}

/// One column of a plugin's table, as declared by the plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub constraints: Vec<FieldConstraint>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            constraints: Vec::new(),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.constraints.push(FieldConstraint::NotNull);
        self
    }

    pub fn unique(mut self) -> Self {
        self.constraints.push(FieldConstraint::Unique);
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.constraints.push(FieldConstraint::Default(value.into()));
        self
    }

    /// Parse a `(name, type, constraints)` triple of literals.
    ///
    /// The constraint literal may contain `NOT NULL`, `UNIQUE` and
    /// `DEFAULT <literal>` in any order, where the literal is an integer, a
    /// real, `NULL`, or a single-quoted string. Anything else is rejected.
    pub fn parse(
        name: &str,
        type_literal: &str,
        constraint_literal: &str,
    ) -> Result<Self, PostblendError> {
        let field_type = FieldType::from_str(type_literal.trim()).map_err(|_| {
            PostblendError::Schema(format!(
                "column `{name}`: unsupported type `{type_literal}` (expected TEXT, INTEGER, REAL, BLOB or NUMERIC)"
            ))
        })?;

        let tokens = tokenize_constraints(constraint_literal)
            .map_err(|e| PostblendError::Schema(format!("column `{name}`: {e}")))?;
        let mut constraints = Vec::new();
        let mut tokens = tokens.into_iter().peekable();
        while let Some(token) = tokens.next() {
            match token.to_ascii_uppercase().as_str() {
                "NOT" => match tokens.next() {
                    Some(t) if t.eq_ignore_ascii_case("NULL") => {
                        constraints.push(FieldConstraint::NotNull)
                    }
                    _ => {
                        return Err(PostblendError::Schema(format!(
                            "column `{name}`: expected NULL after NOT"
                        )));
                    }
                },
                "UNIQUE" => constraints.push(FieldConstraint::Unique),
                "DEFAULT" => {
                    let literal = tokens.next().ok_or_else(|| {
                        PostblendError::Schema(format!(
                            "column `{name}`: DEFAULT requires a value"
                        ))
                    })?;
                    constraints.push(FieldConstraint::Default(parse_default_literal(
                        name, &literal,
                    )?));
                }
                other => {
                    return Err(PostblendError::Schema(format!(
                        "column `{name}`: unsupported constraint `{other}`"
                    )));
                }
            }
        }

        Ok(Self {
            name: name.to_string(),
            field_type,
            constraints,
        })
    }
}

/// Split a constraint literal on whitespace, keeping single-quoted strings whole.
fn tokenize_constraints(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' {
            chars.next();
            let mut quoted = String::from("'");
            loop {
                match chars.next() {
                    Some('\'') if chars.peek() == Some(&'\'') => {
                        chars.next();
                        quoted.push_str("''");
                    }
                    Some('\'') => {
                        quoted.push('\'');
                        break;
                    }
                    Some(ch) => quoted.push(ch),
                    None => return Err("unterminated string literal".to_string()),
                }
            }
            tokens.push(quoted);
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || ch == '\'' {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            tokens.push(word);
        }
    }
    Ok(tokens)
}

fn parse_default_literal(column: &str, literal: &str) -> Result<FieldValue, PostblendError> {
    if literal.eq_ignore_ascii_case("NULL") {
        return Ok(FieldValue::Null);
    }
    if let Some(inner) = literal
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Ok(FieldValue::Text(inner.replace("''", "'")));
    }
    if let Ok(i) = literal.parse::<i64>() {
        return Ok(FieldValue::Integer(i));
    }
    if let Ok(r) = literal.parse::<f64>()
        && r.is_finite()
    {
        return Ok(FieldValue::Real(r));
    }
    Err(PostblendError::Schema(format!(
        "column `{column}`: unsupported DEFAULT literal `{literal}`"
    )))
}
