use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

/// Category of a time-tracking entry, as offered by the row's select control.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryType {
    #[default]
    #[serde(rename = "Betriebliche Tätigkeit")]
    BetrieblicheTaetigkeit,
    #[serde(rename = "Schulung")]
    Schulung,
    #[serde(rename = "Berufschule", alias = "Berufsschule")]
    Berufschule,
}

impl EntryType {
    pub const ALL: [EntryType; 3] = [
        EntryType::BetrieblicheTaetigkeit,
        EntryType::Schulung,
        EntryType::Berufschule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::BetrieblicheTaetigkeit => "Betriebliche Tätigkeit",
            EntryType::Schulung => "Schulung",
            EntryType::Berufschule => "Berufschule",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Backend-assigned identifier of a persisted entry. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the body of a create response: a bare JSON number or string.
    pub fn from_response_body(body: &str) -> Option<Self> {
        match serde_json::from_str::<serde_json::Value>(body.trim()).ok()? {
            serde_json::Value::Number(n) => Some(Self(n.to_string())),
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(Self(s)),
            _ => None,
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(serde_json::Number),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(EntryId(n.to_string())),
            Raw::Text(s) if !s.trim().is_empty() => Ok(EntryId(s)),
            Raw::Text(_) => Err(de::Error::custom("empty entry identifier")),
        }
    }
}

/// Client-side identity of a row, independent of persistence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(Uuid);

impl RowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Immutable snapshot of a row's fields at the moment an event fired.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub identifier: Option<EntryId>,
    pub title: String,
    pub log_date: NaiveDate,
    pub entry_type: EntryType,
    /// `NaN` when the duration input could not be parsed.
    pub duration_hours: f64,
}

impl Entry {
    /// Reject snapshots whose duration cannot be transmitted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.duration_hours.is_nan() {
            return Err(ValidationError::UnparsableDuration);
        }
        if !self.duration_hours.is_finite() {
            return Err(ValidationError::InfiniteDuration);
        }
        if self.duration_hours < 0.0 {
            return Err(ValidationError::NegativeDuration(self.duration_hours));
        }
        Ok(())
    }

    pub fn to_payload(&self) -> Result<EntryPayload, ValidationError> {
        self.validate()?;
        Ok(EntryPayload {
            title: self.title.clone(),
            logdate: self.log_date,
            entry_type: self.entry_type,
            spend_time: self.duration_hours,
        })
    }
}

/// JSON body of `POST /entry` and `PUT /entry/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryPayload {
    pub title: String,
    /// Serialized as `YYYY-MM-DD`.
    pub logdate: NaiveDate,
    pub entry_type: EntryType,
    /// Fractional hours.
    pub spend_time: f64,
}

/// One element of the `GET /entry` listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryRecord {
    pub id: EntryId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub spend_time: f64,
    pub logdate: NaiveDate,
    pub entry_type: EntryType,
}
