//! The UI-side editable representation of one entry.
use chrono::{Local, NaiveDate};

use crate::error::StateError;
use crate::model::{Entry, EntryId, EntryRecord, EntryType, RowId};

/// A single user edit to one of the row's controls.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Title(String),
    Date(NaiveDate),
    Category(EntryType),
    /// Raw text from the duration input; parsed when a snapshot is taken.
    Duration(String),
}

/// Current field values of one list item plus its backend identifier.
#[derive(Debug, Clone)]
pub struct EntryRow {
    id: RowId,
    title: String,
    log_date: NaiveDate,
    entry_type: EntryType,
    duration_input: String,
    identifier: Option<EntryId>,
    attached: bool,
}

impl EntryRow {
    /// A freshly added list item: empty title, today's date, first category,
    /// zero hours.
    pub fn new() -> Self {
        Self::dated(Local::now().date_naive())
    }

    pub fn dated(log_date: NaiveDate) -> Self {
        Self {
            id: RowId::new(),
            title: String::new(),
            log_date,
            entry_type: EntryType::default(),
            duration_input: "0".to_string(),
            identifier: None,
            attached: true,
        }
    }

    /// Rebuild a row for an entry the backend already holds. The duration is
    /// taken verbatim, so an out-of-range value keeps failing validation
    /// until the user replaces it.
    pub fn from_record(record: &EntryRecord) -> Self {
        Self {
            id: RowId::new(),
            title: record.title.clone(),
            log_date: record.logdate,
            entry_type: record.entry_type,
            duration_input: record.spend_time.to_string(),
            identifier: Some(record.id.clone()),
            attached: true,
        }
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn apply(&mut self, edit: FieldEdit) {
        match edit {
            FieldEdit::Title(title) => self.title = title,
            FieldEdit::Date(date) => self.log_date = date,
            FieldEdit::Category(entry_type) => self.entry_type = entry_type,
            FieldEdit::Duration(raw) => self.duration_input = raw,
        }
    }

    /// Snapshot of the current field values. An unparsable duration becomes
    /// `NaN` instead of failing here.
    pub fn field_values(&self) -> Entry {
        Entry {
            identifier: self.identifier.clone(),
            title: self.title.clone(),
            log_date: self.log_date,
            entry_type: self.entry_type,
            duration_hours: parse_hours(&self.duration_input),
        }
    }

    pub fn identifier(&self) -> Option<&EntryId> {
        self.identifier.as_ref()
    }

    pub fn has_identifier(&self) -> bool {
        self.identifier.is_some()
    }

    /// Write the backend identifier. Succeeds at most once per row.
    pub fn assign_identifier(&mut self, id: EntryId) -> Result<(), StateError> {
        if let Some(existing) = &self.identifier {
            return Err(StateError::IdentifierAlreadyAssigned {
                row: self.id,
                existing: existing.clone(),
            });
        }
        self.identifier = Some(id);
        Ok(())
    }

    /// Detach from the visible list. Never touches the backend.
    pub fn remove(&mut self) {
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl Default for EntryRow {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_hours(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}
