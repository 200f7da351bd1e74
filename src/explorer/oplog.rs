//! Processing-operation log kept by a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Applied,
    Rejected,
}

/// Row and column counts of a table snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub columns: usize,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.columns)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub details: String,
    pub status: OperationStatus,
    pub before: Shape,
    pub after: Shape,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationLog {
    entries: Vec<OperationEntry>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        operation: impl Into<String>,
        details: impl Into<String>,
        status: OperationStatus,
        before: Shape,
        after: Shape,
    ) {
        self.entries.push(OperationEntry {
            timestamp: Utc::now(),
            operation: operation.into(),
            details: details.into(),
            status,
            before,
            after,
        });

        // Keep only the most recent entries
        if self.entries.len() > MAX_ENTRIES {
            self.entries.drain(0..self.entries.len() - MAX_ENTRIES);
        }
    }

    pub fn entries(&self) -> &[OperationEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&OperationEntry> {
        self.entries.last()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
