// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operations for queued run metadata mutations.
//!
//! Every mutation of a run attribute is represented as an operation. A
//! producer builds a [`PendingOperation`]; the log stamps it with the next
//! sequence number and a timestamp, turning it into an [`Operation`] that is
//! immutable from then on. Ops are designed to be:
//!
//! - Serializable: Can be stored and transmitted
//! - Ordered: Sequence numbers are contiguous within one queue
//! - Opaque: Values are carried as JSON, the queue never interprets them

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Sequence number assigned to an operation when it is appended.
///
/// Zero is never assigned; it denotes "nothing appended" in offsets.
pub type Seq = u64;

/// Path of an attribute within a run, e.g. `metrics/train/loss`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AttributePath(Vec<String>);

impl AttributePath {
    /// Builds a path from segments, rejecting empty paths and empty segments.
    pub fn new<I, S>(segments: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidPath(segments.join("/")));
        }
        Ok(AttributePath(segments))
    }

    /// Returns the path segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl TryFrom<Vec<String>> for AttributePath {
    type Error = Error;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        AttributePath::new(segments)
    }
}

impl From<AttributePath> for Vec<String> {
    fn from(path: AttributePath) -> Self {
        path.0
    }
}

impl FromStr for AttributePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::InvalidPath(String::new()));
        }
        AttributePath::new(s.split('/'))
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// One point appended to a series attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    pub fn now(value: Value, step: Option<f64>) -> Self {
        LogEntry {
            value,
            step,
            timestamp: Utc::now(),
        }
    }
}

/// Discriminant of an [`OpPayload`], used in logs and rejection reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Assign,
    Log,
    Add,
    Remove,
    Delete,
    ConfigChange,
    CopyFile,
    UploadFile,
    ClearSeries,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpKind::Assign => "assign",
            OpKind::Log => "log",
            OpKind::Add => "add",
            OpKind::Remove => "remove",
            OpKind::Delete => "delete",
            OpKind::ConfigChange => "config_change",
            OpKind::CopyFile => "copy_file",
            OpKind::UploadFile => "upload_file",
            OpKind::ClearSeries => "clear_series",
        };
        write!(f, "{name}")
    }
}

/// Payload describing the specific mutation being performed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpPayload {
    /// Overwrite the value of a scalar attribute.
    Assign { value: Value },

    /// Append points to a series attribute.
    Log { values: Vec<LogEntry> },

    /// Add members to a set attribute.
    Add { values: Vec<Value> },

    /// Remove members from a set attribute.
    Remove { values: Vec<Value> },

    /// Delete the attribute entirely.
    Delete,

    /// Change the configuration of an attribute (e.g. series bounds).
    ConfigChange { value: Value },

    /// Copy the value of another attribute.
    CopyFile { source: AttributePath },

    /// Upload a local file as the attribute value.
    UploadFile {
        file_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ext: Option<String>,
    },

    /// Remove all points of a series attribute.
    ClearSeries,
}

impl OpPayload {
    /// Returns the kind of this payload.
    pub fn kind(&self) -> OpKind {
        match self {
            OpPayload::Assign { .. } => OpKind::Assign,
            OpPayload::Log { .. } => OpKind::Log,
            OpPayload::Add { .. } => OpKind::Add,
            OpPayload::Remove { .. } => OpKind::Remove,
            OpPayload::Delete => OpKind::Delete,
            OpPayload::ConfigChange { .. } => OpKind::ConfigChange,
            OpPayload::CopyFile { .. } => OpKind::CopyFile,
            OpPayload::UploadFile { .. } => OpKind::UploadFile,
            OpPayload::ClearSeries => OpKind::ClearSeries,
        }
    }
}

/// A mutation handed to the queue, not yet sequenced.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    pub path: AttributePath,
    pub payload: OpPayload,
}

impl PendingOperation {
    /// Creates a pending operation from a path and payload.
    pub fn new(path: AttributePath, payload: OpPayload) -> Self {
        PendingOperation { path, payload }
    }

    /// Creates an Assign operation.
    pub fn assign(path: AttributePath, value: Value) -> Self {
        Self::new(path, OpPayload::Assign { value })
    }

    /// Creates a Log operation with a single point stamped now.
    pub fn log(path: AttributePath, value: Value, step: Option<f64>) -> Self {
        Self::new(
            path,
            OpPayload::Log {
                values: vec![LogEntry::now(value, step)],
            },
        )
    }

    /// Creates an Add operation.
    pub fn add(path: AttributePath, values: Vec<Value>) -> Self {
        Self::new(path, OpPayload::Add { values })
    }

    /// Creates a Remove operation.
    pub fn remove(path: AttributePath, values: Vec<Value>) -> Self {
        Self::new(path, OpPayload::Remove { values })
    }

    /// Creates a Delete operation.
    pub fn delete(path: AttributePath) -> Self {
        Self::new(path, OpPayload::Delete)
    }

    /// Stamps this operation with its sequence number and production time.
    pub fn into_operation(self, seq: Seq, produced_at: DateTime<Utc>) -> Operation {
        Operation {
            seq,
            path: self.path,
            payload: self.payload,
            produced_at,
        }
    }
}

/// A sequenced, persisted operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    /// Position in the queue; contiguous and strictly increasing.
    pub seq: Seq,
    pub path: AttributePath,
    pub payload: OpPayload,
    pub produced_at: DateTime<Utc>,
}

impl Operation {
    /// Returns the kind of the payload.
    pub fn kind(&self) -> OpKind {
        self.payload.kind()
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
