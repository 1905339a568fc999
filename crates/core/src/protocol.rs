// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages between a queue and a metadata server.
//!
//! The protocol is simple:
//! - Client sends a batch of operations for one run
//! - Server answers with the highest sequence it accepted, listing any
//!   operations it refused, or with an error

use serde::{Deserialize, Serialize};

use crate::op::{Operation, Seq};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A contiguous batch of operations.
    Batch {
        /// Run the operations belong to.
        run_id: String,
        ops: Vec<Operation>,
    },
}

/// An operation the server refused permanently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rejection {
    pub seq: Seq,
    pub reason: String,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Everything up to and including `highest_accepted` was processed.
    ///
    /// Operations listed in `rejections` were processed by being refused.
    Ack {
        highest_accepted: Seq,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        rejections: Vec<Rejection>,
    },

    /// The whole batch failed.
    Error {
        /// When false the client should retry later.
        permanent: bool,
        message: String,
    },
}

impl ClientMessage {
    /// Creates a Batch message.
    pub fn batch(run_id: impl Into<String>, ops: Vec<Operation>) -> Self {
        ClientMessage::Batch {
            run_id: run_id.into(),
            ops,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses a message from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl ServerMessage {
    /// Creates an Ack message without rejections.
    pub fn ack(highest_accepted: Seq) -> Self {
        ServerMessage::Ack {
            highest_accepted,
            rejections: Vec::new(),
        }
    }

    /// Creates a permanent or transient error message.
    pub fn error(permanent: bool, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            permanent,
            message: message.into(),
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses a message from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
