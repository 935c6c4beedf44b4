// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <error.rs>

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// Failure to open or keep using a transport. Fatal to the read loop.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("cannot open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("cannot connect to broker at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A binary envelope that does not match the schema. On the queue path this
/// means a protocol mismatch, so it is never swallowed.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("protobuf decode failed: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("unknown envelope type {0}")]
    UnknownType(i32),

    #[error("envelope of type {0} carries no matching payload")]
    MissingPayload(&'static str),

    #[error("envelope of type {0} carries more than one payload")]
    AmbiguousPayload(&'static str),

    #[error("field {field} out of range: {value}")]
    FieldRange { field: &'static str, value: u32 },
}

/// Why a text line could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("not a JSON object: {0}")]
    NotJson(String),

    #[error("no \"Type\" field")]
    MissingDiscriminant,

    #[error("unknown record type {0:?}")]
    UnknownType(String),

    #[error("invalid {kind} record: {detail}")]
    InvalidField { kind: &'static str, detail: String },

    #[error("field {field:?} is not valid base64: {detail}")]
    BadEncoding { field: &'static str, detail: String },
}

/// A text record that was rejected. Keeps the original bytes so the caller
/// can show the operator exactly what came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed {
    pub raw: Bytes,
    pub reason: MalformedReason,
}

impl Malformed {
    pub fn new(raw: impl Into<Bytes>, reason: MalformedReason) -> Self {
        Self {
            raw: raw.into(),
            reason,
        }
    }

    /// The raw line as text, with invalid UTF-8 replaced.
    pub fn raw_lossy(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.reason, self.raw.len())
    }
}

impl std::error::Error for Malformed {}

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
