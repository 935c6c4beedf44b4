// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <record.rs>

//! Decoded telemetry records.
//!
//! A [`Record`] is built fresh from one line or one broker message, handed
//! to the dispatcher and dropped. Both decoders produce the same type.

use bytes::Bytes;
use serde_json::{Map, Value};

/// One decoded telemetry record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Debug(DebugMessage),
    Status(StatusMessage),
    Settings(RadioSettings),
    Frame(DataFrame),
    LogEntry(LogEntry),
}

impl Record {
    /// Short name used in logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Debug(_) => "debug",
            Record::Status(_) => "status",
            Record::Settings(_) => "settings",
            Record::Frame(_) => "frame",
            Record::LogEntry(_) => "log entry",
        }
    }
}

/// Diagnostic text printed by the firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugMessage {
    /// Message text without its trailing line terminator.
    pub text: String,
    /// Exact bytes as decoded from transit encoding.
    pub raw: Bytes,
    /// Device clock (seconds) when the firmware attached one.
    pub timestamp: Option<i64>,
}

impl DebugMessage {
    pub fn from_bytes(raw: impl Into<Bytes>, timestamp: Option<i64>) -> Self {
        let raw = raw.into();
        let text = String::from_utf8_lossy(&raw)
            .trim_end_matches(['\r', '\n'])
            .to_owned();
        Self {
            text,
            raw,
            timestamp,
        }
    }
}

/// A named status and its value. The firmware's own status report carries
/// `Tx Frame Queue Full` instead of a value; `value` is then empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub status: String,
    pub value: String,
    pub tx_queue_full: Option<bool>,
}

/// Current radio configuration as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioSettings {
    pub frequency: u32,
    pub spreading_factor: u8,
    pub bandwidth: u32,
    pub coding_rate: u8,
    pub mode: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    pub packet_type: u8,
    pub stream_id: u8,
    pub ttl: u8,
    pub sender: u8,
    pub preamble_offset: u8,
    pub num_symbol_offset: u8,
    pub symbol_offset: u8,
}

/// A mesh data frame seen by the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub header: FrameHeader,
    pub header_crc: u32,
    pub data_crc: u32,
    pub payload: Bytes,
}

/// One line of the device's flash log, replayed after `Read Log`. The
/// fields are whatever the firmware logged, minus the `Type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogEntry {
    pub fields: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_text_drops_line_terminator() {
        let msg = DebugMessage::from_bytes(&b"radio up\r\n"[..], None);
        assert_eq!(msg.text, "radio up");
        assert_eq!(&msg.raw[..], b"radio up\r\n");
    }

    #[test]
    fn debug_text_replaces_invalid_utf8() {
        let msg = DebugMessage::from_bytes(vec![b'o', b'k', 0xff], Some(12));
        assert_eq!(msg.text, "ok\u{fffd}");
        assert_eq!(msg.timestamp, Some(12));
    }

    #[test]
    fn kind_names() {
        let status = Record::Status(StatusMessage {
            status: "LINK".into(),
            value: "UP".into(),
            tx_queue_full: None,
        });
        assert_eq!(status.kind(), "status");
    }
}
