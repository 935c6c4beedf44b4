// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <json.rs>

//! JSON line format spoken by the radio firmware over serial.
//!
//! Decoding is tolerant: anything that is not a well-formed record of a
//! known `Type` comes back as [`Malformed`] and the caller moves on to the
//! next line. Field names are the firmware's and must not change.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Malformed, MalformedReason};
use crate::record::{
    DataFrame, DebugMessage, FrameHeader, LogEntry, RadioSettings, Record, StatusMessage,
};

pub const TYPE_FIELD: &str = "Type";
pub const TYPE_DEBUG: &str = "Debug Msg";
pub const TYPE_STATUS: &str = "Status";
pub const TYPE_SETTINGS: &str = "Settings";
pub const TYPE_FRAME: &str = "Frame";
pub const TYPE_LOG_ENTRY: &str = "Log Entry";

#[derive(Debug, Serialize, Deserialize)]
struct DebugLine {
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "Timestamp", default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusLine {
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(
        rename = "Tx Frame Queue Full",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    tx_queue_full: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsLine {
    // The firmware's settings dump writes "Frequency", live updates "Freq".
    #[serde(rename = "Freq", alias = "Frequency")]
    freq: u32,
    #[serde(rename = "SF")]
    sf: u8,
    #[serde(rename = "BW")]
    bw: u32,
    #[serde(rename = "CR")]
    cr: u8,
    #[serde(rename = "Mode")]
    mode: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FrameLine {
    #[serde(rename = "HDR Pkt Type")]
    pkt_type: u8,
    #[serde(rename = "HDR Stream ID")]
    stream_id: u8,
    #[serde(rename = "HDR TTL")]
    ttl: u8,
    #[serde(rename = "HDR Sender")]
    sender: u8,
    #[serde(rename = "HDR Pre Offset")]
    pre_offset: u8,
    #[serde(rename = "HDR Num Sym Offset")]
    num_sym_offset: u8,
    #[serde(rename = "HDR Sym Offset")]
    sym_offset: u8,
    #[serde(rename = "Header CRC")]
    header_crc: u32,
    #[serde(rename = "Data CRC")]
    data_crc: u32,
    #[serde(rename = "Data Payload")]
    payload: String,
}

impl From<&DataFrame> for FrameLine {
    fn from(frame: &DataFrame) -> Self {
        let h = &frame.header;
        Self {
            pkt_type: h.packet_type,
            stream_id: h.stream_id,
            ttl: h.ttl,
            sender: h.sender,
            pre_offset: h.preamble_offset,
            num_sym_offset: h.num_symbol_offset,
            sym_offset: h.symbol_offset,
            header_crc: frame.header_crc,
            data_crc: frame.data_crc,
            payload: BASE64.encode(&frame.payload),
        }
    }
}

/// Decodes one line (without its terminator) into a record.
pub fn decode_line(raw: &[u8]) -> Result<Record, Malformed> {
    let reject = |reason| Malformed::new(raw.to_vec(), reason);

    let value: Value =
        serde_json::from_slice(raw).map_err(|e| reject(MalformedReason::NotJson(e.to_string())))?;
    if !value.is_object() {
        return Err(reject(MalformedReason::NotJson("top level is not an object".into())));
    }

    let kind = match value.get(TYPE_FIELD) {
        Some(Value::String(kind)) => kind.clone(),
        Some(other) => return Err(reject(MalformedReason::UnknownType(other.to_string()))),
        None => return Err(reject(MalformedReason::MissingDiscriminant)),
    };

    let decoded = match kind.as_str() {
        TYPE_DEBUG => fields::<DebugLine>(TYPE_DEBUG, value).and_then(debug_record),
        TYPE_STATUS => fields::<StatusLine>(TYPE_STATUS, value).and_then(status_record),
        TYPE_SETTINGS => fields::<SettingsLine>(TYPE_SETTINGS, value).map(|line| {
            Record::Settings(RadioSettings {
                frequency: line.freq,
                spreading_factor: line.sf,
                bandwidth: line.bw,
                coding_rate: line.cr,
                mode: line.mode,
            })
        }),
        TYPE_FRAME => fields::<FrameLine>(TYPE_FRAME, value).and_then(frame_record),
        TYPE_LOG_ENTRY => Ok(log_entry_record(value)),
        _ => Err(MalformedReason::UnknownType(kind.clone())),
    };

    decoded.map_err(reject)
}

fn fields<T: DeserializeOwned>(kind: &'static str, value: Value) -> Result<T, MalformedReason> {
    serde_json::from_value(value).map_err(|e| MalformedReason::InvalidField {
        kind,
        detail: e.to_string(),
    })
}

fn base64_field(field: &'static str, text: &str) -> Result<Vec<u8>, MalformedReason> {
    BASE64
        .decode(text.trim())
        .map_err(|e| MalformedReason::BadEncoding {
            field,
            detail: e.to_string(),
        })
}

fn status_record(line: StatusLine) -> Result<Record, MalformedReason> {
    let invalid = |detail: &str| MalformedReason::InvalidField {
        kind: TYPE_STATUS,
        detail: detail.to_owned(),
    };
    let tx_queue_full = match line.tx_queue_full.as_deref() {
        None => None,
        Some("True") => Some(true),
        Some("False") => Some(false),
        Some(_) => return Err(invalid("`Tx Frame Queue Full` is neither True nor False")),
    };
    let value = match (line.value, tx_queue_full) {
        (Some(value), _) => value,
        (None, Some(_)) => String::new(),
        (None, None) => return Err(invalid("missing field `Value`")),
    };
    Ok(Record::Status(StatusMessage {
        status: line.status,
        value,
        tx_queue_full,
    }))
}

fn log_entry_record(value: Value) -> Record {
    let mut fields = match value {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    fields.remove(TYPE_FIELD);
    Record::LogEntry(LogEntry { fields })
}

fn debug_record(line: DebugLine) -> Result<Record, MalformedReason> {
    let raw = base64_field("Message", &line.message)?;
    Ok(Record::Debug(DebugMessage::from_bytes(raw, line.timestamp)))
}

fn frame_record(line: FrameLine) -> Result<Record, MalformedReason> {
    let payload = base64_field("Data Payload", &line.payload)?;
    Ok(Record::Frame(DataFrame {
        header: FrameHeader {
            packet_type: line.pkt_type,
            stream_id: line.stream_id,
            ttl: line.ttl,
            sender: line.sender,
            preamble_offset: line.pre_offset,
            num_symbol_offset: line.num_sym_offset,
            symbol_offset: line.sym_offset,
        },
        header_crc: line.header_crc,
        data_crc: line.data_crc,
        payload: payload.into(),
    }))
}

/// Encodes a record back into the firmware's line format (no terminator).
pub fn encode_record(record: &Record) -> String {
    let (kind, body) = match record {
        Record::Debug(msg) => (
            TYPE_DEBUG,
            serde_json::to_value(DebugLine {
                message: BASE64.encode(&msg.raw),
                timestamp: msg.timestamp,
            }),
        ),
        Record::Status(status) => (
            TYPE_STATUS,
            serde_json::to_value(StatusLine {
                status: status.status.clone(),
                value: (status.tx_queue_full.is_none() || !status.value.is_empty())
                    .then(|| status.value.clone()),
                tx_queue_full: status
                    .tx_queue_full
                    .map(|full| if full { "True" } else { "False" }.to_owned()),
            }),
        ),
        Record::Settings(s) => (
            TYPE_SETTINGS,
            serde_json::to_value(SettingsLine {
                freq: s.frequency,
                sf: s.spreading_factor,
                bw: s.bandwidth,
                cr: s.coding_rate,
                mode: s.mode.clone(),
            }),
        ),
        Record::Frame(frame) => (TYPE_FRAME, serde_json::to_value(FrameLine::from(frame))),
        Record::LogEntry(entry) => (TYPE_LOG_ENTRY, Ok(Value::Object(entry.fields.clone()))),
    };
    tagged(kind, body.unwrap_or(Value::Null))
}

/// Prepends the `Type` discriminant to a serialized body.
pub(crate) fn tagged(kind: &str, body: Value) -> String {
    let mut object = serde_json::Map::new();
    object.insert(TYPE_FIELD.to_owned(), Value::String(kind.to_owned()));
    if let Value::Object(fields) = body {
        object.extend(fields);
    }
    Value::Object(object).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line() {
        let record = decode_line(br#"{"Type": "Status", "Status": "LINK", "Value": "UP"}"#).unwrap();
        assert_eq!(
            record,
            Record::Status(StatusMessage {
                status: "LINK".into(),
                value: "UP".into(),
                tx_queue_full: None,
            })
        );
    }

    #[test]
    fn debug_line_is_base64_decoded() {
        let line = format!(
            r#"{{"Type": "Debug Msg", "Message": "{}"}}"#,
            BASE64.encode(b"hello\n")
        );
        let Record::Debug(msg) = decode_line(line.as_bytes()).unwrap() else {
            panic!("expected a debug record");
        };
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.timestamp, None);
    }

    #[test]
    fn debug_line_keeps_timestamp() {
        let line = br#"{"Type":"Debug Msg","Timestamp":1700000000,"Message":"b2sNCg=="}"#;
        let Record::Debug(msg) = decode_line(line).unwrap() else {
            panic!("expected a debug record");
        };
        assert_eq!(msg.text, "ok");
        assert_eq!(msg.timestamp, Some(1_700_000_000));
    }

    #[test]
    fn settings_accepts_both_frequency_spellings() {
        let live = br#"{"Type":"Settings","Freq":915000000,"SF":9,"BW":2,"CR":1,"Mode":"Mesh"}"#;
        let dump =
            br#"{"Type":"Settings","Frequency":915000000,"SF":9,"BW":2,"CR":1,"Mode":"Mesh"}"#;
        assert_eq!(decode_line(live).unwrap(), decode_line(dump).unwrap());
    }

    #[test]
    fn frame_line() {
        let line = br#"{"Type":"Frame","HDR Pkt Type":1,"HDR Stream ID":2,"HDR TTL":3,"HDR Sender":4,"HDR Pre Offset":5,"HDR Num Sym Offset":6,"HDR Sym Offset":7,"Header CRC":4660,"Data CRC":22136,"Data Payload":"AAEC"}"#;
        let Record::Frame(frame) = decode_line(line).unwrap() else {
            panic!("expected a frame record");
        };
        assert_eq!(frame.header.packet_type, 1);
        assert_eq!(frame.header.symbol_offset, 7);
        assert_eq!(frame.header_crc, 0x1234);
        assert_eq!(frame.data_crc, 0x5678);
        assert_eq!(&frame.payload[..], &[0, 1, 2]);
    }

    #[test]
    fn garbage_is_malformed_with_original_bytes() {
        let raw = b"\x07\xfe{\"Type\": \"Sta";
        let err = decode_line(raw).unwrap_err();
        assert_eq!(&err.raw[..], raw);
        assert!(matches!(err.reason, MalformedReason::NotJson(_)));
    }

    #[test]
    fn non_object_json_is_malformed() {
        let err = decode_line(b"[1, 2, 3]").unwrap_err();
        assert!(matches!(err.reason, MalformedReason::NotJson(_)));
    }

    #[test]
    fn missing_and_unknown_type() {
        let err = decode_line(br#"{"Status":"LINK"}"#).unwrap_err();
        assert_eq!(err.reason, MalformedReason::MissingDiscriminant);

        let err = decode_line(br#"{"Type":"Read Log"}"#).unwrap_err();
        assert_eq!(err.reason, MalformedReason::UnknownType("Read Log".into()));

        let err = decode_line(br#"{"Type":7}"#).unwrap_err();
        assert_eq!(err.reason, MalformedReason::UnknownType("7".into()));
    }

    #[test]
    fn frame_without_payload_is_malformed() {
        let line = br#"{"Type":"Frame","HDR Pkt Type":1,"HDR Stream ID":2,"HDR TTL":3,"HDR Sender":4,"HDR Pre Offset":5,"HDR Num Sym Offset":6,"HDR Sym Offset":7,"Header CRC":1,"Data CRC":2}"#;
        let err = decode_line(line).unwrap_err();
        match err.reason {
            MalformedReason::InvalidField { kind, detail } => {
                assert_eq!(kind, TYPE_FRAME);
                assert!(detail.contains("Data Payload"), "{detail}");
            }
            other => panic!("unexpected reason {other:?}"),
        }
    }

    #[test]
    fn bad_base64_is_malformed() {
        let err = decode_line(br#"{"Type":"Debug Msg","Message":"%%%"}"#).unwrap_err();
        assert!(matches!(
            err.reason,
            MalformedReason::BadEncoding { field: "Message", .. }
        ));
    }

    #[test]
    fn firmware_status_report_without_value() {
        let line = br#"{"Type":"Status","Status":"RUNNING","Tx Frame Queue Full":"False"}"#;
        let record = decode_line(line).unwrap();
        assert_eq!(
            record,
            Record::Status(StatusMessage {
                status: "RUNNING".into(),
                value: String::new(),
                tx_queue_full: Some(false),
            })
        );
        let again: Value = serde_json::from_str(&encode_record(&record)).unwrap();
        assert_eq!(
            again,
            serde_json::json!({"Type": "Status", "Status": "RUNNING", "Tx Frame Queue Full": "False"})
        );
    }

    #[test]
    fn status_needs_value_or_queue_flag() {
        let err = decode_line(br#"{"Type":"Status","Status":"RUNNING"}"#).unwrap_err();
        assert!(matches!(err.reason, MalformedReason::InvalidField { kind: TYPE_STATUS, .. }));

        let err = decode_line(br#"{"Type":"Status","Status":"RUNNING","Tx Frame Queue Full":"maybe"}"#)
            .unwrap_err();
        assert!(matches!(err.reason, MalformedReason::InvalidField { kind: TYPE_STATUS, .. }));
    }

    #[test]
    fn log_entry_keeps_logged_fields() {
        let line = br#"{"Type":"Log Entry","Timestamp":1234,"RSSI":-80,"SNR":7}"#;
        let Record::LogEntry(entry) = decode_line(line).unwrap() else {
            panic!("expected a log entry");
        };
        assert!(!entry.fields.contains_key("Type"));
        assert_eq!(entry.fields["RSSI"], -80);
        assert_eq!(
            decode_line(encode_record(&Record::LogEntry(entry.clone())).as_bytes()).unwrap(),
            Record::LogEntry(entry)
        );
    }

    #[test]
    fn encoded_payloads_round_trip() {
        let payload: Vec<u8> = (0..=255).collect();
        let frame = Record::Frame(DataFrame {
            header: FrameHeader {
                packet_type: 2,
                ttl: 5,
                ..FrameHeader::default()
            },
            header_crc: 0xbeef,
            data_crc: 0xcafe,
            payload: payload.clone().into(),
        });
        let debug = Record::Debug(DebugMessage::from_bytes(&b"boot ok\r\n"[..], Some(3)));

        for record in [frame, debug] {
            let line = encode_record(&record);
            assert_eq!(decode_line(line.as_bytes()).unwrap(), record);
        }
    }

    #[test]
    fn encoded_line_starts_with_type() {
        let line = encode_record(&Record::Status(StatusMessage {
            status: "RUNNING".into(),
            value: "True".into(),
            tx_queue_full: None,
        }));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["Type"], "Status");
        assert_eq!(value["Value"], "True");
    }
}
