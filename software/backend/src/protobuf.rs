// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <protobuf.rs>

//! Binary envelopes delivered by the broker.
//!
//! The message types mirror `proto/qmesh.proto`. Decoding is strict: the
//! broker hands over whole messages, so anything that does not fit the
//! schema is a version mismatch and is reported as a [`DecodeError`].

use bytes::Bytes;
use prost::Message;

use crate::error::DecodeError;
use crate::record::{DataFrame, DebugMessage, FrameHeader, Record, StatusMessage};

pub use schema::{DataMsg, DbgMsg, SerialMsg, StatusMsg, serial_msg};

pub mod schema {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SerialMsg {
        #[prost(enumeration = "serial_msg::Type", tag = "1")]
        pub r#type: i32,
        #[prost(message, optional, tag = "2")]
        pub dbg_msg: ::core::option::Option<DbgMsg>,
        #[prost(message, optional, tag = "3")]
        pub data_msg: ::core::option::Option<DataMsg>,
        #[prost(message, optional, tag = "4")]
        pub status: ::core::option::Option<StatusMsg>,
    }

    pub mod serial_msg {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum Type {
            Unspecified = 0,
            DebugMsg = 1,
            Data = 2,
            Status = 3,
        }

        impl Type {
            pub fn as_str_name(&self) -> &'static str {
                match self {
                    Type::Unspecified => "UNSPECIFIED",
                    Type::DebugMsg => "DEBUG_MSG",
                    Type::Data => "DATA",
                    Type::Status => "STATUS",
                }
            }
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct DbgMsg {
        #[prost(string, tag = "1")]
        pub msg: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StatusMsg {
        #[prost(string, tag = "1")]
        pub status: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub value: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct DataMsg {
        #[prost(uint32, tag = "1")]
        pub r#type: u32,
        #[prost(uint32, tag = "2")]
        pub stream_id: u32,
        #[prost(uint32, tag = "3")]
        pub ttl: u32,
        #[prost(uint32, tag = "4")]
        pub sender: u32,
        #[prost(uint32, tag = "5")]
        pub pre_offset: u32,
        #[prost(uint32, tag = "6")]
        pub nsym_offset: u32,
        #[prost(uint32, tag = "7")]
        pub sym_offset: u32,
        #[prost(uint32, tag = "8")]
        pub hdr_crc: u32,
        #[prost(uint32, tag = "9")]
        pub data_crc: u32,
        #[prost(bytes = "vec", tag = "10")]
        pub payload: ::prost::alloc::vec::Vec<u8>,
    }
}

use serial_msg::Type;

/// Decodes one broker message into a record.
pub fn decode_envelope(buf: &[u8]) -> Result<Record, DecodeError> {
    let msg = SerialMsg::decode(buf)?;
    let kind = Type::try_from(msg.r#type).map_err(|_| DecodeError::UnknownType(msg.r#type))?;
    let name = kind.as_str_name();

    let populated = [
        msg.dbg_msg.is_some(),
        msg.data_msg.is_some(),
        msg.status.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();
    if populated > 1 {
        return Err(DecodeError::AmbiguousPayload(name));
    }

    match kind {
        Type::Unspecified => Err(DecodeError::UnknownType(msg.r#type)),
        Type::DebugMsg => {
            let dbg = msg.dbg_msg.ok_or(DecodeError::MissingPayload(name))?;
            Ok(Record::Debug(DebugMessage::from_bytes(dbg.msg.into_bytes(), None)))
        }
        Type::Status => {
            let status = msg.status.ok_or(DecodeError::MissingPayload(name))?;
            Ok(Record::Status(StatusMessage {
                status: status.status,
                value: status.value,
                tx_queue_full: None,
            }))
        }
        Type::Data => {
            let data = msg.data_msg.ok_or(DecodeError::MissingPayload(name))?;
            data_frame(data).map(Record::Frame)
        }
    }
}

fn small(field: &'static str, value: u32) -> Result<u8, DecodeError> {
    u8::try_from(value).map_err(|_| DecodeError::FieldRange { field, value })
}

fn data_frame(data: DataMsg) -> Result<DataFrame, DecodeError> {
    Ok(DataFrame {
        header: FrameHeader {
            packet_type: small("type", data.r#type)?,
            stream_id: small("stream_id", data.stream_id)?,
            ttl: small("ttl", data.ttl)?,
            sender: small("sender", data.sender)?,
            preamble_offset: small("pre_offset", data.pre_offset)?,
            num_symbol_offset: small("nsym_offset", data.nsym_offset)?,
            symbol_offset: small("sym_offset", data.sym_offset)?,
        },
        header_crc: data.hdr_crc,
        data_crc: data.data_crc,
        payload: Bytes::from(data.payload),
    })
}

/// Builds the envelope for a record, for bridges that publish to the broker.
/// Settings and log entries have no envelope type and yield `None`.
pub fn encode_envelope(record: &Record) -> Option<Vec<u8>> {
    let msg = match record {
        Record::Debug(dbg) => SerialMsg {
            r#type: Type::DebugMsg as i32,
            dbg_msg: Some(DbgMsg {
                msg: String::from_utf8_lossy(&dbg.raw).into_owned(),
            }),
            ..SerialMsg::default()
        },
        Record::Status(status) => SerialMsg {
            r#type: Type::Status as i32,
            status: Some(StatusMsg {
                status: status.status.clone(),
                value: status.value.clone(),
            }),
            ..SerialMsg::default()
        },
        Record::Frame(frame) => {
            let h = &frame.header;
            SerialMsg {
                r#type: Type::Data as i32,
                data_msg: Some(DataMsg {
                    r#type: h.packet_type.into(),
                    stream_id: h.stream_id.into(),
                    ttl: h.ttl.into(),
                    sender: h.sender.into(),
                    pre_offset: h.preamble_offset.into(),
                    nsym_offset: h.num_symbol_offset.into(),
                    sym_offset: h.symbol_offset.into(),
                    hdr_crc: frame.header_crc,
                    data_crc: frame.data_crc,
                    payload: frame.payload.to_vec(),
                }),
                ..SerialMsg::default()
            }
        }
        Record::Settings(_) | Record::LogEntry(_) => return None,
    };
    Some(msg.encode_to_vec())
}
