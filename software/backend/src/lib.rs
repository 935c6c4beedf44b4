// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <lib.rs>

//! Telemetry bridge for QMesh radios.
//!
//! Raw records come from a [`reader::FrameReader`] (serial JSON lines or
//! broker protobuf messages), are decoded into [`record::Record`]s by
//! [`json`] or [`protobuf`], routed by a [`dispatch::Dispatcher`] and end up
//! in a [`sink::Sink`].

pub mod command;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod json;
pub mod logging;
pub mod pipeline;
pub mod protobuf;
pub mod reader;
pub mod record;
pub mod settings;
pub mod sink;
pub mod tcp_server;

pub use dispatch::{DispatchStats, Dispatcher, RecordHandler};
pub use error::{ConnectionError, DecodeError, Malformed, MalformedReason, PipelineError};
pub use reader::{FrameReader, QueueConfig, SerialConfig, connect_queue, open_serial};
pub use record::{
    DataFrame, DebugMessage, FrameHeader, LogEntry, RadioSettings, Record, StatusMessage,
};
