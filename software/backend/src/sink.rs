// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <sink.rs>

//! Downstream consumers of decoded records.

use std::io::Write;

use crate::dispatch::RecordHandler;
use crate::error::Malformed;
use crate::json::encode_record;
use crate::record::{Record, StatusMessage};

const RED: &str = "\x1b[1;31;40m";
const GREEN: &str = "\x1b[1;32;40m";
const RESET: &str = "\x1b[1;37;40m";

/// Something that shows or forwards records. Never decodes.
pub trait Sink {
    fn emit(&mut self, record: &Record);

    fn emit_malformed(&mut self, _malformed: &Malformed) {}
}

/// Human-readable rendering, one line per record.
pub fn render(record: &Record) -> String {
    match record {
        Record::Debug(msg) => msg.text.clone(),
        Record::Status(s) => render_status(s),
        Record::Settings(s) => format!(
            "Settings: Freq {}, SF {}, BW {}, CR {}, Mode {}",
            s.frequency, s.spreading_factor, s.bandwidth, s.coding_rate, s.mode
        ),
        Record::Frame(f) => format!(
            "Frame: type {} stream {} ttl {} sender {} offsets {}/{}/{} hdr crc {:04x} data crc {:04x}, {} bytes",
            f.header.packet_type,
            f.header.stream_id,
            f.header.ttl,
            f.header.sender,
            f.header.preamble_offset,
            f.header.num_symbol_offset,
            f.header.symbol_offset,
            f.header_crc,
            f.data_crc,
            f.payload.len()
        ),
        Record::LogEntry(entry) => match serde_json::to_string(&entry.fields) {
            Ok(fields) => format!("Log Entry: {fields}"),
            Err(_) => "Log Entry".to_owned(),
        },
    }
}

fn render_status(s: &StatusMessage) -> String {
    match s.tx_queue_full {
        Some(full) if s.value.is_empty() => format!("Status Msg: {}, tx queue full {}", s.status, full),
        Some(full) => format!("Status Msg: {}, {}, tx queue full {}", s.status, s.value, full),
        None => format!("Status Msg: {}, {}", s.status, s.value),
    }
}

/// Prints records for an operator. Debug text is green and rejected lines
/// are red when colour is on.
pub struct ConsoleSink<W> {
    out: W,
    color: bool,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(std::io::stdout(), color)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str, color: Option<&str>) {
        let result = match (self.color, color) {
            (true, Some(c)) => writeln!(self.out, "{c}{text}{RESET}"),
            _ => writeln!(self.out, "{text}"),
        };
        if let Err(e) = result.and_then(|_| self.out.flush()) {
            log::warn!("console write failed: {}", e);
        }
    }
}

impl<W: Write> Sink for ConsoleSink<W> {
    fn emit(&mut self, record: &Record) {
        let color = matches!(record, Record::Debug(_)).then_some(GREEN);
        self.line(&render(record), color);
    }

    fn emit_malformed(&mut self, malformed: &Malformed) {
        let raw = malformed.raw_lossy();
        self.line(raw.trim_end(), Some(RED));
    }
}

/// Forwards records as JSON lines in the device's own format.
pub struct JsonLinesSink<W> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn emit(&mut self, record: &Record) {
        if let Err(e) = writeln!(self.out, "{}", encode_record(record)) {
            log::warn!("JSON forward failed: {}", e);
        }
    }
}

/// Sends every record to both sinks.
pub struct Tee<A, B>(pub A, pub B);

impl<A: Sink, B: Sink> Sink for Tee<A, B> {
    fn emit(&mut self, record: &Record) {
        self.0.emit(record);
        self.1.emit(record);
    }

    fn emit_malformed(&mut self, malformed: &Malformed) {
        self.0.emit_malformed(malformed);
        self.1.emit_malformed(malformed);
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn emit(&mut self, record: &Record) {
        (**self).emit(record)
    }

    fn emit_malformed(&mut self, malformed: &Malformed) {
        (**self).emit_malformed(malformed)
    }
}

/// Handler that hands every record to a sink.
pub struct SinkHandler<S> {
    sink: S,
}

impl<S: Sink> SinkHandler<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S: Sink> RecordHandler for SinkHandler<S> {
    fn on_record(&mut self, record: &Record) {
        self.sink.emit(record);
    }

    fn on_malformed(&mut self, malformed: &Malformed) {
        self.sink.emit_malformed(malformed);
    }
}
