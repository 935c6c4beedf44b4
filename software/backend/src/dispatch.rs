// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <dispatch.rs>

use crate::error::Malformed;
use crate::record::{DataFrame, DebugMessage, LogEntry, RadioSettings, Record, StatusMessage};
use crate::settings::{SettingsReader, SettingsWriter, settings_channel};

/// Receives decoded records.
///
/// The dispatcher calls [`RecordHandler::on_record`] once per record. Its
/// default splits the record into one per-kind call; handlers that work on
/// whole records (sinks) override it instead.
pub trait RecordHandler {
    fn on_record(&mut self, record: &Record) {
        match record {
            Record::Debug(msg) => self.on_debug(msg),
            Record::Status(status) => self.on_status(status),
            Record::Settings(settings) => self.on_settings(settings),
            Record::Frame(frame) => self.on_frame(frame),
            Record::LogEntry(entry) => self.on_log_entry(entry),
        }
    }

    fn on_debug(&mut self, _msg: &DebugMessage) {}
    fn on_status(&mut self, _status: &StatusMessage) {}
    fn on_settings(&mut self, _settings: &RadioSettings) {}
    fn on_frame(&mut self, _frame: &DataFrame) {}
    fn on_log_entry(&mut self, _entry: &LogEntry) {}

    /// Called for text lines that could not be decoded.
    fn on_malformed(&mut self, _malformed: &Malformed) {}
}

impl<H: RecordHandler + ?Sized> RecordHandler for Box<H> {
    fn on_record(&mut self, record: &Record) {
        (**self).on_record(record)
    }
    fn on_malformed(&mut self, malformed: &Malformed) {
        (**self).on_malformed(malformed)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub debug: u64,
    pub status: u64,
    pub settings: u64,
    pub frames: u64,
    pub log_entries: u64,
    pub malformed: u64,
}

impl DispatchStats {
    pub fn total(&self) -> u64 {
        self.debug + self.status + self.settings + self.frames + self.log_entries + self.malformed
    }
}

/// Routes each record to its handler, exactly once.
pub struct Dispatcher<H> {
    handler: H,
    settings: SettingsWriter,
    stats: DispatchStats,
}

impl<H: RecordHandler> Dispatcher<H> {
    /// Dispatcher with its own settings accumulator; see [`Dispatcher::settings`].
    pub fn new(handler: H) -> Self {
        let (writer, _) = settings_channel();
        Self::with_settings(handler, writer)
    }

    pub fn with_settings(handler: H, settings: SettingsWriter) -> Self {
        Self {
            handler,
            settings,
            stats: DispatchStats::default(),
        }
    }

    pub fn dispatch(&mut self, record: &Record) {
        log::debug!("dispatching {} record", record.kind());
        match record {
            Record::Debug(_) => self.stats.debug += 1,
            Record::Status(_) => self.stats.status += 1,
            Record::Settings(settings) => {
                self.stats.settings += 1;
                self.settings.publish(settings.clone());
            }
            Record::Frame(_) => self.stats.frames += 1,
            Record::LogEntry(_) => self.stats.log_entries += 1,
        }
        self.handler.on_record(record);
    }

    pub fn reject(&mut self, malformed: &Malformed) {
        log::debug!("rejecting line: {}", malformed);
        self.stats.malformed += 1;
        self.handler.on_malformed(malformed);
    }

    /// Dispatches a text decode result, good or bad.
    pub fn dispatch_decoded(&mut self, decoded: Result<Record, Malformed>) {
        match decoded {
            Ok(record) => self.dispatch(&record),
            Err(malformed) => self.reject(&malformed),
        }
    }

    /// A reader of the settings this dispatcher publishes.
    pub fn settings(&self) -> SettingsReader {
        self.settings.reader()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MalformedReason;
    use crate::record::FrameHeader;

    #[derive(Default)]
    struct Calls(Vec<&'static str>);

    impl RecordHandler for Calls {
        fn on_debug(&mut self, _: &DebugMessage) {
            self.0.push("debug");
        }
        fn on_status(&mut self, _: &StatusMessage) {
            self.0.push("status");
        }
        fn on_settings(&mut self, _: &RadioSettings) {
            self.0.push("settings");
        }
        fn on_frame(&mut self, _: &DataFrame) {
            self.0.push("frame");
        }
        fn on_log_entry(&mut self, _: &LogEntry) {
            self.0.push("log entry");
        }
        fn on_malformed(&mut self, _: &Malformed) {
            self.0.push("malformed");
        }
    }

    fn sample_settings() -> RadioSettings {
        RadioSettings {
            frequency: 433_000_000,
            spreading_factor: 8,
            bandwidth: 250_000,
            coding_rate: 2,
            mode: "Mesh".into(),
        }
    }

    #[test]
    fn each_record_hits_one_handler() {
        let records = [
            Record::Debug(DebugMessage::from_bytes(&b"x"[..], None)),
            Record::Status(StatusMessage {
                status: "LINK".into(),
                value: "UP".into(),
                tx_queue_full: None,
            }),
            Record::Settings(sample_settings()),
            Record::Frame(DataFrame {
                header: FrameHeader::default(),
                header_crc: 0,
                data_crc: 0,
                payload: Default::default(),
            }),
            Record::LogEntry(LogEntry::default()),
        ];
        let mut dispatcher = Dispatcher::new(Calls::default());
        for record in &records {
            dispatcher.dispatch(record);
        }
        dispatcher.reject(&Malformed::new(&b"??"[..], MalformedReason::MissingDiscriminant));

        assert_eq!(
            dispatcher.handler().0,
            vec!["debug", "status", "settings", "frame", "log entry", "malformed"]
        );
        let stats = dispatcher.stats();
        assert_eq!(stats.total(), 6);
        assert_eq!(stats.log_entries, 1);
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn settings_are_published_before_handler_runs() {
        struct Check(SettingsReader, Option<RadioSettings>);
        impl RecordHandler for Check {
            fn on_settings(&mut self, _: &RadioSettings) {
                self.1 = self.0.current();
            }
        }

        let (writer, reader) = settings_channel();
        let mut dispatcher = Dispatcher::with_settings(Check(reader, None), writer);
        dispatcher.dispatch(&Record::Settings(sample_settings()));
        assert_eq!(dispatcher.handler().1, Some(sample_settings()));
        assert_eq!(dispatcher.settings().current(), Some(sample_settings()));
    }

    #[test]
    fn whole_record_handlers_see_every_kind() {
        #[derive(Default)]
        struct Kinds(Vec<&'static str>);
        impl RecordHandler for Kinds {
            fn on_record(&mut self, record: &Record) {
                self.0.push(record.kind());
            }
        }

        let mut dispatcher = Dispatcher::new(Box::new(Kinds::default()));
        dispatcher.dispatch(&Record::Settings(sample_settings()));
        dispatcher.dispatch(&Record::LogEntry(LogEntry::default()));
        assert_eq!(dispatcher.handler().0, vec!["settings", "log entry"]);
        assert_eq!(dispatcher.settings().current(), Some(sample_settings()));
    }
}
