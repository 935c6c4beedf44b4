// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <settings.rs>

//! "Current radio settings", shared between the dispatcher and handlers.
//!
//! There is one [`SettingsWriter`], owned by the dispatcher, and any number
//! of [`SettingsReader`]s. Each new settings record replaces the previous
//! one; readers always see the latest value.

use tokio::sync::watch;

use crate::record::RadioSettings;

pub struct SettingsWriter {
    tx: watch::Sender<Option<RadioSettings>>,
}

#[derive(Clone)]
pub struct SettingsReader {
    rx: watch::Receiver<Option<RadioSettings>>,
}

/// Creates an empty accumulator.
pub fn settings_channel() -> (SettingsWriter, SettingsReader) {
    let (tx, rx) = watch::channel(None);
    (SettingsWriter { tx }, SettingsReader { rx })
}

impl SettingsWriter {
    /// Replaces the current settings, returning the previous ones.
    pub fn publish(&self, settings: RadioSettings) -> Option<RadioSettings> {
        self.tx.send_replace(Some(settings))
    }

    pub fn reader(&self) -> SettingsReader {
        SettingsReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl SettingsReader {
    /// Latest settings, or `None` before the device has reported any.
    pub fn current(&self) -> Option<RadioSettings> {
        self.rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(sf: u8) -> RadioSettings {
        RadioSettings {
            frequency: 915_000_000,
            spreading_factor: sf,
            bandwidth: 125_000,
            coding_rate: 1,
            mode: "Mesh".into(),
        }
    }

    #[test]
    fn starts_empty() {
        let (_writer, reader) = settings_channel();
        assert!(reader.current().is_none());
    }

    #[test]
    fn later_settings_overwrite_earlier() {
        let (writer, reader) = settings_channel();
        assert!(writer.publish(settings(7)).is_none());
        assert_eq!(writer.publish(settings(9)), Some(settings(7)));
        assert_eq!(reader.current(), Some(settings(9)));
        assert_eq!(writer.reader().current(), Some(settings(9)));
    }
}
