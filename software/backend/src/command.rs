// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <command.rs>

//! Host-to-device requests understood by the radio's serial interface.

use serde_json::{Value, json};

use crate::json::{FrameLine, tagged};
use crate::record::DataFrame;

/// One radio setting to overwrite with `Put Setting`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingUpdate {
    Frequency(u32),
    SpreadingFactor(u8),
    Bandwidth(u32),
    CodingRate(u8),
    Mode(String),
}

impl SettingUpdate {
    /// Key the firmware stores this setting under.
    pub fn key(&self) -> &'static str {
        match self {
            SettingUpdate::Frequency(_) => "Freq",
            SettingUpdate::SpreadingFactor(_) => "SF",
            SettingUpdate::Bandwidth(_) => "BW",
            SettingUpdate::CodingRate(_) => "CR",
            SettingUpdate::Mode(_) => "Mode",
        }
    }

    fn value(&self) -> Value {
        match self {
            SettingUpdate::Frequency(v) | SettingUpdate::Bandwidth(v) => json!(v),
            SettingUpdate::SpreadingFactor(v) | SettingUpdate::CodingRate(v) => json!(v),
            SettingUpdate::Mode(mode) => json!(mode),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetSettings,
    PutSetting(SettingUpdate),
    GetStatus,
    SendFrame(DataFrame),
    Reboot,
    EraseLog,
    ReadLog,
}

impl Command {
    /// Value of the `Type` field for this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetSettings => "Get Settings",
            Command::PutSetting(_) => "Put Setting",
            Command::GetStatus => "Get Status",
            Command::SendFrame(_) => "Send Frame",
            Command::Reboot => "Reboot",
            Command::EraseLog => "Erase Log",
            Command::ReadLog => "Read Log",
        }
    }

    /// Encodes the command as a single JSON line without terminator.
    pub fn to_json_line(&self) -> String {
        let body = match self {
            Command::PutSetting(update) => {
                let mut body = serde_json::Map::new();
                body.insert("Setting".to_owned(), json!(update.key()));
                body.insert(update.key().to_owned(), update.value());
                Value::Object(body)
            }
            Command::SendFrame(frame) => {
                serde_json::to_value(FrameLine::from(frame)).unwrap_or(Value::Null)
            }
            _ => Value::Null,
        };
        tagged(self.name(), body)
    }
}
