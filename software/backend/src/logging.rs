// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <logging.rs>

/// Sets up `env_logger`. `RUST_LOG` wins; otherwise each `-v` raises the
/// default level from `info`.
pub fn init_logging(verbose: u8) {
    use env_logger::Env;
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}
