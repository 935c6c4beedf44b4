// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <qmesh-debug.rs>

use anyhow::Context;
use clap::{ArgAction, Parser};
use tokio::signal;

use qmesh_telemetry::logging::init_logging;
use qmesh_telemetry::pipeline::run_binary;
use qmesh_telemetry::reader::{DEFAULT_BROKER_ADDR, DEFAULT_MAX_FRAME};
use qmesh_telemetry::sink::{ConsoleSink, SinkHandler};
use qmesh_telemetry::{Dispatcher, QueueConfig, connect_queue};

/// Print debug, status and data messages published by QMesh radios
#[derive(Parser, Debug)]
#[command(name = "qmesh-debug", version, about)]
struct Args {
    /// Broker bridge to subscribe to
    #[arg(long, default_value = DEFAULT_BROKER_ADDR, env = "QMESH_BROKER")]
    broker: String,

    /// Largest message accepted from the broker
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME, env = "QMESH_MAX_FRAME")]
    max_frame: usize,

    /// Disable ANSI colours
    #[arg(long)]
    no_color: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = QueueConfig {
        address: args.broker.clone(),
        max_frame_length: args.max_frame,
    };
    let mut reader = connect_queue(&config)
        .await
        .context("broker unavailable")?;
    let mut dispatcher = Dispatcher::new(SinkHandler::new(ConsoleSink::stdout(!args.no_color)));

    let result = tokio::select! {
        result = run_binary(&mut reader, &mut dispatcher) => result
            .map(|_| log::info!("[{}] broker closed the subscription", config.address))
            .context("consuming broker messages"),
        _ = signal::ctrl_c() => {
            log::info!("Ctrl+C received, shutting down");
            Ok(())
        }
    };

    log::info!("{} messages handled", dispatcher.stats().total());
    if let Err(ref e) = result {
        log::error!("{:#}", e);
    }
    result
}
