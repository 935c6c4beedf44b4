// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <main.rs>

use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};
use tokio::signal;

use qmesh_telemetry::command::Command;
use qmesh_telemetry::framing::DEFAULT_MAX_LINE;
use qmesh_telemetry::logging::init_logging;
use qmesh_telemetry::pipeline::run_text;
use qmesh_telemetry::reader::DEFAULT_BAUDRATE;
use qmesh_telemetry::sink::{ConsoleSink, JsonLinesSink, Sink, SinkHandler, Tee};
use qmesh_telemetry::tcp_server::TcpFanout;
use qmesh_telemetry::{ConnectionError, Dispatcher, RecordHandler, SerialConfig, open_serial};

/// Print telemetry from a QMesh radio's serial port
#[derive(Parser, Debug)]
#[command(name = "qmesh-serial", version, about)]
struct Args {
    /// Serial device the radio is attached to, e.g. /dev/ttyACM0
    port: String,

    /// Line rate
    #[arg(short, long, default_value_t = DEFAULT_BAUDRATE, env = "QMESH_BAUD")]
    baud: u32,

    /// Longest line accepted before it is discarded as noise
    #[arg(long, default_value_t = DEFAULT_MAX_LINE, env = "QMESH_MAX_LINE")]
    max_line: usize,

    /// Print records as JSON lines instead of text
    #[arg(long)]
    json: bool,

    /// Disable ANSI colours
    #[arg(long)]
    no_color: bool,

    /// Also forward records as JSON lines to TCP clients on this address
    #[arg(long, env = "QMESH_FORWARD")]
    forward: Option<String>,

    /// Ask the radio for its settings and status after opening the port
    #[arg(long)]
    request_settings: bool,

    /// Reopen the port this many seconds after it fails instead of exiting
    #[arg(long, env = "QMESH_RECONNECT_DELAY")]
    reconnect_delay: Option<u64>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = SerialConfig {
        baud_rate: args.baud,
        max_line_length: args.max_line,
    };

    let local: Box<dyn Sink> = if args.json {
        Box::new(JsonLinesSink::new(std::io::stdout()))
    } else {
        Box::new(ConsoleSink::stdout(!args.no_color))
    };
    let sink: Box<dyn Sink> = match &args.forward {
        Some(addr) => Box::new(Tee(local, TcpFanout::bind(addr).await?)),
        None => local,
    };

    let mut dispatcher = Dispatcher::new(SinkHandler::new(sink));
    let settings = dispatcher.settings();

    let result = tokio::select! {
        result = serve(&args, &config, &mut dispatcher) => result,
        _ = signal::ctrl_c() => {
            log::info!("Ctrl+C received, shutting down");
            Ok(())
        }
    };

    let stats = dispatcher.stats();
    log::info!(
        "{} records: {} debug, {} status, {} settings, {} frames, {} log entries, {} malformed",
        stats.total(),
        stats.debug,
        stats.status,
        stats.settings,
        stats.frames,
        stats.log_entries,
        stats.malformed
    );
    if let Some(current) = settings.current() {
        log::info!("last radio settings: {:?}", current);
    }

    if let Err(ref e) = result {
        log::error!("{:#}", e);
    }
    result
}

async fn serve<H: RecordHandler>(
    args: &Args,
    config: &SerialConfig,
    dispatcher: &mut Dispatcher<H>,
) -> anyhow::Result<()> {
    loop {
        let outcome = read_port(args, config, dispatcher).await;
        let Some(delay) = args.reconnect_delay else {
            return outcome.with_context(|| format!("reading {}", args.port));
        };
        match outcome {
            Ok(()) => log::warn!("[{}] stream ended, reopening in {}s", args.port, delay),
            Err(e) => log::warn!("[{}] {}, reopening in {}s", args.port, e, delay),
        }
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }
}

async fn read_port<H: RecordHandler>(
    args: &Args,
    config: &SerialConfig,
    dispatcher: &mut Dispatcher<H>,
) -> Result<(), ConnectionError> {
    let mut reader = open_serial(&args.port, config)?;
    if args.request_settings {
        reader.send_command(&Command::GetSettings).await?;
        reader.send_command(&Command::GetStatus).await?;
    }
    run_text(&mut reader, dispatcher).await?;
    if reader.codec().dropped_lines() > 0 {
        log::warn!("[{}] {} over-long lines dropped", args.port, reader.codec().dropped_lines());
    }
    Ok(())
}
