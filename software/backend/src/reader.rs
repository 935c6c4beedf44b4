// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <reader.rs>

//! Transports that yield raw records: serial lines or broker messages.
//!
//! A [`FrameReader`] is owned by exactly one consumer loop. It never
//! reconnects on its own; when the link drops the caller sees end of stream
//! or a [`ConnectionError`] and decides what to do next.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tokio_stream::StreamExt;
use tokio_util::codec::{Decoder, FramedRead, LengthDelimitedCodec};

use crate::command::Command;
use crate::error::ConnectionError;
use crate::framing::{DEFAULT_MAX_LINE, LineCodec};

pub const DEFAULT_BAUDRATE: u32 = 921_600;
pub const DEFAULT_BROKER_ADDR: &str = "127.0.0.1:5555";
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub max_line_length: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUDRATE,
            max_line_length: DEFAULT_MAX_LINE,
        }
    }
}

/// Where to subscribe for broker messages. The bridge delivers each message
/// behind a 4-byte big-endian length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub address: String,
    pub max_frame_length: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_BROKER_ADDR.to_owned(),
            max_frame_length: DEFAULT_MAX_FRAME,
        }
    }
}

pub struct FrameReader<R, C = LineCodec> {
    source: String,
    inner: FramedRead<R, C>,
    records: u64,
}

impl<R, C> FrameReader<R, C>
where
    R: AsyncRead + Unpin,
    C: Decoder,
    C::Item: Into<Bytes>,
    ConnectionError: From<C::Error>,
{
    /// Wraps an already open byte stream.
    pub fn new(source: impl Into<String>, io: R, codec: C) -> Self {
        Self {
            source: source.into(),
            inner: FramedRead::new(io, codec),
            records: 0,
        }
    }

    /// Waits for the next complete record. `Ok(None)` means end of stream.
    pub async fn next_raw_record(&mut self) -> Result<Option<Bytes>, ConnectionError> {
        match self.inner.next().await {
            Some(Ok(item)) => {
                self.records += 1;
                Ok(Some(item.into()))
            }
            Some(Err(e)) => Err(e.into()),
            None => {
                log::info!("[{}] end of stream after {} records", self.source, self.records);
                Ok(None)
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn codec(&self) -> &C {
        self.inner.decoder()
    }
}

impl<R, C> FrameReader<R, C>
where
    R: AsyncWrite + Unpin,
{
    /// Writes one command line to the device on the same link.
    pub async fn send_command(&mut self, command: &Command) -> Result<(), ConnectionError> {
        let mut line = command.to_json_line();
        line.push_str("\r\n");
        log::debug!("[{}] sending {}", self.source, command.name());
        let io = self.inner.get_mut();
        io.write_all(line.as_bytes()).await?;
        io.flush().await?;
        Ok(())
    }
}

/// Opens a serial device at the configured rate, 8N1 without flow control.
pub fn open_serial(
    port: &str,
    config: &SerialConfig,
) -> Result<FrameReader<SerialStream>, ConnectionError> {
    log::info!("opening \"{}\" at {} baud (8N1, no flow)", port, config.baud_rate);
    let stream = tokio_serial::new(port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|source| ConnectionError::Open {
            port: port.to_owned(),
            source,
        })?;
    log::info!("[{}] port open", port);
    Ok(FrameReader::new(
        port,
        stream,
        LineCodec::new(config.max_line_length),
    ))
}

/// Subscribes to the broker bridge.
pub async fn connect_queue(
    config: &QueueConfig,
) -> Result<FrameReader<TcpStream, LengthDelimitedCodec>, ConnectionError> {
    log::info!("connecting to broker at {}", config.address);
    let stream = TcpStream::connect(&config.address)
        .await
        .map_err(|source| ConnectionError::Connect {
            addr: config.address.clone(),
            source,
        })?;
    stream.set_nodelay(true).ok();
    let codec = LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(config.max_frame_length)
        .new_codec();
    log::info!("[{}] subscribed", config.address);
    Ok(FrameReader::new(config.address.clone(), stream, codec))
}
