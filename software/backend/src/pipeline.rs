// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <pipeline.rs>

//! Pull loops tying a reader, a decoder and a dispatcher together.
//!
//! Both loops take one record at a time: the reader is not polled again
//! until the handlers for the current record have returned.

use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio_util::codec::Decoder;

use crate::dispatch::{DispatchStats, Dispatcher, RecordHandler};
use crate::error::{ConnectionError, PipelineError};
use crate::reader::FrameReader;
use crate::{json, protobuf};

/// Reads JSON lines until end of stream. Bad lines are handed to the
/// dispatcher as malformed and never stop the loop.
pub async fn run_text<R, C, H>(
    reader: &mut FrameReader<R, C>,
    dispatcher: &mut Dispatcher<H>,
) -> Result<DispatchStats, ConnectionError>
where
    R: AsyncRead + Unpin,
    C: Decoder,
    C::Item: Into<Bytes>,
    ConnectionError: From<C::Error>,
    H: RecordHandler,
{
    while let Some(raw) = reader.next_raw_record().await? {
        dispatcher.dispatch_decoded(json::decode_line(&raw));
    }
    Ok(dispatcher.stats())
}

/// Reads protobuf envelopes until end of stream. The first envelope that
/// fails to decode ends the run.
pub async fn run_binary<R, C, H>(
    reader: &mut FrameReader<R, C>,
    dispatcher: &mut Dispatcher<H>,
) -> Result<DispatchStats, PipelineError>
where
    R: AsyncRead + Unpin,
    C: Decoder,
    C::Item: Into<Bytes>,
    ConnectionError: From<C::Error>,
    H: RecordHandler,
{
    while let Some(raw) = reader.next_raw_record().await? {
        let record = protobuf::decode_envelope(&raw).inspect_err(|e| {
            log::error!("[{}] undecodable envelope ({} bytes): {}", reader.source(), raw.len(), e);
        })?;
        dispatcher.dispatch(&record);
    }
    Ok(dispatcher.stats())
}
