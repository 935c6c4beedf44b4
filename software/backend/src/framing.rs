// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Filename: <framing.rs>

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

pub const DEFAULT_MAX_LINE: usize = 4096;

/// Splits a serial byte stream into `\n`-terminated lines.
///
/// Yields the line without `\n` (and without a preceding `\r`). Unlike
/// `LinesCodec` it never fails on bad UTF-8: a garbled line is still a line,
/// and the JSON decoder decides what to do with it. A line longer than
/// `max_length` is dropped up to the next newline. Bytes left over when the
/// stream ends are discarded.
#[derive(Debug)]
pub struct LineCodec {
    max_length: usize,
    // Bytes of the current buffer already known to hold no newline.
    next_index: usize,
    discarding: bool,
    dropped_lines: u64,
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
            dropped_lines: 0,
        }
    }

    /// Number of over-long lines thrown away so far.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped_lines
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE)
    }
}

impl Decoder for LineCodec {
    type Item = Bytes;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, std::io::Error> {
        loop {
            let newline = buf[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            match (self.discarding, newline) {
                (true, Some(end)) => {
                    buf.advance(end + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (true, None) => {
                    buf.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                (false, Some(end)) => {
                    let mut line = buf.split_to(end + 1);
                    self.next_index = 0;
                    line.truncate(end);
                    if line.last() == Some(&b'\r') {
                        line.truncate(end - 1);
                    }
                    if line.len() > self.max_length {
                        self.dropped_lines += 1;
                        log::warn!("dropping {}-byte line (limit {})", line.len(), self.max_length);
                        continue;
                    }
                    return Ok(Some(line.freeze()));
                }
                // A trailing `\r` may be the first half of a split `\r\n`.
                (false, None) if buf.len() - usize::from(buf.last() == Some(&b'\r')) > self.max_length => {
                    self.dropped_lines += 1;
                    log::warn!("line exceeds {} bytes, discarding until newline", self.max_length);
                    buf.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(None);
                }
                (false, None) => {
                    self.next_index = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, std::io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if !buf.is_empty() {
            log::debug!("discarding {} bytes of partial line at end of stream", buf.len());
            buf.clear();
        }
        self.next_index = 0;
        self.discarding = false;
        Ok(None)
    }
}
