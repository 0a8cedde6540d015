//! Chunk decompressors.
//!
//! Every codec is driven the same way: compressed chunks go in through
//! [`ChunkDecoder::feed`] in arrival order and whatever the codec could
//! decode so far comes back out, possibly nothing. [`ChunkDecoder::finish`]
//! is called once at end of input.

use std::io::{self, Write};
use std::path::Path;

use bzip2::{Decompress, Status};
use serde::Deserialize;
use zstd::stream::raw::Operation;

use crate::error::DecodeError;

/// Output buffer size for one decompress call.
const OUTPUT_RESERVE_BYTES: usize = 32 * 1024;

pub trait ChunkDecoder {
    fn name(&self) -> &'static str;

    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<u8>, DecodeError>;

    fn finish(&mut self) -> Result<Vec<u8>, DecodeError>;
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    #[serde(alias = "none")]
    Identity,
    Bzip2,
    Gzip,
    Zstd,
}

impl Codec {
    /// Picks a codec from a file extension (`.bz2`, `.gz`, `.zst`).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bz2") => Codec::Bzip2,
            Some("gz") => Codec::Gzip,
            Some("zst") | Some("zstd") => Codec::Zstd,
            _ => Codec::Identity,
        }
    }

    pub fn decoder(self) -> Result<Box<dyn ChunkDecoder>, DecodeError> {
        Ok(match self {
            Codec::Identity => Box::new(IdentityDecoder),
            Codec::Bzip2 => Box::new(Bzip2Decoder::new()),
            Codec::Gzip => Box::new(GzipDecoder::new()),
            Codec::Zstd => Box::new(ZstdDecoder::new()?),
        })
    }
}

/// Pass-through for uncompressed input.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityDecoder;

impl ChunkDecoder for IdentityDecoder {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Ok(chunk.to_vec())
    }

    fn finish(&mut self) -> Result<Vec<u8>, DecodeError> {
        Ok(Vec::new())
    }
}

/// Failure bookkeeping shared by the codecs.
///
/// Output decoded before a failure is returned first; the error follows on
/// the next call, and every call after that reports the decoder as poisoned.
#[derive(Debug, Default)]
struct FailureState {
    pending: Option<DecodeError>,
    failed: bool,
}

impl FailureState {
    fn check(&mut self, codec: &'static str) -> Result<(), DecodeError> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }
        if self.failed {
            return Err(DecodeError::Poisoned { codec });
        }
        Ok(())
    }

    fn fail(&mut self, err: DecodeError, decoded: Vec<u8>) -> Result<Vec<u8>, DecodeError> {
        self.failed = true;
        if decoded.is_empty() {
            return Err(err);
        }
        self.pending = Some(err);
        Ok(decoded)
    }
}

fn io_to_decode_error(codec: &'static str, err: io::Error) -> DecodeError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => DecodeError::Truncated { codec },
        _ => DecodeError::Corrupt {
            codec,
            message: err.to_string(),
        },
    }
}

/// Streaming bzip2 decoder.
///
/// Concatenated streams (as written by parallel compressors) decode back to
/// back: a new stream state is started whenever input remains after an
/// end-of-stream marker.
pub struct Bzip2Decoder {
    inner: Decompress,
    started: bool,
    stream_done: bool,
    failure: FailureState,
}

impl Bzip2Decoder {
    const NAME: &'static str = "bzip2";

    pub fn new() -> Self {
        Self {
            inner: Decompress::new(false),
            started: false,
            stream_done: false,
            failure: FailureState::default(),
        }
    }

    fn corrupt(message: impl Into<String>) -> DecodeError {
        DecodeError::Corrupt {
            codec: Self::NAME,
            message: message.into(),
        }
    }

    fn decode_into(&mut self, mut input: &[u8], out: &mut Vec<u8>) -> Result<(), DecodeError> {
        loop {
            if self.stream_done {
                if input.is_empty() {
                    return Ok(());
                }
                self.inner = Decompress::new(false);
                self.stream_done = false;
            }
            if out.capacity() - out.len() < OUTPUT_RESERVE_BYTES / 2 {
                out.reserve(OUTPUT_RESERVE_BYTES);
            }

            let before_in = self.inner.total_in();
            let before_out = out.len();
            let status = self
                .inner
                .decompress_vec(input, out)
                .map_err(|err| Self::corrupt(err.to_string()))?;
            let consumed = (self.inner.total_in() - before_in) as usize;
            let produced = out.len() - before_out;
            input = &input[consumed..];
            if consumed > 0 {
                self.started = true;
            }

            if status == Status::StreamEnd {
                self.stream_done = true;
                continue;
            }
            // A full output buffer may hide more pending output.
            let out_full = out.len() == out.capacity();
            if input.is_empty() && (!out_full || produced == 0) {
                return Ok(());
            }
            if consumed == 0 && produced == 0 {
                return Err(Self::corrupt("decoder made no progress"));
            }
        }
    }
}

impl Default for Bzip2Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkDecoder for Bzip2Decoder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<u8>, DecodeError> {
        self.failure.check(Self::NAME)?;
        let mut out = Vec::new();
        if chunk.is_empty() {
            return Ok(out);
        }
        match self.decode_into(chunk, &mut out) {
            Ok(()) => Ok(out),
            Err(err) => self.failure.fail(err, out),
        }
    }

    fn finish(&mut self) -> Result<Vec<u8>, DecodeError> {
        self.failure.check(Self::NAME)?;
        if self.started && !self.stream_done {
            return self
                .failure
                .fail(DecodeError::Truncated { codec: Self::NAME }, Vec::new());
        }
        Ok(Vec::new())
    }
}

/// Streaming gzip decoder (single member).
pub struct GzipDecoder {
    inner: flate2::write::GzDecoder<Vec<u8>>,
    started: bool,
    failure: FailureState,
}

impl GzipDecoder {
    const NAME: &'static str = "gzip";

    pub fn new() -> Self {
        Self {
            inner: flate2::write::GzDecoder::new(Vec::new()),
            started: false,
            failure: FailureState::default(),
        }
    }
}

impl Default for GzipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkDecoder for GzipDecoder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<u8>, DecodeError> {
        self.failure.check(Self::NAME)?;
        if chunk.is_empty() {
            return Ok(Vec::new());
        }
        self.started = true;
        let written = self.inner.write_all(chunk).and_then(|()| self.inner.flush());
        let decoded = std::mem::take(self.inner.get_mut());
        match written {
            Ok(()) => Ok(decoded),
            Err(err) => self.failure.fail(io_to_decode_error(Self::NAME, err), decoded),
        }
    }

    fn finish(&mut self) -> Result<Vec<u8>, DecodeError> {
        self.failure.check(Self::NAME)?;
        if !self.started {
            return Ok(Vec::new());
        }
        let finished = self.inner.try_finish();
        let decoded = std::mem::take(self.inner.get_mut());
        match finished {
            Ok(()) => Ok(decoded),
            Err(err) => self.failure.fail(io_to_decode_error(Self::NAME, err), decoded),
        }
    }
}

/// Streaming zstd decoder.
///
/// Driven through the raw streaming API so the end of each frame is visible:
/// the decoder's size hint drops to zero only once a frame has been fully
/// decoded and flushed.
pub struct ZstdDecoder {
    inner: zstd::stream::raw::Decoder<'static>,
    scratch: Vec<u8>,
    started: bool,
    frame_done: bool,
    failure: FailureState,
}

impl ZstdDecoder {
    const NAME: &'static str = "zstd";

    pub fn new() -> Result<Self, DecodeError> {
        let inner = zstd::stream::raw::Decoder::new()
            .map_err(|err| io_to_decode_error(Self::NAME, err))?;
        Ok(Self {
            inner,
            scratch: vec![0; OUTPUT_RESERVE_BYTES],
            started: false,
            frame_done: false,
            failure: FailureState::default(),
        })
    }

    fn decode_into(&mut self, mut input: &[u8], out: &mut Vec<u8>) -> Result<(), DecodeError> {
        loop {
            let status = self
                .inner
                .run_on_buffers(input, &mut self.scratch)
                .map_err(|err| io_to_decode_error(Self::NAME, err))?;
            out.extend_from_slice(&self.scratch[..status.bytes_written]);
            input = &input[status.bytes_read..];
            if status.bytes_read > 0 {
                self.started = true;
            }
            if status.bytes_read > 0 || status.bytes_written > 0 {
                self.frame_done = status.remaining == 0;
            }

            // A full scratch buffer may hide more pending output.
            let out_full = status.bytes_written == self.scratch.len();
            if input.is_empty() && (!out_full || status.bytes_written == 0) {
                return Ok(());
            }
            if status.bytes_read == 0 && status.bytes_written == 0 {
                return Err(DecodeError::Corrupt {
                    codec: Self::NAME,
                    message: "decoder made no progress".to_string(),
                });
            }
        }
    }
}

impl ChunkDecoder for ZstdDecoder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<u8>, DecodeError> {
        self.failure.check(Self::NAME)?;
        let mut out = Vec::new();
        if chunk.is_empty() {
            return Ok(out);
        }
        match self.decode_into(chunk, &mut out) {
            Ok(()) => Ok(out),
            Err(err) => self.failure.fail(err, out),
        }
    }

    fn finish(&mut self) -> Result<Vec<u8>, DecodeError> {
        self.failure.check(Self::NAME)?;
        if self.started && !self.frame_done {
            return self
                .failure
                .fail(DecodeError::Truncated { codec: Self::NAME }, Vec::new());
        }
        Ok(Vec::new())
    }
}
