//! The `errors` module defines the error taxonomy used throughout the transcoder (§7 of the
//! design spec).

use std::fmt;

/// `Error` enumerates every way a transcode or header-validation call can fail.
///
/// There is no retry or partial-success path: any of these is surfaced as a failed return from
/// the top-level `start_transcoding` / `transcode_image_level` calls, and the caller is expected
/// to discard the transcoder instance.
#[derive(Debug)]
pub enum Error {
    /// Bad signature, version, size, or CRC16 in the file header.
    MalformedHeader(&'static str),
    /// An offset or size in the header or a slice descriptor extends beyond the supplied buffer.
    BufferTooSmall(&'static str),
    /// Invalid prefix code, out-of-range palette index, or inconsistent derived selector flags.
    CodebookCorrupt(&'static str),
    /// RLE run exceeded the slice's block count, a predictor referenced a non-existent neighbor,
    /// the stream ended before all blocks were decoded, or a repeat counter was left dangling.
    StreamCorrupt(&'static str),
    /// The request can't be serviced: an unsupported target format, non-power-of-two PVRTC1
    /// dimensions, or a reserved decode flag.
    UnsupportedRequest(&'static str),
    /// `transcode_image_level` was called before `start_transcoding`.
    NotReady,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedHeader(msg) => write!(f, "malformed header: {msg}"),
            Error::BufferTooSmall(msg) => write!(f, "buffer too small: {msg}"),
            Error::CodebookCorrupt(msg) => write!(f, "codebook corrupt: {msg}"),
            Error::StreamCorrupt(msg) => write!(f, "stream corrupt: {msg}"),
            Error::UnsupportedRequest(msg) => write!(f, "unsupported request: {msg}"),
            Error::NotReady => write!(f, "transcode called before start_transcoding"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

pub fn malformed_header<T>(msg: &'static str) -> Result<T> {
    Err(Error::MalformedHeader(msg))
}

pub fn buffer_too_small<T>(msg: &'static str) -> Result<T> {
    Err(Error::BufferTooSmall(msg))
}

pub fn codebook_corrupt<T>(msg: &'static str) -> Result<T> {
    Err(Error::CodebookCorrupt(msg))
}

pub fn stream_corrupt<T>(msg: &'static str) -> Result<T> {
    Err(Error::StreamCorrupt(msg))
}

pub fn unsupported_request<T>(msg: &'static str) -> Result<T> {
    Err(Error::UnsupportedRequest(msg))
}
