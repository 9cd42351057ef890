//! Protobuf parser for GTFS Realtime feeds.

use prost::Message;
use std::io::Read;
use std::path::Path;

use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, prost::DecodeError> {
    FeedMessage::decode(bytes)
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reads a feed file written by the producer. Gzip content is recognized by
/// its magic bytes, whatever the file is named.
pub fn read_feed_file(path: &Path) -> anyhow::Result<FeedMessage> {
    let raw = std::fs::read(path)?;
    let bytes = if raw.starts_with(&GZIP_MAGIC) {
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
        out
    } else {
        raw
    };
    Ok(parse_feed(&bytes)?)
}
