use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;

use common::{GameState, MAX_COMPRESSED_BYTES};

/// Failures of the persistence codec. `SizeLimit` must reach the caller
/// before any durable write happens; a save is aborted, never truncated.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("compressed snapshot is {actual} bytes, limit is {limit}")]
    SizeLimit { actual: usize, limit: usize },
    #[error("snapshot could not be encoded: {0}")]
    Encode(String),
    #[error("stored snapshot could not be decoded: {0}")]
    Decode(String),
}

/// Serialize a state to compressed text: JSON, gzip, base64.
///
/// Deterministic and reversible: `decode(encode(s)) == s` for every valid
/// state. The output is plain ASCII so it can live in a text column.
pub fn encode(state: &GameState) -> Result<String, CodecError> {
    let json = serde_json::to_vec(state).map_err(|e| CodecError::Encode(e.to_string()))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .and_then(|_| encoder.finish())
        .map(|bytes| BASE64.encode(bytes))
        .map_err(|e| CodecError::Encode(e.to_string()))
}

/// Inverse of [`encode`]. Any failure along the way (bad base64, corrupt
/// gzip, unparseable JSON) is a [`CodecError::Decode`].
pub fn decode(text: &str) -> Result<GameState, CodecError> {
    let bytes = BASE64
        .decode(text.trim())
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    let mut json = Vec::new();
    GzDecoder::new(bytes.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Enforce the hard snapshot cap, measured in encoded UTF-8 bytes of the
/// compressed text. Exactly at the limit passes.
pub fn check_size(compressed: &str) -> Result<(), CodecError> {
    let actual = compressed.len();
    if actual > MAX_COMPRESSED_BYTES {
        return Err(CodecError::SizeLimit { actual, limit: MAX_COMPRESSED_BYTES });
    }
    Ok(())
}

/// [`encode`] off the caller's task, so a long compression never stalls the
/// simulation tick or input handling.
pub async fn encode_async(state: GameState) -> Result<String, CodecError> {
    tokio::task::spawn_blocking(move || encode(&state))
        .await
        .map_err(|e| CodecError::Encode(e.to_string()))?
}

/// [`decode`] off the caller's task.
pub async fn decode_async(text: String) -> Result<GameState, CodecError> {
    tokio::task::spawn_blocking(move || decode(&text))
        .await
        .map_err(|e| CodecError::Decode(e.to_string()))?
}
