// ── Decode backend surface ──

use async_trait::async_trait;

use crate::camera::VideoSink;
use crate::error::Error;

/// Single-shot code decoding, from a live frame or a static image.
///
/// Absence and failure are distinct in this contract: a frame or image
/// that simply contains no code is `Ok(None)`, and only genuine backend
/// failures are `Err`. Consumers never inspect error text to tell the
/// two apart.
#[async_trait]
pub trait DecodeBackend: Send + Sync {
    /// Attempt one decode against the current frame of the bound sink.
    async fn decode_frame(&self, sink: &dyn VideoSink) -> Result<Option<String>, Error>;

    /// Attempt one decode against an encoded static image.
    async fn decode_image(&self, image: &[u8]) -> Result<Option<String>, Error>;
}
