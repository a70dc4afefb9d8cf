//! Length-delimited JSON framing: a `u32` big-endian length prefix around a
//! `serde_json`-encoded [`RuntimeFrame`], built on `tokio_util`'s
//! `LengthDelimitedCodec`.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::error::BridgeError;
use crate::protocol::RuntimeFrame;

/// Wraps `LengthDelimitedCodec` with JSON (de)serialization of
/// [`RuntimeFrame`], so callers work in terms of frames, not bytes.
pub struct RuntimeFrameCodec {
    inner: LengthDelimitedCodec,
}

impl Default for RuntimeFrameCodec {
    fn default() -> Self {
        Self {
            inner: LengthDelimitedCodec::new(),
        }
    }
}

impl Decoder for RuntimeFrameCodec {
    type Item = RuntimeFrame;
    type Error = BridgeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(bytes) => {
                let frame: RuntimeFrame = serde_json::from_slice(&bytes)?;
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<RuntimeFrame> for RuntimeFrameCodec {
    type Error = BridgeError;

    fn encode(&mut self, item: RuntimeFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = serde_json::to_vec(&item)?;
        self.inner.encode(Bytes::from(bytes), dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_header_frame() {
        let mut codec = RuntimeFrameCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(RuntimeFrame::Header { count: 2 }, &mut buf)
            .unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        match decoded {
            RuntimeFrame::Header { count } => assert_eq!(count, 2),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn partial_bytes_yield_no_frame_yet() {
        let mut codec = RuntimeFrameCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(RuntimeFrame::Error { message: "boom".into() }, &mut buf)
            .unwrap();
        let mut truncated = BytesMut::from(&buf[..buf.len() - 1]);
        assert!(codec.decode(&mut truncated).unwrap().is_none());
    }
}
