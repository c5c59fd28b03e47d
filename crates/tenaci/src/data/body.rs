use std::fmt;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt, stream};

use crate::error::BoxError;

/// A boxed stream type for response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Stream of body chunks as produced by a transport.
pub type BodyStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// A response body: either fully buffered or still streaming from the transport.
///
/// Buffered bodies can be cloned and read any number of times; streaming bodies
/// are read once. [`Body::bytes`] turns either into a single `Bytes`.
pub struct Body {
    inner: Inner,
}

enum Inner {
    Full(Bytes),
    Streaming(BodyStream),
}

impl Body {
    pub fn empty() -> Self { Self::from(Bytes::new()) }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        Self {
            inner: Inner::Streaming(Box::pin(stream)),
        }
    }

    /// The buffered contents, or `None` if the body has not been read yet.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.inner {
            Inner::Full(bytes) => Some(bytes),
            Inner::Streaming(_) => None,
        }
    }

    pub fn is_buffered(&self) -> bool { matches!(self.inner, Inner::Full(_)) }

    /// Read the whole body into memory.
    pub async fn bytes(self) -> Result<Bytes, BoxError> {
        match self.inner {
            Inner::Full(bytes) => Ok(bytes),
            Inner::Streaming(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }

    /// Read the body to its end, keeping at most `limit` bytes.
    ///
    /// Stops early on a stream error; whatever was kept is still returned.
    pub async fn drain(self, limit: usize) -> Bytes {
        match self.inner {
            Inner::Full(bytes) => bytes.slice(..bytes.len().min(limit)),
            Inner::Streaming(mut stream) => {
                let mut kept = BytesMut::new();
                while let Some(Ok(chunk)) = stream.next().await {
                    let room = limit.saturating_sub(kept.len());
                    kept.extend_from_slice(&chunk[..chunk.len().min(room)]);
                }
                kept.freeze()
            }
        }
    }

    /// Buffer the body in place so it can be read again later.
    ///
    /// On a stream error the body is rebuilt from the bytes already read
    /// followed by the error, so a reader sees exactly what it would have seen
    /// without the buffering attempt.
    pub(crate) async fn buffer(&mut self) -> Result<Bytes, BoxError> {
        let stream = match std::mem::replace(&mut self.inner, Inner::Full(Bytes::new())) {
            Inner::Full(bytes) => {
                self.inner = Inner::Full(bytes.clone());
                return Ok(bytes);
            }
            Inner::Streaming(stream) => stream,
        };

        let mut stream = stream;
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => buf.extend_from_slice(&chunk),
                Err(e) => {
                    let message = e.to_string();
                    let prefix = buf.freeze();
                    let replay = stream::iter([Ok(prefix), Err(e)]).chain(stream);
                    self.inner = Inner::Streaming(Box::pin(replay));
                    return Err(message.into());
                }
            }
        }

        let bytes = buf.freeze();
        self.inner = Inner::Full(bytes.clone());
        Ok(bytes)
    }

    pub fn into_stream(self) -> BodyStream {
        match self.inner {
            Inner::Full(bytes) => Box::pin(stream::once(async move { Ok(bytes) })),
            Inner::Streaming(stream) => stream,
        }
    }
}

impl Default for Body {
    fn default() -> Self { Self::empty() }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Full(bytes) => f.debug_tuple("Body::Full").field(&bytes.len()).finish(),
            Inner::Streaming(_) => f.write_str("Body::Streaming"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self {
            inner: Inner::Full(bytes),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self { Self::from(Bytes::from(v)) }
}

impl From<String> for Body {
    fn from(s: String) -> Self { Self::from(Bytes::from(s)) }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self { Self::from(Bytes::from_static(s.as_bytes())) }
}
