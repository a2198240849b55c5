//! Token-keyed registry of request body content decoders.
//!
//! The parser only checks that a `Content-Encoding` token is known; the connection asks the
//! registry for a fresh [`ContentDecoder`] per request and runs every decoded body span through
//! it before the handler sees it.

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::Bytes;

/// Stateful decoder for one request body.
pub trait ContentDecoder: Send {
    /// Decodes the next span of the encoded body. May return an empty span.
    fn decode(&mut self, encoded: Bytes) -> io::Result<Bytes>;

    /// Flushes whatever is still buffered once the encoded body ended.
    fn finish(&mut self) -> io::Result<Bytes> {
        Ok(Bytes::new())
    }
}

/// Factory registered under a content-coding token.
pub trait ContentCoding: Send + Sync {
    fn decoder(&self) -> Box<dyn ContentDecoder>;
}

impl<F> ContentCoding for F
where
    F: Fn() -> Box<dyn ContentDecoder> + Send + Sync,
{
    fn decoder(&self) -> Box<dyn ContentDecoder> {
        (self)()
    }
}

/// Ordered association list of lower-case token to decoder factory.
#[derive(Clone, Default)]
pub struct ContentDecoders {
    entries: Vec<(String, Arc<dyn ContentCoding>)>,
}

pub const IDENTITY: &str = "identity";

impl ContentDecoders {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Registers `coding` under `token`, replacing an earlier registration of the same token.
    pub fn register(&mut self, token: &str, coding: impl ContentCoding + 'static) {
        let token = token.trim().to_ascii_lowercase();
        let coding: Arc<dyn ContentCoding> = Arc::new(coding);
        match self.entries.iter_mut().find(|(t, _)| *t == token) {
            Some(entry) => entry.1 = coding,
            None => self.entries.push((token, coding)),
        }
    }

    /// Whether `token` names a known coding; `identity` always does.
    pub fn supports(&self, token: &str) -> bool {
        token == IDENTITY || self.entries.iter().any(|(t, _)| t == token)
    }

    /// A fresh decoder for a lower-case `token`, `None` when unsupported or `identity`.
    pub fn decoder(&self, token: &str) -> Option<Box<dyn ContentDecoder>> {
        self.entries.iter().find(|(t, _)| t == token).map(|(_, coding)| coding.decoder())
    }

    /// Registered tokens in registration order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }
}

impl fmt::Debug for ContentDecoders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tokens()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl ContentDecoder for Upper {
        fn decode(&mut self, encoded: Bytes) -> io::Result<Bytes> {
            Ok(Bytes::from(encoded.to_ascii_uppercase()))
        }
    }

    #[test]
    fn lookup_by_token() {
        let mut decoders = ContentDecoders::new();
        decoders.register("X-Upper", || Box::new(Upper) as Box<dyn ContentDecoder>);

        assert!(decoders.supports("x-upper"));
        assert!(decoders.supports(IDENTITY));
        assert!(!decoders.supports("gzip"));
        assert!(decoders.decoder(IDENTITY).is_none());

        let mut decoder = decoders.decoder("x-upper").unwrap();
        assert_eq!(&decoder.decode(Bytes::from_static(b"abc")).unwrap()[..], b"ABC");
        assert_eq!(decoders.tokens().collect::<Vec<_>>(), vec!["x-upper"]);
    }
}
