use std::fmt;

/// Protocol versions the parser accepts on the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    Http10,
    #[default]
    Http11,
}

impl Protocol {
    pub fn from_bytes(bytes: &[u8]) -> Option<Protocol> {
        match bytes {
            b"HTTP/1.1" => Some(Protocol::Http11),
            b"HTTP/1.0" => Some(Protocol::Http10),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http10 => "HTTP/1.0",
            Protocol::Http11 => "HTTP/1.1",
        }
    }

    /// Whether connections stay open when the request says nothing about it.
    #[inline]
    pub fn keep_alive_by_default(&self) -> bool {
        matches!(self, Protocol::Http11)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
