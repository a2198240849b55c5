//! Helpers shared by the parser and the connection loop.

/// Returns early with `$error` unless `$predicate` holds.
///
/// Like `assert!`, but produces an error instead of panicking:
/// `ensure!(self.parser.is_idle(), ParseError::ConnectionClosed)`.
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
