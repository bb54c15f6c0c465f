/// Error type for this crate, shared by the writer, the reader and the
/// serde adapters. Transaction failures have their own status type in
/// [`crate::soi2c`].
#[derive(Debug, ::thiserror::Error)]
pub enum Error {
    /// Errors that don't fit into any other category.
    #[error("{0}")]
    Generic(String),

    /// The buffer filled up and could not grow.
    #[error("buffer overrun")]
    Overrun,

    /// The bytes are not a JSONB frame (envelope missing or damaged).
    #[error("not a jsonb frame")]
    Frame,

    /// A record ran past the end of the decoded payload.
    #[error("truncated record")]
    Truncated,

    /// A tag byte that names no known record kind.
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    /// Errors related to usage of unsupported types.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Errors related to values that are not valid for the given type.
    #[error("invalid {0}")]
    Invalid(String),
}

/// Result type for this crate.
pub type Result<T> = ::std::result::Result<T, Error>;

impl ::serde::de::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        Self::Generic(msg.to_string())
    }
}

impl ::serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        Self::Generic(msg.to_string())
    }
}
