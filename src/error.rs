use thiserror::Error;

/// Errors returned by index building and extraction.
///
/// A cancelled build is not an error: [`build_index`](crate::build_index)
/// reports it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum Error {
    /// The decompression engine reported corrupt data, a memory failure or a
    /// version mismatch. The engine state is unusable afterwards.
    #[error("zlib error {code}: {message}")]
    Codec { code: i32, message: String },

    /// The byte source ran out before the compressed data it was expected to hold.
    #[error("compressed source truncated: {0}")]
    TruncatedSource(&'static str),

    /// An operation was called in a session state that does not allow it.
    #[error("protocol misuse: {0}")]
    ProtocolMisuse(&'static str),

    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A persisted index could not be parsed or breaks the checkpoint invariants.
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    /// Propagated I/O error from the byte source or the index file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;

        match err {
            Error::Io(e) => e,
            Error::TruncatedSource(_) => std::io::Error::new(ErrorKind::UnexpectedEof, err),
            Error::InvalidArgument(_) => std::io::Error::new(ErrorKind::InvalidInput, err),
            Error::Codec { .. } | Error::InvalidIndex(_) => {
                std::io::Error::new(ErrorKind::InvalidData, err)
            }
            Error::ProtocolMisuse(_) => std::io::Error::other(err),
        }
    }
}
