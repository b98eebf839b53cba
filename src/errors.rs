use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to resolve host {host}")]
    Resolve { host: String },

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("datagram from unknown source {0}")]
    UnknownSource(SocketAddr),

    #[error("bad framing prefix {0:#010x}")]
    BadFraming(i32),

    #[error("response truncated at offset {0}")]
    Truncated(usize),

    #[error("unterminated string at offset {0}")]
    TruncatedString(usize),

    #[error("unexpected response type {0:#04x}")]
    UnexpectedResponseType(u8),

    #[error("response type {kind:#04x} out of order in stage {stage}")]
    OutOfOrder { kind: u8, stage: &'static str },

    #[error("decompressed payload checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    Checksum { expected: u32, actual: u32 },

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("malformed multi-packet fragment: {0}")]
    Fragment(String),

    #[error("invalid request kind {0:#04x}")]
    InvalidRequestKind(u8),
}

pub type Result<T> = std::result::Result<T, Error>;
