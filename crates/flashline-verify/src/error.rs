use std::io;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("digest mismatch: expected {}, got {}", hex::encode(.expected), hex::encode(.actual))]
    Mismatch {
        expected: Vec<u8>,
        actual:   Vec<u8>,
    },

    #[error("signature does not match the data")]
    BadSignature,

    #[error("malformed signature: {0}")]
    SignatureMalformed(String),

    #[error("malformed key: {0}")]
    KeyMalformed(String),

    #[error("signature context is {0} bytes, at most 255 allowed")]
    ContextTooLong(usize),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
