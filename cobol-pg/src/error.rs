use thiserror::Error;

#[derive(Debug, Error)]
pub enum CobConvError {
    #[error("value {0} does not fit in {1} digit(s)")]
    FieldOverflow(String, u32),

    #[error("negative value {0} in unsigned field")]
    NegativeUnsigned(String),

    #[error("invalid digit byte 0x{0:02x}")]
    BadDigit(u8),

    #[error("invalid sign byte 0x{0:02x}")]
    BadSign(u8),

    #[error("invalid packed-decimal nibble 0x{0:x}")]
    BadNibble(u8),

    #[error("invalid decimal literal {0:?}")]
    BadDecimal(String),

    #[error("field storage is {expected} byte(s), got {actual}")]
    BadFieldSize { expected: usize, actual: usize },

    #[error("varlen prefix {0} exceeds the field capacity")]
    BadVarlenPrefix(u32),

    #[error("value of {0} byte(s) does not fit in {1}")]
    Truncated(usize, usize),

    #[error("no text representation for column type {0}")]
    UnsupportedColumnType(String),

    #[error(transparent)]
    Db(#[from] tokio_postgres::Error),
}

pub type CobConvResult<T> = Result<T, CobConvError>;
