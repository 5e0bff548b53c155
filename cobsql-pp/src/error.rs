use thiserror::Error;

/// Process-level exit codes shared with the CLI.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const BAD_INPUT: i32 = 1;
    pub const BAD_OUTPUT: i32 = 2;
    pub const MISSING_INPUT: i32 = 4;
}

#[derive(Debug, Error)]
pub enum PpError {
    #[error("copybook {0} not found")]
    CopyNotFound(String),

    #[error("copybook inclusion cycle: {0}")]
    CopyCycle(String),

    #[error("{file}:{line}: syntax error: {message}")]
    Syntax {
        file: String,
        line: u32,
        message: String,
    },

    #[error("unexpected end of file: {0}")]
    UnexpectedEof(String),

    #[error("{file}:{line}: duplicate declaration of {name}")]
    DuplicateDeclare {
        file: String,
        line: u32,
        name: String,
    },

    #[error("code generation failed: {0}")]
    Generation(String),

    #[error("step input is not valid")]
    InvalidInput,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PpError {
    /// Numeric code reported through [`ErrorData`]; the CLI uses it as the
    /// process exit status.
    pub fn code(&self) -> i32 {
        match self {
            PpError::CopyNotFound(_) => 8,
            PpError::CopyCycle(_) => 9,
            PpError::Syntax { .. } => 16,
            PpError::UnexpectedEof(_) => 17,
            PpError::DuplicateDeclare { .. } => 18,
            PpError::Generation(_) => 19,
            PpError::InvalidInput => exit_code::BAD_INPUT,
            PpError::Io(_) => 20,
        }
    }
}

/// Outcome record shared by all pipeline steps: 0 means success, messages
/// accumulate in order. Warnings never stop the run.
#[derive(Debug, Default)]
pub struct ErrorData {
    pub code: i32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ErrorData {
    pub fn new() -> ErrorData {
        ErrorData::default()
    }

    pub fn ok(&self) -> bool {
        self.code == 0
    }

    pub fn set_error(&mut self, code: i32, message: impl Into<String>) {
        self.code = code;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_data_accumulates() {
        let mut e = ErrorData::new();
        assert!(e.ok());
        e.add_warning("w1");
        assert!(e.ok());
        e.set_error(4, "missing input");
        assert!(!e.ok());
        assert_eq!(e.code, 4);
        assert_eq!(e.errors.len(), 1);
        assert_eq!(e.warnings.len(), 1);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(PpError::CopyNotFound("X".into()).code(), 8);
        assert_eq!(PpError::InvalidInput.code(), exit_code::BAD_INPUT);
    }
}
