use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::copy::CopyResolver;
use crate::error::{ErrorData, PpError};
use crate::options::OptionsMap;
use crate::parser::ir::EsqlProgram;

/// What a step hands to its successor: either a file on disk or an
/// in-memory buffer. The parser additionally attaches the IR it produced,
/// shared by reference with the generator step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepDataKind {
    #[default]
    Filename,
    Buffer,
}

#[derive(Debug, Clone, Default)]
pub struct TransformationStepData {
    kind: StepDataKind,
    filename: String,
    buffer: Option<Arc<String>>,
    pub program: Option<Arc<EsqlProgram>>,
}

impl TransformationStepData {
    pub fn of_filename(path: impl Into<String>) -> TransformationStepData {
        TransformationStepData {
            kind: StepDataKind::Filename,
            filename: path.into(),
            ..Default::default()
        }
    }

    pub fn of_buffer(content: String) -> TransformationStepData {
        TransformationStepData {
            kind: StepDataKind::Buffer,
            buffer: Some(Arc::new(content)),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> StepDataKind {
        self.kind
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn buffer(&self) -> Option<&str> {
        self.buffer.as_deref().map(String::as_str)
    }

    /// A Filename is valid when the path is non-empty; a Buffer when the
    /// content is present.
    pub fn is_valid(&self) -> bool {
        match self.kind {
            StepDataKind::Filename => !self.filename.is_empty(),
            StepDataKind::Buffer => self.buffer.is_some(),
        }
    }

    /// Valid as a pipeline *input*: an existing file, or a present buffer.
    pub fn is_valid_input(&self) -> bool {
        match self.kind {
            StepDataKind::Filename => self.is_valid() && Path::new(&self.filename).is_file(),
            StepDataKind::Buffer => self.is_valid(),
        }
    }

    /// The textual content, reading the file when the payload is a name.
    pub fn content(&self) -> Result<String, PpError> {
        match self.kind {
            StepDataKind::Buffer => self
                .buffer
                .as_ref()
                .map(|b| b.as_ref().clone())
                .ok_or(PpError::InvalidInput),
            StepDataKind::Filename => {
                if !self.is_valid() {
                    return Err(PpError::InvalidInput);
                }
                Ok(std::fs::read_to_string(&self.filename)?)
            }
        }
    }
}

/// Everything a step may consult while running. The options map is
/// read-only for steps; the error record and temp-file list are shared
/// with the driver.
pub struct StepContext<'a> {
    pub options: &'a OptionsMap,
    pub resolver: Option<&'a CopyResolver>,
    pub err_data: &'a mut ErrorData,
    pub temp_files: &'a mut Vec<PathBuf>,
    pub input_file: &'a str,
    pub output_file: &'a str,
}

/// One stage of the translation pipeline: read the predecessor's output,
/// do the work, produce this stage's output.
pub trait TransformationStep {
    fn name(&self) -> &'static str;

    fn run(
        &mut self,
        ctx: &mut StepContext<'_>,
        input: &TransformationStepData,
    ) -> Result<TransformationStepData, PpError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_validity() {
        let empty = TransformationStepData::of_filename("");
        assert!(!empty.is_valid());

        let missing = TransformationStepData::of_filename("/no/such/file.cbl");
        assert!(missing.is_valid());
        assert!(!missing.is_valid_input());
    }

    #[test]
    fn test_buffer_content() {
        let data = TransformationStepData::of_buffer("abc".to_string());
        assert!(data.is_valid());
        assert!(data.is_valid_input());
        assert_eq!(data.content().unwrap(), "abc");
    }
}
