//! Embedded-SQL preprocessor pipeline for COBOL sources.
//!
//! The [`Preprocessor`] drives an ordered chain of transformation steps:
//! [`consolidate::SourceConsolidation`] flattens COPY/INCLUDE references
//! into one buffer, [`parser::EsqlParser`] lifts the `EXEC SQL` windows
//! into an IR, and [`codegen::EsqlProcessor`] lowers the IR back to plain
//! COBOL calling the runtime bridge. The CLI assembles the chain, sets the
//! options map and calls [`Preprocessor::process`].

pub mod codegen;
pub mod consolidate;
pub mod copy;
pub mod error;
pub mod options;
pub mod parser;
pub mod step;

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};

use crate::error::{exit_code, ErrorData, PpError};
use crate::options::{keys, OptionValue, OptionsExt, OptionsMap};
use crate::step::{StepContext, TransformationStep, TransformationStepData};

pub use copy::CopyResolver;

/// Owns the step chain, the options map and the shared error record.
#[derive(Default)]
pub struct Preprocessor {
    steps: Vec<Box<dyn TransformationStep>>,
    options: OptionsMap,
    resolver: Option<Arc<CopyResolver>>,
    err_data: ErrorData,
    infile: String,
    outfile: String,
    verbose: bool,
    temp_files: Vec<PathBuf>,
    output: Option<TransformationStepData>,
}

impl Preprocessor {
    pub fn new() -> Preprocessor {
        Preprocessor::default()
    }

    pub fn set_copy_resolver(&mut self, resolver: Arc<CopyResolver>) {
        self.resolver = Some(resolver);
    }

    pub fn add_step(&mut self, step: Box<dyn TransformationStep>) {
        self.steps.push(step);
    }

    pub fn set_option(&mut self, key: &str, value: impl Into<OptionValue>) {
        self.options.insert(key.to_string(), value.into());
    }

    pub fn options(&self) -> &OptionsMap {
        &self.options
    }

    pub fn set_input_file(&mut self, path: impl Into<String>) {
        self.infile = path.into();
    }

    pub fn set_output_file(&mut self, path: impl Into<String>) {
        self.outfile = path.into();
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn err_data(&self) -> &ErrorData {
        &self.err_data
    }

    /// The last step's output, available after a successful `process()`.
    pub fn output(&self) -> Option<&TransformationStepData> {
        self.output.as_ref()
    }

    /// Run the whole pipeline. Returns false on failure with the numeric
    /// code and messages left in [`Preprocessor::err_data`]; an empty step
    /// list returns false with code 0.
    pub fn process(&mut self) -> bool {
        if self.steps.is_empty() {
            return false;
        }

        let input = TransformationStepData::of_filename(self.infile.clone());
        if !input.is_valid() {
            self.err_data
                .set_error(exit_code::BAD_INPUT, "invalid input file name");
            return false;
        }
        let no_output = self.options.get_bool(keys::NO_OUTPUT, false);
        if !no_output && self.outfile.is_empty() {
            self.err_data
                .set_error(exit_code::BAD_OUTPUT, "invalid output file name");
            return false;
        }
        if !input.is_valid_input() {
            self.err_data.set_error(
                exit_code::MISSING_INPUT,
                format!("input file {} does not exist", self.infile),
            );
            return false;
        }

        if self.verbose {
            self.echo_configuration();
        }

        match self.transform(input) {
            Ok(output) => {
                if !no_output {
                    if let Some(buffer) = output.buffer() {
                        if let Err(e) = std::fs::write(&self.outfile, buffer) {
                            self.err_data.set_error(
                                exit_code::BAD_OUTPUT,
                                format!("cannot write {}: {e}", self.outfile),
                            );
                            return false;
                        }
                    }
                }
                self.output = Some(output);
                if !self.options.get_bool(keys::KEEP_TEMP_FILES, false) {
                    for path in self.temp_files.drain(..) {
                        let _ = std::fs::remove_file(&path);
                    }
                }
                true
            }
            Err(e) => {
                self.err_data.set_error(e.code(), e.to_string());
                false
            }
        }
    }

    /// Chain the steps: step 0 reads the injected input, every later step
    /// reads its predecessor's output, the first failure stops the run.
    fn transform(
        &mut self,
        input: TransformationStepData,
    ) -> Result<TransformationStepData, PpError> {
        let mut steps = std::mem::take(&mut self.steps);
        let mut current = input;
        let mut failure: Option<PpError> = None;

        for step in steps.iter_mut() {
            debug!("running step {}", step.name());
            let mut ctx = StepContext {
                options: &self.options,
                resolver: self.resolver.as_deref(),
                err_data: &mut self.err_data,
                temp_files: &mut self.temp_files,
                input_file: &self.infile,
                output_file: &self.outfile,
            };
            match step.run(&mut ctx, &current) {
                Ok(next) => current = next,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        self.steps = steps;
        match failure {
            Some(e) => Err(e),
            None => Ok(current),
        }
    }

    fn echo_configuration(&self) {
        info!("input: {}", self.infile);
        info!("output: {}", self.outfile);
        if let Some(resolver) = &self.resolver {
            for dir in resolver.search_dirs() {
                info!("copy dir: {}", dir.display());
            }
            info!("copy extensions: {}", resolver.extensions().join(","));
        }
        let mut keys: Vec<&String> = self.options.keys().collect();
        keys.sort();
        for key in keys {
            info!("option {} = {}", key, self.options[key]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperStep;

    impl TransformationStep for UpperStep {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn run(
            &mut self,
            _ctx: &mut StepContext<'_>,
            input: &TransformationStepData,
        ) -> Result<TransformationStepData, PpError> {
            Ok(TransformationStepData::of_buffer(
                input.content()?.to_uppercase(),
            ))
        }
    }

    struct FailingStep;

    impl TransformationStep for FailingStep {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn run(
            &mut self,
            _ctx: &mut StepContext<'_>,
            _input: &TransformationStepData,
        ) -> Result<TransformationStepData, PpError> {
            Err(PpError::Generation("boom".to_string()))
        }
    }

    #[test]
    fn test_empty_pipeline_is_a_noop_failure() {
        let mut pp = Preprocessor::new();
        assert!(!pp.process());
        assert_eq!(pp.err_data().code, 0);
    }

    #[test]
    fn test_missing_input_file() {
        let mut pp = Preprocessor::new();
        pp.add_step(Box::new(UpperStep));
        pp.set_input_file("/no/such/input.cbl");
        pp.set_output_file("/tmp/out.cob");
        assert!(!pp.process());
        assert_eq!(pp.err_data().code, exit_code::MISSING_INPUT);
    }

    #[test]
    fn test_chain_feeds_successor_and_writes_output() {
        let tmp = tempfile::tempdir().unwrap();
        let infile = tmp.path().join("in.cbl");
        let outfile = tmp.path().join("out.cob");
        std::fs::write(&infile, "hello\n").unwrap();

        let mut pp = Preprocessor::new();
        pp.add_step(Box::new(UpperStep));
        pp.add_step(Box::new(UpperStep));
        pp.set_input_file(infile.to_string_lossy().to_string());
        pp.set_output_file(outfile.to_string_lossy().to_string());
        assert!(pp.process());
        assert_eq!(std::fs::read_to_string(&outfile).unwrap(), "HELLO\n");
    }

    #[test]
    fn test_first_failure_stops_the_pipeline() {
        let tmp = tempfile::tempdir().unwrap();
        let infile = tmp.path().join("in.cbl");
        std::fs::write(&infile, "hello\n").unwrap();

        let mut pp = Preprocessor::new();
        pp.add_step(Box::new(FailingStep));
        pp.add_step(Box::new(UpperStep));
        pp.set_input_file(infile.to_string_lossy().to_string());
        pp.set_output_file(tmp.path().join("out.cob").to_string_lossy().to_string());
        assert!(!pp.process());
        assert_eq!(pp.err_data().code, PpError::Generation(String::new()).code());
        assert!(pp.output().is_none());
    }
}
