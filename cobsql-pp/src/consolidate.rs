use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::copy::CopyResolver;
use crate::error::PpError;
use crate::options::{keys, OptionsExt};
use crate::step::{StepContext, TransformationStep, TransformationStepData};

/// Marker comment emitted before the lines of an included file; the payload
/// is the absolute path. The parser rebuilds original source locations from
/// these, the generator drops them.
pub const FILE_PUSH_MARKER: &str = "*>CBSQL-FILE-PUSH";
/// Marker comment emitted after the lines of an included file.
pub const FILE_POP_MARKER: &str = "*>CBSQL-FILE-POP";

/// Pseudo-filename pushed around the built-in SQLCA expansion.
pub const SQLCA_NAME: &str = "SQLCA";

/// The communication area spliced in by `EXEC SQL INCLUDE SQLCA END-EXEC`.
const SQLCA_SRC: &str = "\
       01  SQLCA.
           05  SQLCAID       PIC X(8) VALUE \"SQLCA   \".
           05  SQLCABC       PIC S9(9) COMP-5 VALUE 136.
           05  SQLCODE       PIC S9(9) COMP-5 VALUE 0.
           05  SQLERRM.
               49  SQLERRML  PIC S9(4) COMP-5.
               49  SQLERRMC  PIC X(70).
           05  SQLERRP       PIC X(8).
           05  SQLERRD       PIC S9(9) COMP-5 OCCURS 6 TIMES.
           05  SQLWARN       PIC X(8).
           05  SQLSTATE      PIC X(5).
";

/// True for fixed-format (`*` in the indicator column) and floating `*>`
/// comment lines. Marker lines also satisfy this; callers that care check
/// for markers first.
pub(crate) fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with("*>") {
        return true;
    }
    let bytes = line.as_bytes();
    bytes.len() >= 7 && (bytes[6] == b'*' || bytes[6] == b'/')
}

#[derive(Debug)]
struct IncludeDirective {
    name: String,
    replacing: Option<String>,
    is_sqlca: bool,
}

fn strip_name(token: &str) -> String {
    token
        .trim_end_matches('.')
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string()
}

/// Recognise `COPY name [REPLACING …].` (only when copy preprocessing is
/// on) and `EXEC SQL INCLUDE name END-EXEC` on a single line.
fn parse_include_directive(line: &str, allow_copy: bool) -> Option<IncludeDirective> {
    if is_comment_line(line) {
        return None;
    }
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    if allow_copy && tokens[0].eq_ignore_ascii_case("COPY") && tokens.len() >= 2 {
        let name = strip_name(tokens[1]);
        let replacing = if tokens.len() > 2 && tokens[2].eq_ignore_ascii_case("REPLACING") {
            Some(tokens[2..].join(" ").trim_end_matches('.').to_string())
        } else {
            None
        };
        return Some(IncludeDirective {
            name,
            replacing,
            is_sqlca: false,
        });
    }

    if tokens.len() >= 5
        && tokens[0].eq_ignore_ascii_case("EXEC")
        && tokens[1].eq_ignore_ascii_case("SQL")
        && tokens[2].eq_ignore_ascii_case("INCLUDE")
        && tokens[4]
            .trim_end_matches('.')
            .eq_ignore_ascii_case("END-EXEC")
    {
        let name = strip_name(tokens[3]);
        let is_sqlca = name.eq_ignore_ascii_case(SQLCA_NAME);
        return Some(IncludeDirective {
            name,
            replacing: None,
            is_sqlca,
        });
    }

    None
}

/// Pipeline stage that produces one flat buffer by recursively inlining
/// copybook references, bracketing every inclusion with push/pop markers.
#[derive(Debug, Default)]
pub struct SourceConsolidation;

impl SourceConsolidation {
    pub fn new() -> SourceConsolidation {
        SourceConsolidation
    }
}

struct Consolidator<'a> {
    resolver: Option<&'a CopyResolver>,
    preprocess_copy: bool,
    emit_debug_info: bool,
    // inclusion origins, innermost last
    stack: Vec<(PathBuf, u32)>,
    out: String,
}

impl<'a> Consolidator<'a> {
    fn cycle_message(&self, repeated: &Path) -> String {
        let mut parts: Vec<String> = self
            .stack
            .iter()
            .map(|(p, line)| format!("{}:{}", p.display(), line))
            .collect();
        parts.push(repeated.display().to_string());
        parts.join(" -> ")
    }

    fn push_marker(&mut self, path: &Path) {
        self.out
            .push_str(&format!("{} {}\n", FILE_PUSH_MARKER, path.display()));
    }

    fn pop_marker(&mut self) {
        self.out.push_str(FILE_POP_MARKER);
        self.out.push('\n');
    }

    fn splice_sqlca(&mut self) {
        self.out
            .push_str(&format!("{} {}\n", FILE_PUSH_MARKER, SQLCA_NAME));
        self.out.push_str(SQLCA_SRC);
        self.pop_marker();
    }

    fn expand_file(&mut self, path: &Path) -> Result<(), PpError> {
        let canonical = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        if self.stack.iter().any(|(p, _)| *p == canonical) {
            return Err(PpError::CopyCycle(self.cycle_message(&canonical)));
        }

        let content = fs::read_to_string(&canonical)?;
        self.stack.push((canonical.clone(), 0));
        self.push_marker(&canonical);

        for line in content.lines() {
            if let Some(top) = self.stack.last_mut() {
                top.1 += 1;
            }
            match parse_include_directive(line, self.preprocess_copy) {
                Some(directive) if directive.is_sqlca => {
                    self.splice_sqlca();
                }
                Some(directive) => {
                    if let Some(replacing) = &directive.replacing {
                        if self.emit_debug_info {
                            self.out
                                .push_str(&format!("*> {} {}\n", directive.name, replacing));
                        } else {
                            warn!(
                                "REPLACING clause on copybook {} is not applied",
                                directive.name
                            );
                        }
                    }
                    let resolved = self
                        .resolver
                        .and_then(|r| r.resolve(&directive.name))
                        .ok_or_else(|| PpError::CopyNotFound(directive.name.clone()))?;
                    debug!("inlining copybook {}", resolved.display());
                    self.expand_file(&resolved)?;
                }
                None => {
                    self.out.push_str(line);
                    self.out.push('\n');
                }
            }
        }

        self.pop_marker();
        self.stack.pop();
        Ok(())
    }
}

impl TransformationStep for SourceConsolidation {
    fn name(&self) -> &'static str {
        "consolidation"
    }

    fn run(
        &mut self,
        ctx: &mut StepContext<'_>,
        input: &TransformationStepData,
    ) -> Result<TransformationStepData, PpError> {
        if !input.is_valid_input() || input.filename().is_empty() {
            return Err(PpError::InvalidInput);
        }

        let mut consolidator = Consolidator {
            resolver: ctx.resolver,
            preprocess_copy: ctx.options.get_bool(keys::PREPROCESS_COPY_FILES, false),
            emit_debug_info: ctx.options.get_bool(keys::EMIT_DEBUG_INFO, false),
            stack: Vec::new(),
            out: String::new(),
        };
        consolidator.expand_file(Path::new(input.filename()))?;

        if ctx.options.get_bool(keys::CONSOLIDATED_MAP, false) && !ctx.output_file.is_empty() {
            let dump = PathBuf::from(format!("{}.consolidated", ctx.output_file));
            fs::write(&dump, &consolidator.out)?;
            ctx.temp_files.push(dump);
        }

        Ok(TransformationStepData::of_buffer(consolidator.out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_detection() {
        assert!(is_comment_line("      * fixed comment"));
        assert!(is_comment_line("*> floating"));
        assert!(is_comment_line("       *> area-B floating"));
        assert!(!is_comment_line("       MOVE A TO B."));
    }

    #[test]
    fn test_directive_recognition() {
        let d = parse_include_directive("       COPY FOO.", true).unwrap();
        assert_eq!(d.name, "FOO");
        assert!(parse_include_directive("       COPY FOO.", false).is_none());

        let d =
            parse_include_directive("       EXEC SQL INCLUDE EMPREC END-EXEC.", false).unwrap();
        assert_eq!(d.name, "EMPREC");
        assert!(!d.is_sqlca);

        let d = parse_include_directive("       EXEC SQL INCLUDE SQLCA END-EXEC", false).unwrap();
        assert!(d.is_sqlca);

        assert!(parse_include_directive("      * COPY FOO.", true).is_none());
    }

    #[test]
    fn test_replacing_clause_captured() {
        let d = parse_include_directive("       COPY FOO REPLACING ==A== BY ==B==.", true).unwrap();
        assert_eq!(d.replacing.as_deref(), Some("REPLACING ==A== BY ==B=="));
    }
}
