//! Lexing and parsing of the consolidated buffer into the ESQL IR.
//!
//! The scanner is line oriented: fixed-format comments are skipped,
//! consolidation markers drive source-location tracking, and every
//! `EXEC SQL … END-EXEC` window (which may span physical lines) is gathered
//! into one token run and dispatched on its verb.

pub mod ir;
pub mod pic;

use std::sync::Arc;

use log::debug;

use crate::consolidate::{is_comment_line, FILE_POP_MARKER, FILE_PUSH_MARKER};
use crate::error::PpError;
use crate::options::{keys, OptionsExt};
use crate::step::{StepContext, TransformationStep, TransformationStepData};
use cobol_pg::{CobField, CobolVarType, FLAG_NONE};
use ir::{
    ConnectSpec, CursorDecl, EsqlProgram, EsqlStmt, EsqlVerb, FetchDirection, HostVarDecl,
    SourceLoc, SqlSource,
};
use pic::PicEntry;

/// Case-insensitive substring search over ASCII text.
fn find_ci(hay: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    hay.as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Rewrite `:name` and legacy `?` markers to `$1, $2, …` in first-appearance
/// order, skipping quoted runs and `::` casts. Returns the rewritten text
/// and the referenced names, one per placeholder position (`?` markers
/// record the pseudo-name `?`; an attached null indicator `:var:ind` is
/// recorded as `var:ind`).
pub fn rewrite_params(sql: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut vars: Vec<String> = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut in_squote = false;
    let mut in_dquote = false;

    while let Some(c) = chars.next() {
        if in_squote {
            out.push(c);
            if c == '\'' {
                in_squote = false;
            }
            continue;
        }
        if in_dquote {
            out.push(c);
            if c == '"' {
                in_dquote = false;
            }
            continue;
        }
        match c {
            '\'' => {
                in_squote = true;
                out.push(c);
            }
            '"' => {
                in_dquote = true;
                out.push(c);
            }
            ':' => {
                if chars.peek() == Some(&':') {
                    chars.next();
                    out.push_str("::");
                } else if chars
                    .peek()
                    .map(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .unwrap_or(false)
                {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    // attached null indicator, :var:ind (but not a :: cast)
                    if chars.peek() == Some(&':') {
                        let mut ahead = chars.clone();
                        ahead.next();
                        if ahead
                            .peek()
                            .map(|c| c.is_ascii_alphanumeric() || *c == '_')
                            .unwrap_or(false)
                        {
                            chars.next();
                            name.push(':');
                            while let Some(&c) = chars.peek() {
                                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                                    name.push(c);
                                    chars.next();
                                } else {
                                    break;
                                }
                            }
                        }
                    }
                    vars.push(name);
                    out.push_str(&format!("${}", vars.len()));
                } else {
                    out.push(c);
                }
            }
            '?' => {
                vars.push("?".to_string());
                out.push_str(&format!("${}", vars.len()));
            }
            _ => out.push(c),
        }
    }
    (out, vars)
}

/// Split a statement's text into whitespace-separated words, keeping quoted
/// strings together.
fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                    current.push(c);
                } else if c.is_whitespace() {
                    if !current.is_empty() {
                        words.push(std::mem::take(&mut current));
                    }
                } else {
                    current.push(c);
                }
            }
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn parse_source(word: &str) -> SqlSource {
    if let Some(name) = word.strip_prefix(':') {
        SqlSource::HostVar(name.to_string())
    } else {
        SqlSource::Literal(word.trim_matches(|c| c == '\'' || c == '"').to_string())
    }
}

fn host_ref(word: &str) -> Option<String> {
    word.trim_end_matches(',')
        .strip_prefix(':')
        .map(str::to_string)
}

/// Tracks the original (file, line) of every consolidated line via the
/// push/pop markers.
struct LocTracker {
    stack: Vec<(String, u32)>,
}

impl LocTracker {
    fn new() -> LocTracker {
        LocTracker { stack: Vec::new() }
    }

    /// Consume a marker line; returns false when the line is ordinary text.
    fn observe_marker(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if let Some(path) = trimmed.strip_prefix(FILE_PUSH_MARKER) {
            self.stack.push((path.trim().to_string(), 0));
            true
        } else if trimmed == FILE_POP_MARKER {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    fn bump(&mut self) {
        if let Some(top) = self.stack.last_mut() {
            top.1 += 1;
        }
    }

    fn loc(&self, column: u32) -> SourceLoc {
        let (file, line) = self
            .stack
            .last()
            .cloned()
            .unwrap_or_else(|| ("<buffer>".to_string(), 0));
        SourceLoc { file, line, column }
    }
}

/// Pipeline stage: consolidated buffer in, same buffer out with the parsed
/// program attached for the generator step.
#[derive(Debug, Default)]
pub struct EsqlParser;

impl EsqlParser {
    pub fn new() -> EsqlParser {
        EsqlParser
    }
}

pub(crate) fn parse_program(
    buffer: &str,
    ctx: &mut StepContext<'_>,
) -> Result<EsqlProgram, PpError> {
    let suffixes = ctx.options.get_str(keys::VARLEN_SUFFIXES, "LEN,ARR").to_string();
    let (len_sfx, arr_sfx) = suffixes
        .split_once(',')
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .unwrap_or_else(|| ("LEN".to_string(), "ARR".to_string()));
    let trace = ctx.options.get_bool(keys::DEBUG_PARSER_SCANNER, false);

    let lines: Vec<&str> = buffer.lines().collect();
    let mut program = EsqlProgram::default();
    let mut tracker = LocTracker::new();
    let mut in_declare = false;
    let mut pending_group: Option<(String, Vec<PicEntry>, SourceLoc, usize)> = None;
    let mut next_stmt_id: u32 = 0;

    let mut i = 0usize;
    while i < lines.len() {
        let line = lines[i];
        if tracker.observe_marker(line) {
            i += 1;
            continue;
        }
        tracker.bump();
        if is_comment_line(line) {
            i += 1;
            continue;
        }

        if let Some(col) = find_ci(line, "EXEC SQL") {
            let loc = tracker.loc(col as u32 + 1);
            let start = i;
            let mut pieces: Vec<String> = Vec::new();
            let mut j = i;
            let mut first_piece = line[col..].to_string();
            loop {
                let piece = if j == start {
                    std::mem::take(&mut first_piece)
                } else {
                    tracker.bump();
                    lines[j].to_string()
                };
                if let Some(end) = find_ci(&piece, "END-EXEC") {
                    pieces.push(piece[..end].to_string());
                    break;
                }
                if !is_comment_line(&piece) {
                    pieces.push(piece);
                }
                j += 1;
                if j == lines.len() {
                    return Err(PpError::UnexpectedEof(format!(
                        "{}:{}: END-EXEC not found",
                        loc.file, loc.line
                    )));
                }
            }
            let text = pieces.join(" ");
            if trace {
                debug!("esql window at {}:{}: {}", loc.file, loc.line, text.trim());
            }

            flush_group(
                &mut program,
                &mut pending_group,
                &(len_sfx.clone(), arr_sfx.clone()),
                ctx,
            )?;
            dispatch_statement(
                &text,
                loc,
                (start, j),
                &mut program,
                &mut in_declare,
                &mut next_stmt_id,
                ctx,
            )?;
            i = j + 1;
            continue;
        }

        if in_declare {
            handle_declaration_line(
                line,
                i,
                &tracker,
                &mut program,
                &mut pending_group,
                &(len_sfx.clone(), arr_sfx.clone()),
                ctx,
            )?;
        }
        i += 1;
    }

    if in_declare {
        return Err(PpError::UnexpectedEof(
            "END DECLARE SECTION not found".to_string(),
        ));
    }
    flush_group(&mut program, &mut pending_group, &(len_sfx, arr_sfx), ctx)?;
    Ok(program)
}

fn register_host_var(program: &mut EsqlProgram, var: HostVarDecl) -> Result<(), PpError> {
    if program.host_var(&var.name).is_some() {
        return Err(PpError::DuplicateDeclare {
            file: var.loc.file.clone(),
            line: var.loc.line,
            name: var.name.clone(),
        });
    }
    program.host_vars.push(var);
    Ok(())
}

fn handle_declaration_line(
    line: &str,
    line_idx: usize,
    tracker: &LocTracker,
    program: &mut EsqlProgram,
    pending: &mut Option<(String, Vec<PicEntry>, SourceLoc, usize)>,
    suffixes: &(String, String),
    ctx: &mut StepContext<'_>,
) -> Result<(), PpError> {
    let loc = tracker.loc(1);
    match pic::parse_declaration(line) {
        None => Ok(()),
        Some(Err(message)) => Err(PpError::Syntax {
            file: loc.file,
            line: loc.line,
            message,
        }),
        Some(Ok(pic::Declaration::Group(group))) => {
            flush_group(program, pending, suffixes, ctx)?;
            if group.level == 1 {
                *pending = Some((group.name, Vec::new(), loc, line_idx));
                Ok(())
            } else {
                Err(PpError::Syntax {
                    file: loc.file,
                    line: loc.line,
                    message: format!("group item {} must be level 01", group.name),
                })
            }
        }
        Some(Ok(pic::Declaration::Elementary(entry))) => {
            if let Some((_, children, _, _)) = pending.as_mut() {
                if entry.level > 1 && entry.level != 77 {
                    children.push(entry);
                    return Ok(());
                }
            }
            flush_group(program, pending, suffixes, ctx)?;
            register_host_var(
                program,
                HostVarDecl {
                    name: entry.name,
                    level: entry.level,
                    var_type: entry.var_type,
                    length: entry.length,
                    scale: entry.scale,
                    varlen: false,
                    loc,
                    span_line: line_idx,
                },
            )
        }
    }
}

/// Close out a pending `01 NAME.` group. A group of exactly the two
/// configured counter/payload subfields becomes one varlen host variable;
/// anything else flattens to alphanumeric storage of the summed size.
fn flush_group(
    program: &mut EsqlProgram,
    pending: &mut Option<(String, Vec<PicEntry>, SourceLoc, usize)>,
    suffixes: &(String, String),
    ctx: &mut StepContext<'_>,
) -> Result<(), PpError> {
    let Some((name, children, loc, span_line)) = pending.take() else {
        return Ok(());
    };
    if children.is_empty() {
        ctx.err_data
            .add_warning(format!("group {name} has no subfields, ignored"));
        return Ok(());
    }

    let len_name = format!("{}-{}", name, suffixes.0);
    let arr_name = format!("{}-{}", name, suffixes.1);
    let is_varlen = children.len() == 2
        && children[0].name.eq_ignore_ascii_case(&len_name)
        && children[0].var_type.is_numeric()
        && children[1].name.eq_ignore_ascii_case(&arr_name)
        && !children[1].var_type.is_numeric();

    let var = if is_varlen {
        HostVarDecl {
            name,
            level: 1,
            var_type: children[1].var_type,
            length: children[1].length,
            scale: 0,
            varlen: true,
            loc,
            span_line,
        }
    } else {
        let total: usize = children
            .iter()
            .map(|c| CobField::new(c.var_type, c.length, c.scale, FLAG_NONE).storage_size())
            .sum();
        HostVarDecl {
            name,
            level: 1,
            var_type: CobolVarType::Alphanumeric,
            length: total as u32,
            scale: 0,
            varlen: false,
            loc,
            span_line,
        }
    };
    register_host_var(program, var)
}

fn syntax_error(loc: &SourceLoc, message: impl Into<String>) -> PpError {
    PpError::Syntax {
        file: loc.file.clone(),
        line: loc.line,
        message: message.into(),
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_statement(
    text: &str,
    loc: SourceLoc,
    span: (usize, usize),
    program: &mut EsqlProgram,
    in_declare: &mut bool,
    next_stmt_id: &mut u32,
    ctx: &mut StepContext<'_>,
) -> Result<(), PpError> {
    let words = split_words(text);
    // strip the EXEC SQL introducer
    if words.len() < 2
        || !words[0].eq_ignore_ascii_case("EXEC")
        || !words[1].eq_ignore_ascii_case("SQL")
    {
        return Err(syntax_error(&loc, "statement does not start with EXEC SQL"));
    }
    let words = &words[2..];
    if words.is_empty() {
        return Err(syntax_error(&loc, "empty EXEC SQL statement"));
    }
    let kw = |i: usize| words.get(i).map(|w| w.to_ascii_uppercase());

    match kw(0).as_deref() {
        Some("BEGIN") if kw(1).as_deref() == Some("DECLARE") => {
            *in_declare = true;
            program.passive_spans.push(span);
            return Ok(());
        }
        Some("END") if kw(1).as_deref() == Some("DECLARE") => {
            *in_declare = false;
            program.passive_spans.push(span);
            return Ok(());
        }
        Some("WHENEVER") => {
            ctx.err_data
                .add_warning(format!("{}:{}: WHENEVER is ignored", loc.file, loc.line));
            program.passive_spans.push(span);
            return Ok(());
        }
        Some("INCLUDE") => {
            return Err(syntax_error(&loc, "unresolved EXEC SQL INCLUDE"));
        }
        _ => {}
    }

    *next_stmt_id += 1;
    let mut stmt = EsqlStmt::new(*next_stmt_id, EsqlVerb::Dml, loc.clone(), span);

    match kw(0).as_deref() {
        Some("CONNECT") => {
            stmt.verb = EsqlVerb::Connect;
            let mut spec = ConnectSpec::default();
            let mut i = 1;
            if kw(1).as_deref() == Some("TO") {
                spec.data_source = Some(parse_source(
                    words.get(2).ok_or_else(|| syntax_error(&loc, "CONNECT TO needs a data source"))?,
                ));
                i = 3;
            } else if words.len() > 1 {
                spec.user = Some(parse_source(&words[1]));
                i = 2;
            }
            while i < words.len() {
                match kw(i).as_deref() {
                    Some("AS") => {
                        spec.connection_name = words.get(i + 1).cloned();
                        i += 2;
                    }
                    Some("USER") => {
                        spec.user = words.get(i + 1).map(|w| parse_source(w));
                        i += 2;
                    }
                    Some("USING") | Some("IDENTIFIED") => {
                        let skip = if kw(i).as_deref() == Some("IDENTIFIED") { 2 } else { 1 };
                        spec.password = words.get(i + skip).map(|w| parse_source(w));
                        i += skip + 1;
                    }
                    Some("AT") => {
                        spec.data_source = words.get(i + 1).map(|w| parse_source(w));
                        i += 2;
                    }
                    _ => return Err(syntax_error(&loc, format!("unexpected token {}", words[i]))),
                }
            }
            stmt.connect = Some(spec);
        }
        Some("DISCONNECT") => {
            stmt.verb = EsqlVerb::Disconnect;
            stmt.target = words.get(1).cloned();
        }
        Some("DECLARE") => {
            stmt.verb = EsqlVerb::DeclareCursor;
            let name = words
                .get(1)
                .ok_or_else(|| syntax_error(&loc, "DECLARE needs a cursor name"))?
                .clone();
            if kw(2).as_deref() != Some("CURSOR") {
                return Err(syntax_error(&loc, "expected CURSOR"));
            }
            let mut i = 3;
            let mut with_hold = false;
            if kw(i).as_deref() == Some("WITH") && kw(i + 1).as_deref() == Some("HOLD") {
                with_hold = true;
                i += 2;
            }
            if kw(i).as_deref() != Some("FOR") {
                return Err(syntax_error(&loc, "expected FOR"));
            }
            let rest = &words[i + 1..];
            if rest.is_empty() {
                return Err(syntax_error(&loc, "DECLARE CURSOR FOR needs a query"));
            }
            let (source, params) = if rest.len() == 1 && rest[0].starts_with(':') {
                (SqlSource::HostVar(rest[0][1..].to_string()), Vec::new())
            } else if rest.len() == 1 && !rest[0].eq_ignore_ascii_case("SELECT") {
                // a bare identifier names a prepared statement
                (
                    SqlSource::Literal(format!("@{}", rest[0].to_lowercase())),
                    Vec::new(),
                )
            } else {
                let (sql, vars) = rewrite_params(&rest.join(" "));
                (SqlSource::Literal(sql), vars)
            };
            if program.cursor(&name).is_some() {
                return Err(PpError::DuplicateDeclare {
                    file: loc.file.clone(),
                    line: loc.line,
                    name,
                });
            }
            program.cursors.push(CursorDecl {
                name: name.clone(),
                source: source.clone(),
                with_hold,
                params: params.clone(),
                loc: loc.clone(),
            });
            stmt.cursor = Some(name);
            stmt.with_hold = with_hold;
            stmt.source = Some(source.clone());
            stmt.input_vars = params;
            if let SqlSource::Literal(sql) = source {
                stmt.sql = sql;
            }
        }
        Some("OPEN") => {
            stmt.verb = EsqlVerb::Open;
            stmt.cursor = Some(
                words
                    .get(1)
                    .ok_or_else(|| syntax_error(&loc, "OPEN needs a cursor name"))?
                    .clone(),
            );
            if kw(2).as_deref() == Some("USING") {
                for word in &words[3..] {
                    let var = host_ref(word)
                        .ok_or_else(|| syntax_error(&loc, format!("bad USING operand {word}")))?;
                    stmt.input_vars.push(var);
                }
            }
        }
        Some("FETCH") => {
            stmt.verb = EsqlVerb::Fetch;
            let mut i = 1;
            stmt.fetch_direction = Some(match kw(1).as_deref() {
                Some("PRIOR") | Some("PREVIOUS") => {
                    i += 1;
                    FetchDirection::Prev
                }
                Some("CURRENT") => {
                    i += 1;
                    FetchDirection::Current
                }
                Some("NEXT") => {
                    i += 1;
                    FetchDirection::Next
                }
                _ => FetchDirection::Next,
            });
            if kw(i).as_deref() == Some("FROM") {
                i += 1;
            }
            stmt.cursor = Some(
                words
                    .get(i)
                    .ok_or_else(|| syntax_error(&loc, "FETCH needs a cursor name"))?
                    .clone(),
            );
            i += 1;
            if kw(i).as_deref() != Some("INTO") {
                return Err(syntax_error(&loc, "FETCH needs an INTO clause"));
            }
            for word in &words[i + 1..] {
                let var = host_ref(word)
                    .ok_or_else(|| syntax_error(&loc, format!("bad INTO operand {word}")))?;
                stmt.output_vars.push(var);
            }
            if stmt.output_vars.is_empty() {
                return Err(syntax_error(&loc, "empty INTO clause"));
            }
        }
        Some("CLOSE") => {
            stmt.verb = EsqlVerb::Close;
            stmt.cursor = Some(
                words
                    .get(1)
                    .ok_or_else(|| syntax_error(&loc, "CLOSE needs a cursor name"))?
                    .clone(),
            );
        }
        Some("PREPARE") => {
            stmt.verb = EsqlVerb::Prepare;
            let name = words
                .get(1)
                .ok_or_else(|| syntax_error(&loc, "PREPARE needs a statement name"))?;
            stmt.target = Some(name.to_lowercase());
            if kw(2).as_deref() != Some("FROM") {
                return Err(syntax_error(&loc, "expected FROM"));
            }
            let src = words
                .get(3)
                .ok_or_else(|| syntax_error(&loc, "PREPARE FROM needs a source"))?;
            stmt.source = Some(parse_source(src));
        }
        Some("EXECUTE") if kw(1).as_deref() == Some("IMMEDIATE") => {
            stmt.verb = EsqlVerb::ExecuteImmediate;
            let src = words
                .get(2)
                .ok_or_else(|| syntax_error(&loc, "EXECUTE IMMEDIATE needs a source"))?;
            stmt.source = Some(parse_source(src));
        }
        Some("EXECUTE") => {
            stmt.verb = EsqlVerb::Execute;
            let name = words
                .get(1)
                .ok_or_else(|| syntax_error(&loc, "EXECUTE needs a statement name"))?;
            stmt.target = Some(name.to_lowercase());
            let mut i = 2;
            if kw(i).as_deref() == Some("USING") {
                i += 1;
                while i < words.len() && !words[i].eq_ignore_ascii_case("INTO") {
                    let var = host_ref(&words[i]).ok_or_else(|| {
                        syntax_error(&loc, format!("bad USING operand {}", words[i]))
                    })?;
                    stmt.input_vars.push(var);
                    i += 1;
                }
            }
            if kw(i).as_deref() == Some("INTO") {
                for word in &words[i + 1..] {
                    let var = host_ref(word)
                        .ok_or_else(|| syntax_error(&loc, format!("bad INTO operand {word}")))?;
                    stmt.output_vars.push(var);
                }
            }
        }
        Some("COMMIT") => {
            stmt.verb = EsqlVerb::Commit;
        }
        Some("ROLLBACK") => {
            stmt.verb = EsqlVerb::Rollback;
        }
        Some("SELECT") => {
            stmt.verb = EsqlVerb::Select;
            let raw = words.join(" ");
            let (without_into, outputs) = strip_into_clause(&raw);
            let (sql, vars) = rewrite_params(&without_into);
            stmt.sql = sql;
            stmt.input_vars = vars;
            stmt.output_vars = outputs;
        }
        _ => {
            stmt.verb = EsqlVerb::Dml;
            let (sql, vars) = rewrite_params(&words.join(" "));
            stmt.sql = sql;
            stmt.input_vars = vars;
        }
    }

    program.statements.push(stmt);
    Ok(())
}

/// Remove the embedded `INTO :a, :b` clause of a singleton SELECT and
/// return the target names. The clause runs from INTO to the following
/// FROM (or to the end).
fn strip_into_clause(sql: &str) -> (String, Vec<String>) {
    let Some(into_at) = find_kw(sql, "INTO") else {
        return (sql.to_string(), Vec::new());
    };
    let after_into = &sql[into_at + 4..];
    let (clause, rest) = match find_kw(after_into, "FROM") {
        Some(from_at) => after_into.split_at(from_at),
        None => (after_into, ""),
    };
    let outputs = clause
        .split(',')
        .filter_map(|t| host_ref(t.trim()))
        .collect();
    let mut out = sql[..into_at].trim_end().to_string();
    if !rest.is_empty() {
        out.push(' ');
        out.push_str(rest.trim_start());
    }
    (out, outputs)
}

/// Find a keyword as a standalone word outside quotes.
fn find_kw(sql: &str, word: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i + word.len() <= bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if b == b'\'' || b == b'"' {
            quote = Some(b);
            i += 1;
            continue;
        }
        if bytes[i..i + word.len()].eq_ignore_ascii_case(word.as_bytes()) {
            let before_ok = i == 0 || bytes[i - 1].is_ascii_whitespace();
            let after = i + word.len();
            let after_ok = after == bytes.len() || bytes[after].is_ascii_whitespace();
            if before_ok && after_ok {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

impl TransformationStep for EsqlParser {
    fn name(&self) -> &'static str {
        "esql-parser"
    }

    fn run(
        &mut self,
        ctx: &mut StepContext<'_>,
        input: &TransformationStepData,
    ) -> Result<TransformationStepData, PpError> {
        let buffer = input.content()?;
        let program = parse_program(&buffer, ctx)?;
        debug!(
            "parsed {} host variable(s), {} cursor(s), {} statement(s)",
            program.host_vars.len(),
            program.cursors.len(),
            program.statements.len()
        );
        let mut out = TransformationStepData::of_buffer(buffer);
        out.program = Some(Arc::new(program));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_params_ordering() {
        let (sql, vars) = rewrite_params("SELECT A FROM T WHERE B = :HV-B AND C = :HV-C");
        assert_eq!(sql, "SELECT A FROM T WHERE B = $1 AND C = $2");
        assert_eq!(vars, vec!["HV-B", "HV-C"]);
    }

    #[test]
    fn test_rewrite_params_quotes_and_casts() {
        let (sql, vars) = rewrite_params("SELECT ':x' || K::text FROM T WHERE K=:K");
        assert_eq!(sql, "SELECT ':x' || K::text FROM T WHERE K=$1");
        assert_eq!(vars, vec!["K"]);
    }

    #[test]
    fn test_rewrite_params_question_marks() {
        let (sql, vars) = rewrite_params("UPDATE T SET A=? WHERE K=?");
        assert_eq!(sql, "UPDATE T SET A=$1 WHERE K=$2");
        assert_eq!(vars, vec!["?", "?"]);
    }

    #[test]
    fn test_rewrite_params_null_indicator() {
        let (sql, vars) = rewrite_params("UPDATE T SET A = :HV-A:HV-A-NULL WHERE K = :K");
        assert_eq!(sql, "UPDATE T SET A = $1 WHERE K = $2");
        assert_eq!(vars, vec!["HV-A:HV-A-NULL", "K"]);
    }

    #[test]
    fn test_rewrite_preserves_reference_multiset() {
        let input = "INSERT INTO T VALUES(:A, :B, :A)";
        let (_, vars) = rewrite_params(input);
        assert_eq!(vars, vec!["A", "B", "A"]);
    }

    #[test]
    fn test_strip_into_clause() {
        let (sql, outs) = strip_into_clause("SELECT A, B INTO :X, :Y FROM T WHERE K = 1");
        assert_eq!(sql, "SELECT A, B FROM T WHERE K = 1");
        assert_eq!(outs, vec!["X", "Y"]);
    }

    #[test]
    fn test_find_kw_respects_quotes() {
        assert_eq!(find_kw("SELECT 'INTO' FROM T", "INTO"), None);
        assert!(find_kw("SELECT A INTO :X", "INTO").is_some());
    }

    #[test]
    fn test_split_words_quoted() {
        let words = split_words("PREPARE S1 FROM 'SELECT * FROM T'");
        assert_eq!(words.len(), 4);
        assert_eq!(words[3], "'SELECT * FROM T'");
    }
}
