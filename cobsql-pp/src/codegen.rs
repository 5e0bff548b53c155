//! Generator stage: replace every `EXEC SQL` window of the consolidated
//! buffer with the call sequence against the runtime bridge, leaving all
//! other source text untouched.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use log::debug;

use crate::consolidate::{FILE_POP_MARKER, FILE_PUSH_MARKER};
use crate::error::PpError;
use crate::options::{keys, OptionsExt};
use crate::parser::ir::{
    EsqlProgram, EsqlStmt, EsqlVerb, FetchDirection, HostVarDecl, SqlSource,
};
use crate::step::{StepContext, TransformationStep, TransformationStepData};
use cobol_pg::{
    CobolVarType, FLAG_AUTOTRIM, FLAG_NONE, FLAG_NULLIND, FLAG_VARLEN, VARLEN_PICX_THRESHOLD,
};

const AREA_B: &str = "           ";
const ARG_INDENT: &str = "                ";

/// Runtime entry points, one per verb.
mod entry {
    pub const START: &str = "CBSQLStartSQL";
    pub const END: &str = "CBSQLEndSQL";
    pub const SET_SQL_PARAM: &str = "CBSQLSetSQLParams";
    pub const SET_RESULT_PARAM: &str = "CBSQLSetResultParams";
    pub const CONNECT: &str = "CBSQLConnect";
    pub const DISCONNECT: &str = "CBSQLDisconnect";
    pub const EXEC: &str = "CBSQLExec";
    pub const EXEC_PARAMS: &str = "CBSQLExecParams";
    pub const EXEC_SELECT_INTO: &str = "CBSQLExecSelectInto";
    pub const CURSOR_DECLARE: &str = "CBSQLCursorDeclare";
    pub const CURSOR_OPEN: &str = "CBSQLCursorOpen";
    pub const CURSOR_FETCH: &str = "CBSQLCursorFetchOne";
    pub const CURSOR_CLOSE: &str = "CBSQLCursorClose";
    pub const PREPARE: &str = "CBSQLPrepare";
    pub const EXEC_PREPARED: &str = "CBSQLExecPrepared";
    pub const EXEC_IMMEDIATE: &str = "CBSQLExecImmediate";
    pub const COMMIT: &str = "CBSQLCommit";
    pub const ROLLBACK: &str = "CBSQLRollback";
}

/// Pipeline stage that turns the IR back into compilable source, plus the
/// optional map and symbol side files.
#[derive(Debug, Default)]
pub struct EsqlProcessor;

impl EsqlProcessor {
    pub fn new() -> EsqlProcessor {
        EsqlProcessor
    }
}

struct GenConfig {
    static_calls: bool,
    cobol85: bool,
    debug_info: bool,
    params_style: char,
    picx_as_varchar: bool,
    autotrim: bool,
    no_rec_code: Option<i32>,
    len_suffix: String,
    arr_suffix: String,
}

impl GenConfig {
    fn from_ctx(ctx: &StepContext<'_>) -> GenConfig {
        let suffixes = ctx
            .options
            .get_str(keys::VARLEN_SUFFIXES, "LEN,ARR")
            .to_string();
        let (len_suffix, arr_suffix) = suffixes
            .split_once(',')
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .unwrap_or_else(|| ("LEN".to_string(), "ARR".to_string()));
        let picx_as = ctx.options.get_str(keys::PICX_AS, "char").to_string();
        GenConfig {
            static_calls: ctx.options.get_bool(keys::EMIT_STATIC_CALLS, false),
            cobol85: ctx.options.get_bool(keys::EMIT_COBOL85, false),
            debug_info: ctx.options.get_bool(keys::EMIT_DEBUG_INFO, false),
            params_style: ctx.options.get_char(keys::PARAMS_STYLE, 'd'),
            picx_as_varchar: ctx.options.get_bool(keys::PICX_AS_VARCHAR, false)
                || picx_as == "varchar",
            autotrim: picx_as != "charf",
            no_rec_code: ctx.options.get(keys::NO_REC_CODE).and_then(|v| v.as_int()),
            len_suffix,
            arr_suffix,
        }
    }

    fn comment(&self, text: &str) -> String {
        if self.cobol85 {
            format!("      *{text}")
        } else {
            format!("      *> {text}")
        }
    }

    fn call_head(&self, name: &str) -> String {
        if self.static_calls {
            format!("{AREA_B}CALL STATIC \"{name}\" USING")
        } else {
            format!("{AREA_B}CALL \"{name}\" USING")
        }
    }

    fn call_plain(&self, name: &str) -> String {
        if self.static_calls {
            format!("{AREA_B}CALL STATIC \"{name}\" END-CALL")
        } else {
            format!("{AREA_B}CALL \"{name}\" END-CALL")
        }
    }
}

/// One generated call-site record for the map file.
struct MapEntry {
    generated_line: usize,
    consolidated_line: usize,
    file: String,
    line: u32,
    column: u32,
    verb: &'static str,
    stmt_id: u32,
}

/// Convert the canonical `$n` placeholders into the configured style:
/// `a` keeps `$n`, `d` emits `?`, `c` emits `:name`.
fn apply_params_style(sql: &str, style: char, vars: &[String]) -> String {
    if style == 'a' {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '$' if chars.peek().map(char::is_ascii_digit).unwrap_or(false) => {
                let mut num = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match style {
                    'd' => out.push('?'),
                    'c' => {
                        let name = vars
                            .get(num.parse::<usize>().unwrap_or(0).saturating_sub(1))
                            .map(String::as_str)
                            .unwrap_or("?");
                        // any attached indicator stays out of the SQL text
                        let name = name.split(':').next().unwrap_or(name);
                        if name == "?" {
                            out.push('?');
                        } else {
                            out.push(':');
                            out.push_str(name);
                        }
                    }
                    _ => {
                        out.push('$');
                        out.push_str(&num);
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Split at char boundaries into pieces of at most `max` bytes.
fn byte_chunks(text: &str, max: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = rest.len().min(max);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // a single char wider than max still makes progress
            end = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
        }
        let (piece, tail) = rest.split_at(end);
        out.push(piece);
        rest = tail;
    }
    out
}

/// WORKING-STORAGE definition of one SQL text constant, chunked into
/// FILLER pieces with a LOW-VALUE terminator.
fn sq_definition(name: &str, sql: &str) -> Vec<String> {
    let mut lines = vec![format!("       01  {name}.")];
    for piece in byte_chunks(sql, 50) {
        let escaped = piece.replace('"', "\"\"");
        lines.push(format!(
            "           03  FILLER PIC X({}) VALUE \"{}\".",
            piece.len(),
            escaped
        ));
    }
    lines.push("           03  FILLER PIC X(1)  VALUE LOW-VALUE.".to_string());
    lines
}

struct Generator<'a> {
    program: &'a EsqlProgram,
    cfg: GenConfig,
    out: Vec<String>,
    map: Vec<MapEntry>,
    /// statement id -> SQ constant name
    sq_names: HashMap<u32, String>,
    sq_lines: Vec<String>,
    ws_section_seen: bool,
}

impl<'a> Generator<'a> {
    fn new(program: &'a EsqlProgram, cfg: GenConfig) -> Generator<'a> {
        Generator {
            program,
            cfg,
            out: Vec::new(),
            map: Vec::new(),
            sq_names: HashMap::new(),
            sq_lines: Vec::new(),
            ws_section_seen: false,
        }
    }

    /// Pre-build the SQ constants for every statement that carries SQL text
    /// known at translation time.
    fn build_sq_constants(&mut self) {
        let mut n = 0u32;
        for stmt in &self.program.statements {
            let sql = match (&stmt.verb, &stmt.source) {
                (EsqlVerb::Prepare | EsqlVerb::ExecuteImmediate, Some(SqlSource::Literal(s))) => {
                    s.clone()
                }
                _ if !stmt.sql.is_empty() => stmt.sql.clone(),
                _ => continue,
            };
            n += 1;
            let name = format!("SQ{n:04}");
            let styled = apply_params_style(&sql, self.cfg.params_style, &stmt.input_vars);
            self.sq_lines.extend(sq_definition(&name, &styled));
            self.sq_names.insert(stmt.id, name);
        }
    }

    fn field_args(&self, decl: &HostVarDecl) -> (u16, u32, u32, u32) {
        let mut flags = FLAG_NONE;
        if decl.varlen {
            flags |= FLAG_VARLEN;
        }
        if decl.var_type == CobolVarType::Alphanumeric {
            if self.cfg.autotrim && !decl.varlen {
                flags |= FLAG_AUTOTRIM;
            }
            if self.cfg.picx_as_varchar && decl.length > VARLEN_PICX_THRESHOLD {
                flags |= FLAG_VARLEN;
            }
        }
        (decl.var_type.code(), decl.length, decl.scale, flags)
    }

    fn lookup(&self, stmt: &EsqlStmt, name: &str) -> Result<&'a HostVarDecl, PpError> {
        self.program.host_var(name).ok_or_else(|| {
            PpError::Generation(format!(
                "{}:{}: host variable {} is not declared",
                stmt.loc.file, stmt.loc.line, name
            ))
        })
    }

    fn emit_call(&mut self, name: &str, args: &[String]) {
        if args.is_empty() {
            self.out.push(self.cfg.call_plain(name));
            return;
        }
        self.out.push(self.cfg.call_head(name));
        for arg in args {
            self.out.push(format!("{ARG_INDENT}{arg}"));
        }
        self.out.push(format!("{AREA_B}END-CALL"));
    }

    fn emit_param_calls(
        &mut self,
        stmt: &EsqlStmt,
        vars: &[String],
        entry_point: &str,
    ) -> Result<(), PpError> {
        for var in vars {
            if var == "?" {
                // positional markers have no translation-time binding
                continue;
            }
            let (name, indicator) = match var.split_once(':') {
                Some((name, ind)) => (name, Some(ind)),
                None => (var.as_str(), None),
            };
            let decl = self.lookup(stmt, name)?;
            let (code, length, scale, mut flags) = self.field_args(decl);
            if indicator.is_some() {
                flags |= FLAG_NULLIND;
            }
            let mut args = vec![
                format!("BY VALUE {code}"),
                format!("BY VALUE {length}"),
                format!("BY VALUE {scale}"),
                format!("BY VALUE {flags}"),
                format!("BY REFERENCE {}", decl.name),
            ];
            if let Some(ind) = indicator {
                let ind_decl = self.lookup(stmt, ind)?;
                args.push(format!("BY REFERENCE {}", ind_decl.name));
            }
            self.emit_call(entry_point, &args);
        }
        Ok(())
    }

    fn name_args(name: &str) -> Vec<String> {
        vec![
            format!("BY CONTENT \"{name}\""),
            format!("BY VALUE {}", name.len()),
        ]
    }

    fn source_arg(&self, stmt: &EsqlStmt, source: &SqlSource) -> Result<String, PpError> {
        match source {
            SqlSource::HostVar(name) => {
                let decl = self.lookup(stmt, name)?;
                Ok(format!("BY REFERENCE {}", decl.name))
            }
            SqlSource::Literal(_) => {
                let sq = self.sq_names.get(&stmt.id).cloned().ok_or_else(|| {
                    PpError::Generation(format!("no SQL constant for statement {}", stmt.id))
                })?;
                Ok(format!("BY REFERENCE {sq}"))
            }
        }
    }

    fn connect_operand(&self, stmt: &EsqlStmt, source: &Option<SqlSource>) -> Result<String, PpError> {
        match source {
            None => Ok("BY CONTENT SPACE".to_string()),
            Some(SqlSource::HostVar(name)) => {
                let decl = self.lookup(stmt, name)?;
                Ok(format!("BY REFERENCE {}", decl.name))
            }
            Some(SqlSource::Literal(text)) => Ok(format!("BY CONTENT \"{text}\"")),
        }
    }

    fn emit_statement(&mut self, stmt: &EsqlStmt) -> Result<(), PpError> {
        if self.cfg.debug_info {
            let heading = format!(
                "ESQL {} {}:{}",
                stmt.verb.as_str(),
                stmt.loc.file,
                stmt.loc.line
            );
            let line = self.cfg.comment(&heading);
            self.out.push(line);
        }

        self.out.push(self.cfg.call_plain(entry::START));
        self.emit_param_calls(stmt, &stmt.input_vars, entry::SET_SQL_PARAM)?;
        self.emit_param_calls(stmt, &stmt.output_vars, entry::SET_RESULT_PARAM)?;

        // the verb call itself is the mapped call site
        self.map.push(MapEntry {
            generated_line: self.out.len() + 1,
            consolidated_line: stmt.span.0 + 1,
            file: stmt.loc.file.clone(),
            line: stmt.loc.line,
            column: stmt.loc.column,
            verb: stmt.verb.as_str(),
            stmt_id: stmt.id,
        });

        let bound_params = stmt.input_vars.iter().filter(|v| *v != "?").count();
        match stmt.verb {
            EsqlVerb::Connect => {
                let spec = stmt.connect.clone().unwrap_or_default();
                let connection_name = match &spec.connection_name {
                    Some(name) => format!("BY CONTENT \"{name}\""),
                    None => "BY CONTENT SPACE".to_string(),
                };
                let args = vec![
                    "BY REFERENCE SQLCA".to_string(),
                    self.connect_operand(stmt, &spec.data_source)?,
                    self.connect_operand(stmt, &spec.user)?,
                    self.connect_operand(stmt, &spec.password)?,
                    connection_name,
                ];
                self.emit_call(entry::CONNECT, &args);
            }
            EsqlVerb::Disconnect => {
                let target = match &stmt.target {
                    Some(name) => format!("BY CONTENT \"{name}\""),
                    None => "BY CONTENT SPACE".to_string(),
                };
                let args = vec!["BY REFERENCE SQLCA".to_string(), target];
                self.emit_call(entry::DISCONNECT, &args);
            }
            EsqlVerb::Commit => {
                self.emit_call(entry::COMMIT, &["BY REFERENCE SQLCA".to_string()]);
            }
            EsqlVerb::Rollback => {
                self.emit_call(entry::ROLLBACK, &["BY REFERENCE SQLCA".to_string()]);
            }
            EsqlVerb::DeclareCursor => {
                let name = stmt.cursor.clone().unwrap_or_default();
                let mut args = vec!["BY REFERENCE SQLCA".to_string()];
                args.extend(Self::name_args(&name));
                args.push(format!("BY VALUE {}", i32::from(stmt.with_hold)));
                let source = stmt.source.clone().ok_or_else(|| {
                    PpError::Generation(format!("cursor {name} has no query source"))
                })?;
                args.push(self.source_arg(stmt, &source)?);
                args.push(format!("BY VALUE {bound_params}"));
                self.emit_call(entry::CURSOR_DECLARE, &args);
            }
            EsqlVerb::Open => {
                let name = stmt.cursor.clone().unwrap_or_default();
                let mut args = vec!["BY REFERENCE SQLCA".to_string()];
                args.extend(Self::name_args(&name));
                args.push(format!("BY VALUE {bound_params}"));
                self.emit_call(entry::CURSOR_OPEN, &args);
            }
            EsqlVerb::Fetch => {
                let name = stmt.cursor.clone().unwrap_or_default();
                let direction = stmt.fetch_direction.unwrap_or(FetchDirection::Next);
                let mut args = vec!["BY REFERENCE SQLCA".to_string()];
                args.extend(Self::name_args(&name));
                args.push(format!("BY VALUE {}", direction.code()));
                self.emit_call(entry::CURSOR_FETCH, &args);
                if let Some(code) = self.cfg.no_rec_code {
                    self.out.push(format!("{AREA_B}IF SQLCODE = 100"));
                    self.out
                        .push(format!("{AREA_B}    MOVE {code} TO SQLCODE"));
                    self.out.push(format!("{AREA_B}END-IF"));
                }
            }
            EsqlVerb::Close => {
                let name = stmt.cursor.clone().unwrap_or_default();
                let mut args = vec!["BY REFERENCE SQLCA".to_string()];
                args.extend(Self::name_args(&name));
                self.emit_call(entry::CURSOR_CLOSE, &args);
            }
            EsqlVerb::Prepare => {
                let name = stmt.target.clone().unwrap_or_default();
                let mut args = vec!["BY REFERENCE SQLCA".to_string()];
                args.extend(Self::name_args(&name));
                let source = stmt.source.clone().ok_or_else(|| {
                    PpError::Generation(format!("PREPARE {name} has no source"))
                })?;
                args.push(self.source_arg(stmt, &source)?);
                self.emit_call(entry::PREPARE, &args);
            }
            EsqlVerb::Execute => {
                let name = stmt.target.clone().unwrap_or_default();
                let mut args = vec!["BY REFERENCE SQLCA".to_string()];
                args.extend(Self::name_args(&name));
                args.push(format!("BY VALUE {bound_params}"));
                args.push(format!("BY VALUE {}", stmt.output_vars.len()));
                self.emit_call(entry::EXEC_PREPARED, &args);
            }
            EsqlVerb::ExecuteImmediate => {
                let source = stmt.source.clone().ok_or_else(|| {
                    PpError::Generation("EXECUTE IMMEDIATE has no source".to_string())
                })?;
                let args = vec![
                    "BY REFERENCE SQLCA".to_string(),
                    self.source_arg(stmt, &source)?,
                ];
                self.emit_call(entry::EXEC_IMMEDIATE, &args);
            }
            EsqlVerb::Select => {
                let sq = self.source_arg(stmt, &SqlSource::Literal(stmt.sql.clone()))?;
                let args = vec![
                    "BY REFERENCE SQLCA".to_string(),
                    sq,
                    format!("BY VALUE {bound_params}"),
                    format!("BY VALUE {}", stmt.output_vars.len()),
                ];
                self.emit_call(entry::EXEC_SELECT_INTO, &args);
            }
            EsqlVerb::Dml => {
                let sq = self.source_arg(stmt, &SqlSource::Literal(stmt.sql.clone()))?;
                if bound_params == 0 {
                    let args = vec!["BY REFERENCE SQLCA".to_string(), sq];
                    self.emit_call(entry::EXEC, &args);
                } else {
                    let args = vec![
                        "BY REFERENCE SQLCA".to_string(),
                        sq,
                        format!("BY VALUE {bound_params}"),
                    ];
                    self.emit_call(entry::EXEC_PARAMS, &args);
                }
            }
        }

        self.out.push(self.cfg.call_plain(entry::END));
        Ok(())
    }

    /// Replace an over-threshold PIC X declaration with the counter/payload
    /// group the runtime expects for varlen fields.
    fn emit_varlen_redeclaration(&mut self, decl: &HostVarDecl) {
        self.out.push(format!("       01  {}.", decl.name));
        self.out.push(format!(
            "           49  {}-{} PIC 9(8) COMP-5.",
            decl.name, self.cfg.len_suffix
        ));
        self.out.push(format!(
            "           49  {}-{} PIC X({}).",
            decl.name, self.cfg.arr_suffix, decl.length
        ));
    }

    fn run(&mut self, buffer: &str) -> Result<(), PpError> {
        self.build_sq_constants();

        let mut in_procedure = false;
        let mut deferred: Vec<&'a EsqlStmt> = Vec::new();
        let lines: Vec<&str> = buffer.lines().collect();
        let stmt_by_start: HashMap<usize, &EsqlStmt> = self
            .program
            .statements
            .iter()
            .map(|s| (s.span.0, s))
            .collect();
        let passive_by_start: HashMap<usize, usize> =
            self.program.passive_spans.iter().copied().collect();
        let redecl_by_line: HashMap<usize, &HostVarDecl> = if self.cfg.picx_as_varchar {
            self.program
                .host_vars
                .iter()
                .filter(|v| {
                    v.var_type == CobolVarType::Alphanumeric
                        && !v.varlen
                        && v.length > VARLEN_PICX_THRESHOLD
                })
                .map(|v| (v.span_line, v))
                .collect()
        } else {
            HashMap::new()
        };

        let mut i = 0usize;
        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();
            if trimmed.starts_with(FILE_PUSH_MARKER) || trimmed == FILE_POP_MARKER {
                i += 1;
                continue;
            }

            if let Some(&end) = passive_by_start.get(&i) {
                for passive in lines.iter().take(end + 1).skip(i) {
                    let comment = self.cfg.comment(passive.trim_start());
                    self.out.push(comment);
                }
                i = end + 1;
                continue;
            }

            if let Some(stmt) = stmt_by_start.get(&i).copied() {
                let end = stmt.span.1;
                if self.cfg.debug_info {
                    for original in lines.iter().take(end + 1).skip(i) {
                        let comment = self.cfg.comment(original.trim_start());
                        self.out.push(comment);
                    }
                }
                // cursor declarations ahead of the PROCEDURE DIVISION move
                // to the top of it; a CALL cannot sit in the data division
                if stmt.verb == EsqlVerb::DeclareCursor && !in_procedure {
                    deferred.push(stmt);
                } else {
                    self.emit_statement(stmt)?;
                }
                i = end + 1;
                continue;
            }

            if let Some(decl) = redecl_by_line.get(&i).copied() {
                self.emit_varlen_redeclaration(decl);
                i += 1;
                continue;
            }

            self.out.push(line.to_string());
            let upper = trimmed.to_ascii_uppercase();
            if !self.ws_section_seen && upper.starts_with("WORKING-STORAGE SECTION") {
                self.ws_section_seen = true;
                let sq_lines = std::mem::take(&mut self.sq_lines);
                self.out.extend(sq_lines);
            }
            if !in_procedure && upper.starts_with("PROCEDURE DIVISION") {
                in_procedure = true;
                for stmt in std::mem::take(&mut deferred) {
                    self.emit_statement(stmt)?;
                }
            }
            i += 1;
        }

        if !deferred.is_empty() {
            return Err(PpError::Generation(
                "cursor declaration found but no PROCEDURE DIVISION to hold it".to_string(),
            ));
        }
        if !self.sq_lines.is_empty() {
            return Err(PpError::Generation(
                "no WORKING-STORAGE SECTION to hold the generated SQL constants".to_string(),
            ));
        }
        Ok(())
    }
}

impl TransformationStep for EsqlProcessor {
    fn name(&self) -> &'static str {
        "esql-generator"
    }

    fn run(
        &mut self,
        ctx: &mut StepContext<'_>,
        input: &TransformationStepData,
    ) -> Result<TransformationStepData, PpError> {
        let buffer = input.content()?;
        let program: Arc<EsqlProgram> = input.program.clone().ok_or(PpError::InvalidInput)?;

        let cfg = GenConfig::from_ctx(ctx);
        let emit_map = ctx.options.get_bool(keys::EMIT_MAP_FILE, false);
        let with_consolidated_column = ctx.options.get_bool(keys::CONSOLIDATED_MAP, false);
        let map_path = ctx
            .options
            .get_str(keys::MAP_FILE, "")
            .to_string();
        let sym_path = ctx.options.get_str(keys::SYM_FILE, "").to_string();

        let mut generator = Generator::new(&program, cfg);
        generator.run(&buffer)?;
        debug!(
            "generated {} line(s), {} call site(s)",
            generator.out.len(),
            generator.map.len()
        );

        if emit_map && !ctx.output_file.is_empty() {
            let path = if map_path.is_empty() {
                format!("{}.map", ctx.output_file)
            } else {
                map_path
            };
            let mut text = String::new();
            for e in &generator.map {
                if with_consolidated_column {
                    text.push_str(&format!(
                        "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                        e.generated_line,
                        e.consolidated_line,
                        e.file,
                        e.line,
                        e.column,
                        e.verb,
                        e.stmt_id
                    ));
                } else {
                    text.push_str(&format!(
                        "{}\t{}\t{}\t{}\t{}\t{}\n",
                        e.generated_line, e.file, e.line, e.column, e.verb, e.stmt_id
                    ));
                }
            }
            fs::write(&path, text)?;
        }

        if !sym_path.is_empty() {
            let mut text = String::new();
            let mut offset = 0usize;
            for decl in &program.host_vars {
                let field = cobol_pg::CobField::new(
                    decl.var_type,
                    decl.length,
                    decl.scale,
                    if decl.varlen { FLAG_VARLEN } else { FLAG_NONE },
                );
                text.push_str(&format!(
                    "{}\t{}\t{}\t{}\t{}\t{}\n",
                    decl.name,
                    decl.var_type.code(),
                    decl.length,
                    decl.scale,
                    field.flags,
                    offset
                ));
                offset += field.storage_size();
            }
            fs::write(&sym_path, text)?;
        }

        let mut text = generator.out.join("\n");
        text.push('\n');
        Ok(TransformationStepData::of_buffer(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_params_style() {
        let vars = vec!["HV-B".to_string(), "HV-C".to_string()];
        let sql = "SELECT A FROM T WHERE B = $1 AND C = $2";
        assert_eq!(apply_params_style(sql, 'a', &vars), sql);
        assert_eq!(
            apply_params_style(sql, 'd', &vars),
            "SELECT A FROM T WHERE B = ? AND C = ?"
        );
        assert_eq!(
            apply_params_style(sql, 'c', &vars),
            "SELECT A FROM T WHERE B = :HV-B AND C = :HV-C"
        );
    }

    #[test]
    fn test_apply_params_style_skips_quoted_dollars() {
        let sql = "SELECT '$1' FROM T WHERE K = $1";
        assert_eq!(
            apply_params_style(sql, 'd', &["K".to_string()]),
            "SELECT '$1' FROM T WHERE K = ?"
        );
    }

    #[test]
    fn test_sq_definition_chunks_and_escapes() {
        let sql = "SELECT \"A\" FROM T";
        let lines = sq_definition("SQ0001", sql);
        assert_eq!(lines[0], "       01  SQ0001.");
        assert!(lines[1].contains("\"\"A\"\""));
        assert!(lines.last().unwrap().contains("LOW-VALUE"));

        let long = "X".repeat(120);
        let lines = sq_definition("SQ0002", &long);
        // 50 + 50 + 20 payload chunks plus header and terminator
        assert_eq!(lines.len(), 5);
        assert!(lines[1].contains("PIC X(50)"));
        assert!(lines[3].contains("PIC X(20)"));
    }

    #[test]
    fn test_byte_chunks_char_boundaries() {
        let text = "ééééé"; // two bytes per char
        let chunks = byte_chunks(text, 3);
        assert!(chunks.iter().all(|c| !c.is_empty()));
        assert_eq!(chunks.concat(), text);
    }
}
