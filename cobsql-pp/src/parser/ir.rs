//! Intermediate representation produced by the parser step and consumed,
//! by shared reference, by the generator step.

use cobol_pg::CobolVarType;

/// Original source position of an IR node, reconstructed from the
/// consolidation push/pop markers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone)]
pub struct HostVarDecl {
    pub name: String,
    pub level: u8,
    pub var_type: CobolVarType,
    /// Digits for numerics, characters otherwise.
    pub length: u32,
    pub scale: u32,
    /// Declared as a length-prefixed group (counter + payload subfields).
    pub varlen: bool,
    pub loc: SourceLoc,
    /// Line index of the declaration in the consolidated buffer.
    pub span_line: usize,
}

/// Where a statement's SQL text comes from at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlSource {
    /// SQL known at translation time; placeholders already rewritten.
    Literal(String),
    /// A host variable holding the SQL text.
    HostVar(String),
}

#[derive(Debug, Clone)]
pub struct CursorDecl {
    pub name: String,
    pub source: SqlSource,
    pub with_hold: bool,
    /// Input host variables in placeholder order.
    pub params: Vec<String>,
    pub loc: SourceLoc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDirection {
    Next,
    Prev,
    Current,
}

impl FetchDirection {
    /// Mode code passed to the runtime fetch entry point.
    pub fn code(self) -> i32 {
        match self {
            FetchDirection::Next => 0,
            FetchDirection::Prev => 1,
            FetchDirection::Current => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EsqlVerb {
    Connect,
    Disconnect,
    DeclareCursor,
    Open,
    Fetch,
    Close,
    Prepare,
    Execute,
    ExecuteImmediate,
    Commit,
    Rollback,
    Select,
    Dml,
}

impl EsqlVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            EsqlVerb::Connect => "CONNECT",
            EsqlVerb::Disconnect => "DISCONNECT",
            EsqlVerb::DeclareCursor => "DECLARE",
            EsqlVerb::Open => "OPEN",
            EsqlVerb::Fetch => "FETCH",
            EsqlVerb::Close => "CLOSE",
            EsqlVerb::Prepare => "PREPARE",
            EsqlVerb::Execute => "EXECUTE",
            EsqlVerb::ExecuteImmediate => "EXECUTE-IMMEDIATE",
            EsqlVerb::Commit => "COMMIT",
            EsqlVerb::Rollback => "ROLLBACK",
            EsqlVerb::Select => "SELECT",
            EsqlVerb::Dml => "DML",
        }
    }
}

/// The CONNECT statement's operands, each a host variable or literal.
#[derive(Debug, Clone, Default)]
pub struct ConnectSpec {
    pub data_source: Option<SqlSource>,
    pub connection_name: Option<String>,
    pub user: Option<SqlSource>,
    pub password: Option<SqlSource>,
}

#[derive(Debug, Clone)]
pub struct EsqlStmt {
    pub id: u32,
    pub verb: EsqlVerb,
    /// SQL text with markers rewritten to `$1, $2, …`; empty when the verb
    /// carries no SQL of its own.
    pub sql: String,
    /// Referenced input host variables, one entry per placeholder in order.
    pub input_vars: Vec<String>,
    /// INTO targets.
    pub output_vars: Vec<String>,
    pub cursor: Option<String>,
    /// Prepared-statement or connection name operand, when the verb has one.
    pub target: Option<String>,
    pub source: Option<SqlSource>,
    pub connect: Option<ConnectSpec>,
    pub fetch_direction: Option<FetchDirection>,
    pub with_hold: bool,
    pub loc: SourceLoc,
    /// Inclusive line span of the `EXEC SQL … END-EXEC` window in the
    /// consolidated buffer.
    pub span: (usize, usize),
}

impl EsqlStmt {
    pub fn new(id: u32, verb: EsqlVerb, loc: SourceLoc, span: (usize, usize)) -> EsqlStmt {
        EsqlStmt {
            id,
            verb,
            sql: String::new(),
            input_vars: Vec::new(),
            output_vars: Vec::new(),
            cursor: None,
            target: None,
            source: None,
            connect: None,
            fetch_direction: None,
            with_hold: false,
            loc,
            span,
        }
    }
}

#[derive(Debug, Default)]
pub struct EsqlProgram {
    pub host_vars: Vec<HostVarDecl>,
    pub cursors: Vec<CursorDecl>,
    pub statements: Vec<EsqlStmt>,
    /// Spans of ESQL windows that generate no calls (declare-section
    /// brackets, ignored statements); the generator comments these out.
    pub passive_spans: Vec<(usize, usize)>,
}

impl EsqlProgram {
    /// Case-insensitive host variable lookup, COBOL names being
    /// case-insensitive.
    pub fn host_var(&self, name: &str) -> Option<&HostVarDecl> {
        self.host_vars
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    pub fn cursor(&self, name: &str) -> Option<&CursorDecl> {
        self.cursors
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}
