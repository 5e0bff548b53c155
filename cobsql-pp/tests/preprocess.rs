use std::fs;
use std::path::Path;
use std::sync::Arc;

use cobsql_pp::codegen::EsqlProcessor;
use cobsql_pp::consolidate::{SourceConsolidation, FILE_POP_MARKER, FILE_PUSH_MARKER};
use cobsql_pp::options::keys;
use cobsql_pp::parser::EsqlParser;
use cobsql_pp::{CopyResolver, Preprocessor};

fn write(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

fn build_preprocessor(dir: &Path, infile: &Path, outfile: &Path, esql: bool) -> Preprocessor {
    let mut resolver = CopyResolver::new(dir);
    resolver.add_search_dir(dir);

    let mut pp = Preprocessor::new();
    pp.set_copy_resolver(Arc::new(resolver));
    pp.add_step(Box::new(SourceConsolidation::new()));
    if esql {
        pp.add_step(Box::new(EsqlParser::new()));
        pp.add_step(Box::new(EsqlProcessor::new()));
    }
    pp.set_input_file(infile.to_string_lossy().to_string());
    pp.set_output_file(outfile.to_string_lossy().to_string());
    pp
}

#[test]
fn consolidation_splices_copybook_with_markers() {
    let tmp = tempfile::tempdir().unwrap();
    let main = tmp.path().join("main.cbl");
    write(&tmp.path().join("FOO.cpy"), "       01 X PIC X(10).\n");
    write(
        &main,
        "       IDENTIFICATION DIVISION.\n       COPY FOO.\n       PROCEDURE DIVISION.\n",
    );

    let out = tmp.path().join("main.cob");
    let mut pp = build_preprocessor(tmp.path(), &main, &out, false);
    pp.set_option(keys::PREPROCESS_COPY_FILES, true);
    assert!(pp.process(), "{:?}", pp.err_data());

    let text = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    let spliced = lines
        .iter()
        .position(|l| l.trim_end() == "       01 X PIC X(10).")
        .expect("copybook line missing");
    assert!(lines[spliced - 1].starts_with(FILE_PUSH_MARKER));
    assert!(lines[spliced - 1].contains("FOO"));
    assert_eq!(lines[spliced + 1], FILE_POP_MARKER);
}

#[test]
fn copybook_cycle_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    write(&tmp.path().join("A.cpy"), "       COPY B.\n");
    write(&tmp.path().join("B.cpy"), "       COPY A.\n");
    let main = tmp.path().join("main.cbl");
    write(&main, "       COPY A.\n");

    let out = tmp.path().join("main.cob");
    let mut pp = build_preprocessor(tmp.path(), &main, &out, false);
    pp.set_option(keys::PREPROCESS_COPY_FILES, true);
    assert!(!pp.process());
    assert!(pp.err_data().errors[0].contains("cycle"));
}

#[test]
fn missing_copybook_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let main = tmp.path().join("main.cbl");
    write(&main, "       COPY NOWHERE.\n");

    let out = tmp.path().join("main.cob");
    let mut pp = build_preprocessor(tmp.path(), &main, &out, false);
    pp.set_option(keys::PREPROCESS_COPY_FILES, true);
    assert!(!pp.process());
    assert!(pp.err_data().errors[0].contains("NOWHERE"));
}

const SELECT_PROGRAM: &str = "\
       IDENTIFICATION DIVISION.
       PROGRAM-ID. T2.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
       EXEC SQL BEGIN DECLARE SECTION END-EXEC.
       01 HV-B PIC 9(4).
       01 HV-C PIC X(10).
       EXEC SQL END DECLARE SECTION END-EXEC.
       PROCEDURE DIVISION.
           EXEC SQL
               SELECT A FROM T WHERE B = :HV-B AND C = :HV-C
           END-EXEC.
           STOP RUN.
";

#[test]
fn parameter_markers_become_numbered_placeholders() {
    let tmp = tempfile::tempdir().unwrap();
    let main = tmp.path().join("t2.cbl");
    write(&main, SELECT_PROGRAM);

    let out = tmp.path().join("t2.cob");
    let mut pp = build_preprocessor(tmp.path(), &main, &out, true);
    pp.set_option(keys::PARAMS_STYLE, 'a');
    assert!(pp.process(), "{:?}", pp.err_data());

    let text = fs::read_to_string(&out).unwrap();
    assert!(
        text.contains("SELECT A FROM T WHERE B = $1 AND C = $2"),
        "generated SQL constant missing:\n{text}"
    );

    // binding order follows first appearance
    let b = text.find("BY REFERENCE HV-B").expect("HV-B binding");
    let c = text.find("BY REFERENCE HV-C").expect("HV-C binding");
    assert!(b < c);

    // the ESQL window is gone from the generated program
    assert!(!text.to_uppercase().contains("EXEC SQL SELECT"));
}

#[test]
fn params_style_d_emits_question_marks() {
    let tmp = tempfile::tempdir().unwrap();
    let main = tmp.path().join("t2.cbl");
    write(&main, SELECT_PROGRAM);

    let out = tmp.path().join("t2.cob");
    let mut pp = build_preprocessor(tmp.path(), &main, &out, true);
    pp.set_option(keys::PARAMS_STYLE, 'd');
    assert!(pp.process(), "{:?}", pp.err_data());

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.contains("SELECT A FROM T WHERE B = ? AND C = ?"));
}

#[test]
fn non_esql_text_survives_verbatim() {
    let tmp = tempfile::tempdir().unwrap();
    let source = "\
       IDENTIFICATION DIVISION.
       PROGRAM-ID. PLAIN.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
       01 W-X PIC X(4).
       PROCEDURE DIVISION.
           MOVE \"ABCD\" TO W-X.
           STOP RUN.
";
    let main = tmp.path().join("plain.cbl");
    write(&main, source);

    let out = tmp.path().join("plain.cob");
    let mut pp = build_preprocessor(tmp.path(), &main, &out, true);
    assert!(pp.process(), "{:?}", pp.err_data());
    assert_eq!(fs::read_to_string(&out).unwrap(), source);
}

const CURSOR_PROGRAM: &str = "\
       IDENTIFICATION DIVISION.
       PROGRAM-ID. T3.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
       EXEC SQL BEGIN DECLARE SECTION END-EXEC.
       01 K PIC 9(4).
       01 R PIC X(20).
       EXEC SQL END DECLARE SECTION END-EXEC.
       EXEC SQL DECLARE CUR1 CURSOR FOR
           SELECT * FROM T WHERE K=:K
       END-EXEC.
       PROCEDURE DIVISION.
           EXEC SQL OPEN CUR1 END-EXEC.
           EXEC SQL FETCH CUR1 INTO :R END-EXEC.
           EXEC SQL CLOSE CUR1 END-EXEC.
           STOP RUN.
";

#[test]
fn cursor_lifecycle_generates_all_four_calls() {
    let tmp = tempfile::tempdir().unwrap();
    let main = tmp.path().join("t3.cbl");
    write(&main, CURSOR_PROGRAM);

    let out = tmp.path().join("t3.cob");
    let mut pp = build_preprocessor(tmp.path(), &main, &out, true);
    pp.set_option(keys::PARAMS_STYLE, 'a');
    assert!(pp.process(), "{:?}", pp.err_data());

    let text = fs::read_to_string(&out).unwrap();
    for entry in [
        "CBSQLCursorDeclare",
        "CBSQLCursorOpen",
        "CBSQLCursorFetchOne",
        "CBSQLCursorClose",
    ] {
        assert!(text.contains(entry), "missing {entry}:\n{text}");
    }
    assert!(text.contains("SELECT * FROM T WHERE K=$1"));
    // fetch result binding
    assert!(text.contains("BY REFERENCE R"));
}

#[test]
fn map_file_records_original_locations() {
    let tmp = tempfile::tempdir().unwrap();
    let main = tmp.path().join("t2.cbl");
    write(&main, SELECT_PROGRAM);

    let out = tmp.path().join("t2.cob");
    let map = tmp.path().join("t2.map");
    let mut pp = build_preprocessor(tmp.path(), &main, &out, true);
    pp.set_option(keys::EMIT_MAP_FILE, true);
    pp.set_option(keys::MAP_FILE, map.to_string_lossy().to_string());
    assert!(pp.process(), "{:?}", pp.err_data());

    let map_text = fs::read_to_string(&map).unwrap();
    let row: Vec<&str> = map_text.lines().next().unwrap().split('\t').collect();
    // generated-line, original-file, original-line, original-column, verb, id
    assert_eq!(row.len(), 6);
    assert!(row[1].contains("t2.cbl"));
    assert_eq!(row[2], "10");
    assert_eq!(row[4], "SELECT");
    assert_eq!(row[5], "1");

    // the mapped generated line is the verb call itself
    let gen_line: usize = row[0].parse().unwrap();
    let text = fs::read_to_string(&out).unwrap();
    let line = text.lines().nth(gen_line - 1).unwrap();
    assert!(line.contains("CBSQLExecSelectInto"), "line was: {line}");
}

#[test]
fn duplicate_host_variable_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let source = "\
       WORKING-STORAGE SECTION.
       EXEC SQL BEGIN DECLARE SECTION END-EXEC.
       01 DUP PIC 9(4).
       01 DUP PIC X(4).
       EXEC SQL END DECLARE SECTION END-EXEC.
";
    let main = tmp.path().join("dup.cbl");
    write(&main, source);

    let out = tmp.path().join("dup.cob");
    let mut pp = build_preprocessor(tmp.path(), &main, &out, true);
    assert!(!pp.process());
    assert!(pp.err_data().errors[0].contains("duplicate"));
}

#[test]
fn sqlca_include_expands_inline() {
    let tmp = tempfile::tempdir().unwrap();
    let source = "\
       DATA DIVISION.
       WORKING-STORAGE SECTION.
       EXEC SQL INCLUDE SQLCA END-EXEC.
       PROCEDURE DIVISION.
";
    let main = tmp.path().join("ca.cbl");
    write(&main, source);

    let out = tmp.path().join("ca.cob");
    let mut pp = build_preprocessor(tmp.path(), &main, &out, true);
    assert!(pp.process(), "{:?}", pp.err_data());
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.contains("01  SQLCA."));
    assert!(text.contains("SQLCODE"));
}
