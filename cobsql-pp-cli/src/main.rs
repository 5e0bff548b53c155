use std::path::Path;
use std::sync::Arc;

use cobsql_pp::codegen::EsqlProcessor;
use cobsql_pp::consolidate::SourceConsolidation;
use cobsql_pp::options::keys;
use cobsql_pp::parser::EsqlParser;
use cobsql_pp::{CopyResolver, Preprocessor};
use env_logger::Env;
use log::warn;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "cobsqlpp",
    about = "Embedded-SQL preprocessor for COBOL. Translates EXEC SQL statements into runtime bridge calls."
)]
struct Opt {
    /// Copybook search path, repeatable; entries are separated with `;` on
    /// Windows and `:` elsewhere
    #[structopt(short = "I", long = "copypath")]
    copy_paths: Vec<String>,
    /// Input source file
    #[structopt(short = "i", long = "infile")]
    infile: Option<String>,
    /// Output source file; a stem of `@` derives the name from the input
    /// basename plus the given extension
    #[structopt(short = "o", long = "outfile")]
    outfile: Option<String>,
    /// Emit a symbol file listing every host variable
    #[structopt(short = "s", long = "symfile")]
    symfile: Option<String>,
    /// Translate embedded SQL
    #[structopt(short = "e", long = "esql")]
    esql: bool,
    /// Inline COPY files during consolidation
    #[structopt(short = "p", long = "esql-preprocess-copy")]
    preprocess_copy: bool,
    /// Copybook extension list, comma separated
    #[structopt(short = "E", long = "esql-copy-exts")]
    copy_exts: Option<String>,
    /// Parameter placeholder style: a = $n, d = ?, c = :name
    #[structopt(short = "z", long = "param-style", default_value = "d")]
    param_style: String,
    /// Emit static calls to the runtime bridge
    #[structopt(short = "S", long = "esql-static-calls")]
    static_calls: bool,
    /// Keep original statements as comments in the generated source
    #[structopt(short = "g", long = "debug-info")]
    debug_info: bool,
    /// Consolidate COPY/INCLUDE references into one file
    #[structopt(short = "c", long = "consolidate")]
    consolidate: bool,
    /// Keep temporary files
    #[structopt(short = "k", long = "keep")]
    keep: bool,
    /// Echo configuration and progress
    #[structopt(short = "v", long = "verbose")]
    verbose: bool,
    /// Verbose debug output
    #[structopt(short = "d", long = "verbose-debug")]
    verbose_debug: bool,
    /// Trace the parser scanner
    #[structopt(short = "D", long = "parser-scanner-debug")]
    parser_scanner_debug: bool,
    /// Emit a map file linking generated call sites to original sources
    #[structopt(short = "m", long = "map")]
    map: bool,
    /// Restrict generated code to COBOL-85
    #[structopt(short = "C", long = "cobol85")]
    cobol85: bool,
    /// Varlen subfield suffixes, e.g. LEN,ARR
    #[structopt(short = "Y", long = "varying", default_value = "LEN,ARR")]
    varying: String,
    /// PIC X handling: char (trimmed), charf (fixed), varchar (varlen)
    #[structopt(short = "P", long = "picx-as", default_value = "char")]
    picx_as: String,
    /// SQLCODE replacing 100 after a FETCH past the last row
    #[structopt(long = "no-rec-code")]
    no_rec_code: Option<i64>,
}

fn usage_error(message: &str) -> ! {
    eprintln!("cobsqlpp: {message}");
    eprintln!("Try 'cobsqlpp --help' for more information.");
    std::process::exit(1);
}

fn path_separator() -> char {
    if cfg!(windows) {
        ';'
    } else {
        ':'
    }
}

/// `-o @.cob` names the output after the input basename with the new
/// extension, next to the input file.
fn derive_outfile(infile: &str, outfile: &str) -> String {
    let out = Path::new(outfile);
    let stem_is_at = out
        .file_stem()
        .map(|s| s == "@")
        .unwrap_or(false);
    if !stem_is_at {
        return outfile.to_string();
    }
    match out.extension() {
        Some(ext) => Path::new(infile)
            .with_extension(ext)
            .to_string_lossy()
            .to_string(),
        None => Path::new(infile)
            .with_extension("")
            .to_string_lossy()
            .to_string(),
    }
}

fn main() {
    let opt = Opt::from_args();

    let default_filter = if opt.verbose_debug || opt.parser_scanner_debug {
        "debug"
    } else if opt.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    if !opt.esql && !opt.consolidate {
        usage_error("nothing to do: pass at least one of -e/--esql or -c/--consolidate");
    }
    let Some(infile) = opt.infile.clone() else {
        usage_error("no input file (-i/--infile)");
    };
    let Some(outfile) = opt.outfile.clone() else {
        usage_error("no output file (-o/--outfile)");
    };
    let outfile = derive_outfile(&infile, &outfile);
    if infile == outfile {
        usage_error("input and output file must be different");
    }
    if !matches!(opt.param_style.as_str(), "a" | "d" | "c") {
        usage_error("param style must be one of a, d, c");
    }
    if !matches!(opt.picx_as.as_str(), "char" | "charf" | "varchar") {
        usage_error("picx-as must be one of char, charf, varchar");
    }
    if !opt.varying.contains(',') {
        usage_error("varying suffixes must be of the form LEN,ARR");
    }
    if let Some(code) = opt.no_rec_code {
        if !(-999_999_999..=999_999_999).contains(&code) {
            usage_error("no-rec-code must be between -999999999 and 999999999");
        }
    }

    let start_dir = Path::new(&infile)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    let mut resolver = CopyResolver::new(start_dir);
    for entry in &opt.copy_paths {
        for dir in entry.split(path_separator()).filter(|d| !d.is_empty()) {
            resolver.add_search_dir(dir);
        }
    }
    if let Some(exts) = &opt.copy_exts {
        resolver.set_extensions(exts.split(',').map(str::to_string).collect());
    }
    resolver.set_verbose(opt.verbose || opt.verbose_debug);

    let mut pp = Preprocessor::new();
    pp.set_copy_resolver(Arc::new(resolver));
    pp.add_step(Box::new(SourceConsolidation::new()));
    if opt.esql {
        pp.add_step(Box::new(EsqlParser::new()));
        pp.add_step(Box::new(EsqlProcessor::new()));
    }
    pp.set_input_file(infile);
    pp.set_output_file(outfile);
    pp.set_verbose(opt.verbose || opt.verbose_debug);

    pp.set_option(keys::VARLEN_SUFFIXES, opt.varying.as_str());
    pp.set_option(keys::EMIT_STATIC_CALLS, opt.static_calls);
    pp.set_option(
        keys::PARAMS_STYLE,
        opt.param_style.chars().next().unwrap_or('d'),
    );
    pp.set_option(keys::PREPROCESS_COPY_FILES, opt.preprocess_copy);
    pp.set_option(keys::CONSOLIDATED_MAP, opt.consolidate && opt.esql);
    pp.set_option(keys::EMIT_MAP_FILE, opt.map);
    pp.set_option(keys::EMIT_COBOL85, opt.cobol85);
    pp.set_option(keys::PICX_AS, opt.picx_as.as_str());
    pp.set_option(keys::PICX_AS_VARCHAR, opt.picx_as == "varchar");
    pp.set_option(keys::DEBUG_PARSER_SCANNER, opt.parser_scanner_debug);
    pp.set_option(keys::EMIT_DEBUG_INFO, opt.debug_info);
    pp.set_option(keys::KEEP_TEMP_FILES, opt.keep);
    if let Some(code) = opt.no_rec_code {
        pp.set_option(keys::NO_REC_CODE, code as i32);
    }
    if let Some(symfile) = &opt.symfile {
        pp.set_option(keys::SYM_FILE, symfile.as_str());
    }

    let ok = pp.process();
    for warning in &pp.err_data().warnings {
        warn!("{warning}");
    }
    if !ok {
        for message in &pp.err_data().errors {
            eprintln!("cobsqlpp: {message}");
        }
        let code = pp.err_data().code;
        std::process::exit(if code == 0 { 1 } else { code });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_outfile_at_stem() {
        assert_eq!(derive_outfile("foo.cbl", "@.cob"), "foo.cob");
        assert_eq!(derive_outfile("dir/foo.cbl", "@.cob"), "dir/foo.cob");
        assert_eq!(derive_outfile("foo.cbl", "bar.cob"), "bar.cob");
        assert_eq!(derive_outfile("foo.cbl", "@"), "foo");
    }

    #[test]
    fn test_flag_parsing() {
        let opt = Opt::from_iter(vec![
            "cobsqlpp", "-e", "-i", "foo.cbl", "-o", "@.cob", "-z", "a", "-S", "-m",
        ]);
        assert!(opt.esql);
        assert_eq!(opt.param_style, "a");
        assert!(opt.static_calls);
        assert!(opt.map);
        assert_eq!(opt.infile.as_deref(), Some("foo.cbl"));
    }

    #[test]
    fn test_copy_path_splitting() {
        let sep = path_separator();
        let entry = format!("one{sep}two");
        let dirs: Vec<&str> = entry.split(sep).collect();
        assert_eq!(dirs, vec!["one", "two"]);
    }
}
