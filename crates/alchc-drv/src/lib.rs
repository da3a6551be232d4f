//! alchc-drv - Compiler Driver
//!
//! Entry point and orchestrator for the pipeline:
//!
//! ```text
//! source -> [lex] -> tokens -> [parse] -> tree -> frontend.ast
//!        -> [optimize] -> midend.ast -> [backend] -> output.asm
//! ```
//!
//! The frontend passes accumulate diagnostics and always run to
//! completion; the driver aborts the pipeline between passes when the
//! sink is non-empty, printing each record with a source line and caret.
//! The stages hand trees to each other through serialized stage files,
//! which are deleted on success unless `--keep-temps` is given.
//!
//! Exit code 0 on success, 1 on any error (lexical or parse diagnostics,
//! file I/O, backend error).

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use alchc_ast::Tree;
use alchc_gen::emit_assembly;
use alchc_lex::{tokenize, LexConfig};
use alchc_mid::optimize;
use alchc_par::{parse, FuncTable};
use alchc_util::{render_diagnostic, DiagSink};

/// Compiled when no input file is given.
pub const DEFAULT_PROGRAM: &str = "func main(a, b) {
    x = a + b;
    if (x) { print(x); };
    return x;
};
";

/// Command line interface
#[derive(Debug, Parser)]
#[command(name = "alchc", version, about = "Compiler for the Alchemist language")]
pub struct Cli {
    /// Input source file; the built-in sample program when omitted
    pub input: Option<PathBuf>,

    /// Output assembly file
    #[arg(default_value = "out.asm")]
    pub output: PathBuf,

    /// Frontend stage file (tree as written by the parser)
    #[arg(default_value = "frontend.ast")]
    pub frontend_ast: PathBuf,

    /// Midend stage file (tree after simplification)
    #[arg(default_value = "midend.ast")]
    pub midend_ast: PathBuf,

    /// Keep the two intermediate stage files
    #[arg(long)]
    pub keep_temps: bool,
}

/// Parse the command line and run the pipeline.
pub fn run() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    compile(&cli)
}

/// Run the whole pipeline for one configuration.
pub fn compile(cli: &Cli) -> Result<()> {
    let (source, source_name) = match &cli.input {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("cannot read '{}'", path.display()))?;
            (text, path.display().to_string())
        }
        None => {
            info!("no input file; compiling the built-in sample program");
            (DEFAULT_PROGRAM.to_string(), "<builtin>".to_string())
        }
    };

    // Lex. Lexical errors accumulate; the pass always finishes.
    let mut sink = DiagSink::new();
    let tokens = tokenize(&source, &LexConfig::default(), &mut sink);
    debug!(tokens = tokens.len(), "lexing finished");
    if !sink.is_empty() {
        report_diagnostics(&source, &source_name, &sink);
        bail!("{} lexical error(s)", sink.len());
    }

    // Parse (both passes).
    let mut tree = Tree::new();
    let mut func_table = FuncTable::new();
    parse(&mut tree, &source, &tokens, &mut func_table, &mut sink);
    debug!(
        nodes = tree.size,
        functions = func_table.len(),
        "parsing finished"
    );
    if !sink.is_empty() {
        report_diagnostics(&source, &source_name, &sink);
        bail!("{} parse error(s)", sink.len());
    }

    // Frontend stage file.
    fs::write(&cli.frontend_ast, tree.to_text())
        .with_context(|| format!("cannot write '{}'", cli.frontend_ast.display()))?;
    info!(file = %cli.frontend_ast.display(), "frontend tree written");

    // Midend: read the stage file back, simplify, write the next stage.
    let frontend_text = fs::read_to_string(&cli.frontend_ast)
        .with_context(|| format!("cannot read '{}'", cli.frontend_ast.display()))?;
    let mut tree = Tree::from_text(&frontend_text)
        .with_context(|| format!("malformed stage file '{}'", cli.frontend_ast.display()))?;
    optimize(&mut tree);
    debug!(nodes = tree.size, "midend finished");
    fs::write(&cli.midend_ast, tree.to_text())
        .with_context(|| format!("cannot write '{}'", cli.midend_ast.display()))?;
    info!(file = %cli.midend_ast.display(), "midend tree written");

    // Backend: a re-read tree interns in its own order, so the backend
    // gets a fresh table and refills it from the declarations (pass 1).
    let midend_text = fs::read_to_string(&cli.midend_ast)
        .with_context(|| format!("cannot read '{}'", cli.midend_ast.display()))?;
    let tree = Tree::from_text(&midend_text)
        .with_context(|| format!("malformed stage file '{}'", cli.midend_ast.display()))?;
    let mut backend_table = FuncTable::new();
    let asm = emit_assembly(&tree, &mut backend_table).context("backend failed")?;

    fs::write(&cli.output, asm)
        .with_context(|| format!("cannot write '{}'", cli.output.display()))?;
    info!(file = %cli.output.display(), "assembly written");

    if !cli.keep_temps {
        let _ = fs::remove_file(&cli.frontend_ast);
        let _ = fs::remove_file(&cli.midend_ast);
        debug!("stage files removed");
    }
    Ok(())
}

/// Print every diagnostic with its source line and caret marker.
fn report_diagnostics(source: &str, source_name: &str, sink: &DiagSink) {
    for diag in sink.iter() {
        eprint!("{}", render_diagnostic(source, source_name, diag));
    }
}

/// Stderr logging, filtered by the `ALCHC_LOG` environment variable
/// (`warn` by default).
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("ALCHC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
