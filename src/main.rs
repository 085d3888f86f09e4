#[macro_use]
extern crate lazy_static;

mod ast;
mod codegen;
mod codetable;
mod error;
mod lexer;
mod parser;
mod registers;
mod storage;
mod symtab;


use {
    crate::{
        ast::{Ast, NodeId},
        codegen::generate_code,
        codetable::CodeTable,
        error::{CompileError, Diagnostic},
        lexer::lex_all_tokens,
        parser::parse_source,
    },
    clap::Parser as _,
    std::{
        io::{self, BufWriter, Write},
        path::Path,
    },
    tracing::{debug, info, instrument},
    tracing_subscriber::{
        layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
    },
};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Only lex, printing every token.
    Lex,

    /// Lex and parse.
    Parse,

    /// Lex, parse and generate code.
    All,
}

#[derive(clap::Parser, Clone, Debug)]
#[command(author, version, about = "Compiles C-- source into a MIPS assembly listing")]
struct CmmArgs {
    #[arg()]
    input_path: String,

    /// Where to write the listing. Defaults to the input path with an .s extension.
    #[arg(short = 'o', long = "output")]
    output_path: Option<String>,

    #[arg(short = 'm', long = "mode", value_enum, default_value_t = Mode::All)]
    mode: Mode,

    /// Print the syntax tree sideways to stdout.
    #[arg(long = "print-ast")]
    should_print_ast: bool,

    /// Write a python script that draws the syntax tree with nltk.
    #[arg(long = "nltk")]
    nltk_path: Option<String>,

    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// Everything produced by a successful compilation.
#[derive(Debug)]
struct Compilation {
    ast: Ast,
    root: NodeId,
    diagnostics: Vec<Diagnostic>,
    code: Option<CodeTable>,
}

fn format_io_err(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> CompileError {
    let context = context.into();
    move |source| CompileError::Io { context, source }
}

#[instrument(level = "info", skip_all)]
fn compile(input: &str, mode: Mode) -> Result<Compilation, CompileError> {
    let parsed = parse_source(input)?;
    info!(nodes = parsed.ast.len(), diagnostics = parsed.diagnostics.len(), "parsed");

    for diagnostic in parsed.diagnostics.iter() {
        eprintln!("{}", diagnostic);
    }

    let code = if mode == Mode::All {
        let code = generate_code(&parsed.ast, parsed.root)?;
        info!(instructions = code.len(), "generated");
        Some(code)
    } else {
        None
    };

    Ok(Compilation {
        ast: parsed.ast,
        root: parsed.root,
        diagnostics: parsed.diagnostics,
        code,
    })
}

fn default_output_path(input_path: &str) -> String {
    Path::new(input_path)
        .with_extension("s")
        .to_string_lossy()
        .into_owned()
}

fn compile_file(args: &CmmArgs) -> Result<(), CompileError> {
    let input = std::fs::read_to_string(&args.input_path)
        .map_err(format_io_err(format!("failed to read {}", args.input_path)))?;
    debug!(path = %args.input_path, bytes = input.len(), "loaded");

    if args.mode == Mode::Lex {
        for token in lex_all_tokens(&input)? {
            println!("{}", token);
        }
        return Ok(());
    }

    let compilation = compile(&input, args.mode)?;

    if args.should_print_ast {
        print!("{}", compilation.ast.to_sideways_string(compilation.root));
    }

    if let Some(nltk_path) = &args.nltk_path {
        std::fs::write(nltk_path, compilation.ast.to_nltk_script(compilation.root))
            .map_err(format_io_err(format!("failed to write {}", nltk_path)))?;
    }

    // The listing only reaches the disk once it is complete.
    if let Some(code) = &compilation.code {
        let output_path = args
            .output_path
            .clone()
            .unwrap_or_else(|| default_output_path(&args.input_path));

        let file = std::fs::File::create(&output_path)
            .map_err(format_io_err(format!("failed to create {}", output_path)))?;
        let mut writer = BufWriter::new(file);
        code.write_to(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(format_io_err(format!("failed to write {}", output_path)))?;

        info!(path = %output_path, "wrote listing");
    }

    Ok(())
}

/// Compiles and reports a failure as a single line on `errors`. Returns the exit status.
fn run(args: &CmmArgs, errors: &mut impl Write) -> i32 {
    match compile_file(args) {
        Ok(()) => 0,
        Err(err) => {
            let _ = writeln!(errors, "{}", err);
            1
        }
    }
}

fn main() {
    let args = CmmArgs::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = Registry::default()
        .with(tracing_forest::ForestLayer::default().with_filter(filter))
        .try_init();

    let status = run(&args, &mut io::stderr());
    if status != 0 {
        std::process::exit(status);
    }
}
