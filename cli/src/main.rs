use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use flagtree_core::{Charset, ErrorStyle, ErrorTree, ParserConfig, SchemaFile, Tokenizer};
use serde::Serialize;
use tracing::{debug, info};

/// CLI-specific error style enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliErrorStyle {
    Flat,
    Tree,
}

impl From<CliErrorStyle> for ErrorStyle {
    fn from(style: CliErrorStyle) -> Self {
        match style {
            CliErrorStyle::Flat => Self::Flat,
            CliErrorStyle::Tree => Self::Tree,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliCharset {
    Ascii,
    Unicode,
}

impl From<CliCharset> for Charset {
    fn from(charset: CliCharset) -> Self {
        match charset {
            CliCharset::Ascii => Self::Ascii,
            CliCharset::Unicode => Self::Unicode,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "flagtree")]
#[command(about = "Check command lines against declarative flag schemas")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Log filter for stderr diagnostics (e.g. warn, debug, flagtree_core=trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a command line against a schema file and report errors.
    Check(CheckArgs),
    /// Print generated help for a schema file.
    Help(SchemaArgs),
    /// Print the token stream of an input string.
    Tokens(TokensArgs),
    /// Load a schema file and report declaration problems.
    Validate(SchemaArgs),
}

#[derive(Debug, Args)]
struct SchemaArgs {
    /// Schema document (YAML, or JSON by `.json` extension).
    #[arg(long)]
    schema: PathBuf,
    /// Parser configuration file (YAML, or JSON by `.json` extension).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[command(flatten)]
    schema: SchemaArgs,
    /// Error rendering style (defaults to the configured style).
    #[arg(long)]
    style: Option<CliErrorStyle>,
    /// Tree drawing characters (defaults to the configured charset or a terminal probe).
    #[arg(long)]
    charset: Option<CliCharset>,
    /// Print a JSON report on stdout instead of text.
    #[arg(long)]
    json: bool,
    /// Parse this string instead of the trailing arguments.
    #[arg(long, conflicts_with = "args", allow_hyphen_values = true)]
    line: Option<String>,
    /// Arguments to check, after `--`.
    #[arg(last = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct TokensArgs {
    /// Command-line string to tokenize.
    #[arg(allow_hyphen_values = true)]
    input: String,
}

#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    program: &'a str,
    ok: bool,
    values: BTreeMap<String, Vec<String>>,
    errors: &'a ErrorTree,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&cli.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let result = match cli.command {
        Command::Check(args) => run_check(args),
        Command::Help(args) => run_help(args),
        Command::Tokens(args) => run_tokens(args),
        Command::Validate(args) => run_validate(args),
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ParserConfig, String> {
    match path {
        Some(path) => ParserConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display())),
        None => Ok(ParserConfig::default()),
    }
}

fn load_parser(args: &SchemaArgs) -> Result<flagtree_core::Parser, String> {
    let config = load_config(args.config.as_deref())?;
    let file = SchemaFile::load(&args.schema)
        .map_err(|err| format!("Failed to load schema '{}': {err}", args.schema.display()))?;
    debug!(schema = %args.schema.display(), name = %file.name, "loaded schema file");
    file.build(config)
        .map_err(|err| format!("Invalid schema '{}': {err}", args.schema.display()))
}

fn run_check(args: CheckArgs) -> Result<i32, String> {
    let mut parser = load_parser(&args.schema)?;
    if let Some(style) = args.style {
        parser.config_mut().error_style = style.into();
    }
    if let Some(charset) = args.charset {
        parser.config_mut().charset = Some(charset.into());
    }

    let parsed = match &args.line {
        Some(line) => parser.parse_str(line),
        None => {
            // parse_args skips argv[0]
            let argv: Vec<String> = std::iter::once(parser.name().to_string())
                .chain(args.args.iter().cloned())
                .collect();
            parser.parse_args(&argv)
        }
    };
    parsed.map_err(|err| format!("Parse aborted: {err}"))?;

    let ok = !parser.has_errors();
    info!(program = parser.name(), ok, "checked command line");

    if args.json {
        let report = CheckReport {
            program: parser.name(),
            ok,
            values: parser.values(),
            errors: parser.errors(),
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|err| format!("Failed to serialize report: {err}"))?;
        println!("{json}");
    } else {
        for (path, values) in parser.values() {
            println!("{path} = {}", values.join(" "));
        }
        if !ok {
            eprint!("{}", parser.render_errors_default());
        }
    }

    Ok(if ok { 0 } else { 1 })
}

fn run_help(args: SchemaArgs) -> Result<i32, String> {
    let parser = load_parser(&args)?;
    print!("{}", parser.help());
    Ok(0)
}

fn run_tokens(args: TokensArgs) -> Result<i32, String> {
    let stream = Tokenizer::tokenize(&args.input);
    for token in stream.tokens() {
        println!("{:>4}  {:<10}  {}", token.position, format!("{:?}", token.kind), token.image);
    }
    Ok(0)
}

fn run_validate(args: SchemaArgs) -> Result<i32, String> {
    let parser = load_parser(&args)?;
    let contexts = parser.schema().contexts().count();
    let entries: usize = parser
        .schema()
        .contexts()
        .map(|(_, ctx)| ctx.entries.len() + ctx.positionals.len())
        .sum();
    println!(
        "{}: ok ({entries} entries in {contexts} contexts, {} constraints)",
        args.schema.display(),
        parser.constraints().len()
    );
    Ok(0)
}
