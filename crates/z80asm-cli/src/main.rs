use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing::Level;
use z80asm_common::lexer::parse_number;
use z80asm_common::{Assembler, AssemblyOptions};

#[derive(Parser, Debug)]
#[command(name = "z80asm")]
#[command(version, about = "Z80 Assembler CLI", long_about = None)]
struct Args {
    /// Input file (use - for stdin)
    #[arg(default_value = "-")]
    input: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Hex)]
    format: Format,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Address of the first instruction
    #[arg(long, value_parser = parse_address)]
    origin: Option<u16>,

    /// Pre-defined constants (repeatable)
    #[arg(short = 'D', long, value_name = "NAME=VALUE", value_parser = parse_define)]
    define: Vec<(String, i64)>,

    /// JSON file with assembly options (`origin`, `defines`)
    #[arg(long)]
    config: Option<PathBuf>,

    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[arg(short, long, default_value_t = Level::WARN)]
    log_level: Level,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Hex,
    Bin,
}

fn parse_address(s: &str) -> Result<u16, String> {
    let value = parse_number(s).ok_or_else(|| format!("invalid address `{s}`"))?;
    u16::try_from(value).map_err(|_| format!("address `{s}` is outside 0..=65535"))
}

fn parse_define(s: &str) -> Result<(String, i64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid NAME=VALUE: no `=` found in `{s}`"))?;
    let value = parse_number(value).ok_or_else(|| format!("invalid value in `{s}`"))?;
    Ok((name.trim().to_string(), value))
}

fn load_options(args: &Args) -> Result<AssemblyOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("cannot read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => AssemblyOptions::default(),
    };
    if let Some(origin) = args.origin {
        options.origin = origin;
    }
    options.defines.extend(args.define.iter().cloned());
    Ok(options)
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(io::stderr)
        .init();

    let input = if args.input == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(&args.input).with_context(|| format!("cannot read {}", args.input))?
    };

    let options = load_options(&args)?;
    tracing::debug!(origin = options.origin, defines = options.defines.len(), "options loaded");

    let assembly = Assembler::new().with_options(options).assemble_source(&input);
    let name = if args.input == "-" { "<stdin>" } else { args.input.as_str() };
    for diagnostic in &assembly.diagnostics {
        eprintln!(
            "{}:{}:{}: {}",
            name, diagnostic.position.line, diagnostic.position.column, diagnostic.error
        );
    }

    let bytes = match assembly.into_bytes() {
        Ok(bytes) => bytes,
        Err(diagnostics) => bail!("{}", diagnostics),
    };
    tracing::info!(bytes = bytes.len(), "assembled");

    let encoded = match args.format {
        Format::Hex => format!("{}\n", hex::encode(&bytes)).into_bytes(),
        Format::Bin => bytes,
    };
    match &args.output {
        Some(path) => fs::write(path, &encoded)
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => io::stdout().write_all(&encoded)?,
    }

    Ok(())
}
