use std::fs;
use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use disasm_oracle::catalog::{Catalog, Pattern, Selection};
use disasm_oracle::config::Config;
use disasm_oracle::format::OutputFormat;
use disasm_oracle::{normalize, Feature, GeneratedModule, ModuleVerdict, NormalizedLine, Oracle};

/// Extension of generated module sources
const SOURCE_EXTENSION: &str = "asm";
/// Extension of the decoded listing the disassembler leaves next to a module
const DECODED_EXTENSION: &str = "dis";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (`name=value` lines)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log generation and comparison details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List catalog forms with their indices
    List {
        /// Mnemonic, mnemonic prefix ending in `*`, or catalog index
        pattern: Option<String>,

        #[arg(long, value_enum)]
        feature: Option<Feature>,

        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Write assembler modules for the selected forms
    Generate {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Mnemonic, mnemonic prefix ending in `*`, or catalog index
        pattern: Option<String>,

        #[arg(long, value_enum)]
        feature: Option<Feature>,

        /// Outer operand values per module
        #[arg(long)]
        capacity: Option<usize>,
    },

    /// Compare one source listing against its decoded listing
    Compare {
        original: PathBuf,
        decoded: PathBuf,

        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Compare every `<name>.asm` in a directory against `<name>.dis`
    Verify {
        #[arg(default_value = ".")]
        dir: PathBuf,

        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::List { pattern, feature, format } => {
            let selection = selection(pattern.as_deref(), feature);
            let rows = Catalog::standard()?.list(&selection)?;
            let output = format.unwrap_or(config.format).get_formatter().format_listing(&rows)?;
            print!("{}", output);
        }

        Command::Generate { out, pattern, feature, capacity } => {
            if let Some(capacity) = capacity {
                config.set("shard_capacity", &capacity.to_string())?;
            }

            let selection = selection(pattern.as_deref(), feature);
            let modules = config.composer().generate(Catalog::standard()?, &selection)?;

            let instructions = write_modules(&out, &modules)?;
            println!("{} modules, {} instructions", modules.len(), instructions);
        }

        Command::Compare { original, decoded, format } => {
            let item = (
                module_name(&original),
                read_listing(&original)?,
                read_listing(&decoded)?,
            );
            let verdicts = config.oracle().compare_all(&[item], false);
            report(&verdicts, format.unwrap_or(config.format))?;
        }

        Command::Verify { dir, format } => {
            let (verdicts, missing) = verify_dir(&dir, &config.oracle(), config.parallel)?;
            for name in &missing {
                eprintln!("{}: no decoded listing", name);
            }
            report(&verdicts, format.unwrap_or(config.format))?;

            if !missing.is_empty() {
                exit(1);
            }
        }
    }

    Ok(())
}

fn selection(pattern: Option<&str>, feature: Option<Feature>) -> Selection {
    let selection = match pattern {
        Some(text) => match text.parse::<Pattern>() {
            Ok(pattern) => Selection::pattern(pattern),
            Err(never) => match never {},
        },
        None => Selection::all(),
    };
    match feature {
        Some(feature) => selection.with_feature(feature),
        None => selection,
    }
}

/// Write each module as `<name>.asm` under `out`; returns the instruction total.
fn write_modules(out: &Path, modules: &[GeneratedModule]) -> Result<usize> {
    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let mut instructions = 0;
    for module in modules {
        let path = out.join(format!("{}.{}", module.name, SOURCE_EXTENSION));
        fs::write(&path, &module.source).with_context(|| format!("writing {}", path.display()))?;
        log::debug!("{}: {} ({} instructions)", path.display(), module.title, module.instructions);
        instructions += module.instructions;
    }
    Ok(instructions)
}

/// Compare every module source in `dir` with its decoded listing.
///
/// Returns the verdicts in name order and the names of modules that have no
/// decoded listing.
fn verify_dir(dir: &Path, oracle: &Oracle, parallel: bool) -> Result<(Vec<ModuleVerdict>, Vec<String>)> {
    let mut sources: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
        })
        .collect();
    sources.sort();

    if sources.is_empty() {
        bail!("no .{} modules in {}", SOURCE_EXTENSION, dir.display());
    }

    let mut items = Vec::with_capacity(sources.len());
    let mut missing = Vec::new();
    for source in &sources {
        let decoded = source.with_extension(DECODED_EXTENSION);
        if !decoded.exists() {
            missing.push(module_name(source));
            continue;
        }
        items.push((module_name(source), read_listing(source)?, read_listing(&decoded)?));
    }

    Ok((oracle.compare_all(&items, parallel), missing))
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_listing(path: &Path) -> Result<Vec<NormalizedLine>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(normalize::listing(&text))
}

/// Print the report and exit non-zero if any module mismatched.
fn report(verdicts: &[ModuleVerdict], format: OutputFormat) -> Result<()> {
    let output = format.get_formatter().format(verdicts)?;
    print!("{}", output);

    if verdicts.iter().any(|verdict| !verdict.result.is_match()) {
        exit(1);
    }
    Ok(())
}
