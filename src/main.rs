use anyhow::{Context, Result};
use clap::Parser;
use spanweave::{ProgramSnapshot, WeaveOutput, Weaver, WeaverConfig};
use std::path::PathBuf;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "spanweave",
    about = "Weave tracing and metrics instrumentation into annotated call sites",
    version
)]
struct Cli {
    /// Files or directories to analyze (directories are walked for .rs files)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Emit wrappers and diagnostics as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Disable the rayon pool and run the per-file passes sequentially
    #[arg(long)]
    no_parallel: bool,

    /// Disable scan-result memoization
    #[arg(long)]
    no_cache: bool,

    /// Module path generated wrappers reach their runtime helpers through
    #[arg(long, env = "SPANWEAVE_RUNTIME_PATH", default_value = spanweave::DEFAULT_RUNTIME_PATH)]
    runtime_path: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = WeaverConfig {
        runtime_path: cli.runtime_path,
        parallel: !cli.no_parallel,
        cache_enabled: !cli.no_cache,
    };

    let sources = collect_sources(&cli.paths)?;
    let snapshot = ProgramSnapshot::parse_files(sources)?;

    let mut weaver = Weaver::new(config);
    let output = weaver.weave(&snapshot)?;

    for diagnostic in &output.diagnostics {
        eprintln!("{diagnostic}");
    }

    if cli.json {
        serde_json::to_writer_pretty(std::io::stdout(), &output)?;
        println!();
    } else {
        print_summary(&output);
    }
    Ok(())
}

fn collect_sources(paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("walking {}", path.display()))?;
                if entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "rs")
                {
                    sources.push(read_source(entry.path())?);
                }
            }
        } else {
            sources.push(read_source(path)?);
        }
    }
    Ok(sources)
}

fn read_source(path: &std::path::Path) -> Result<(PathBuf, String)> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok((path.to_path_buf(), content))
}

fn print_summary(output: &WeaveOutput) {
    for wrapper in &output.wrappers {
        println!(
            "{} {} -> {} ({})",
            wrapper.location, wrapper.declaration_key, wrapper.wrapper_name, wrapper.variant
        );
    }
    println!(
        "{} wrappers, {} diagnostics",
        output.wrappers.len(),
        output.diagnostics.len()
    );
}
