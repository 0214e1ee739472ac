use anyhow::{Context, Result};
use cavekit::cave::convert::ConvertReport;
use cavekit::cave::{run, ExtensionSource, MagicDetector, PromptResolver, ReconcileReport, StrictResolver};
use cavekit::{Config, ConfigFile, PathOverrides, Task};
use clap::{Args, Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Keep a cave export document and its media directory in sync.
#[derive(Parser, Debug)]
#[command(name = "cavekit", version, about)]
struct Cli {
    /// Config file (default: ./cavekit.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every decision, including unchanged files
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fix file extensions by inspecting file contents
    FixExt {
        #[command(flatten)]
        paths: PathArgs,
    },
    /// Rename media files to {id}-{n}_{channel}-{user}_{ms}{ext}
    Reindex {
        #[command(flatten)]
        paths: PathArgs,
        /// Take extensions from file contents instead of current names
        #[arg(long)]
        detect_extension: bool,
    },
    /// Convert a legacy cave.json to the import format
    Convert {
        #[command(flatten)]
        paths: PathArgs,
        /// userId -> channelId mapping file
        #[arg(long)]
        mapping: Option<String>,
        /// Fail on users missing from the mapping instead of prompting
        #[arg(long)]
        non_interactive: bool,
    },
}

#[derive(Args, Debug)]
struct PathArgs {
    /// Input JSON document
    #[arg(long)]
    input: Option<String>,
    /// Output JSON document
    #[arg(long)]
    output: Option<String>,
    /// Directory holding the media files
    #[arg(long)]
    media_dir: Option<String>,
    /// Indentation of written JSON
    #[arg(long)]
    json_indent: Option<usize>,
}

impl PathArgs {
    fn into_overrides(self, mapping: Option<String>) -> PathOverrides {
        PathOverrides {
            input: self.input,
            output: self.output,
            media_dir: self.media_dir,
            mapping,
            json_indent: self.json_indent,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "cavekit=debug" } else { "cavekit=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let file = ConfigFile::discover(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::FixExt { paths } => {
            let config = Config::resolve(Task::FixExtension, &file, &paths.into_overrides(None));
            let report = run::fix_extensions(&config, MagicDetector)
                .context("Extension fix aborted")?;
            print_files_summary("extension fix", &report);
        }
        Commands::Reindex {
            paths,
            detect_extension,
        } => {
            let config = Config::resolve(Task::Reindex, &file, &paths.into_overrides(None));
            let source = if detect_extension {
                ExtensionSource::Detected
            } else {
                ExtensionSource::Existing
            };
            let report = run::reindex(&config, MagicDetector, source).context("Reindex aborted")?;
            print_files_summary("reindex", &report);
        }
        Commands::Convert {
            paths,
            mapping,
            non_interactive,
        } => {
            let config = Config::resolve(Task::Convert, &file, &paths.into_overrides(mapping));
            let now = chrono::Utc::now();
            let result = if non_interactive {
                run::convert_legacy(&config, &mut StrictResolver, now)
            } else {
                run::convert_legacy(&config, &mut PromptResolver::default(), now)
            };
            let report = result.context("Conversion aborted")?;
            print_convert_summary(&report);
        }
    }
    Ok(())
}

fn print_files_summary(title: &str, report: &ReconcileReport) {
    println!();
    println!("{}", style(format!("--- {title} done ---")).bold());
    println!("corrected:              {}", style(report.corrected).green());
    println!("records updated:        {}", report.records_updated);
    println!("unchanged:              {}", report.unchanged);
    println!("skipped (missing):      {}", style(report.missing).yellow());
    println!("skipped (unknown type): {}", style(report.undetectable).yellow());
    println!("skipped (error):        {}", style(report.errors).red());

    let mut unreconciled = report.unreconciled().peekable();
    if unreconciled.peek().is_some() {
        println!();
        println!("{}", style("not reconciled:").bold());
        for entry in unreconciled {
            let reason = match &entry.outcome {
                cavekit::cave::Outcome::Error(reason) => format!(" ({reason})"),
                _ => String::new(),
            };
            println!(
                "  {:<22} record {} element {}: {}{}",
                entry.outcome.label(),
                entry.record,
                entry.position,
                entry.file,
                reason
            );
        }
    }
}

fn print_convert_summary(report: &ConvertReport) {
    if report.interrupted {
        println!();
        println!("{}", style("stopped early: interrupted while asking for a channel").yellow());
    }
    println!();
    println!("{}", style("--- conversion done ---").bold());
    println!("records converted:      {}", style(report.converted).green());
    println!("rows skipped:           {}", report.skipped_rows);
    println!("new user mappings:      {}", report.new_users);
    print_files_summary("media renames", &report.files);
}
