//! # Metaweave CLI (`weave`)
//!
//! The `weave` binary merges harvested metadata records and rich user
//! content into canonical output records, driven by a JSON template.
//!
//! ## Usage
//!
//! ```bash
//! weave --config ./weave.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `weave transform datasets` | Merge every harvested dataset record |
//! | `weave transform tools --id <id>` | Merge a single tool record |
//! | `weave check` | Validate every instruction in the template |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use metaweave::model::RecordKind;
use metaweave::{assemble, config, traverse};

/// Metaweave — merge rich user content and structured metadata into
/// canonical records, driven by a declarative template.
#[derive(Parser)]
#[command(
    name = "weave",
    about = "Metaweave — template-driven merging of rich user content and structured metadata",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./weave.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Merge records of the given kind through the template.
    ///
    /// Loads the template once, then for each record id found in the
    /// records directory (or the single `--id`) resolves every template
    /// instruction against the record's rich user content and the
    /// structured-query service, writing one merged JSON file per record.
    Transform {
        /// Record kind: `datasets` or `tools`. Selects the query database
        /// and the identifying field used in synthesized queries.
        kind: String,

        /// Merge a single record instead of the whole records directory.
        #[arg(long)]
        id: Option<String>,
    },

    /// Validate the template without merging anything.
    ///
    /// Parses every instruction and compiles every regex, reporting the
    /// first defective instruction. Useful as a pre-run gate after
    /// template edits.
    Check,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Transform { kind, id } => {
            let kind: RecordKind = kind.parse()?;
            let written = assemble::run_transform(&cfg, kind, id.as_deref())?;
            println!("merged {} record(s) into {}", written, cfg.paths.output_dir.display());
        }
        Commands::Check => {
            let template = assemble::load_template(&cfg.paths.template)?;
            let checked = traverse::check_template(&template)?;
            println!("template OK: {} instruction(s) checked", checked);
        }
    }

    Ok(())
}
