use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;

use schema_graph::config::{self, Config, ExportMode, RelationsConfig};
use schema_graph::export::{export_combined, FileSink};
use schema_graph::utils::logging::init_logging;
use schema_graph::{infer_by_naming, Schema, Table};

#[derive(Parser)]
#[command(name = "schema_graph", version, about = "Export a database schema as a JSON relation graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read the catalog and write the schema graph
    Export {
        #[arg(short, long, default_value = "schema_graph.toml")]
        config: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Output folder, overrides `output.folder`
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Infer relations from column names
        #[arg(long)]
        discover: bool,
        /// Skip declared foreign keys
        #[arg(long)]
        no_declared: bool,
        /// Only apply aliases when inferring
        #[arg(long)]
        ignore_conventions: bool,
    },
    /// Infer relations on a previously exported combined file
    Infer {
        /// `<name>.schema.json` produced by `export`
        #[arg(short, long)]
        input: PathBuf,
        /// Relation settings (`[relations]`) to apply; `[database]` is not needed
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output folder, defaults to the input's folder
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Combined,
    PerTable,
}

impl From<ModeArg> for ExportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Combined => ExportMode::Combined,
            ModeArg::PerTable => ExportMode::PerTable,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Export {
            config,
            mode,
            output,
            discover,
            no_declared,
            ignore_conventions,
        } => {
            let mut config = config::load_from_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            init_logging(config.logging.as_ref())?;

            if let Some(mode) = mode {
                config.output.mode = mode.into();
            }
            if let Some(output) = output {
                config.output.folder = output;
            }
            config.relations.discover_by_naming |= discover;
            config.relations.extract_declared &= !no_declared;
            config.relations.ignore_conventions |= ignore_conventions;

            run_export(config).await
        }
        Command::Infer {
            input,
            config,
            output,
        } => {
            let config = config
                .map(|path| {
                    config::load_offline_from_file(&path)
                        .with_context(|| format!("loading {}", path.display()))
                })
                .transpose()?;
            init_logging(config.as_ref().and_then(|c| c.logging.as_ref()))?;

            let relations = config.map(|c| c.relations).unwrap_or_default();
            run_infer(&input, output.as_deref(), &relations)
        }
    }
}

async fn run_export(config: Config) -> anyhow::Result<()> {
    let folder = config.output.folder.clone();
    let written = schema_graph::export_database(config, &FileSink)
        .await
        .context("exporting schema")?;

    println!("Wrote {} document(s) to {}", written, folder.display());
    Ok(())
}

fn run_infer(input: &Path, output: Option<&Path>, relations: &RelationsConfig) -> anyhow::Result<()> {
    let content =
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let tables: IndexMap<String, Table> =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", input.display()))?;

    let mut schema = Schema::new("snapshot");
    schema.tables = tables;

    let report = infer_by_naming(&mut schema, &relations.inference_options());
    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }

    let file_name = input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("database.schema.json");
    let name = file_name
        .trim_end_matches(".json")
        .trim_end_matches(".schema");
    let folder = output
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    export_combined(&schema, &FileSink, &folder, name)?;

    println!(
        "Added {} outgoing and {} incoming relation(s); wrote {}",
        report.outgoing_added,
        report.incoming_added,
        folder.join(format!("{}.schema.json", name)).display()
    );
    Ok(())
}
