//! Relativity CLI: load a graph of relations from JSON and query it
//!
//! The data file looks like:
//!
//! ```json
//! {
//!   "relations": [["student", "class"], ["class", "teacher"]],
//!   "rows": [{"student": "alice", "class": "math", "teacher": "smith"}]
//! }
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use relativity::{Graph, RelationConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "relativity", version, about = "Query relativity graphs loaded from JSON")]
struct Cli {
    /// JSON data file
    #[arg(long, env = "RELATIVITY_DATA")]
    data: PathBuf,

    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Composed pairs between two columns
    Pairs { from: String, to: String },
    /// Rows of a chain through the given columns
    Chain {
        #[arg(required = true, num_args = 2..)]
        labels: Vec<String>,
    },
    /// Rows of a star from a center column
    Star {
        center: String,
        #[arg(required = true)]
        labels: Vec<String>,
    },
    /// Distinct values of one column
    Column { label: String },
    /// Columns visited between two columns
    Route { from: String, to: String },
}

#[derive(Deserialize)]
struct Dataset {
    relations: Vec<(String, String)>,
    #[serde(default)]
    rows: Vec<BTreeMap<String, String>>,
}

/// Header plus rows, ready to print
struct Output {
    columns: Vec<String>,
    records: Vec<Vec<String>>,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => RelationConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => RelationConfig::default(),
    };
    let graph = load_graph(&cli.data, config)?;

    let output = match &cli.command {
        Commands::Pairs { from, to } => {
            let index = graph.pairs(from.as_str(), to.as_str());
            Output {
                columns: vec![from.clone(), to.clone()],
                records: index.iter_pairs().map(|(k, v)| vec![k, v]).collect(),
            }
        }
        Commands::Chain { labels } => {
            let chain = graph.chain(labels.iter().map(String::as_str))?;
            let records = chain.rows().collect();
            Output {
                columns: labels.clone(),
                records,
            }
        }
        Commands::Star { center, labels } => {
            let star = graph.star(center.as_str(), labels.iter().map(String::as_str))?;
            let mut columns = vec![center.clone()];
            columns.extend(labels.iter().cloned());
            let records = star
                .rows()
                .map(|row| {
                    let mut record = vec![row.key];
                    record.extend(row.values.iter().map(|set| {
                        set.iter().cloned().collect::<Vec<_>>().join(", ")
                    }));
                    record
                })
                .collect();
            Output { columns, records }
        }
        Commands::Column { label } => Output {
            columns: vec![label.clone()],
            records: graph.column(label.as_str())?.into_iter().map(|v| vec![v]).collect(),
        },
        Commands::Route { from, to } => Output {
            columns: vec!["column".to_string()],
            records: graph
                .route(from.as_str(), to.as_str())?
                .into_iter()
                .map(|label| vec![label.to_string()])
                .collect(),
        },
    };

    print_output(&output, &cli.format)
}

fn load_graph(path: &Path, config: RelationConfig) -> anyhow::Result<Graph<String>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading data {}", path.display()))?;
    let dataset: Dataset = serde_json::from_str(&source).context("parsing data file")?;

    let graph = Graph::with_config(config, dataset.relations)?;
    for (n, row) in dataset.rows.into_iter().enumerate() {
        graph
            .add(row)
            .with_context(|| format!("adding row {}", n))?;
    }
    tracing::debug!("Loaded graph with columns {:?}", graph.columns());
    Ok(graph)
}

fn print_output(output: &Output, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&render_json(output))?);
        }
        OutputFormat::Csv => {
            let header: Vec<String> = output.columns.iter().map(|c| format_csv_value(c)).collect();
            println!("{}", header.join(","));
            for record in &output.records {
                let cells: Vec<String> = record.iter().map(|v| format_csv_value(v)).collect();
                println!("{}", cells.join(","));
            }
        }
        OutputFormat::Table => {
            if output.records.is_empty() {
                println!("(no results)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(&output.columns);

            for record in &output.records {
                table.add_row(record);
            }

            println!("{}", table);
            println!("{} row(s)", output.records.len());
        }
    }

    Ok(())
}

/// Columns in query order plus one array per record; labels may repeat
fn render_json(output: &Output) -> serde_json::Value {
    serde_json::json!({
        "columns": output.columns,
        "rows": output.records,
    })
}

fn format_csv_value(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
