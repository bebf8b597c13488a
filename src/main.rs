use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::Value;

use chartsmith::{clean_value, resolve_figure, ChartSpec, Table};

#[derive(Parser, Debug)]
#[command(name = "chartsmith")]
#[command(about = "Resolve declarative chart specs against tabular data", long_about = None)]
struct Args {
    /// Chart spec JSON file, or '-' for stdin
    spec: Option<String>,

    /// Data file backing the figure (CSV, or JSON columns/records)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Clean a resolved figure back into an editable spec
    #[arg(long)]
    clean: bool,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let spec_value = read_spec(args.spec.as_deref())?;

    let output = if args.clean {
        clean_value(&spec_value).context("Failed to clean figure")?
    } else {
        let data_path = args
            .data
            .as_deref()
            .ok_or_else(|| anyhow!("--data is required unless --clean is set"))?;
        let table = load_table(data_path)
            .with_context(|| format!("Failed to load data from {}", data_path.display()))?;
        let spec = ChartSpec::from_value(&spec_value).context("Invalid chart spec")?;
        resolve_figure(&table, &spec).to_value()
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    }
    .context("Failed to serialize output")?;
    println!("{}", rendered);

    Ok(())
}

fn read_spec(path: Option<&str>) -> Result<Value> {
    let text = match path {
        None | Some("-") => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read spec from stdin")?;
            buffer
        }
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read spec file {}", path))?,
    };
    serde_json::from_str(&text).context("Spec is not valid JSON")
}

fn load_table(path: &Path) -> Result<Table> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("json") {
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text).context("Data file is not valid JSON")?;
        let table = if value.is_array() {
            Table::from_records(&value)?
        } else {
            Table::from_json(&value)?
        };
        Ok(table)
    } else {
        let file = File::open(path)?;
        Ok(Table::from_csv_reader(file)?)
    }
}
