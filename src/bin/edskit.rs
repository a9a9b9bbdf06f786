use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use polars::prelude::*;

use edskit::{results, EdsArchive, ParsedRun, RunDescription, TemplateSet};

/// edskit CLI
#[derive(Parser)]
#[command(name = "edskit")]
#[command(version)]
#[command(about = "Generate and read EDS qPCR plate-run archives", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an .eds archive from a JSON run description
    Generate {
        /// Template directory (mirrors the archive layout)
        #[arg(long, env = "EDSKIT_TEMPLATES", default_value = "template")]
        templates: PathBuf,
        /// Run description JSON (barcode, name, operator, description, wells)
        #[arg(long)]
        input: PathBuf,
        /// Archive to write
        #[arg(long)]
        output: PathBuf,
        /// Directory recorded in the experiment's file name (instrument side)
        #[arg(long, default_value = "C:\\")]
        directory: String,
        /// File name recorded in the experiment (default: the output file name)
        #[arg(long)]
        filename: Option<String>,
    },

    /// Parse a completed run and print its metadata
    Parse {
        /// Archive to read
        file: PathBuf,
        /// Write the whole parsed run as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Print the analysis result table
    Results {
        /// Archive to read
        file: PathBuf,
        /// Emit CSV to stdout
        #[arg(long)]
        csv: bool,
    },

    /// Print per-cycle fluorescence readings
    Multicomponent {
        /// Archive to read
        file: PathBuf,
        /// Only this well (e.g. "A1")
        #[arg(long)]
        well: Option<String>,
        /// Only this dye (e.g. "FAM")
        #[arg(long)]
        dye: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate { templates, input, output, directory, filename } => {
            cmd_generate(&templates, &input, &output, &directory, filename)?;
        }
        Commands::Parse { file, json } => {
            cmd_parse(&file, json.as_deref())?;
        }
        Commands::Results { file, csv } => {
            cmd_results(&file, csv)?;
        }
        Commands::Multicomponent { file, well, dye } => {
            cmd_multicomponent(&file, well.as_deref(), dye.as_deref())?;
        }
    }

    Ok(())
}

fn cmd_generate(templates: &Path, input: &Path, output: &Path, directory: &str, filename: Option<String>) -> anyhow::Result<()> {
    let templates = TemplateSet::load(templates).with_context(|| format!("loading templates from {}", templates.display()))?;
    let text = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let run = RunDescription::from_json(&text).with_context(|| format!("parsing {}", input.display()))?;

    let filename = match filename {
        Some(f) => f,
        None => match output.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => bail!("output path {} has no file name", output.display()),
        },
    };
    let bytes = edskit::generate(&templates, directory, &filename, &run)?;
    fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    println!("wrote {} ({} wells, {} bytes)", output.display(), run.wells().len(), bytes.len());
    Ok(())
}

fn read_run(file: &Path) -> anyhow::Result<ParsedRun> {
    let mut archive = EdsArchive::open(file)?;
    edskit::parse_archive(&mut archive).with_context(|| format!("parsing {}", file.display()))
}

fn cmd_parse(file: &Path, json: Option<&Path>) -> anyhow::Result<()> {
    let run = read_run(file)?;
    let m = &run.metadata;
    println!("barcode: {}", m.barcode);
    println!("plate name: {}", m.plate_name.as_deref().unwrap_or("-"));
    println!("description: {}", m.plate_description.as_deref().unwrap_or("-"));
    println!("operator: {}", m.operator_name.as_deref().unwrap_or("-"));
    println!("result rows: {}", run.results.len());
    println!("wells with readings: {}", run.wells.wells.len());

    if let Some(path) = json {
        let out = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(out, &run)?;
    }
    Ok(())
}

fn configure_table_display() {
    std::env::set_var("POLARS_FMT_TABLE_FORMATTING", "UTF8_FULL");
    std::env::set_var("POLARS_FMT_MAX_COLS", "100000");
    std::env::set_var("POLARS_FMT_MAX_ROWS", "1000000");
    std::env::set_var("POLARS_FMT_STR_LEN", "100000");
    std::env::set_var("POLARS_TABLE_WIDTH", "65535");
}

fn cmd_results(file: &Path, csv: bool) -> anyhow::Result<()> {
    let run = read_run(file)?;
    let columns = results::columns(&run.results);

    let mut series = vec![Series::new("well_index", run.results.iter().map(|r| r.well as u64).collect::<Vec<_>>())];
    for column in &columns {
        let values: Vec<Option<String>> = run.results.iter().map(|r| r.get(column).map(String::from)).collect();
        series.push(Series::new(column.as_str(), values));
    }
    let mut df = DataFrame::new(series)?;

    if csv {
        CsvWriter::new(std::io::stdout()).include_header(true).finish(&mut df)?;
    } else {
        configure_table_display();
        println!("{}", df);
    }
    Ok(())
}

fn cmd_multicomponent(file: &Path, well: Option<&str>, dye: Option<&str>) -> anyhow::Result<()> {
    let run = read_run(file)?;

    let mut rows: Vec<(String, String, u32, String)> = Vec::new();
    for (well_name, dyes) in &run.wells.wells {
        if well.is_some_and(|w| !w.eq_ignore_ascii_case(well_name)) {
            continue;
        }
        for (dye_name, cycles) in dyes {
            if dye.is_some_and(|d| d != dye_name) {
                continue;
            }
            for (cycle, value) in cycles {
                rows.push((well_name.clone(), dye_name.clone(), *cycle, value.clone()));
            }
        }
    }

    let df = df!(
        "well"  => rows.iter().map(|r| r.0.clone()).collect::<Vec<_>>(),
        "dye"   => rows.iter().map(|r| r.1.clone()).collect::<Vec<_>>(),
        "cycle" => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        "value" => rows.iter().map(|r| r.3.clone()).collect::<Vec<_>>(),
    )?;
    configure_table_display();
    println!("{}", df);
    Ok(())
}
