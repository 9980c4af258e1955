use std::path::PathBuf;

use keystone_evaluator::batch::{self, BatchRecord, BatchSummary};

use crate::util::{EngineArgs, Output, parse_usage};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub(crate) enum Format {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct BatchArg {
    #[clap(flatten)]
    engine: EngineArgs,
    /// Target usage rates; every season is predicted at each of them
    #[arg(long, num_args = 1.., required = true, value_parser = parse_usage)]
    usage: Vec<f32>,
    /// Export format (csv or json)
    #[arg(long, default_value = "csv")]
    format: Format,
    /// Write the summary as JSON to this path instead of printing it
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &BatchArg) -> anyhow::Result<()> {
    let (engine, table) = arg.engine.build()?;
    let results = batch::run_batch(&engine, table.seasons(), &arg.usage);

    let mut output = Output::from_output_path(arg.output.clone())?;
    match arg.format {
        Format::Csv => output.write_csv(results.iter().map(BatchRecord::from))?,
        Format::Json => output.write_json(&results)?,
    }

    let summary = BatchSummary::from_results(&results);
    match &arg.summary {
        Some(path) => Output::save_json(&summary, Some(path.clone()))?,
        None => eprintln!("{summary}"),
    }
    Ok(())
}
