use std::path::PathBuf;

use anyhow::Context;

use crate::util::{EngineArgs, Output, parse_usage};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PredictArg {
    #[clap(flatten)]
    engine: EngineArgs,
    /// Player identifier in the feature table
    #[arg(long)]
    player: String,
    /// Season label in the feature table
    #[arg(long)]
    season: String,
    /// Target usage rates to predict at
    #[arg(long, num_args = 1.., required = true, value_parser = parse_usage)]
    usage: Vec<f32>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &PredictArg) -> anyhow::Result<()> {
    let (engine, table) = arg.engine.build()?;
    let season = table
        .get(&arg.player, &arg.season)
        .with_context(|| format!("No season {} for player {}", arg.season, arg.player))?;

    let results = arg
        .usage
        .iter()
        .map(|&usage| engine.predict(season, usage))
        .collect::<Vec<_>>();
    for result in &results {
        if let Some(gate) = &result.binding_gate {
            eprintln!(
                "usage {:.3}: capped by '{gate}' ({:.3} -> {:.3})",
                result.target_usage, result.raw_score, result.performance
            );
        }
    }

    Output::save_json(&results, arg.output.clone())
}
