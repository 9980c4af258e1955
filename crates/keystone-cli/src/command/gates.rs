use std::path::PathBuf;

use anyhow::Context;
use keystone_analysis::distribution::ReferenceDistribution;
use keystone_evaluator::gate::GateHierarchy;

use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GatesArg {
    /// Feature table used to resolve percentile thresholds
    #[arg(long)]
    features: PathBuf,
    /// Engine configuration (JSON); defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: GatesArg) -> anyhow::Result<()> {
    let GatesArg {
        features,
        config,
        output,
    } = arg;

    let config = util::load_config(config.as_deref())?;
    let table = util::read_feature_table(&features)?;
    let dist = ReferenceDistribution::build(
        table.seasons(),
        &config.qualification,
        config.distribution,
    )
    .context("Failed to build reference distribution")?;
    let gates = GateHierarchy::compile(&config.gates, &dist).context("Invalid gate catalog")?;

    Output::save_json(&gates, output)
}
