use std::path::PathBuf;

use anyhow::Context;
use keystone_analysis::distribution::ReferenceDistribution;

use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct DistributionArg {
    /// Feature table of the reference population
    #[arg(long)]
    features: PathBuf,
    /// Engine configuration (JSON); defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: DistributionArg) -> anyhow::Result<()> {
    let DistributionArg {
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

    eprintln!(
        "{} seasons, {} qualified, {} in the star cohort",
        dist.total_count(),
        dist.qualified_count(),
        dist.star_count()
    );
    Output::save_json(&dist, output)
}
