use clap::{ArgAction, Parser, Subcommand};

use self::{
    batch::BatchArg, config::ConfigArg, distribution::DistributionArg, gates::GatesArg,
    predict::PredictArg,
};

mod batch;
mod config;
mod distribution;
mod gates;
mod predict;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// More log output on stderr (-v debug, -vv trace); overrides `RUST_LOG`
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Print the default engine configuration
    Config(#[clap(flatten)] ConfigArg),
    /// Build and export the reference distribution
    Distribution(#[clap(flatten)] DistributionArg),
    /// Print the compiled gate hierarchy with resolved thresholds
    Gates(#[clap(flatten)] GatesArg),
    /// Predict one season at one or more target usages
    Predict(#[clap(flatten)] PredictArg),
    /// Predict every season of a table and export the results
    Batch(#[clap(flatten)] BatchArg),
}

pub fn run(args: CommandArgs) -> anyhow::Result<()> {
    match args.mode {
        Mode::Config(arg) => config::run(arg)?,
        Mode::Distribution(arg) => distribution::run(arg)?,
        Mode::Gates(arg) => gates::run(arg)?,
        Mode::Predict(arg) => predict::run(&arg)?,
        Mode::Batch(arg) => batch::run(&arg)?,
    }
    Ok(())
}
