mod cli;
mod live;
mod report;
mod sim;

use clap::Parser;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    common::logger::init_logger("playout", cli.json);

    let report = match &cli.command {
        Command::Simulate(args) => sim::run(&args.params()?)?,
        Command::Live(args) => live::run(args.params()?).await?,
    };

    report.print(cli.json)
}
