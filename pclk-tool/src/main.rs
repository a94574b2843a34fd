use clap::Parser;
use critical_section as _;

mod common;
mod debug;
mod layouts;
mod rate;
mod regdump;
mod run;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Explore AT91 peripheral clock gating and division on a simulated
/// PMC.
#[derive(Parser, Debug)]
#[command(version, about)]
struct ToolOptions {
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    /// Print the closest rate a PCR clock could run at.
    RoundRate(rate::RoundRateOpts),
    /// Set an exact rate on a PCR clock, enable it, and print the result.
    SetRate(rate::SetRateOpts),
    /// List the known PCR layouts.
    Layouts(layouts::LayoutsOpts),
    /// Run a clock script.
    Run(run::RunOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            RoundRate(o) => o.run(),
            SetRate(o) => o.run(),
            Layouts(o) => o.run(),
            Run(o) => o.run(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let opts = ToolOptions::parse();
    opts.command.run()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        ToolOptions::command().debug_assert();
    }
}
