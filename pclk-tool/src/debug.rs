use std::io::Write;

use at91_pclk::sim::SimPmc;

#[derive(clap::Args, Debug, Clone)]
pub struct DebugArgs {
    /// Print more. Once for details, twice to also dump the simulated
    /// registers after every step.
    #[arg(short, long, action=clap::ArgAction::Count)]
    pub debug: u8,
}

impl DebugArgs {
    pub fn verbose(&self) -> bool {
        self.debug >= 1
    }

    pub fn dumps(&self) -> bool {
        self.debug >= 2
    }

    /// Print access counts, and reset them.
    pub fn accesses<W: Write>(&self, out: &mut W, pmc: &SimPmc) -> anyhow::Result<()> {
        if self.verbose() {
            writeln!(out, "  ({} reads, {} writes)", pmc.reads(), pmc.writes())?;
        }
        pmc.reset_counts();
        Ok(())
    }

    /// Dump the simulated registers, if asked for.
    pub fn dump<W: Write>(&self, out: &mut W, pmc: &SimPmc) -> anyhow::Result<()> {
        if self.dumps() {
            crate::regdump::regdump(out, pmc)?;
        }
        Ok(())
    }
}
