use std::io::Write;

use at91_pclk::sim::SimPmc;
use at91_pclk::{ClkInit, ClkOps, ClkRateOps, PcrLock, Sam9x5Peripheral};

use crate::common::{format_hz, parse_hz, SocArgs};
use crate::debug::DebugArgs;

#[derive(clap::Args, Debug, Clone)]
pub struct ClockArgs {
    #[command(flatten)]
    soc: SocArgs,
    #[command(flatten)]
    debug: DebugArgs,
    /// Peripheral id to simulate.
    #[arg(short, long, default_value_t = 2)]
    id: u32,
}

impl ClockArgs {
    /// A fresh simulated PMC with the chosen layout.
    pub fn simulate(&self) -> anyhow::Result<SimPmc> {
        Ok(SimPmc::new(*self.soc.layout()?))
    }

    /// Register the one PCR clock these arguments describe.
    pub fn register<'a, W: Write>(
        &self,
        out: &mut W,
        pmc: &'a SimPmc,
        lock: &'a PcrLock,
    ) -> anyhow::Result<Sam9x5Peripheral<'a, &'a SimPmc>> {
        let clk = Sam9x5Peripheral::register(
            pmc,
            lock,
            self.soc.layout()?,
            ClkInit::new("periph", "masterck"),
            self.id,
            self.soc.range(),
            self.soc.parent,
        )?;

        if self.debug.verbose() {
            writeln!(out, "{:?}", clk)?;
        }
        Ok(clk)
    }
}

#[derive(clap::Args, Debug)]
pub struct RoundRateOpts {
    #[command(flatten)]
    clock: ClockArgs,
    /// Rate to aim for.
    #[arg(value_parser = parse_hz)]
    target: u32,
}

impl RoundRateOpts {
    pub fn round<W: Write>(
        &self,
        out: &mut W,
        pmc: &SimPmc,
        lock: &PcrLock,
    ) -> anyhow::Result<u32> {
        let parent = self.clock.soc.parent;
        let clk = self.clock.register(out, pmc, lock)?;
        let rate = clk.round_rate(self.target, parent);

        if self.clock.debug.verbose() {
            writeln!(
                out,
                "{} from {} is /{}",
                format_hz(rate),
                format_hz(parent),
                parent.checked_div(rate).unwrap_or(0)
            )?;
        }
        writeln!(out, "{}", rate)?;
        Ok(rate)
    }
}

impl crate::ToolRun for RoundRateOpts {
    fn run(&self) -> anyhow::Result<()> {
        let pmc = self.clock.simulate()?;
        let lock = PcrLock::new();
        self.round(&mut std::io::stdout().lock(), &pmc, &lock)?;
        Ok(())
    }
}

#[derive(clap::Args, Debug)]
pub struct SetRateOpts {
    #[command(flatten)]
    clock: ClockArgs,
    /// Exact rate to set.
    #[arg(value_parser = parse_hz)]
    target: u32,
}

impl SetRateOpts {
    pub fn set<W: Write>(
        &self,
        out: &mut W,
        pmc: &SimPmc,
        lock: &PcrLock,
    ) -> anyhow::Result<u32> {
        let parent = self.clock.soc.parent;
        let debug = &self.clock.debug;
        let clk = self.clock.register(out, pmc, lock)?;

        if let Err(e) = clk.set_rate(self.target, parent) {
            anyhow::bail!(
                "cannot set {} from {}: {}",
                format_hz(self.target),
                format_hz(parent),
                e
            );
        }
        debug.accesses(out, pmc)?;

        // the divider reaches the PCR when the clock is enabled
        clk.enable()?;
        debug.accesses(out, pmc)?;
        debug.dump(out, pmc)?;

        if debug.verbose() {
            let state = pmc.pcr_state(self.clock.id);
            writeln!(
                out,
                "PCR {}: {:?}, {}",
                self.clock.id,
                state.div,
                if state.enabled { "enabled" } else { "disabled" }
            )?;
        }

        let rate = clk.recalc_rate(parent);
        writeln!(out, "{}", rate)?;
        Ok(rate)
    }
}

impl crate::ToolRun for SetRateOpts {
    fn run(&self) -> anyhow::Result<()> {
        let pmc = self.clock.simulate()?;
        let lock = PcrLock::new();
        self.set(&mut std::io::stdout().lock(), &pmc, &lock)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use at91_pclk::Divider;
    use clap::Parser;

    #[derive(Parser)]
    struct Round {
        #[command(flatten)]
        opts: RoundRateOpts,
    }

    #[derive(Parser)]
    struct Set {
        #[command(flatten)]
        opts: SetRateOpts,
    }

    fn round(args: &[&str]) -> anyhow::Result<(u32, String)> {
        let args = Round::try_parse_from(std::iter::once("round-rate").chain(args.iter().copied()))?;
        let pmc = args.opts.clock.simulate()?;
        let lock = PcrLock::new();
        let mut out = Vec::new();
        let rate = args.opts.round(&mut out, &pmc, &lock)?;
        Ok((rate, String::from_utf8(out)?))
    }

    fn set(args: &[&str]) -> anyhow::Result<(SimPmc, String)> {
        let args = Set::try_parse_from(std::iter::once("set-rate").chain(args.iter().copied()))?;
        let pmc = args.opts.clock.simulate()?;
        let lock = PcrLock::new();
        let mut out = Vec::new();
        args.opts.set(&mut out, &pmc, &lock)?;
        Ok((pmc, String::from_utf8(out)?))
    }

    #[test]
    fn round_rate_prints_closest() {
        let (rate, out) = round(&["--parent", "133M", "--max", "83M", "70M"]).unwrap();
        assert_eq!(66_500_000, rate);
        assert_eq!("66500000\n", out);
    }

    #[test]
    fn round_rate_without_max() {
        let (rate, out) = round(&["--parent", "133M", "1M"]).unwrap();
        assert_eq!(133_000_000, rate);
        assert_eq!("133000000\n", out);
    }

    #[test]
    fn set_rate_reaches_pcr() {
        let (pmc, out) = set(&["--parent", "133M", "--max", "83M", "16.625M"]).unwrap();
        assert_eq!("16625000\n", out);

        let state = pmc.pcr_state(2);
        assert!(state.enabled);
        assert_eq!(Divider::Div8, state.div);
        assert_eq!(Some(2), pmc.selected());
    }

    #[test]
    fn set_rate_other_id() {
        let (pmc, out) = set(&["-p", "133M", "-m", "83M", "--id", "20", "33.25M"]).unwrap();
        assert_eq!("33250000\n", out);
        assert_eq!(Divider::Div4, pmc.pcr_state(20).div);
        assert!(!pmc.pcr_state(2).enabled);
    }

    #[test]
    fn set_rate_refuses() {
        let err = set(&["--parent", "133M", "--max", "83M", "50M"]).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid argument"));

        // exact, but over the limit
        assert!(set(&["--parent", "133M", "--max", "83M", "133M"]).is_err());
        assert!(set(&["--layout", "nope", "1M"]).is_err());
    }

    #[test]
    fn set_rate_verbose() {
        let (_, out) = set(&["-d", "--parent", "133M", "--max", "83M", "16.625M"]).unwrap();
        assert!(out.contains("Sam9x5Peripheral"));
        assert!(out.contains("PCR 2: Div8, enabled"));
        assert!(out.ends_with("16625000\n"));
    }
}
