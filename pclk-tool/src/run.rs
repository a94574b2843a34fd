//! Drive a simulated PMC from a small script.
//!
//! One command per line, `#` starts a comment:
//!
//! ```text
//! legacy NAME ID        register a bit-mask gated clock
//! periph NAME ID [MAX]  register a PCR clock, MAX overrides --max
//! enable NAME
//! disable NAME
//! status NAME
//! rate NAME
//! round NAME HZ
//! set NAME HZ
//! dump
//! ```

use std::io::Write;

use anyhow::Context;
use at91_pclk::sim::SimPmc;
use at91_pclk::{ClkInit, ClkOps, ClkRange, ClkTable, PcrLayout, PcrLock, PeriphClk};

use crate::common::{format_hz, parse_hz, SocArgs};
use crate::debug::DebugArgs;

const TABLE_SIZE: usize = 64;
const PARENT_NAME: &str = "masterck";

#[derive(clap::Args, Debug)]
pub struct RunOpts {
    /// Script to run, or - for stdin.
    script: String,
    #[command(flatten)]
    soc: SocArgs,
    #[command(flatten)]
    debug: DebugArgs,
}

impl crate::ToolRun for RunOpts {
    fn run(&self) -> anyhow::Result<()> {
        let text = if self.script == "-" {
            std::io::read_to_string(std::io::stdin())?
        } else {
            std::fs::read_to_string(&self.script)
                .with_context(|| format!("could not read {}", self.script))?
        };

        let script = parse_script(&text)?;
        let layout = self.soc.layout()?;
        let pmc = SimPmc::new(*layout);
        let lock = PcrLock::new();

        let stdout = std::io::stdout();
        let mut runner = Runner::new(&self.soc, &self.debug, layout, &pmc, &lock, stdout.lock());
        runner.run(&script)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Legacy { name: String, id: u32 },
    Periph { name: String, id: u32, max: Option<u32> },
    Enable(String),
    Disable(String),
    Status(String),
    Rate(String),
    Round(String, u32),
    Set(String, u32),
    Dump,
}

impl std::str::FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let words: Vec<_> = line.split_whitespace().collect();
        let (cmd, args) = words.split_first().context("empty command")?;

        let name = |i: usize| -> anyhow::Result<String> {
            args.get(i)
                .map(|s| s.to_string())
                .with_context(|| format!("{} needs a clock name", cmd))
        };
        let id = |i: usize| -> anyhow::Result<u32> {
            let s = args.get(i).with_context(|| format!("{} needs an id", cmd))?;
            s.parse().with_context(|| format!("bad id {:?}", s))
        };
        let hz = |i: usize| -> anyhow::Result<u32> {
            let s = args.get(i).with_context(|| format!("{} needs a rate", cmd))?;
            parse_hz(s).with_context(|| format!("bad rate {:?}", s))
        };

        let (command, used) = match *cmd {
            "legacy" => (
                Command::Legacy {
                    name: name(0)?,
                    id: id(1)?,
                },
                2,
            ),
            "periph" => {
                let max = if args.len() > 2 { Some(hz(2)?) } else { None };
                let used = if max.is_some() { 3 } else { 2 };
                (
                    Command::Periph {
                        name: name(0)?,
                        id: id(1)?,
                        max,
                    },
                    used,
                )
            }
            "enable" => (Command::Enable(name(0)?), 1),
            "disable" => (Command::Disable(name(0)?), 1),
            "status" => (Command::Status(name(0)?), 1),
            "rate" => (Command::Rate(name(0)?), 1),
            "round" => (Command::Round(name(0)?, hz(1)?), 2),
            "set" => (Command::Set(name(0)?, hz(1)?), 2),
            "dump" => (Command::Dump, 0),
            _ => anyhow::bail!("unknown command {:?}", cmd),
        };

        anyhow::ensure!(
            args.len() == used,
            "{} takes {} argument(s), got {}",
            cmd,
            used,
            args.len()
        );
        Ok(command)
    }
}

/// Parse a whole script, keeping line numbers for error messages.
pub fn parse_script(text: &str) -> anyhow::Result<Vec<(usize, Command)>> {
    let mut commands = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = match line.split_once('#') {
            Some((code, _)) => code,
            None => line,
        };
        if line.trim().is_empty() {
            continue;
        }
        let command = line
            .parse()
            .with_context(|| format!("line {}: {}", i + 1, line.trim()))?;
        commands.push((i + 1, command));
    }
    Ok(commands)
}

pub struct Runner<'a, W> {
    soc: &'a SocArgs,
    debug: &'a DebugArgs,
    layout: &'a PcrLayout,
    pmc: &'a SimPmc,
    lock: &'a PcrLock,
    table: ClkTable<'a, &'a SimPmc, TABLE_SIZE>,
    out: W,
}

impl<'a, W> Runner<'a, W>
where
    W: Write,
{
    pub fn new(
        soc: &'a SocArgs,
        debug: &'a DebugArgs,
        layout: &'a PcrLayout,
        pmc: &'a SimPmc,
        lock: &'a PcrLock,
        out: W,
    ) -> Self {
        Self {
            soc,
            debug,
            layout,
            pmc,
            lock,
            table: ClkTable::new(),
            out,
        }
    }

    pub fn run(&mut self, script: &'a [(usize, Command)]) -> anyhow::Result<()> {
        for (line, command) in script {
            self.execute(command)
                .with_context(|| format!("line {}", line))?;
            self.debug.accesses(&mut self.out, self.pmc)?;
            self.debug.dump(&mut self.out, self.pmc)?;
        }
        Ok(())
    }

    fn get(&self, name: &str) -> anyhow::Result<&PeriphClk<'a, &'a SimPmc>> {
        self.table
            .get(name)
            .with_context(|| format!("no clock named {:?}", name))
    }

    fn execute(&mut self, command: &'a Command) -> anyhow::Result<()> {
        let parent = self.soc.parent;

        match command {
            Command::Legacy { name, id } => {
                let clk = self
                    .table
                    .register_peripheral(self.pmc, ClkInit::new(name, PARENT_NAME), *id)
                    .with_context(|| format!("cannot register {}", name))?;
                if self.debug.verbose() {
                    writeln!(self.out, "{:?}", clk)?;
                }
            }
            Command::Periph { name, id, max } => {
                let range = max.map(ClkRange::up_to).unwrap_or(self.soc.range());
                let clk = self
                    .table
                    .register_sam9x5(
                        self.pmc,
                        self.lock,
                        self.layout,
                        ClkInit::new(name, PARENT_NAME),
                        *id,
                        range,
                        parent,
                    )
                    .with_context(|| format!("cannot register {}", name))?;
                if self.debug.verbose() {
                    writeln!(self.out, "{:?}", clk)?;
                }
            }
            Command::Enable(name) => self.get(name)?.enable()?,
            Command::Disable(name) => self.get(name)?.disable(),
            Command::Status(name) => {
                let on = self.get(name)?.is_enabled();
                let status = if on { "enabled" } else { "disabled" };
                writeln!(self.out, "{}: {}", name, status)?;
            }
            Command::Rate(name) => {
                // a plain gate runs at its parent rate
                let rate = match self.get(name)?.rate_ops() {
                    Some(ops) => ops.recalc_rate(parent),
                    None => parent,
                };
                writeln!(self.out, "{}: {}", name, format_hz(rate))?;
            }
            Command::Round(name, target) => {
                let ops = self
                    .get(name)?
                    .rate_ops()
                    .with_context(|| format!("{} has no rate to change", name))?;
                let rate = ops.round_rate(*target, parent);
                writeln!(self.out, "{}: {} rounds to {}", name, target, format_hz(rate))?;
            }
            Command::Set(name, target) => {
                let ops = self
                    .get(name)?
                    .rate_ops()
                    .with_context(|| format!("{} has no rate to change", name))?;
                match ops.set_rate(*target, parent) {
                    Ok(()) => writeln!(self.out, "{}: set {}", name, format_hz(*target))?,
                    Err(e) => writeln!(self.out, "{}: cannot set {}: {}", name, target, e)?,
                }
            }
            Command::Dump => crate::regdump::regdump(&mut self.out, self.pmc)?,
        }
        Ok(())
    }
}
