//! Print the state of a simulated PMC.
//!
//! The PCR table prints one cell per peripheral id: `E` or `-` for
//! enabled or not, followed by the divider shift. Runs of identical
//! rows collapse into a single `*`.

use std::io::Write;

use at91_pclk::sim::{PcrState, SimPmc, SIM_IDS};

const WIDTH: usize = 0x10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line<'a> {
    first: usize,
    states: &'a [PcrState],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupLine<'a> {
    Data(Line<'a>),
    Duplicate,
}

fn cell(state: &PcrState) -> String {
    let en = if state.enabled { 'E' } else { '-' };
    format!("{}{}", en, state.div.shift())
}

impl<'a> std::fmt::Display for Line<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:02x}", self.first)?;
        for (i, state) in self.states.iter().enumerate() {
            if i % 8 == 0 {
                write!(f, " ")?;
            }
            write!(f, " {}", cell(state))?;
        }

        let sources: Vec<_> = self
            .states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.gckcss != 0)
            .map(|(i, s)| format!("{:02x}:{}", self.first + i, s.gckcss))
            .collect();
        if !sources.is_empty() {
            write!(f, "  gck {}", sources.join(" "))?;
        }
        Ok(())
    }
}

impl<'a> std::fmt::Display for DedupLine<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Data(line) => line.fmt(f),
            Self::Duplicate => write!(f, "*"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DedupLineIter<'a> {
    chunks: std::iter::Enumerate<std::slice::Chunks<'a, PcrState>>,
    last: Option<&'a [PcrState]>,
    in_duplicate: bool,
}

impl<'a> DedupLineIter<'a> {
    pub fn new(states: &'a [PcrState]) -> Self {
        Self {
            chunks: states.chunks(WIDTH).enumerate(),
            last: None,
            in_duplicate: false,
        }
    }
}

impl<'a> Iterator for DedupLineIter<'a> {
    type Item = DedupLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for (i, states) in self.chunks.by_ref() {
            if self.last == Some(states) {
                if !self.in_duplicate {
                    self.in_duplicate = true;
                    return Some(DedupLine::Duplicate);
                }
            } else {
                self.last = Some(states);
                self.in_duplicate = false;
                return Some(DedupLine::Data(Line {
                    first: i * WIDTH,
                    states,
                }));
            }
        }
        None
    }
}

fn status_bank(states: &[PcrState]) -> u32 {
    states
        .iter()
        .enumerate()
        .filter(|(_, s)| s.enabled)
        .fold(0, |acc, (i, _)| acc | (1 << i))
}

/// Write the status banks and the PCR table of `pmc`.
///
/// This doesn't go through the register interface, so access counts
/// are left alone.
pub fn regdump<W: Write>(out: &mut W, pmc: &SimPmc) -> anyhow::Result<()> {
    let states: Vec<_> = (0..SIM_IDS as u32).map(|id| pmc.pcr_state(id)).collect();

    writeln!(
        out,
        "PCSR  {:08x}  PCSR1 {:08x}  PCR {} @ {:#x}, selected {}",
        status_bank(&states[..32]),
        status_bank(&states[32..64]),
        pmc.layout().name,
        pmc.layout().offset,
        match pmc.selected() {
            Some(id) => format!("{}", id),
            None => "none".to_owned(),
        },
    )?;
    for line in DedupLineIter::new(&states) {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use at91_pclk::registers::SAM9X5;

    #[test]
    fn dedups_idle_rows() {
        let pmc = SimPmc::new(SAM9X5);
        pmc.set_pcr_state(3, 2, true);

        let mut out = Vec::new();
        regdump(&mut out, &pmc).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(
            "PCSR  00000008  PCSR1 00000000  PCR sam9x5 @ 0x10c, selected none",
            lines[0]
        );
        assert_eq!(
            "00  -0 -0 -0 E2 -0 -0 -0 -0  -0 -0 -0 -0 -0 -0 -0 -0",
            lines[1]
        );
        assert_eq!(
            "10  -0 -0 -0 -0 -0 -0 -0 -0  -0 -0 -0 -0 -0 -0 -0 -0",
            lines[2]
        );
        assert_eq!("*", lines[3]);
        assert_eq!(4, lines.len());
    }

    #[test]
    fn leaves_counts() {
        let pmc = SimPmc::new(SAM9X5);
        regdump(&mut Vec::new(), &pmc).unwrap();
        assert_eq!((0, 0), (pmc.reads(), pmc.writes()));
    }
}
