use at91_pclk::{ClkRange, PcrLayout};

#[derive(clap::Args, Debug, Clone)]
pub struct SocArgs {
    /// PCR layout to simulate.
    #[arg(short, long, default_value = "sam9x5")]
    layout: String,
    /// Parent clock rate. Accepts k, M and G suffixes.
    #[arg(short, long, default_value = "133M", value_parser = parse_hz)]
    pub parent: u32,
    /// Maximum peripheral clock rate, if any.
    #[arg(short, long, value_parser = parse_hz)]
    max: Option<u32>,
}

impl SocArgs {
    pub fn layout(&self) -> anyhow::Result<&'static PcrLayout> {
        match PcrLayout::by_name(&self.layout) {
            Some(l) => Ok(l),
            None => anyhow::bail!(
                "unknown layout {:?}, try one of: {}",
                self.layout,
                layout_names()
            ),
        }
    }

    pub fn range(&self) -> ClkRange {
        self.max.map(ClkRange::up_to).unwrap_or(ClkRange::NONE)
    }
}

pub fn layout_names() -> String {
    PcrLayout::ALL
        .iter()
        .map(|l| l.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a frequency in Hz, with an optional k/M/G suffix.
///
/// Decimals are allowed with a suffix, as long as the result is a
/// whole number of Hz.
pub fn parse_hz(s: &str) -> anyhow::Result<u32> {
    let s = s.trim();
    let s = s
        .strip_suffix("Hz")
        .or_else(|| s.strip_suffix("hz"))
        .unwrap_or(s);
    let (num, digits) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 3),
        Some((i, 'M')) => (&s[..i], 6),
        Some((i, 'G' | 'g')) => (&s[..i], 9),
        _ => (s, 0),
    };

    let num = num.trim().replace('_', "");
    let (whole, frac) = num.split_once('.').unwrap_or((num.as_str(), ""));
    anyhow::ensure!(
        !whole.is_empty() || !frac.is_empty(),
        "{:?} has no digits",
        s
    );
    anyhow::ensure!(
        whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()),
        "{:?} is not a number",
        s
    );

    // anything past the suffix's precision has to be zero
    let (frac, rest) = frac.split_at(frac.len().min(digits));
    anyhow::ensure!(
        rest.chars().all(|c| c == '0'),
        "{:?} is not a whole number of Hz",
        s
    );

    let mut hz: u64 = 0;
    let padded = frac.chars().chain(std::iter::repeat('0')).take(digits);
    for c in whole.chars().chain(padded) {
        hz = hz
            .checked_mul(10)
            .and_then(|hz| hz.checked_add(u64::from(c as u8 - b'0')))
            .filter(|hz| *hz <= u64::from(u32::MAX))
            .ok_or_else(|| anyhow::anyhow!("{:?} does not fit in 32 bits", s))?;
    }
    Ok(u32::try_from(hz)?)
}

pub fn format_hz(hz: u32) -> String {
    if hz >= 1_000_000 && hz % 1_000 == 0 {
        format!("{} Hz ({} MHz)", hz, hz as f64 / 1e6)
    } else if hz >= 1_000 && hz % 1_000 == 0 {
        format!("{} Hz ({} kHz)", hz, hz / 1_000)
    } else {
        format!("{} Hz", hz)
    }
}
