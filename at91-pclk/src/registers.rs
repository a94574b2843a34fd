//! PMC register offsets and peripheral control register layouts.

use crate::regmap::genmask;

/// 0x10 Peripheral Clock Enable Register 0.
pub const PCER: u32 = 0x10;
/// 0x14 Peripheral Clock Disable Register 0.
pub const PCDR: u32 = 0x14;
/// 0x18 Peripheral Clock Status Register 0.
pub const PCSR: u32 = 0x18;

/// 0x100 Peripheral Clock Enable Register 1.
pub const PCER1: u32 = 0x100;
/// 0x104 Peripheral Clock Disable Register 1.
pub const PCDR1: u32 = 0x104;
/// 0x108 Peripheral Clock Status Register 1.
pub const PCSR1: u32 = 0x108;

/// Peripheral control register enable bit, the same on every layout.
pub const PCR_EN: u32 = 1 << 28;

/// Describes where the fields of the Peripheral Control Register live.
///
/// The PCR is a single register shared by every peripheral. Writing
/// an id into `pid_mask` selects which peripheral the other fields
/// refer to. Writing with `cmd` set applies the other fields to the
/// selected peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PcrLayout {
    /// The layout name, used in Debug output and by tools.
    pub name: &'static str,
    /// Offset of the PCR in the PMC.
    pub offset: u32,
    /// Command bit(s), set to apply a write.
    pub cmd: u32,
    /// Peripheral id selection field.
    pub pid_mask: u32,
    /// Divider field, or 0 if this generation has no divider.
    pub div_mask: u32,
    /// Generic clock source field, or 0 if not present.
    pub gckcss_mask: u32,
}

impl PcrLayout {
    /// Does this layout have a peripheral divider field?
    #[inline(always)]
    pub const fn has_divider(&self) -> bool {
        self.div_mask != 0
    }

    /// All layouts known to this crate.
    pub const ALL: &'static [PcrLayout] = &[SAM9X5, SAMA5D2, SAM9X60];

    /// Look up a known layout by name, ignoring case.
    pub fn by_name(name: &str) -> Option<&'static PcrLayout> {
        Self::ALL.iter().find(|l| l.name.eq_ignore_ascii_case(name))
    }
}

/// SAM9X5 family and SAMA5D3/4.
pub const SAM9X5: PcrLayout = PcrLayout {
    name: "sam9x5",
    offset: 0x10c,
    cmd: 1 << 12,
    pid_mask: genmask(5, 0),
    div_mask: genmask(17, 16),
    gckcss_mask: 0,
};

/// SAMA5D2, which widens the id field and adds generic clocks.
pub const SAMA5D2: PcrLayout = PcrLayout {
    name: "sama5d2",
    offset: 0x10c,
    cmd: 1 << 12,
    pid_mask: genmask(6, 0),
    div_mask: genmask(17, 16),
    gckcss_mask: genmask(10, 8),
};

/// SAM9X60, which moves the PCR and drops the peripheral divider.
pub const SAM9X60: PcrLayout = PcrLayout {
    name: "sam9x60",
    offset: 0x88,
    cmd: 1 << 31,
    pid_mask: genmask(6, 0),
    div_mask: 0,
    gckcss_mask: genmask(12, 8),
};

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sam9x5() {
        assert_eq!(0x0000_003f, SAM9X5.pid_mask);
        assert_eq!(0x0003_0000, SAM9X5.div_mask);
        assert_eq!(0x0000_1000, SAM9X5.cmd);
        assert!(SAM9X5.has_divider());
    }

    #[test]
    fn fields_do_not_overlap() {
        for l in PcrLayout::ALL {
            let fields = [l.cmd, l.pid_mask, l.div_mask, l.gckcss_mask, PCR_EN];
            for (i, a) in fields.iter().enumerate() {
                for b in &fields[i + 1..] {
                    assert_eq!(0, a & b, "{} has overlapping fields", l.name);
                }
            }
        }
    }

    #[test]
    fn by_name() {
        assert_eq!(Some(&SAM9X60), PcrLayout::by_name("SAM9X60"));
        assert!(!SAM9X60.has_divider());
        assert_eq!(None, PcrLayout::by_name("sam4l"));
    }
}
