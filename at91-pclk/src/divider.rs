//! Peripheral clock dividers and rate selection.

/// A peripheral clock divider, a power of two from 1 to 8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Divider {
    /// Peripheral clock is the parent clock.
    #[default]
    Div1 = 0,
    /// Parent clock divided by 2.
    Div2 = 1,
    /// Parent clock divided by 4.
    Div4 = 2,
    /// Parent clock divided by 8.
    Div8 = 3,
}

/// An optional range constraint on a peripheral clock rate, in Hz.
///
/// A `max` of 0 means the peripheral has no constraint, and so no
/// divider freedom either.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClkRange {
    /// Lower bound, kept with the device description. Nothing here
    /// enforces it, since dividing only ever lowers the rate.
    pub min: u32,
    /// Upper bound, or 0 for none.
    pub max: u32,
}

impl ClkRange {
    /// No constraint.
    pub const NONE: Self = Self { min: 0, max: 0 };

    /// Constrain a clock to at most `max` Hz.
    #[inline(always)]
    pub const fn up_to(max: u32) -> Self {
        Self { min: 0, max }
    }

    /// The maximum rate, if there is one.
    #[inline(always)]
    pub const fn max_rate(&self) -> Option<u32> {
        if self.max == 0 {
            None
        } else {
            Some(self.max)
        }
    }
}

impl Divider {
    /// Every divider, from finest to coarsest.
    pub const ALL: [Divider; 4] = [Self::Div1, Self::Div2, Self::Div4, Self::Div8];

    /// The largest possible shift.
    pub const MAX_SHIFT: u32 = 3;

    /// Convert a shift amount into a divider, if in range.
    #[inline(always)]
    pub const fn from_shift(shift: u32) -> Option<Self> {
        match shift {
            0 => Some(Self::Div1),
            1 => Some(Self::Div2),
            2 => Some(Self::Div4),
            3 => Some(Self::Div8),
            _ => None,
        }
    }

    /// Convert a 2-bit register field into a divider.
    #[inline(always)]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => Self::Div1,
            1 => Self::Div2,
            2 => Self::Div4,
            _ => Self::Div8,
        }
    }

    /// The shift amount, which is also the register field value.
    #[inline(always)]
    pub const fn shift(self) -> u32 {
        self as u32
    }

    /// The division factor, 1 to 8.
    #[inline(always)]
    pub const fn factor(self) -> u32 {
        1 << self.shift()
    }

    /// Apply this divider to a parent rate.
    #[inline(always)]
    pub const fn apply(self, parent_rate: u32) -> u32 {
        parent_rate >> self.shift()
    }

    /// Iterate over this divider and every coarser one.
    #[inline]
    pub fn and_coarser(self) -> impl Iterator<Item = Divider> {
        Self::ALL.into_iter().skip(self as usize)
    }
}

/// The finest divider that brings `parent_rate` to at most `max`.
///
/// Returns [Divider::Div8] if no divider is enough.
pub fn finest_under(parent_rate: u32, max: u32) -> Divider {
    Divider::ALL
        .into_iter()
        .find(|d| d.apply(parent_rate) <= max)
        .unwrap_or(Divider::Div8)
}

/// Pick the achievable rate closest to `rate` that honors `max`.
///
/// Starting from the finest divider that satisfies `max`, coarser
/// dividers are tried until one matches exactly or undershoots
/// `rate`. Rates only shrink as the divider grows, so nothing past
/// that point can be closer.
///
/// If even [Divider::Div8] exceeds `max`, its rate is returned
/// anyway, as the closest achievable.
pub fn round_rate(rate: u32, parent_rate: u32, max: u32) -> (Divider, u32) {
    let ceiling = finest_under(parent_rate, max);
    let ceiling_rate = ceiling.apply(parent_rate);
    if rate >= ceiling_rate {
        return (ceiling, ceiling_rate);
    }

    let mut best = (ceiling, ceiling_rate);
    let mut best_diff = ceiling_rate - rate;
    for div in ceiling.and_coarser() {
        let cur = div.apply(parent_rate);
        let diff = cur.abs_diff(rate);
        if diff < best_diff {
            best_diff = diff;
            best = (div, cur);
        }

        if best_diff == 0 || cur < rate {
            break;
        }
    }

    best
}

/// Find the divider that produces exactly `rate` from `parent_rate`.
pub fn exact(rate: u32, parent_rate: u32) -> Option<Divider> {
    Divider::ALL
        .into_iter()
        .find(|d| d.apply(parent_rate) == rate)
}
