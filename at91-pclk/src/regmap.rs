//! Access to the PMC register file.

/// A register transport for the PMC.
///
/// Each method must be atomic with respect to the single register it
/// touches. Nothing here is atomic across registers: sequences that
/// need that go through a [PcrLock](crate::PcrLock).
pub trait Regmap {
    /// Read the register at `offset`.
    fn read(&self, offset: u32) -> u32;

    /// Write `value` to the register at `offset`.
    fn write(&self, offset: u32, value: u32);

    /// Replace the bits in `mask` of the register at `offset` with
    /// those of `value`.
    ///
    /// The default does a read followed by a write, which is only
    /// atomic if the caller already excludes other writers.
    fn update_bits(&self, offset: u32, mask: u32, value: u32) {
        let old = self.read(offset);
        self.write(offset, (old & !mask) | (value & mask));
    }
}

impl<T> Regmap for &T
where
    T: Regmap + ?Sized,
{
    #[inline(always)]
    fn read(&self, offset: u32) -> u32 {
        (**self).read(offset)
    }

    #[inline(always)]
    fn write(&self, offset: u32, value: u32) {
        (**self).write(offset, value)
    }

    #[inline(always)]
    fn update_bits(&self, offset: u32, mask: u32, value: u32) {
        (**self).update_bits(offset, mask, value)
    }
}

/// Shift `value` into the field described by `mask`.
#[inline(always)]
pub const fn field_prep(mask: u32, value: u32) -> u32 {
    if mask == 0 {
        return 0;
    }
    (value << mask.trailing_zeros()) & mask
}

/// Extract the field described by `mask` from `reg`.
#[inline(always)]
pub const fn field_get(mask: u32, reg: u32) -> u32 {
    if mask == 0 {
        return 0;
    }
    (reg & mask) >> mask.trailing_zeros()
}

/// A contiguous bit mask covering bits `low..=high`.
#[inline(always)]
pub const fn genmask(high: u32, low: u32) -> u32 {
    (u32::MAX >> (31 - high)) & (u32::MAX << low)
}
