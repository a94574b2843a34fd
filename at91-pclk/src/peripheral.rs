//! Peripheral clocks gated by the PCER/PCDR/PCSR bit masks.

use crate::clk::{ClkInit, ClkOps};
use crate::registers::{PCDR, PCDR1, PCER, PCER1, PCSR, PCSR1};
use crate::{Error, Regmap};

/// Ids below this are always on, and have no gate.
pub const PERIPHERAL_ID_MIN: u32 = 2;
/// The highest id a bit-mask gated peripheral can have.
pub const PERIPHERAL_ID_MAX: u32 = 31;

#[inline(always)]
const fn peripheral_mask(id: u32) -> u32 {
    1 << (id & PERIPHERAL_ID_MAX)
}

/// A peripheral clock on the older bit-mask interface.
///
/// Every id has its own bit in the enable, disable and status
/// registers, so there is nothing to lock.
pub struct Peripheral<'a, M> {
    regmap: M,
    init: ClkInit<'a>,
    id: u32,
}

impl<'a, M> core::fmt::Debug for Peripheral<'a, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Peripheral")
            .field("name", &self.init.name)
            .field("parent", &self.init.parent_name)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<'a, M> defmt::Format for Peripheral<'a, M> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Peripheral({=str}, {=u32})", self.init.name, self.id);
    }
}

impl<'a, M> Peripheral<'a, M>
where
    M: Regmap,
{
    /// Create a bit-mask gated clock for peripheral `id`.
    ///
    /// Fails if either name is empty or `id` is above
    /// [PERIPHERAL_ID_MAX].
    pub fn register(regmap: M, init: ClkInit<'a>, id: u32) -> Result<Self, Error> {
        init.validate()?;
        if id > PERIPHERAL_ID_MAX {
            return Err(Error::InvalidArgument);
        }

        debug!("registered peripheral clock {=str} ({=u32})", init.name, id);
        Ok(Self { regmap, init, id })
    }

    // ids past the first bank live in the second set of registers
    #[inline(always)]
    fn offset(&self, bank0: u32, bank1: u32) -> u32 {
        if self.id > PERIPHERAL_ID_MAX {
            bank1
        } else {
            bank0
        }
    }
}

impl<'a, M> Peripheral<'a, M> {
    /// The names this clock was registered with.
    pub fn init(&self) -> &ClkInit<'a> {
        &self.init
    }

    /// The peripheral id.
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl<'a, M> ClkOps for Peripheral<'a, M>
where
    M: Regmap,
{
    fn enable(&self) -> Result<(), Error> {
        if self.id < PERIPHERAL_ID_MIN {
            return Ok(());
        }

        trace!("enable {=str}", self.init.name);
        self.regmap
            .write(self.offset(PCER, PCER1), peripheral_mask(self.id));
        Ok(())
    }

    fn disable(&self) {
        if self.id < PERIPHERAL_ID_MIN {
            return;
        }

        trace!("disable {=str}", self.init.name);
        self.regmap
            .write(self.offset(PCDR, PCDR1), peripheral_mask(self.id));
    }

    fn is_enabled(&self) -> bool {
        if self.id < PERIPHERAL_ID_MIN {
            return true;
        }

        let status = self.regmap.read(self.offset(PCSR, PCSR1));
        status & peripheral_mask(self.id) != 0
    }
}
