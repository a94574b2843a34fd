//! The interface between peripheral clocks and a clock tree.

use crate::divider::ClkRange;
use crate::lock::PcrLock;
use crate::peripheral::Peripheral;
use crate::registers::PcrLayout;
use crate::sam9x5::Sam9x5Peripheral;
use crate::{Error, Regmap};

/// Operations every peripheral clock supports.
pub trait ClkOps {
    /// Turn the clock on.
    fn enable(&self) -> Result<(), Error>;

    /// Turn the clock off.
    fn disable(&self);

    /// Is the clock on?
    fn is_enabled(&self) -> bool;

    /// Rate operations, for clocks that can change their rate.
    fn rate_ops(&self) -> Option<&dyn ClkRateOps> {
        None
    }
}

/// Operations for clocks with a configurable rate.
///
/// All rates are in Hz. The parent rate is always supplied by the
/// caller, which owns the clock tree.
pub trait ClkRateOps {
    /// Compute the current rate from the parent rate.
    fn recalc_rate(&self, parent_rate: u32) -> u32;

    /// The closest rate to `rate` this clock could run at.
    fn round_rate(&self, rate: u32, parent_rate: u32) -> u32;

    /// Configure the clock to run at exactly `rate`.
    fn set_rate(&self, rate: u32, parent_rate: u32) -> Result<(), Error>;
}

/// Names given to a clock when it is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClkInit<'a> {
    pub name: &'a str,
    pub parent_name: &'a str,
}

impl<'a> ClkInit<'a> {
    /// Name a clock and its parent.
    pub const fn new(name: &'a str, parent_name: &'a str) -> Self {
        Self { name, parent_name }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() || self.parent_name.is_empty() {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }
}

/// Either kind of peripheral clock.
pub enum PeriphClk<'a, M> {
    /// A clock gated by the PCER/PCDR/PCSR bit masks.
    Peripheral(Peripheral<'a, M>),
    /// A clock controlled through the PCR, possibly with a divider.
    Sam9x5(Sam9x5Peripheral<'a, M>),
}

impl<'a, M> PeriphClk<'a, M> {
    /// The names this clock was registered with.
    pub fn init(&self) -> &ClkInit<'a> {
        match self {
            Self::Peripheral(p) => p.init(),
            Self::Sam9x5(p) => p.init(),
        }
    }

    /// The clock name.
    pub fn name(&self) -> &'a str {
        self.init().name
    }

    /// The peripheral id.
    pub fn id(&self) -> u32 {
        match self {
            Self::Peripheral(p) => p.id(),
            Self::Sam9x5(p) => p.id(),
        }
    }
}

impl<'a, M> core::fmt::Debug for PeriphClk<'a, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Peripheral(p) => core::fmt::Debug::fmt(p, f),
            Self::Sam9x5(p) => core::fmt::Debug::fmt(p, f),
        }
    }
}

#[cfg(feature = "defmt")]
impl<'a, M> defmt::Format for PeriphClk<'a, M> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Peripheral(p) => p.format(f),
            Self::Sam9x5(p) => p.format(f),
        }
    }
}

impl<'a, M> ClkOps for PeriphClk<'a, M>
where
    M: Regmap,
{
    fn enable(&self) -> Result<(), Error> {
        match self {
            Self::Peripheral(p) => p.enable(),
            Self::Sam9x5(p) => p.enable(),
        }
    }

    fn disable(&self) {
        match self {
            Self::Peripheral(p) => p.disable(),
            Self::Sam9x5(p) => p.disable(),
        }
    }

    fn is_enabled(&self) -> bool {
        match self {
            Self::Peripheral(p) => p.is_enabled(),
            Self::Sam9x5(p) => p.is_enabled(),
        }
    }

    fn rate_ops(&self) -> Option<&dyn ClkRateOps> {
        match self {
            Self::Peripheral(p) => p.rate_ops(),
            Self::Sam9x5(p) => p.rate_ops(),
        }
    }
}

/// A fixed-capacity table of registered peripheral clocks.
///
/// Registering into a full table fails with [Error::OutOfMemory]
/// before anything is touched.
pub struct ClkTable<'a, M, const N: usize> {
    clks: heapless::Vec<PeriphClk<'a, M>, N>,
}

impl<'a, M, const N: usize> Default for ClkTable<'a, M, N>
where
    M: Regmap,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, M, const N: usize> core::fmt::Debug for ClkTable<'a, M, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_list().entries(self.clks.iter()).finish()
    }
}

impl<'a, M, const N: usize> ClkTable<'a, M, N>
where
    M: Regmap,
{
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            clks: heapless::Vec::new(),
        }
    }

    fn reserve(&self) -> Result<(), Error> {
        if self.clks.is_full() {
            warn!("clock table full ({=usize} entries)", N);
            return Err(Error::OutOfMemory);
        }
        Ok(())
    }

    fn publish(&mut self, clk: PeriphClk<'a, M>) -> Result<&PeriphClk<'a, M>, Error> {
        self.clks.push(clk).map_err(|_| Error::OutOfMemory)?;
        // just pushed, so there is a last element
        self.clks.last().ok_or(Error::OutOfMemory)
    }

    /// Register a bit-mask gated peripheral clock.
    pub fn register_peripheral(
        &mut self,
        regmap: M,
        init: ClkInit<'a>,
        id: u32,
    ) -> Result<&PeriphClk<'a, M>, Error> {
        self.reserve()?;
        let clk = Peripheral::register(regmap, init, id)?;
        self.publish(PeriphClk::Peripheral(clk))
    }

    /// Register a PCR controlled peripheral clock.
    ///
    /// See [Sam9x5Peripheral::register].
    #[allow(clippy::too_many_arguments)]
    pub fn register_sam9x5(
        &mut self,
        regmap: M,
        lock: &'a PcrLock,
        layout: &'a PcrLayout,
        init: ClkInit<'a>,
        id: u32,
        range: ClkRange,
        parent_rate: u32,
    ) -> Result<&PeriphClk<'a, M>, Error> {
        self.reserve()?;
        let clk = Sam9x5Peripheral::register(regmap, lock, layout, init, id, range, parent_rate)?;
        self.publish(PeriphClk::Sam9x5(clk))
    }

    /// Find a clock by name.
    pub fn get(&self, name: &str) -> Option<&PeriphClk<'a, M>> {
        self.clks.iter().find(|c| c.name() == name)
    }

    /// Iterate over clocks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PeriphClk<'a, M>> {
        self.clks.iter()
    }

    /// Number of registered clocks.
    pub fn len(&self) -> usize {
        self.clks.len()
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.clks.is_empty()
    }
}
