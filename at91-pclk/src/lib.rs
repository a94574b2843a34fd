//! Peripheral clock gating and division for the Atmel/Microchip AT91
//! Power Management Controller.
//!
//! Two kinds of peripheral clock live here:
//!
//!  * [Peripheral], gated by one bit per id in the PCER/PCDR/PCSR
//!    registers.
//!  * [Sam9x5Peripheral], controlled through the single, shared
//!    Peripheral Control Register (PCR). Each access first selects a
//!    peripheral id, then reads or updates it, under a [PcrLock]. On
//!    parts that support it, these clocks also have a power-of-two
//!    [Divider].
//!
//! Both implement [ClkOps], and the PCR clocks also provide
//! [ClkRateOps]. A clock tree holds them as [PeriphClk], or uses a
//! [ClkTable].
//!
//! Registers are accessed through the [Regmap] trait. [sim::SimPmc]
//! implements it in memory.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod log;

mod clk;
pub use clk::*;

pub mod divider;
pub use divider::{ClkRange, Divider};

mod ids;
pub use ids::*;

mod lock;
pub use lock::*;

mod peripheral;
pub use peripheral::*;

pub mod registers;
pub use registers::PcrLayout;

mod regmap;
pub use regmap::*;

mod sam9x5;
pub use sam9x5::*;

pub mod sim;

/// An error produced when registering or configuring a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A name was missing, an id was out of range, or a rate can't be
    /// produced.
    InvalidArgument,
    /// There was no room to register another clock.
    OutOfMemory,
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::OutOfMemory => write!(f, "out of memory"),
        }
    }
}
