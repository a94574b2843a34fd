//! A simulated PMC register file, for tests and host tools.

use core::cell::RefCell;

use bitfield_struct::bitfield;
use critical_section::Mutex;

use crate::divider::Divider;
use crate::registers::{PcrLayout, PCDR, PCDR1, PCER, PCER1, PCR_EN, PCSR, PCSR1};
use crate::regmap::{field_get, field_prep};
use crate::Regmap;

/// Number of peripheral ids the simulated PCR can hold.
pub const SIM_IDS: usize = 128;

/// Stored state for one simulated peripheral.
#[cfg_attr(not(feature = "defmt"), bitfield(u16))]
#[cfg_attr(feature = "defmt", bitfield(u16, defmt = true))]
#[derive(PartialEq, Eq)]
struct Slot {
    #[bits(2)]
    div: u8,
    enabled: bool,
    #[bits(5)]
    gckcss: u8,
    #[bits(8)]
    __: u8,
}

/// The PCR fields of one simulated peripheral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PcrState {
    pub div: Divider,
    pub enabled: bool,
    pub gckcss: u8,
}

impl Slot {
    fn state(self) -> PcrState {
        PcrState {
            div: Divider::from_bits(self.div() as u32),
            enabled: self.enabled(),
            gckcss: self.gckcss(),
        }
    }
}

#[derive(Debug)]
struct State {
    selected: Option<u32>,
    slots: [Slot; SIM_IDS],
    reads: u32,
    writes: u32,
}

/// A PMC register file held in memory.
///
/// The legacy PCER/PCDR/PCSR banks and the PCR share the same enable
/// state, as on real parts. Writing the PCR without the command bit
/// only selects a peripheral. Writing it with the command bit stores
/// the divider, enable and generic clock source of the selected one.
/// Registers this doesn't know read as 0 and ignore writes.
#[derive(Debug)]
pub struct SimPmc {
    layout: PcrLayout,
    state: Mutex<RefCell<State>>,
}

impl SimPmc {
    /// Create a simulated PMC with every peripheral off and undivided.
    pub const fn new(layout: PcrLayout) -> Self {
        Self {
            layout,
            state: Mutex::new(RefCell::new(State {
                selected: None,
                slots: [Slot::new(); SIM_IDS],
                reads: 0,
                writes: 0,
            })),
        }
    }

    /// The PCR layout this PMC decodes.
    pub fn layout(&self) -> &PcrLayout {
        &self.layout
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    /// The peripheral currently selected in the PCR, if any.
    pub fn selected(&self) -> Option<u32> {
        self.with(|s| s.selected)
    }

    /// Get the PCR fields for peripheral `id`, as hardware sees them.
    pub fn pcr_state(&self, id: u32) -> PcrState {
        self.with(|s| {
            s.slots
                .get(id as usize)
                .copied()
                .map(Slot::state)
                .unwrap_or_default()
        })
    }

    /// Set the PCR fields for peripheral `id` behind the driver's back,
    /// as a bootloader might. This is not counted as an access.
    pub fn set_pcr_state(&self, id: u32, div: u8, enabled: bool) {
        self.with(|s| {
            if let Some(slot) = s.slots.get_mut(id as usize) {
                slot.set_div(div & 0b11);
                slot.set_enabled(enabled);
            }
        })
    }

    /// Number of register reads so far.
    pub fn reads(&self) -> u32 {
        self.with(|s| s.reads)
    }

    /// Number of register writes so far.
    pub fn writes(&self) -> u32 {
        self.with(|s| s.writes)
    }

    /// Reset the read and write counters.
    pub fn reset_counts(&self) {
        self.with(|s| {
            s.reads = 0;
            s.writes = 0;
        })
    }
}

impl State {
    fn bank(&self, base: usize) -> u32 {
        self.slots[base..base + 32]
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.enabled())
            .fold(0, |acc, (i, _)| acc | (1 << i))
    }

    fn set_bank(&mut self, base: usize, bits: u32, enabled: bool) {
        for (i, slot) in self.slots[base..base + 32].iter_mut().enumerate() {
            if bits & (1 << i) != 0 {
                slot.set_enabled(enabled);
            }
        }
    }

    fn read(&mut self, layout: &PcrLayout, offset: u32) -> u32 {
        self.reads += 1;
        match offset {
            PCSR => self.bank(0),
            PCSR1 => self.bank(32),
            o if o == layout.offset => match self.selected {
                Some(id) => {
                    let slot = self.slots[id as usize];
                    id | field_prep(layout.div_mask, slot.div() as u32)
                        | field_prep(layout.gckcss_mask, slot.gckcss() as u32)
                        | if slot.enabled() { PCR_EN } else { 0 }
                }
                None => 0,
            },
            _ => 0,
        }
    }

    fn write(&mut self, layout: &PcrLayout, offset: u32, value: u32) {
        self.writes += 1;
        match offset {
            PCER => self.set_bank(0, value, true),
            PCER1 => self.set_bank(32, value, true),
            PCDR => self.set_bank(0, value, false),
            PCDR1 => self.set_bank(32, value, false),
            o if o == layout.offset => {
                let id = value & layout.pid_mask;
                self.selected = Some(id);
                if value & layout.cmd != 0 {
                    let slot = &mut self.slots[id as usize];
                    slot.set_div(field_get(layout.div_mask, value) as u8 & 0b11);
                    slot.set_gckcss(field_get(layout.gckcss_mask, value) as u8 & 0b1_1111);
                    slot.set_enabled(value & PCR_EN != 0);
                }
            }
            _ => {}
        }
    }
}

impl Regmap for SimPmc {
    fn read(&self, offset: u32) -> u32 {
        self.with(|s| s.read(&self.layout, offset))
    }

    fn write(&self, offset: u32, value: u32) {
        self.with(|s| s.write(&self.layout, offset, value))
    }

    fn update_bits(&self, offset: u32, mask: u32, value: u32) {
        self.with(|s| {
            let old = s.read(&self.layout, offset);
            s.write(&self.layout, offset, (old & !mask) | (value & mask));
        })
    }
}
