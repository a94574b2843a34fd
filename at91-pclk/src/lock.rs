//! The lock shared by every peripheral behind one PCR.

use critical_section::CriticalSection;

use crate::ids::PeriphIds;
use crate::registers::PcrLayout;
use crate::Regmap;

/// Serializes access to a Peripheral Control Register.
///
/// The PCR is multiplexed across every peripheral: a write selects a
/// peripheral, and the following read or write applies to it. Every
/// [Sam9x5Peripheral](crate::Sam9x5Peripheral) built on the same PCR
/// must share the same lock.
///
/// The lock also remembers which peripheral ids have been registered
/// behind it.
///
/// Create exactly one of these per PMC, before any peripheral.
#[derive(Debug)]
pub struct PcrLock {
    lock: spin::Mutex<()>,
    ids: PeriphIds,
}

#[cfg(feature = "defmt")]
impl defmt::Format for PcrLock {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "PcrLock({}, {})", self.lock.is_locked(), self.ids);
    }
}

impl Default for PcrLock {
    fn default() -> Self {
        Self::new()
    }
}

/// A PCR with a peripheral selected, handed out by [PcrLock::select].
///
/// Every access through this refers to the selected peripheral.
pub struct Selected<'a, M> {
    regmap: &'a M,
    layout: &'a PcrLayout,
    cs: CriticalSection<'a>,
}

impl PcrLock {
    /// Create a new, unlocked PCR lock.
    pub const fn new() -> Self {
        Self {
            lock: spin::Mutex::new(()),
            ids: PeriphIds::new(),
        }
    }

    /// The peripheral ids registered behind this PCR.
    pub fn ids(&self) -> &PeriphIds {
        &self.ids
    }

    /// Is someone using the PCR right now?
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Select peripheral `id` in the PCR, then run `f` on it.
    ///
    /// Nobody else sharing this lock can touch the PCR until `f`
    /// returns, so the selection can't change underneath it.
    pub fn select<M, R>(
        &self,
        regmap: &M,
        layout: &PcrLayout,
        id: u32,
        f: impl FnOnce(&Selected<'_, M>) -> R,
    ) -> R
    where
        M: Regmap,
    {
        critical_section::with(|cs| {
            let _guard = self.lock.lock();
            regmap.write(layout.offset, id & layout.pid_mask);
            f(&Selected { regmap, layout, cs })
        })
    }
}

impl<'a, M> Selected<'a, M>
where
    M: Regmap,
{
    /// Read the PCR for the selected peripheral.
    #[inline(always)]
    pub fn read(&self) -> u32 {
        self.regmap.read(self.layout.offset)
    }

    /// Update the masked bits of the PCR for the selected peripheral.
    #[inline(always)]
    pub fn update(&self, mask: u32, value: u32) {
        self.regmap.update_bits(self.layout.offset, mask, value)
    }

    /// The layout of the selected PCR.
    #[inline(always)]
    pub fn layout(&self) -> &PcrLayout {
        self.layout
    }

    /// The critical section this selection is held under.
    #[inline(always)]
    pub fn cs(&self) -> CriticalSection<'a> {
        self.cs
    }
}

impl<'a, M> core::fmt::Debug for Selected<'a, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Selected")
            .field("layout", &self.layout.name)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registers::{PCR_EN, SAM9X5};
    use crate::sim::SimPmc;

    #[test]
    fn select_writes_id_first() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();

        pmc.set_pcr_state(9, 2, true);
        let value = lock.select(&pmc, &SAM9X5, 9, |sel| {
            assert!(lock.is_locked());
            sel.read()
        });

        assert!(!lock.is_locked());
        assert_eq!(9, value & SAM9X5.pid_mask);
        assert_eq!(PCR_EN, value & PCR_EN);
        assert_eq!(Some(9), pmc.selected());
    }

    #[test]
    fn id_is_masked() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();

        // 0x45 & 0x3f
        lock.select(&pmc, &SAM9X5, 0x45, |_| ());
        assert_eq!(Some(5), pmc.selected());
    }
}
