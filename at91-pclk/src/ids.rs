//! The set of peripheral ids registered with the PMC.

use core::cell::Cell;

use critical_section::Mutex;

/// Capacity of [PeriphIds], the highest id it can hold plus one.
pub const PMC_MAX_IDS: u32 = 128;

const WORDS: usize = (PMC_MAX_IDS / 32) as usize;

/// Peripheral ids that have a divider-capable clock registered.
///
/// Ids at or above [PMC_MAX_IDS] are silently ignored.
#[derive(Debug)]
pub struct PeriphIds {
    bits: Mutex<Cell<[u32; WORDS]>>,
}

impl Default for PeriphIds {
    fn default() -> Self {
        Self::new()
    }
}

impl PeriphIds {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            bits: Mutex::new(Cell::new([0; WORDS])),
        }
    }

    fn get(&self) -> [u32; WORDS] {
        critical_section::with(|cs| self.bits.borrow(cs).get())
    }

    /// Record `id`. Returns false if it was out of range.
    pub fn register(&self, id: u32) -> bool {
        if id >= PMC_MAX_IDS {
            return false;
        }

        critical_section::with(|cs| {
            let cell = self.bits.borrow(cs);
            let mut bits = cell.get();
            bits[(id / 32) as usize] |= 1 << (id % 32);
            cell.set(bits);
        });
        true
    }

    /// Has `id` been registered?
    pub fn contains(&self, id: u32) -> bool {
        id < PMC_MAX_IDS && self.get()[(id / 32) as usize] & (1 << (id % 32)) != 0
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.get().iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Is the registry empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over registered ids in ascending order.
    ///
    /// This iterates over a snapshot; ids registered afterwards are
    /// not seen.
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        let bits = self.get();
        (0..PMC_MAX_IDS).filter(move |id| bits[(id / 32) as usize] & (1 << (id % 32)) != 0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PeriphIds {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "PeriphIds({=[?]})", &self.get()[..]);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register() {
        let ids = PeriphIds::new();
        assert!(ids.is_empty());

        assert!(ids.register(5));
        assert!(ids.register(70));
        assert!(ids.register(5));
        assert!(!ids.register(PMC_MAX_IDS));

        assert!(ids.contains(5));
        assert!(ids.contains(70));
        assert!(!ids.contains(6));
        assert!(!ids.contains(1000));
        assert_eq!(2, ids.len());
    }

    #[test]
    fn iter_sorted() {
        let ids = PeriphIds::new();
        for id in [127, 3, 64, 31, 32] {
            ids.register(id);
        }
        let mut out = [0; 5];
        for (slot, id) in out.iter_mut().zip(ids.iter()) {
            *slot = id;
        }
        assert_eq!([3, 31, 32, 64, 127], out);
    }
}
