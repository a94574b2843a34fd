//! Peripheral clocks controlled through the Peripheral Control Register.

use core::cell::Cell;

use critical_section::Mutex;

use crate::clk::{ClkInit, ClkOps, ClkRateOps};
use crate::divider::{self, ClkRange, Divider};
use crate::lock::PcrLock;
use crate::peripheral::PERIPHERAL_ID_MIN;
use crate::registers::{PcrLayout, PCR_EN};
use crate::regmap::{field_get, field_prep};
use crate::{Error, Regmap};

/// Divider state, owned by the peripheral and kept in sync with the
/// PCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct DivState {
    div: Divider,
    // the divider still needs to be picked from the range
    auto_div: bool,
}

impl DivState {
    /// Pick the divider from the range, if that is still pending.
    ///
    /// A parent rate of 0 means the parent isn't known yet, so this
    /// stays pending.
    fn resolve(self, range: ClkRange, parent_rate: u32) -> Self {
        if !self.auto_div {
            return self;
        }

        let div = match range.max_rate() {
            None => Divider::Div1,
            Some(_) if parent_rate == 0 => return self,
            Some(max) => divider::finest_under(parent_rate, max),
        };

        Self {
            div,
            auto_div: false,
        }
    }
}

/// A peripheral clock behind the PCR.
///
/// Every operation selects this peripheral in the PCR and then reads
/// or updates it, all while holding the shared [PcrLock].
///
/// On layouts with a divider field, the divider is picked
/// automatically from the [ClkRange] until either [ClkRateOps::set_rate]
/// chooses one or the hardware is found already running.
pub struct Sam9x5Peripheral<'a, M> {
    regmap: M,
    lock: &'a PcrLock,
    layout: &'a PcrLayout,
    init: ClkInit<'a>,
    id: u32,
    range: ClkRange,
    state: Mutex<Cell<DivState>>,
}

impl<'a, M> core::fmt::Debug for Sam9x5Peripheral<'a, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Sam9x5Peripheral")
            .field("name", &self.init.name)
            .field("parent", &self.init.parent_name)
            .field("id", &self.id)
            .field("layout", &self.layout.name)
            .field("range", &self.range)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<'a, M> defmt::Format for Sam9x5Peripheral<'a, M> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Sam9x5Peripheral({=str}, {=u32}, {})",
            self.init.name,
            self.id,
            self.state()
        );
    }
}

impl<'a, M> Sam9x5Peripheral<'a, M>
where
    M: Regmap,
{
    /// Create a PCR controlled clock for peripheral `id`.
    ///
    /// `parent_rate` is the current rate of the parent clock, or 0 if
    /// it isn't known yet. If it is known and `range` has a maximum,
    /// the divider is picked right away.
    ///
    /// On success, `id` is recorded in the lock's id registry.
    pub fn register(
        regmap: M,
        lock: &'a PcrLock,
        layout: &'a PcrLayout,
        init: ClkInit<'a>,
        id: u32,
        range: ClkRange,
        parent_rate: u32,
    ) -> Result<Self, Error> {
        init.validate()?;

        let this = Self {
            regmap,
            lock,
            layout,
            init,
            id,
            range,
            state: Mutex::new(Cell::new(DivState {
                div: Divider::Div1,
                auto_div: layout.has_divider(),
            })),
        };

        this.resolve_auto_div(parent_rate);
        if !lock.ids().register(id) {
            warn!("peripheral id {=u32} too large to track", id);
        }

        debug!(
            "registered {=str} ({=u32}) on {=str}, {}",
            init.name,
            id,
            layout.name,
            this.state()
        );
        Ok(this)
    }

    /// Pick the divider from the range now, if that is still pending.
    ///
    /// Does nothing once a divider has been chosen, or while
    /// `parent_rate` is 0.
    pub fn resolve_auto_div(&self, parent_rate: u32) {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            cell.set(cell.get().resolve(self.range, parent_rate));
        })
    }
}

impl<'a, M> Sam9x5Peripheral<'a, M> {
    fn state(&self) -> DivState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    /// The names this clock was registered with.
    pub fn init(&self) -> &ClkInit<'a> {
        &self.init
    }

    /// The peripheral id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The rate range this clock must stay within.
    pub fn range(&self) -> ClkRange {
        self.range
    }

    /// The current divider.
    pub fn divider(&self) -> Divider {
        self.state().div
    }

    /// Is the divider still waiting to be picked from the range?
    pub fn auto_div_pending(&self) -> bool {
        self.state().auto_div
    }
}

impl<'a, M> ClkOps for Sam9x5Peripheral<'a, M>
where
    M: Regmap,
{
    fn enable(&self) -> Result<(), Error> {
        if self.id < PERIPHERAL_ID_MIN {
            return Ok(());
        }

        self.lock.select(&self.regmap, self.layout, self.id, |pcr| {
            let div = self.state.borrow(pcr.cs()).get().div;
            let l = pcr.layout();
            trace!("enable {=str} with {}", self.init.name, div);
            pcr.update(
                l.div_mask | l.cmd | PCR_EN,
                field_prep(l.div_mask, div.shift()) | l.cmd | PCR_EN,
            );
        });
        Ok(())
    }

    fn disable(&self) {
        if self.id < PERIPHERAL_ID_MIN {
            return;
        }

        self.lock.select(&self.regmap, self.layout, self.id, |pcr| {
            let l = pcr.layout();
            trace!("disable {=str}", self.init.name);
            pcr.update(PCR_EN | l.cmd, l.cmd);
        });
    }

    fn is_enabled(&self) -> bool {
        if self.id < PERIPHERAL_ID_MIN {
            return true;
        }

        self.lock
            .select(&self.regmap, self.layout, self.id, |pcr| pcr.read() & PCR_EN != 0)
    }

    fn rate_ops(&self) -> Option<&dyn ClkRateOps> {
        Some(self)
    }
}

impl<'a, M> ClkRateOps for Sam9x5Peripheral<'a, M>
where
    M: Regmap,
{
    fn recalc_rate(&self, parent_rate: u32) -> u32 {
        if self.id < PERIPHERAL_ID_MIN {
            return parent_rate;
        }

        let div = self.lock.select(&self.regmap, self.layout, self.id, |pcr| {
            let status = pcr.read();
            let cell = self.state.borrow(pcr.cs());

            // a running clock is the authority on its divider
            let state = if status & PCR_EN != 0 {
                DivState {
                    div: Divider::from_bits(field_get(pcr.layout().div_mask, status)),
                    auto_div: false,
                }
            } else {
                cell.get().resolve(self.range, parent_rate)
            };

            cell.set(state);
            state.div
        });

        div.apply(parent_rate)
    }

    fn round_rate(&self, rate: u32, parent_rate: u32) -> u32 {
        match self.range.max_rate() {
            Some(max) if self.id >= PERIPHERAL_ID_MIN => {
                divider::round_rate(rate, parent_rate, max).1
            }
            _ => parent_rate,
        }
    }

    fn set_rate(&self, rate: u32, parent_rate: u32) -> Result<(), Error> {
        let max = match self.range.max_rate() {
            Some(max) if self.id >= PERIPHERAL_ID_MIN => max,
            _ if rate == parent_rate => return Ok(()),
            _ => return Err(Error::InvalidArgument),
        };

        if rate > max {
            debug!("{=str}: {=u32} Hz is over the {=u32} Hz limit", self.init.name, rate, max);
            return Err(Error::InvalidArgument);
        }

        let Some(div) = divider::exact(rate, parent_rate) else {
            debug!("{=str}: no divider makes {=u32} Hz", self.init.name, rate);
            return Err(Error::InvalidArgument);
        };

        critical_section::with(|cs| {
            self.state.borrow(cs).set(DivState {
                div,
                auto_div: false,
            })
        });
        debug!("{=str}: set {}", self.init.name, div);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registers::{PCSR, SAM9X5, SAM9X60};
    use crate::sim::SimPmc;

    const PARENT: u32 = 133_000_000;
    const MAX: u32 = 83_000_000;

    fn periph<'a>(
        pmc: &'a SimPmc,
        lock: &'a PcrLock,
        id: u32,
        range: ClkRange,
        parent_rate: u32,
    ) -> Sam9x5Peripheral<'a, &'a SimPmc> {
        Sam9x5Peripheral::register(
            pmc,
            lock,
            pmc.layout(),
            ClkInit::new("periph", "masterck"),
            id,
            range,
            parent_rate,
        )
        .unwrap()
    }

    #[test]
    fn always_on() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        for id in 0..PERIPHERAL_ID_MIN {
            let clk = periph(&pmc, &lock, id, ClkRange::up_to(MAX), PARENT);
            pmc.reset_counts();

            clk.enable().unwrap();
            clk.disable();
            assert!(clk.is_enabled());
            assert_eq!(PARENT, clk.recalc_rate(PARENT));
            assert_eq!(PARENT, clk.round_rate(1_000, PARENT));
            assert_eq!(Ok(()), clk.set_rate(PARENT, PARENT));
            assert_eq!(Err(Error::InvalidArgument), clk.set_rate(PARENT / 2, PARENT));
            assert_eq!((0, 0), (pmc.reads(), pmc.writes()));
        }
    }

    #[test]
    fn enable_disable() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 12, ClkRange::up_to(MAX), PARENT);
        assert_eq!(Divider::Div2, clk.divider());

        assert!(!clk.is_enabled());
        clk.enable().unwrap();
        assert!(clk.is_enabled());
        assert_eq!(Divider::Div2, pmc.pcr_state(12).div);
        // the bit-mask status agrees
        assert_eq!(1 << 12, pmc.read(PCSR) & (1 << 12));

        clk.disable();
        assert!(!clk.is_enabled());
        // disabling leaves the divider alone
        assert_eq!(Divider::Div2, pmc.pcr_state(12).div);
    }

    #[test]
    fn register_records_id() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        periph(&pmc, &lock, 22, ClkRange::NONE, 0);
        assert!(lock.ids().contains(22));
        assert_eq!(1, lock.ids().len());
    }

    #[test]
    fn register_rejects_names() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let res = Sam9x5Peripheral::register(
            &pmc,
            &lock,
            &SAM9X5,
            ClkInit::new("", "masterck"),
            4,
            ClkRange::NONE,
            0,
        );
        assert_eq!(Some(Error::InvalidArgument), res.err());
        assert!(lock.ids().is_empty());
    }

    #[test]
    fn select_isolates_ids() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let a = periph(&pmc, &lock, 6, ClkRange::up_to(MAX), PARENT);
        let b = periph(&pmc, &lock, 7, ClkRange::up_to(MAX), PARENT);
        b.set_rate(PARENT >> 3, PARENT).unwrap();

        a.enable().unwrap();
        b.enable().unwrap();
        b.disable();

        assert!(a.is_enabled());
        assert!(!b.is_enabled());
        assert_eq!(Divider::Div2, pmc.pcr_state(6).div);
        assert_eq!(Divider::Div8, pmc.pcr_state(7).div);
    }

    #[test]
    fn round_rate_example() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 9, ClkRange::up_to(MAX), PARENT);

        assert_eq!(66_500_000, clk.round_rate(70_000_000, PARENT));
        // asking again gives the same answer
        assert_eq!(66_500_000, clk.round_rate(70_000_000, PARENT));
        assert_eq!(66_500_000, clk.round_rate(PARENT, PARENT));
    }

    #[test]
    fn round_rate_without_range() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 9, ClkRange::NONE, PARENT);
        assert_eq!(PARENT, clk.round_rate(70_000_000, PARENT));
    }

    #[test]
    fn set_rate_examples() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 9, ClkRange::up_to(MAX), 0);
        assert!(clk.auto_div_pending());

        assert_eq!(Ok(()), clk.set_rate(16_625_000, PARENT));
        assert_eq!(Divider::Div8, clk.divider());
        assert!(!clk.auto_div_pending());

        assert_eq!(Err(Error::InvalidArgument), clk.set_rate(50_000_000, PARENT));
        assert_eq!(Divider::Div8, clk.divider());

        // over the range, even though it is exact
        assert_eq!(Err(Error::InvalidArgument), clk.set_rate(PARENT, PARENT));
    }

    #[test]
    fn set_rate_without_range() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 9, ClkRange::NONE, PARENT);
        assert_eq!(Ok(()), clk.set_rate(PARENT, PARENT));
        assert_eq!(Err(Error::InvalidArgument), clk.set_rate(PARENT / 2, PARENT));
    }

    #[test]
    fn set_rate_then_enable() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 30, ClkRange::up_to(MAX), PARENT);
        clk.set_rate(PARENT >> 2, PARENT).unwrap();
        clk.enable().unwrap();
        assert_eq!(Divider::Div4, pmc.pcr_state(30).div);
        assert_eq!(PARENT >> 2, clk.recalc_rate(PARENT));
    }

    #[test]
    fn auto_div_waits_for_parent() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 9, ClkRange::up_to(MAX), 0);
        assert!(clk.auto_div_pending());
        assert_eq!(Divider::Div1, clk.divider());

        clk.resolve_auto_div(0);
        assert!(clk.auto_div_pending());
        assert_eq!(Divider::Div1, clk.divider());

        clk.resolve_auto_div(PARENT);
        assert!(!clk.auto_div_pending());
        assert_eq!(Divider::Div2, clk.divider());

        // once only, even if the parent changes
        clk.resolve_auto_div(PARENT * 4);
        assert_eq!(Divider::Div2, clk.divider());
    }

    #[test]
    fn auto_div_clamps() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 9, ClkRange::up_to(1_000), PARENT);
        assert_eq!(Divider::Div8, clk.divider());
    }

    #[test]
    fn auto_div_without_range() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 9, ClkRange::NONE, 0);
        assert!(!clk.auto_div_pending());
        assert_eq!(Divider::Div1, clk.divider());
    }

    #[test]
    fn no_divider_layout() {
        let pmc = SimPmc::new(SAM9X60);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 9, ClkRange::up_to(MAX), 0);
        assert!(!clk.auto_div_pending());

        // the divider never resolves, so this is undivided
        assert_eq!(PARENT, clk.recalc_rate(PARENT));
        clk.enable().unwrap();
        assert!(clk.is_enabled());
        assert!(pmc.pcr_state(9).enabled);
    }

    #[test]
    fn recalc_syncs_from_hardware() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 9, ClkRange::up_to(MAX), 0);
        assert!(clk.auto_div_pending());

        // a bootloader left it running at /4
        pmc.set_pcr_state(9, 2, true);
        assert_eq!(PARENT >> 2, clk.recalc_rate(PARENT));
        assert_eq!(Divider::Div4, clk.divider());
        assert!(!clk.auto_div_pending());
    }

    #[test]
    fn recalc_overrides_set_rate_when_running() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 9, ClkRange::up_to(MAX), PARENT);
        clk.set_rate(PARENT >> 3, PARENT).unwrap();

        pmc.set_pcr_state(9, 1, true);
        assert_eq!(PARENT >> 1, clk.recalc_rate(PARENT));
        assert_eq!(Divider::Div2, clk.divider());
    }

    #[test]
    fn recalc_resolves_when_stopped() {
        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clk = periph(&pmc, &lock, 9, ClkRange::up_to(MAX), 0);

        assert_eq!(PARENT >> 1, clk.recalc_rate(PARENT));
        assert!(!clk.auto_div_pending());

        // stopped with a known divider, stays put
        clk.set_rate(PARENT >> 2, PARENT).unwrap();
        assert_eq!(PARENT >> 2, clk.recalc_rate(PARENT));
    }

    // the host critical section is one global lock, so this checks that
    // ids stay apart across threads, not the PCR spin lock itself
    #[test]
    fn threads_keep_ids_apart() {
        use std::thread;

        let pmc = SimPmc::new(SAM9X5);
        let lock = PcrLock::new();
        let clks: [_; 8] = core::array::from_fn(|i| {
            let id = i as u32 + 2;
            let clk = periph(&pmc, &lock, id, ClkRange::up_to(MAX), PARENT);
            clk.set_rate(PARENT >> (i as u32 % 4), PARENT).ok();
            clk
        });

        thread::scope(|s| {
            for clk in &clks {
                s.spawn(move || {
                    for _ in 0..200 {
                        clk.enable().unwrap();
                        assert!(clk.is_enabled());
                        clk.disable();
                        assert!(!clk.is_enabled());
                    }
                    clk.enable().unwrap();
                });
            }
        });

        for clk in &clks {
            let state = pmc.pcr_state(clk.id());
            assert!(state.enabled);
            assert_eq!(clk.divider(), state.div);
        }
    }
}
