//! Fake register backend for the clock tests.
//!
//! Backs every register group with a small word array and models the
//! handshake behaviors the drivers poll for: a PLL lock bit that follows
//! the enable bit, a frequency-change bit that clears itself a configured
//! number of reads after being requested, and "stuck" bits that never read
//! back as written. Delays advance a simulated clock instead of blocking,
//! so bounded-wait tests terminate immediately.
use core::cell::{Cell, RefCell};

use pxa1908::{REGISTER_GROUP_COUNT, RegisterGroup, mpmu};

use super::regs::ClkRegIo;

/// Words per register group; covers every offset the declarations use.
const FAKE_REG_WORDS: usize = 128;

pub struct FakeRegIo {
    regs: RefCell<[[u32; FAKE_REG_WORDS]; REGISTER_GROUP_COUNT]>,
    elapsed_us: u64,
    read_count: Cell<u64>,
    unmapped: &'static [RegisterGroup],
    /// `(swcr1 offset, lock bit)`: writing the PLL enable bit sets the lock
    /// bit in POSR.
    auto_lock: Option<(u32, u8)>,
    /// `(group, offset, bit, reads)`: a write setting `bit` arms a countdown
    /// of `reads` accesses to that register before the bit self-clears.
    fc_ack: Option<(RegisterGroup, u32, u8, u32)>,
    fc_pending: Cell<Option<u32>>,
    /// `(group, offset, mask)`: these bits always read back as zero.
    stuck: Option<(RegisterGroup, u32, u32)>,
}

impl FakeRegIo {
    pub fn new() -> Self {
        Self {
            regs: RefCell::new([[0; FAKE_REG_WORDS]; REGISTER_GROUP_COUNT]),
            elapsed_us: 0,
            read_count: Cell::new(0),
            unmapped: &[],
            auto_lock: None,
            fc_ack: None,
            fc_pending: Cell::new(None),
            stuck: None,
        }
    }

    pub fn with_unmapped(mut self, groups: &'static [RegisterGroup]) -> Self {
        self.unmapped = groups;
        self
    }

    pub fn with_auto_lock(mut self, swcr1_offset: u32, lock_bit: u8) -> Self {
        self.auto_lock = Some((swcr1_offset, lock_bit));
        self
    }

    pub fn with_fc_ack(
        mut self,
        group: RegisterGroup,
        offset: u32,
        bit: u8,
        after_reads: u32,
    ) -> Self {
        self.fc_ack = Some((group, offset, bit, after_reads));
        self
    }

    pub fn with_stuck(mut self, group: RegisterGroup, offset: u32, mask: u32) -> Self {
        self.stuck = Some((group, offset, mask));
        self
    }

    /// Raw peek at a stored register value.
    pub fn reg(&self, group: RegisterGroup, offset: u32) -> u32 {
        self.regs.borrow()[group.index()][(offset / 4) as usize]
    }

    /// Raw poke, bypassing all modeled behavior.
    pub fn poke(&mut self, group: RegisterGroup, offset: u32, value: u32) {
        self.regs.borrow_mut()[group.index()][(offset / 4) as usize] = value;
    }

    /// Simulated time spent in `delay_us`.
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    /// Number of register reads performed.
    pub fn read_count(&self) -> u64 {
        self.read_count.get()
    }
}

impl Default for FakeRegIo {
    fn default() -> Self {
        Self::new()
    }
}

impl ClkRegIo for FakeRegIo {
    fn read(&self, group: RegisterGroup, offset: u32) -> u32 {
        self.read_count.set(self.read_count.get() + 1);
        let word = (offset / 4) as usize;
        if let (Some((fc_group, fc_offset, bit, _)), Some(remaining)) =
            (self.fc_ack, self.fc_pending.get())
        {
            if group == fc_group && offset == fc_offset {
                if remaining == 0 {
                    self.regs.borrow_mut()[group.index()][word] &= !(1 << bit);
                    self.fc_pending.set(None);
                } else {
                    self.fc_pending.set(Some(remaining - 1));
                }
            }
        }
        let mut value = self.regs.borrow()[group.index()][word];
        if let Some((stuck_group, stuck_offset, mask)) = self.stuck {
            if group == stuck_group && offset == stuck_offset {
                value &= !mask;
            }
        }
        value
    }

    fn write(&mut self, group: RegisterGroup, offset: u32, value: u32) {
        let word = (offset / 4) as usize;
        self.regs.borrow_mut()[group.index()][word] = value;
        if let Some((swcr1_offset, lock_bit)) = self.auto_lock {
            if group == RegisterGroup::Mpmu && offset == swcr1_offset {
                let posr_word = (mpmu::POSR / 4) as usize;
                let mut regs = self.regs.borrow_mut();
                if value & (1 << 31) != 0 {
                    regs[RegisterGroup::Mpmu.index()][posr_word] |= 1 << lock_bit;
                } else {
                    regs[RegisterGroup::Mpmu.index()][posr_word] &= !(1 << lock_bit);
                }
            }
        }
        if let Some((fc_group, fc_offset, bit, after_reads)) = self.fc_ack {
            if group == fc_group && offset == fc_offset && value & (1 << bit) != 0 {
                self.fc_pending.set(Some(after_reads));
            }
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }

    fn is_mapped(&self, group: RegisterGroup) -> bool {
        !self.unmapped.contains(&group)
    }
}
