//! Register group access.
//!
//! Clock control registers are spread over several physically distinct
//! blocks ([pxa1908::RegisterGroup]). The blocks' base addresses come from
//! the platform's address discovery and are supplied once when the MMIO
//! backend is constructed; every node addresses its registers as
//! `(group, offset)` pairs through the [ClkRegIo] trait. Keeping the access
//! path behind a trait also allows the clock tests to run against a fake
//! register file on the host.
use embedded_hal::delay::DelayNs;
use pxa1908::{REGISTER_GROUP_COUNT, RegisterGroup};

/// 32-bit register access plus the busy-poll delay primitive.
///
/// All hardware waits in the subsystem are bounded busy-polls built from
/// `read` and `delay_us`; implementations must not block beyond the
/// requested delay.
pub trait ClkRegIo {
    /// Read the 32-bit register at `base(group) + offset`.
    fn read(&self, group: RegisterGroup, offset: u32) -> u32;
    /// Write the 32-bit register at `base(group) + offset`.
    fn write(&mut self, group: RegisterGroup, offset: u32, value: u32);
    /// Busy-wait for the given number of microseconds.
    fn delay_us(&mut self, us: u32);
    /// Whether a base address is bound for the given group.
    ///
    /// Registry init refuses node declarations on unmapped groups, so the
    /// access methods may assume the group is mapped.
    fn is_mapped(&self, group: RegisterGroup) -> bool {
        let _ = group;
        true
    }
}

/// Memory-mapped backend over the physical register blocks.
pub struct MmioRegIo<D: DelayNs> {
    bases: [Option<usize>; REGISTER_GROUP_COUNT],
    delay: D,
}

impl<D: DelayNs> MmioRegIo<D> {
    /// Create a backend from a base-address table.
    ///
    /// Groups missing from the table stay unmapped; binding a clock node to
    /// an unmapped group is a fatal registry-init error.
    ///
    /// # Safety
    ///
    /// The supplied addresses must point to the corresponding register
    /// blocks and must stay valid for the lifetime of the backend. The
    /// caller is responsible for ensuring no other code performs
    /// read-modify-write accesses to these blocks concurrently.
    pub unsafe fn new(bases: &[(RegisterGroup, usize)], delay: D) -> Self {
        let mut table = [None; REGISTER_GROUP_COUNT];
        for (group, base) in bases {
            table[group.index()] = Some(*base);
        }
        Self {
            bases: table,
            delay,
        }
    }

    /// Create a backend using the documented physical base addresses.
    ///
    /// # Safety
    ///
    /// See [Self::new]. Only valid on targets where the blocks are not
    /// remapped.
    pub unsafe fn new_with_fixed_bases(delay: D) -> Self {
        unsafe {
            Self::new(
                &[
                    (RegisterGroup::Mpmu, pxa1908::bases::MPMU),
                    (RegisterGroup::Apmu, pxa1908::bases::APMU),
                    (RegisterGroup::Apbc, pxa1908::bases::APBC),
                    (RegisterGroup::Apbs, pxa1908::bases::APBS),
                    (RegisterGroup::Apbc2, pxa1908::bases::APBC2),
                ],
                delay,
            )
        }
    }
}

impl<D: DelayNs> ClkRegIo for MmioRegIo<D> {
    #[inline]
    fn read(&self, group: RegisterGroup, offset: u32) -> u32 {
        match self.bases[group.index()] {
            // Safety: base validity is guaranteed by the constructor contract.
            Some(base) => unsafe {
                core::ptr::read_volatile((base + offset as usize) as *const u32)
            },
            None => 0,
        }
    }

    #[inline]
    fn write(&mut self, group: RegisterGroup, offset: u32, value: u32) {
        if let Some(base) = self.bases[group.index()] {
            // Safety: base validity is guaranteed by the constructor contract.
            unsafe { core::ptr::write_volatile((base + offset as usize) as *mut u32, value) };
        }
    }

    #[inline]
    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    #[inline]
    fn is_mapped(&self, group: RegisterGroup) -> bool {
        self.bases[group.index()].is_some()
    }
}
