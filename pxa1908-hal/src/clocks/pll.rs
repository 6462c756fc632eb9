//! Software-controlled PLL nodes.
//!
//! A PLL only achieves a discrete set of VCO frequencies; each achievable
//! frequency is one row of raw register field values in the node's rate
//! table. The configured fields are latched when the PLL is enabled, so
//! rate changes are refused while the PLL runs. Lock indication is polled
//! from the shared status register in the MPMU block.
use log::{debug, warn};
use pxa1908::{
    RegisterGroup, mpmu,
    pll::{PllStatus, PllSwcr1, PllSwcr2},
};

use super::{ClockError, regs::ClkRegIo};
use crate::time::Hertz;

/// Lock polling granularity.
pub const LOCK_POLL_GRANULARITY_US: u32 = 5;
/// Hardware-specified worst-case lock time is about 3 ms.
pub const LOCK_POLL_ITERATIONS: u32 = 600;

/// One achievable VCO frequency and the raw field values producing it.
pub struct PllRateRow {
    pub rate: Hertz,
    pub refdiv: u8,
    pub fbdiv: u8,
    pub icp: u8,
    pub kvco: u8,
    pub div_int: u8,
    pub div_frac: u32,
}

/// Static descriptor of one PLL instance.
pub struct PllDesc {
    /// Offset of the first software control word inside the node's group.
    pub swcr1: u32,
    /// Offset of the second software control word.
    pub swcr2: u32,
    /// This instance's bit in the shared lock status register.
    pub lock_bit: u8,
    /// Hardware-valid VCO envelope.
    pub vco_min: Hertz,
    pub vco_max: Hertz,
    pub table: &'static [PllRateRow],
}

impl PllRateRow {
    fn matches(&self, swcr1: &PllSwcr1, swcr2: &PllSwcr2) -> bool {
        self.refdiv == swcr1.refdiv()
            && self.fbdiv == swcr1.fbdiv()
            && self.icp == swcr1.icp()
            && self.kvco == swcr1.kvco().value()
            && self.div_int == swcr2.div_int().value()
            && self.div_frac == swcr2.div_frac().value()
    }
}

#[inline]
pub fn is_enabled<B: ClkRegIo>(desc: &PllDesc, group: RegisterGroup, io: &B) -> bool {
    PllSwcr1::new_with_raw_value(io.read(group, desc.swcr1)).en()
}

/// Power the PLL up and wait for lock.
///
/// Idempotent: an already running PLL is left alone. An expired lock wait is
/// reported as [ClockError::Unconfirmed]; the enable bit stays set and the
/// clock may still stabilize later.
pub fn enable<B: ClkRegIo>(
    desc: &PllDesc,
    name: &'static str,
    group: RegisterGroup,
    io: &mut B,
) -> Result<(), ClockError> {
    let mut swcr1 = PllSwcr1::new_with_raw_value(io.read(group, desc.swcr1));
    if swcr1.en() {
        return Ok(());
    }
    swcr1.set_en(true);
    io.write(group, desc.swcr1, swcr1.raw_value());
    for _ in 0..LOCK_POLL_ITERATIONS {
        let posr = PllStatus::new_with_raw_value(io.read(RegisterGroup::Mpmu, mpmu::POSR));
        if posr.locked(desc.lock_bit) {
            return Ok(());
        }
        io.delay_us(LOCK_POLL_GRANULARITY_US);
    }
    warn!("{name}: lock wait expired, clock may not be stable");
    Err(ClockError::Unconfirmed(name))
}

pub fn disable<B: ClkRegIo>(desc: &PllDesc, group: RegisterGroup, io: &mut B) {
    let mut swcr1 = PllSwcr1::new_with_raw_value(io.read(group, desc.swcr1));
    swcr1.set_en(false);
    io.write(group, desc.swcr1, swcr1.raw_value());
}

/// Read back the configured fields and look them up in the rate table.
///
/// An untabulated field combination yields 0 Hz ("unknown") rather than an
/// interpolated guess.
pub fn get_rate<B: ClkRegIo>(desc: &PllDesc, group: RegisterGroup, io: &B) -> Hertz {
    let swcr1 = PllSwcr1::new_with_raw_value(io.read(group, desc.swcr1));
    let swcr2 = PllSwcr2::new_with_raw_value(io.read(group, desc.swcr2));
    for row in desc.table {
        if row.matches(&swcr1, &swcr2) {
            return row.rate;
        }
    }
    Hertz::from_raw(0)
}

/// Largest tabulated frequency not exceeding `target`.
///
/// Targets outside the VCO envelope are rejected before any table walk.
pub fn round_rate(desc: &PllDesc, target: Hertz) -> Result<Hertz, ClockError> {
    if target < desc.vco_min || target > desc.vco_max {
        return Err(ClockError::RateOutOfRange {
            requested: target.raw(),
            min: desc.vco_min.raw(),
            max: desc.vco_max.raw(),
        });
    }
    desc.table
        .iter()
        .filter(|row| row.rate <= target)
        .map(|row| row.rate)
        .max()
        .ok_or(ClockError::NoTabulatedRate(target.raw()))
}

/// Program the raw fields of the exact tabulated row for `target`.
///
/// The caller must pre-round; an untabulated target is an error. A running
/// PLL refuses the change as a non-error no-op (the current rate is
/// returned), since the fields would only latch on the next enable anyway.
pub fn set_rate<B: ClkRegIo>(
    desc: &PllDesc,
    name: &'static str,
    group: RegisterGroup,
    io: &mut B,
    target: Hertz,
) -> Result<Hertz, ClockError> {
    if is_enabled(desc, group, io) {
        debug!("{name}: set_rate ignored while enabled");
        return Ok(get_rate(desc, group, io));
    }
    let row = desc
        .table
        .iter()
        .find(|row| row.rate == target)
        .ok_or(ClockError::NoTabulatedRate(target.raw()))?;

    let mut swcr1 = PllSwcr1::new_with_raw_value(io.read(group, desc.swcr1));
    swcr1.set_refdiv(row.refdiv);
    swcr1.set_fbdiv(row.fbdiv);
    swcr1.set_icp(row.icp);
    swcr1.set_kvco(arbitrary_int::u4::new(row.kvco));
    io.write(group, desc.swcr1, swcr1.raw_value());

    let mut swcr2 = PllSwcr2::new_with_raw_value(io.read(group, desc.swcr2));
    swcr2.set_div_int(arbitrary_int::u7::new(row.div_int));
    swcr2.set_div_frac(arbitrary_int::u24::new(row.div_frac));
    io.write(group, desc.swcr2, swcr2.raw_value());
    Ok(row.rate)
}
