//! Register layouts of the software-controlled PLLs.
//!
//! Each programmable PLL is configured through a pair of software control
//! words (`SWCR1`/`SWCR2`). The configured fields are only latched into the
//! analog block when the PLL is enabled, and lock indication is reported
//! through the shared [PllStatus] register in the MPMU block.
use arbitrary_int::{u4, u7, u24};

/// PLL software control word 1.
///
/// NOTE: Changing the divider fields while the PLL is enabled has no effect;
/// the hardware latches them on the enable edge.
#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct PllSwcr1 {
    /// PLL enable / power-up control.
    #[bit(31, rw)]
    en: bool,
    /// VCO band selection.
    #[bits(24..=27, rw)]
    kvco: u4,
    /// Reference divider.
    #[bits(16..=23, rw)]
    refdiv: u8,
    /// Feedback divider.
    #[bits(8..=15, rw)]
    fbdiv: u8,
    /// Charge pump current selection.
    #[bits(0..=7, rw)]
    icp: u8,
}

/// PLL software control word 2: the fractional post divider.
#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct PllSwcr2 {
    /// Integer part of the output divider.
    #[bits(24..=30, rw)]
    div_int: u7,
    /// Fractional part of the output divider.
    #[bits(0..=23, rw)]
    div_frac: u24,
}

/// Shared PLL lock status register (MPMU `POSR`).
///
/// Read-only. Each software-controlled PLL owns one lock bit; the bit index
/// is part of the per-PLL descriptor rather than hard-coded here because
/// derivative parts shuffle the assignment.
#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct PllStatus {
    #[bit(2, r)]
    pll4_lock: bool,
    #[bit(1, r)]
    pll3_lock: bool,
    #[bit(0, r)]
    pll2_lock: bool,
}

impl PllStatus {
    /// Lock indication for an arbitrary lock bit index.
    #[inline]
    pub const fn locked(&self, lock_bit: u8) -> bool {
        (self.raw_value() >> lock_bit) & 0b1 == 1
    }
}
