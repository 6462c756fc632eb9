//! # Clock control register layouts for PXA1908-class SoCs
//!
//! This crate only covers the register blocks involved in clock distribution:
//! the main and application power management units (MPMU/APMU) and the three
//! APB control blocks (APBC/APBS/APBC2). The register windows themselves are
//! discovered by the platform at run-time, so this crate exposes block tags
//! and register offsets rather than fixed-address MMIO handles.
#![no_std]

pub mod pll;

/// The physically distinct register blocks that carry clock control registers.
///
/// A clock node is always bound to exactly one of these blocks; the block's
/// base address is supplied once at subsystem construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegisterGroup {
    /// Main power management unit.
    Mpmu,
    /// Application subsystem power management unit.
    Apmu,
    /// APB clock/reset control block.
    Apbc,
    /// APB control block of the audio island.
    Apbs,
    /// Secondary APB clock/reset control block.
    Apbc2,
}

/// Number of register groups, for dense per-group tables.
pub const REGISTER_GROUP_COUNT: usize = 5;

impl RegisterGroup {
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            RegisterGroup::Mpmu => 0,
            RegisterGroup::Apmu => 1,
            RegisterGroup::Apbc => 2,
            RegisterGroup::Apbs => 3,
            RegisterGroup::Apbc2 => 4,
        }
    }
}

/// Reset-manual base addresses of the register groups.
///
/// These are the documented physical addresses. Platforms which remap the
/// windows (or run behind an MMU) pass their own table instead.
pub mod bases {
    pub const MPMU: usize = 0xD405_0000;
    pub const APMU: usize = 0xD428_2800;
    pub const APBC: usize = 0xD401_5000;
    pub const APBS: usize = 0xD409_0000;
    pub const APBC2: usize = 0xD403_B000;
}

/// MPMU register offsets.
pub mod mpmu {
    /// Shared PLL lock/ready status register. One lock bit per PLL instance,
    /// see [crate::pll::PllStatus].
    pub const POSR: u32 = 0x0010;
    /// Fractional UART PLL control (DDN layout).
    pub const UART_PLL_CR: u32 = 0x0014;
    /// UART PLL output gate.
    pub const UART_PLL_GATE: u32 = 0x0018;
    /// PLL2 software control word 1, see [crate::pll::PllSwcr1].
    pub const PLL2_SWCR1: u32 = 0x0034;
    /// PLL2 software control word 2, see [crate::pll::PllSwcr2].
    pub const PLL2_SWCR2: u32 = 0x0038;
}

/// APMU register offsets.
pub mod apmu {
    /// AXI bus clock control.
    pub const ACLK_CTRL: u32 = 0x0000;
    /// SD host controller clock controls.
    pub const SDH0_CTRL: u32 = 0x0054;
    pub const SDH1_CTRL: u32 = 0x0058;
    /// USB OTG clock/reset control.
    pub const USB_CTRL: u32 = 0x005C;
    /// NAND flash controller clock control.
    pub const DFC_CTRL: u32 = 0x0060;
    /// Camera interface clock control register pair. `CCIC_CTRL` carries the
    /// reset bits, the dynamic fields live in `CCIC_SEL`.
    pub const CCIC_CTRL: u32 = 0x0050;
    pub const CCIC_SEL: u32 = 0x0024;
}

/// APBC register offsets.
pub mod apbc {
    pub const UART0: u32 = 0x0000;
    pub const UART1: u32 = 0x0004;
    pub const GPIO: u32 = 0x0008;
    pub const SSP0: u32 = 0x001C;
    pub const TIMERS: u32 = 0x0034;
    /// Debug/trace fabric clock, only present in the reduced boot image.
    pub const DBG_CLK: u32 = 0x0038;
}

/// APBS (audio island) register offsets.
pub mod apbs {
    /// Audio SSP clock control. This register does not read back reliably
    /// while the island is power-gated; software keeps a shadow image.
    pub const SSPA0: u32 = 0x0004;
}

/// APBC2 register offsets.
pub mod apbc2 {
    pub const UART2: u32 = 0x0000;
    pub const SSP1: u32 = 0x0004;
}

static_assertions::const_assert!(bases::MPMU % 4 == 0);
static_assertions::const_assert!(mpmu::PLL2_SWCR2 == mpmu::PLL2_SWCR1 + 4);
