//! Static clock tree declaration.
//!
//! One record per clock node, ordered sources-first so parent names always
//! resolve against already-bound nodes. The records are pure data consumed
//! by [ClockRegistry::init](super::ClockRegistry::init); kind-specific
//! behavior lives with the node kinds, not here.
use pxa1908::{RegisterGroup, apbc, apbc2, apbs, apmu, mpmu};

use super::{
    Availability, ClockDecl, ClockId, ClockKind,
    ddn::{DdnDesc, DdnRateRow, GateBit},
    mix::{DivEntry, DivField, Factor, Gate, MixDesc, MuxField, ParentDecl},
    pll::{PllDesc, PllRateRow},
    remap::{IdRemap, ReducedId},
};
use crate::time::Hertz;

/// Clock ids of the full node set.
pub mod ids {
    use super::ClockId;

    pub const CLK32: ClockId = ClockId(0);
    pub const VCTCXO: ClockId = ClockId(1);
    pub const PLL1_624: ClockId = ClockId(2);
    pub const PLL1_416: ClockId = ClockId(3);
    pub const PLL1_D2: ClockId = ClockId(4);
    pub const PLL1_D4: ClockId = ClockId(5);
    pub const PLL1_D12: ClockId = ClockId(6);
    pub const PLL1_D24: ClockId = ClockId(7);
    pub const PLL1_D48: ClockId = ClockId(8);
    pub const PLL2: ClockId = ClockId(9);
    pub const UART_PLL: ClockId = ClockId(10);
    pub const ACLK: ClockId = ClockId(11);
    pub const SDH0: ClockId = ClockId(12);
    pub const SDH1: ClockId = ClockId(13);
    pub const USB: ClockId = ClockId(14);
    pub const UART0: ClockId = ClockId(15);
    pub const UART1: ClockId = ClockId(16);
    pub const GPIO: ClockId = ClockId(17);
    pub const SSP0: ClockId = ClockId(18);
    pub const TIMERS: ClockId = ClockId(19);
    pub const UART2: ClockId = ClockId(20);
    pub const SSPA0: ClockId = ClockId(21);
    pub const CCIC: ClockId = ClockId(22);
    pub const DFC: ClockId = ClockId(23);
    pub const EARLY_DBG: ClockId = ClockId(24);
}

/// APBC-style function+bus clock gate; these clocks need a short settling
/// delay after a toggle.
const fn apbc_gate() -> Gate {
    Gate {
        mask: 0x3,
        enabled: 0x3,
        disabled: 0x0,
        settle_us: Some(10),
    }
}

/// Fixed-factor divider off `pll1_624`.
const fn pll1_factor(div: u32) -> MixDesc {
    MixDesc {
        ctrl: 0,
        sel: None,
        fc_bit: None,
        gate: None,
        div: None,
        mux: None,
        factor: Some(Factor { div, mul: 1 }),
        parents: ParentDecl::Named("pll1_624"),
        shadowed: false,
    }
}

static PLL2_DESC: PllDesc = PllDesc {
    swcr1: mpmu::PLL2_SWCR1,
    swcr2: mpmu::PLL2_SWCR2,
    lock_bit: 0,
    vco_min: Hertz::from_raw(1_200_000_000),
    vco_max: Hertz::from_raw(3_200_000_000),
    table: &[
        PllRateRow {
            rate: Hertz::from_raw(1_248_000_000),
            refdiv: 0x64,
            fbdiv: 0x70,
            icp: 0x40,
            kvco: 0x01,
            div_int: 0x66,
            div_frac: 0x000000,
        },
        PllRateRow {
            rate: Hertz::from_raw(1_595_000_000),
            refdiv: 0x64,
            fbdiv: 0x8f,
            icp: 0x40,
            kvco: 0x01,
            div_int: 0x50,
            div_frac: 0x09999a,
        },
        PllRateRow {
            rate: Hertz::from_raw(2_457_600_000),
            refdiv: 0x64,
            fbdiv: 0xdd,
            icp: 0x50,
            kvco: 0x00,
            div_int: 0x33,
            div_frac: 0x0ccccd,
        },
        PllRateRow {
            rate: Hertz::from_raw(3_100_000_000),
            refdiv: 0x64,
            fbdiv: 0xff,
            icp: 0x50,
            kvco: 0x02,
            div_int: 0x20,
            div_frac: 0x100000,
        },
    ],
};

static UART_PLL_DESC: DdnDesc = DdnDesc {
    ctrl: mpmu::UART_PLL_CR,
    num_shift: 16,
    num_width: 13,
    den_shift: 0,
    den_width: 13,
    factor: 2,
    gate: Some(GateBit {
        offset: mpmu::UART_PLL_GATE,
        bit: 1,
    }),
    parent: "pll1_624",
    table: &[
        DdnRateRow {
            num: 8125,
            den: 1536,
        },
        DdnRateRow {
            num: 3521,
            den: 689,
        },
        DdnRateRow { num: 3042, den: 655 },
    ],
};

static ACLK_DESC: MixDesc = MixDesc {
    ctrl: apmu::ACLK_CTRL,
    sel: None,
    fc_bit: Some(9),
    gate: None,
    div: Some(DivField {
        shift: 0,
        width: 3,
        table: None,
    }),
    mux: Some(MuxField {
        shift: 4,
        width: 2,
        table: None,
    }),
    factor: None,
    parents: ParentDecl::Candidates(&["pll1_624", "pll1_d2", "pll1_416"]),
    shadowed: false,
};

const fn sdh_desc(ctrl: u32) -> MixDesc {
    MixDesc {
        ctrl,
        sel: None,
        fc_bit: None,
        gate: Some(Gate {
            mask: 0x12,
            enabled: 0x12,
            disabled: 0x00,
            settle_us: None,
        }),
        div: Some(DivField {
            shift: 10,
            width: 4,
            table: None,
        }),
        mux: Some(MuxField {
            shift: 8,
            width: 2,
            table: None,
        }),
        factor: None,
        parents: ParentDecl::Candidates(&["pll1_416", "pll1_624", "pll2"]),
        shadowed: false,
    }
}

static SDH0_DESC: MixDesc = sdh_desc(apmu::SDH0_CTRL);
static SDH1_DESC: MixDesc = sdh_desc(apmu::SDH1_CTRL);

static USB_DESC: MixDesc = MixDesc {
    ctrl: apmu::USB_CTRL,
    sel: None,
    fc_bit: None,
    gate: Some(Gate {
        mask: 0x9,
        enabled: 0x9,
        disabled: 0x0,
        settle_us: Some(5),
    }),
    div: None,
    mux: None,
    factor: None,
    parents: ParentDecl::Named("aclk"),
    shadowed: false,
};

const fn uart_desc(ctrl: u32) -> MixDesc {
    MixDesc {
        ctrl,
        sel: None,
        fc_bit: None,
        gate: Some(apbc_gate()),
        div: None,
        mux: Some(MuxField {
            shift: 4,
            width: 3,
            table: None,
        }),
        factor: None,
        parents: ParentDecl::Candidates(&["pll1_d48", "vctcxo", "uart_pll"]),
        shadowed: false,
    }
}

static UART0_DESC: MixDesc = uart_desc(apbc::UART0);
static UART1_DESC: MixDesc = uart_desc(apbc::UART1);
static UART2_DESC: MixDesc = uart_desc(apbc2::UART2);

static GPIO_DESC: MixDesc = MixDesc {
    ctrl: apbc::GPIO,
    sel: None,
    fc_bit: None,
    gate: Some(apbc_gate()),
    div: None,
    mux: None,
    factor: None,
    parents: ParentDecl::Named("vctcxo"),
    shadowed: false,
};

/// SSP bit clock divider encoding is non-linear.
const SSP_DIV_TABLE: &[DivEntry] = &[
    DivEntry { raw: 1, div: 2 },
    DivEntry { raw: 2, div: 4 },
    DivEntry { raw: 3, div: 8 },
];

const fn ssp_desc(ctrl: u32) -> MixDesc {
    MixDesc {
        ctrl,
        sel: None,
        fc_bit: None,
        gate: Some(apbc_gate()),
        div: Some(DivField {
            shift: 8,
            width: 2,
            table: Some(SSP_DIV_TABLE),
        }),
        mux: Some(MuxField {
            shift: 4,
            width: 2,
            table: None,
        }),
        factor: None,
        parents: ParentDecl::Candidates(&["pll1_d12", "pll1_d24", "vctcxo"]),
        shadowed: false,
    }
}

static SSP0_DESC: MixDesc = ssp_desc(apbc::SSP0);
static SSP1_DESC: MixDesc = ssp_desc(apbc2::SSP1);

/// The timers mux register encoding skips `0b01`.
const TIMERS_MUX_TABLE: &[u32] = &[0b00, 0b10];

static TIMERS_DESC: MixDesc = MixDesc {
    ctrl: apbc::TIMERS,
    sel: None,
    fc_bit: None,
    gate: Some(apbc_gate()),
    div: None,
    mux: Some(MuxField {
        shift: 4,
        width: 2,
        table: Some(TIMERS_MUX_TABLE),
    }),
    factor: None,
    parents: ParentDecl::Candidates(&["clk32", "vctcxo"]),
    shadowed: false,
};

/// The audio island clock control register does not read back reliably
/// while the island is power-gated; this node is driven through the
/// software shadow.
static SSPA0_DESC: MixDesc = MixDesc {
    ctrl: apbs::SSPA0,
    sel: None,
    fc_bit: None,
    gate: Some(Gate {
        mask: 0x2,
        enabled: 0x2,
        disabled: 0x0,
        settle_us: None,
    }),
    div: None,
    mux: Some(MuxField {
        shift: 4,
        width: 1,
        table: None,
    }),
    factor: None,
    parents: ParentDecl::Candidates(&["vctcxo", "uart_pll"]),
    shadowed: true,
};

static CCIC_DESC: MixDesc = MixDesc {
    ctrl: apmu::CCIC_CTRL,
    sel: Some(apmu::CCIC_SEL),
    fc_bit: Some(15),
    gate: Some(Gate {
        mask: 0x1B,
        enabled: 0x1B,
        disabled: 0x00,
        settle_us: None,
    }),
    div: Some(DivField {
        shift: 17,
        width: 3,
        table: None,
    }),
    mux: Some(MuxField {
        shift: 6,
        width: 2,
        table: None,
    }),
    factor: None,
    parents: ParentDecl::Candidates(&["pll1_416", "pll1_624"]),
    shadowed: false,
};

static DFC_DESC: MixDesc = MixDesc {
    ctrl: apmu::DFC_CTRL,
    sel: None,
    fc_bit: None,
    gate: None,
    div: Some(DivField {
        shift: 0,
        width: 3,
        table: None,
    }),
    mux: None,
    factor: None,
    parents: ParentDecl::Named("pll1_416"),
    shadowed: false,
};

static EARLY_DBG_DESC: MixDesc = MixDesc {
    ctrl: apbc::DBG_CLK,
    sel: None,
    fc_bit: None,
    gate: Some(apbc_gate()),
    div: None,
    mux: None,
    factor: None,
    parents: ParentDecl::Named("vctcxo"),
    shadowed: false,
};

const fn fixed(id: ClockId, name: &'static str, rate: u32) -> ClockDecl {
    ClockDecl {
        id,
        name,
        group: RegisterGroup::Mpmu,
        avail: Availability::Both,
        kind: ClockKind::Fixed {
            rate: Hertz::from_raw(rate),
        },
    }
}

const fn factor_node(id: ClockId, name: &'static str, desc: &'static MixDesc) -> ClockDecl {
    ClockDecl {
        id,
        name,
        group: RegisterGroup::Mpmu,
        avail: Availability::Both,
        kind: ClockKind::Mix(desc),
    }
}

static PLL1_D2_DESC: MixDesc = pll1_factor(2);
static PLL1_D4_DESC: MixDesc = pll1_factor(4);
static PLL1_D12_DESC: MixDesc = pll1_factor(12);
static PLL1_D24_DESC: MixDesc = pll1_factor(24);
static PLL1_D48_DESC: MixDesc = pll1_factor(48);

/// The full node set, ordered sources-first.
pub static DECLARATIONS: &[ClockDecl] = &[
    fixed(ids::CLK32, "clk32", 32_768),
    fixed(ids::VCTCXO, "vctcxo", 26_000_000),
    fixed(ids::PLL1_624, "pll1_624", 624_000_000),
    fixed(ids::PLL1_416, "pll1_416", 416_000_000),
    factor_node(ids::PLL1_D2, "pll1_d2", &PLL1_D2_DESC),
    factor_node(ids::PLL1_D4, "pll1_d4", &PLL1_D4_DESC),
    factor_node(ids::PLL1_D12, "pll1_d12", &PLL1_D12_DESC),
    factor_node(ids::PLL1_D24, "pll1_d24", &PLL1_D24_DESC),
    factor_node(ids::PLL1_D48, "pll1_d48", &PLL1_D48_DESC),
    ClockDecl {
        id: ids::PLL2,
        name: "pll2",
        group: RegisterGroup::Mpmu,
        avail: Availability::Both,
        kind: ClockKind::Pll(&PLL2_DESC),
    },
    ClockDecl {
        id: ids::UART_PLL,
        name: "uart_pll",
        group: RegisterGroup::Mpmu,
        avail: Availability::Both,
        kind: ClockKind::Ddn(&UART_PLL_DESC),
    },
    ClockDecl {
        id: ids::ACLK,
        name: "aclk",
        group: RegisterGroup::Apmu,
        avail: Availability::Both,
        kind: ClockKind::Mix(&ACLK_DESC),
    },
    ClockDecl {
        id: ids::SDH0,
        name: "sdh0",
        group: RegisterGroup::Apmu,
        avail: Availability::FullOnly,
        kind: ClockKind::Mix(&SDH0_DESC),
    },
    ClockDecl {
        id: ids::SDH1,
        name: "sdh1",
        group: RegisterGroup::Apmu,
        avail: Availability::FullOnly,
        kind: ClockKind::Mix(&SDH1_DESC),
    },
    ClockDecl {
        id: ids::USB,
        name: "usb",
        group: RegisterGroup::Apmu,
        avail: Availability::FullOnly,
        kind: ClockKind::Mix(&USB_DESC),
    },
    ClockDecl {
        id: ids::UART0,
        name: "uart0",
        group: RegisterGroup::Apbc,
        avail: Availability::Both,
        kind: ClockKind::Mix(&UART0_DESC),
    },
    ClockDecl {
        id: ids::UART1,
        name: "uart1",
        group: RegisterGroup::Apbc,
        avail: Availability::FullOnly,
        kind: ClockKind::Mix(&UART1_DESC),
    },
    ClockDecl {
        id: ids::GPIO,
        name: "gpio",
        group: RegisterGroup::Apbc,
        avail: Availability::FullOnly,
        kind: ClockKind::Mix(&GPIO_DESC),
    },
    ClockDecl {
        id: ids::SSP0,
        name: "ssp0",
        group: RegisterGroup::Apbc,
        avail: Availability::FullOnly,
        kind: ClockKind::Mix(&SSP0_DESC),
    },
    ClockDecl {
        id: ids::TIMERS,
        name: "timers",
        group: RegisterGroup::Apbc,
        avail: Availability::Both,
        kind: ClockKind::Mix(&TIMERS_DESC),
    },
    ClockDecl {
        id: ids::UART2,
        name: "uart2",
        group: RegisterGroup::Apbc2,
        avail: Availability::FullOnly,
        kind: ClockKind::Mix(&UART2_DESC),
    },
    ClockDecl {
        id: ids::SSPA0,
        name: "sspa0",
        group: RegisterGroup::Apbs,
        avail: Availability::FullOnly,
        kind: ClockKind::Mix(&SSPA0_DESC),
    },
    ClockDecl {
        id: ids::CCIC,
        name: "ccic",
        group: RegisterGroup::Apmu,
        avail: Availability::FullOnly,
        kind: ClockKind::Mix(&CCIC_DESC),
    },
    ClockDecl {
        id: ids::DFC,
        name: "dfc",
        group: RegisterGroup::Apmu,
        avail: Availability::FullOnly,
        kind: ClockKind::Mix(&DFC_DESC),
    },
    ClockDecl {
        id: ids::EARLY_DBG,
        name: "early_dbg",
        group: RegisterGroup::Apbc,
        avail: Availability::ReducedOnly,
        kind: ClockKind::Mix(&EARLY_DBG_DESC),
    },
];

/// Mandatory startup rates, applied at the end of registry init. External
/// configuration: platforms may inject their own table instead.
pub static DEFAULT_STARTUP_RATES: &[(ClockId, Hertz)] = &[
    (ids::ACLK, Hertz::from_raw(208_000_000)),
    (ids::PLL2, Hertz::from_raw(2_457_600_000)),
];

/// Translation table for the reduced early-boot id space.
pub static REDUCED_ID_MAP: IdRemap = IdRemap::new(&[
    (ids::CLK32, ReducedId(0)),
    (ids::VCTCXO, ReducedId(1)),
    (ids::PLL1_624, ReducedId(2)),
    (ids::ACLK, ReducedId(3)),
    (ids::UART0, ReducedId(4)),
    (ids::TIMERS, ReducedId(5)),
    (ids::EARLY_DBG, ReducedId(6)),
]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clocks::{ClockError, ClockRegistry, Variant, test_support::FakeRegIo};

    fn full_registry() -> ClockRegistry<FakeRegIo> {
        // The bus clock applies its divider through the frequency-change
        // handshake; let the fake ack it.
        let io = FakeRegIo::new().with_fc_ack(RegisterGroup::Apmu, apmu::ACLK_CTRL, 9, 3);
        ClockRegistry::init(io, DECLARATIONS, Variant::Full, DEFAULT_STARTUP_RATES).unwrap()
    }

    #[test]
    fn init_applies_startup_rates() {
        let registry = full_registry();
        assert_eq!(
            registry.get_rate(ids::ACLK),
            Ok(Hertz::from_raw(208_000_000))
        );
        // The PLL2 fields are latched even though the PLL stays disabled.
        assert_eq!(
            registry.get_rate(ids::PLL2),
            Ok(Hertz::from_raw(2_457_600_000))
        );
        assert_eq!(registry.is_enabled(ids::PLL2), Ok(false));
    }

    #[test]
    fn invalid_ids_are_rejected() {
        let registry = full_registry();
        assert_eq!(
            registry.get_rate(ClockId(9999)),
            Err(ClockError::InvalidClock(9999))
        );
        assert_eq!(
            registry.get_rate(ClockId(199)),
            Err(ClockError::InvalidClock(199))
        );
    }

    #[test]
    fn unmapped_group_fails_init() {
        let io = FakeRegIo::new().with_unmapped(&[RegisterGroup::Apbs]);
        assert_eq!(
            ClockRegistry::init(io, DECLARATIONS, Variant::Full, &[]).err(),
            Some(ClockError::UnmappedGroup(RegisterGroup::Apbs))
        );
    }

    #[test]
    fn reduced_variant_skips_full_only_nodes() {
        let io = FakeRegIo::new();
        let registry = ClockRegistry::init(io, DECLARATIONS, Variant::Reduced, &[]).unwrap();
        assert_eq!(
            registry.get_rate(ids::SDH0),
            Err(ClockError::InvalidClock(ids::SDH0.0))
        );
        // The reduced-only node exists here and nowhere else.
        assert_eq!(registry.is_enabled(ids::EARLY_DBG), Ok(false));
        let full = full_registry();
        assert_eq!(
            full.get_rate(ids::EARLY_DBG),
            Err(ClockError::InvalidClock(ids::EARLY_DBG.0))
        );
    }

    #[test]
    fn enable_is_idempotent_for_every_kind() {
        let mut registry = full_registry();
        let nodes = [
            (ids::CLK32, RegisterGroup::Mpmu, 0),
            (ids::UART0, RegisterGroup::Apbc, apbc::UART0),
            (ids::UART_PLL, RegisterGroup::Mpmu, mpmu::UART_PLL_GATE),
            (ids::SDH0, RegisterGroup::Apmu, apmu::SDH0_CTRL),
        ];
        for (id, group, offset) in nodes {
            assert_eq!(registry.enable(id), Ok(()));
            assert_eq!(registry.is_enabled(id), Ok(true));
            let snapshot = registry.io().reg(group, offset);
            assert_eq!(registry.enable(id), Ok(()));
            assert_eq!(registry.io().reg(group, offset), snapshot);
        }
    }

    #[test]
    fn divider_only_round_trip() {
        let mut registry = full_registry();
        // dfc: 416 MHz parent, plain 3-bit divider.
        for target in [416_000_000, 208_000_000, 104_000_000, 59_428_571] {
            let target = Hertz::from_raw(target);
            let achieved = registry.set_rate(ids::DFC, target).unwrap();
            assert_eq!(registry.get_rate(ids::DFC), Ok(achieved));
            assert_eq!(registry.round_rate(ids::DFC, target), Ok(achieved));
        }
    }

    #[test]
    fn set_parent_is_a_noop_without_a_mux() {
        let mut registry = full_registry();
        assert_eq!(registry.set_parent(ids::GPIO, ids::CLK32), Ok(()));
        assert_eq!(registry.parent_of(ids::GPIO), Ok(Some(ids::VCTCXO)));
    }

    #[test]
    fn set_parent_switches_the_mux() {
        let mut registry = full_registry();
        assert_eq!(registry.parent_of(ids::UART0), Ok(Some(ids::PLL1_D48)));
        assert_eq!(registry.set_parent(ids::UART0, ids::VCTCXO), Ok(()));
        assert_eq!(registry.parent_of(ids::UART0), Ok(Some(ids::VCTCXO)));
        assert_eq!(
            registry.get_rate(ids::UART0),
            Ok(Hertz::from_raw(26_000_000))
        );
    }

    #[test]
    fn set_parent_rejects_non_candidates() {
        let mut registry = full_registry();
        assert_eq!(
            registry.set_parent(ids::UART0, ids::SDH0),
            Err(ClockError::UnknownParent("sdh0"))
        );
    }

    #[test]
    fn mux_bootstrap_reads_the_boot_rom_selection() {
        let mut io = FakeRegIo::new().with_fc_ack(RegisterGroup::Apmu, apmu::ACLK_CTRL, 9, 3);
        // The boot ROM left uart0 on vctcxo (mux index 1).
        io.poke(RegisterGroup::Apbc, apbc::UART0, 1 << 4);
        let registry =
            ClockRegistry::init(io, DECLARATIONS, Variant::Full, DEFAULT_STARTUP_RATES).unwrap();
        assert_eq!(registry.parent_of(ids::UART0), Ok(Some(ids::VCTCXO)));
    }

    #[test]
    fn failed_enable_leaves_other_nodes_working() {
        // sdh0's gate bits never read back; enable reports Unconfirmed.
        let io = FakeRegIo::new()
            .with_fc_ack(RegisterGroup::Apmu, apmu::ACLK_CTRL, 9, 3)
            .with_stuck(RegisterGroup::Apmu, apmu::SDH0_CTRL, 0x12);
        let mut registry =
            ClockRegistry::init(io, DECLARATIONS, Variant::Full, DEFAULT_STARTUP_RATES).unwrap();
        assert_eq!(
            registry.enable(ids::SDH0),
            Err(ClockError::Unconfirmed("sdh0"))
        );
        // The gate pattern itself was written.
        assert_eq!(
            registry.io().reg(RegisterGroup::Apmu, apmu::SDH0_CTRL) & 0x12,
            0x12
        );
        // Unrelated nodes are unaffected.
        assert_eq!(registry.enable(ids::UART0), Ok(()));
        assert_eq!(
            registry.get_rate(ids::ACLK),
            Ok(Hertz::from_raw(208_000_000))
        );
    }

    #[test]
    fn scenario_mux_switch_prefers_first_found() {
        let mut registry = full_registry();
        // sdh0 candidates are [pll1_416, pll1_624, pll2]; 104 MHz divides
        // out of both PLL1 taps, and the 416 MHz parent is found first.
        let achieved = registry.set_rate(ids::SDH0, Hertz::from_raw(104_000_000)).unwrap();
        assert_eq!(achieved, Hertz::from_raw(104_000_000));
        assert_eq!(registry.parent_of(ids::SDH0), Ok(Some(ids::PLL1_416)));
        assert_eq!(registry.get_rate(ids::SDH0), Ok(achieved));
    }
}
