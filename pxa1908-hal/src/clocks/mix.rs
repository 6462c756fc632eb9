//! Composite "mix" clock nodes.
//!
//! A mix node combines up to four facets sharing one or two control
//! registers: a gate, an integer divider, a parent mux and a constant
//! factor. Some layouts additionally carry a frequency-change request bit
//! which tells the hardware to latch a pending divider/mux change; the
//! hardware clears the bit once the change took effect.
//!
//! When a node has a separate select register, all dynamic fields (gate,
//! mux, divider, frequency-change) live in it; otherwise they live in the
//! control register. One node's select register does not read back reliably
//! and is driven through a software [ShadowReg] instead of read-modify-write.
use log::{debug, warn};
use pxa1908::RegisterGroup;

use super::{ClockError, ShadowReg, regs::ClkRegIo};
use crate::time::Hertz;

/// Readback poll schedule after a gate toggle. The delays back off
/// exponentially to tolerate clock-domain synchronization latency.
pub const GATE_POLL_DELAYS_US: [u32; 5] = [1, 10, 100, 1_000, 10_000];

/// Short budget for the frequency-change acknowledgement poll.
pub const FC_POLL_SHORT_ITERATIONS: u32 = 50;
/// Escalated budget once the short poll expires.
pub const FC_POLL_LONG_ITERATIONS: u32 = 5000;

/// Gate facet: bit patterns applied to the node's dynamic register.
pub struct Gate {
    pub mask: u32,
    pub enabled: u32,
    pub disabled: u32,
    /// Fixed post-toggle settling delay, where the hardware requires one.
    pub settle_us: Option<u32>,
}

/// Non-identity mapping from a raw divider field value to the divider.
pub struct DivEntry {
    pub raw: u32,
    pub div: u32,
}

/// Divider facet: a bit-field inside the dynamic register.
pub struct DivField {
    pub shift: u8,
    pub width: u8,
    /// Raw-value translation table; identity when absent.
    pub table: Option<&'static [DivEntry]>,
}

/// Mux facet: a bit-field selecting among the candidate parents.
pub struct MuxField {
    pub shift: u8,
    pub width: u8,
    /// Explicit index-to-raw encoding when the register values are not
    /// contiguous; identity when absent.
    pub table: Option<&'static [u32]>,
}

/// Constant factor applied to the parent rate, for nodes without a
/// register-controlled ratio.
pub struct Factor {
    pub div: u32,
    pub mul: u32,
}

/// Parent linkage as declared; resolved to arena indices at registry init.
#[derive(Debug, Clone, Copy)]
pub enum ParentDecl {
    /// Terminal source, no parent.
    None,
    /// Fixed parent, by name.
    Named(&'static str),
    /// Mux candidates, in mux-index order.
    Candidates(&'static [&'static str]),
}

/// Static descriptor of one mix node.
pub struct MixDesc {
    /// Control register offset inside the node's group.
    pub ctrl: u32,
    /// Select register offset; the dynamic fields live here when present.
    pub sel: Option<u32>,
    /// Frequency-change request bit inside the dynamic register.
    pub fc_bit: Option<u8>,
    pub gate: Option<Gate>,
    pub div: Option<DivField>,
    pub mux: Option<MuxField>,
    pub factor: Option<Factor>,
    pub parents: ParentDecl,
    /// Drive the dynamic register through the software shadow instead of
    /// read-modify-write; the hardware register does not read back.
    pub shadowed: bool,
}

impl DivField {
    #[inline]
    pub const fn max_raw(&self) -> u32 {
        (1 << self.width) - 1
    }

    #[inline]
    const fn mask(&self) -> u32 {
        self.max_raw() << self.shift
    }

    #[inline]
    fn extract(&self, image: u32) -> u32 {
        (image >> self.shift) & self.max_raw()
    }

    /// Divider for a raw field value; `None` when the value is not in the
    /// translation table.
    pub fn divider_for_raw(&self, raw: u32) -> Option<u32> {
        match self.table {
            Some(table) => table.iter().find(|e| e.raw == raw).map(|e| e.div),
            None => Some(raw),
        }
    }

    /// Walk the achievable `(raw, divider)` pairs in deterministic order:
    /// the translation table in declared order, or 1..=2^width-1 identity.
    fn for_each_divider(&self, mut f: impl FnMut(u32, u32)) {
        match self.table {
            Some(table) => {
                for entry in table {
                    f(entry.raw, entry.div);
                }
            }
            None => {
                for raw in 1..=self.max_raw() {
                    f(raw, raw);
                }
            }
        }
    }
}

impl MuxField {
    #[inline]
    const fn max_raw(&self) -> u32 {
        (1 << self.width) - 1
    }

    #[inline]
    const fn mask(&self) -> u32 {
        self.max_raw() << self.shift
    }

    /// Candidate index for a raw field value.
    fn index_for_raw(&self, raw: u32) -> Option<usize> {
        match self.table {
            Some(table) => table.iter().position(|&v| v == raw),
            None => Some(raw as usize),
        }
    }

    /// Raw field value encoding a candidate index.
    fn raw_for_index(&self, index: usize) -> Option<u32> {
        match self.table {
            Some(table) => table.get(index).copied(),
            None => (index as u32 <= self.max_raw()).then_some(index as u32),
        }
    }
}

impl MixDesc {
    /// The register holding the dynamic fields in this layout.
    #[inline]
    pub const fn dyn_reg(&self) -> u32 {
        match self.sel {
            Some(sel) => sel,
            None => self.ctrl,
        }
    }
}

fn read_image<B: ClkRegIo>(
    desc: &MixDesc,
    group: RegisterGroup,
    io: &B,
    shadow: &ShadowReg,
) -> u32 {
    if desc.shadowed {
        shadow.value()
    } else {
        io.read(group, desc.dyn_reg())
    }
}

/// Read-modify-write of the dynamic register, or a shadow update followed by
/// a plain write for the shadowed node.
fn modify_image<B: ClkRegIo>(
    desc: &MixDesc,
    group: RegisterGroup,
    io: &mut B,
    shadow: &mut ShadowReg,
    mask: u32,
    bits: u32,
) {
    let image = if desc.shadowed {
        shadow.apply(mask, bits)
    } else {
        (io.read(group, desc.dyn_reg()) & !mask) | bits
    };
    io.write(group, desc.dyn_reg(), image);
}

pub fn is_enabled<B: ClkRegIo>(
    desc: &MixDesc,
    group: RegisterGroup,
    io: &B,
    shadow: &ShadowReg,
) -> bool {
    match &desc.gate {
        Some(gate) => read_image(desc, group, io, shadow) & gate.mask == gate.enabled,
        // Ungated nodes always run.
        None => true,
    }
}

/// Apply the enabled gate pattern and wait for it to read back.
///
/// An expired readback wait is reported as [ClockError::Unconfirmed] but
/// leaves the written pattern in place. The shadowed node skips the
/// readback entirely.
pub fn enable<B: ClkRegIo>(
    desc: &MixDesc,
    name: &'static str,
    group: RegisterGroup,
    io: &mut B,
    shadow: &mut ShadowReg,
) -> Result<(), ClockError> {
    let Some(gate) = &desc.gate else {
        return Ok(());
    };
    modify_image(desc, group, io, shadow, gate.mask, gate.enabled);
    if let Some(us) = gate.settle_us {
        io.delay_us(us);
    }
    if desc.shadowed {
        return Ok(());
    }
    for delay in GATE_POLL_DELAYS_US {
        if io.read(group, desc.dyn_reg()) & gate.mask == gate.enabled {
            return Ok(());
        }
        io.delay_us(delay);
    }
    if io.read(group, desc.dyn_reg()) & gate.mask == gate.enabled {
        return Ok(());
    }
    warn!("{name}: gate did not read back as enabled");
    Err(ClockError::Unconfirmed(name))
}

pub fn disable<B: ClkRegIo>(
    desc: &MixDesc,
    group: RegisterGroup,
    io: &mut B,
    shadow: &mut ShadowReg,
) {
    let Some(gate) = &desc.gate else {
        return;
    };
    modify_image(desc, group, io, shadow, gate.mask, gate.disabled);
    if let Some(us) = gate.settle_us {
        io.delay_us(us);
    }
}

/// Current mux selection as a candidate index, or `None` for nodes without
/// a mux facet / with an untabulated raw selection.
pub fn parent_index<B: ClkRegIo>(
    desc: &MixDesc,
    group: RegisterGroup,
    io: &B,
    shadow: &ShadowReg,
) -> Option<usize> {
    let mux = desc.mux.as_ref()?;
    let raw = (read_image(desc, group, io, shadow) >> mux.shift) & mux.max_raw();
    mux.index_for_raw(raw)
}

/// Write the mux field for a candidate index and run the frequency-change
/// handshake where the layout supports it.
pub fn set_parent_by_index<B: ClkRegIo>(
    desc: &MixDesc,
    name: &'static str,
    group: RegisterGroup,
    io: &mut B,
    shadow: &mut ShadowReg,
    index: usize,
) -> Result<(), ClockError> {
    let Some(mux) = &desc.mux else {
        return Ok(());
    };
    let raw = mux
        .raw_for_index(index)
        .ok_or(ClockError::MuxSelectionInvalid(name))?;
    modify_image(desc, group, io, shadow, mux.mask(), raw << mux.shift);
    frequency_change(desc, name, group, io)
}

/// Frequency-change handshake: request the pending divider/mux change and
/// poll for the acknowledgement (hardware clears the request bit).
///
/// The poll escalates from a short to a much longer budget before giving
/// up. An expired wait leaves the hardware state unknown but is non-fatal;
/// subsequent operations re-read everything from the registers.
pub fn frequency_change<B: ClkRegIo>(
    desc: &MixDesc,
    name: &'static str,
    group: RegisterGroup,
    io: &mut B,
) -> Result<(), ClockError> {
    let Some(bit) = desc.fc_bit else {
        return Ok(());
    };
    let reg = desc.dyn_reg();
    let image = io.read(group, reg) | (1 << bit);
    io.write(group, reg, image);
    for _ in 0..FC_POLL_SHORT_ITERATIONS {
        if io.read(group, reg) & (1 << bit) == 0 {
            return Ok(());
        }
        io.delay_us(1);
    }
    debug!("{name}: frequency change not acked yet, escalating the poll budget");
    for _ in 0..FC_POLL_LONG_ITERATIONS {
        if io.read(group, reg) & (1 << bit) == 0 {
            return Ok(());
        }
        io.delay_us(1);
    }
    warn!("{name}: frequency change request was not acknowledged");
    Err(ClockError::Unconfirmed(name))
}

/// Raw divider field value currently latched, for nodes with a divider.
pub fn divider_raw<B: ClkRegIo>(
    desc: &MixDesc,
    group: RegisterGroup,
    io: &B,
    shadow: &ShadowReg,
) -> Option<u32> {
    let div = desc.div.as_ref()?;
    Some(div.extract(read_image(desc, group, io, shadow)))
}

/// Node rate for a known parent rate: divider-scaled when a divider facet
/// exists, otherwise factor-scaled, otherwise the parent rate unchanged.
pub fn get_rate<B: ClkRegIo>(
    desc: &MixDesc,
    name: &'static str,
    group: RegisterGroup,
    io: &B,
    shadow: &ShadowReg,
    parent_rate: Hertz,
) -> Result<Hertz, ClockError> {
    if let Some(div) = &desc.div {
        let raw = div.extract(read_image(desc, group, io, shadow));
        let divider = div
            .divider_for_raw(raw)
            .ok_or(ClockError::DividerInvalid(name))?;
        if divider == 0 {
            return Err(ClockError::DivisorZero(name));
        }
        return Ok(Hertz::from_raw(parent_rate.raw() / divider));
    }
    Ok(factor_scaled(desc, parent_rate))
}

fn factor_scaled(desc: &MixDesc, parent_rate: Hertz) -> Hertz {
    match &desc.factor {
        Some(factor) => {
            Hertz::from_raw((parent_rate.raw() as u64 * factor.mul as u64 / factor.div as u64) as u32)
        }
        None => parent_rate,
    }
}

/// Outcome of [best_rate]: the chosen rate and the (parent, divider) pair
/// producing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestRate {
    pub rate: Hertz,
    pub parent_index: usize,
    pub divider: u32,
    pub raw: u32,
}

/// Search the best achievable rate for `target`.
///
/// With a mux facet every candidate parent is considered, otherwise only
/// the current one. For each parent, every achievable divider value is
/// scored by `|parent / divider - target|`. Ties keep the first-found
/// combination (lower parent index, then lower divider), reproducing the
/// legacy search order; callers depend on this being deterministic.
pub fn best_rate(
    desc: &MixDesc,
    target: Hertz,
    parent_rates: &[Hertz],
    current_parent: usize,
) -> Result<BestRate, ClockError> {
    let parents: &[usize] = &[current_parent];
    let all: heapless::Vec<usize, { super::MAX_MUX_PARENTS }>;
    let parents = if desc.mux.is_some() {
        all = (0..parent_rates.len()).collect();
        &all
    } else {
        parents
    };

    let mut best: Option<BestRate> = None;
    let mut best_err = u32::MAX;
    for &pi in parents {
        let parent_rate = parent_rates[pi];
        let mut consider = |raw: u32, divider: u32, rate: Hertz| {
            let err = rate.raw().abs_diff(target.raw());
            if err < best_err {
                best_err = err;
                best = Some(BestRate {
                    rate,
                    parent_index: pi,
                    divider,
                    raw,
                });
            }
        };
        match &desc.div {
            Some(div) => div.for_each_divider(|raw, divider| {
                if divider != 0 {
                    consider(raw, divider, Hertz::from_raw(parent_rate.raw() / divider));
                }
            }),
            None => consider(0, 1, factor_scaled(desc, parent_rate)),
        }
    }
    best.ok_or(ClockError::NoTabulatedRate(target.raw()))
}

/// Write the divider field and run the frequency-change handshake.
///
/// A raw value exceeding the field width is rejected before any write.
pub fn write_divider<B: ClkRegIo>(
    desc: &MixDesc,
    name: &'static str,
    group: RegisterGroup,
    io: &mut B,
    shadow: &mut ShadowReg,
    raw: u32,
) -> Result<(), ClockError> {
    let Some(div) = &desc.div else {
        return Ok(());
    };
    if raw > div.max_raw() {
        return Err(ClockError::DividerOverflow {
            divider: raw,
            width: div.width,
        });
    }
    modify_image(desc, group, io, shadow, div.mask(), raw << div.shift);
    frequency_change(desc, name, group, io)
}
