//! Fractional M/N ("DDN") divider nodes.
//!
//! A DDN synthesizes its output as `parent * den / (num * factor)` from a
//! numerator/denominator register pair and a fixed integer factor. The
//! achievable settings are tabulated; rate selection is a linear scan in
//! table order. All arithmetic is integral, scaled by 10⁴ to keep sub-Hz
//! precision without floating point.
use pxa1908::RegisterGroup;

use super::{ClockError, regs::ClkRegIo};
use crate::time::Hertz;

/// Scale applied around the division to preserve fractional precision.
const RATE_SCALE: u64 = 10_000;

/// One tabulated numerator/denominator setting.
pub struct DdnRateRow {
    pub num: u32,
    pub den: u32,
}

/// Gate bit living in a register separate from the divider control.
pub struct GateBit {
    pub offset: u32,
    pub bit: u8,
}

/// Static descriptor of one DDN node.
pub struct DdnDesc {
    /// Offset of the numerator/denominator control register.
    pub ctrl: u32,
    pub num_shift: u8,
    pub num_width: u8,
    pub den_shift: u8,
    pub den_width: u8,
    /// Fixed factor applied on top of the numerator.
    pub factor: u32,
    pub gate: Option<GateBit>,
    pub parent: &'static str,
    pub table: &'static [DdnRateRow],
}

impl DdnDesc {
    #[inline]
    const fn num_mask(&self) -> u32 {
        ((1 << self.num_width) - 1) << self.num_shift
    }

    #[inline]
    const fn den_mask(&self) -> u32 {
        ((1 << self.den_width) - 1) << self.den_shift
    }

    /// Output rate for a numerator/denominator pair.
    pub fn rate_for(&self, parent_rate: Hertz, num: u32, den: u32) -> Hertz {
        let scaled = parent_rate.raw() as u64 / RATE_SCALE * den as u64
            / (num as u64 * self.factor as u64)
            * RATE_SCALE;
        Hertz::from_raw(scaled as u32)
    }
}

pub fn is_enabled<B: ClkRegIo>(desc: &DdnDesc, group: RegisterGroup, io: &B) -> bool {
    match &desc.gate {
        Some(gate) => io.read(group, gate.offset) & (1 << gate.bit) != 0,
        None => true,
    }
}

/// Plain gate-bit toggle; no handshake and no settle delay.
pub fn enable<B: ClkRegIo>(desc: &DdnDesc, group: RegisterGroup, io: &mut B) {
    if let Some(gate) = &desc.gate {
        let image = io.read(group, gate.offset) | (1 << gate.bit);
        io.write(group, gate.offset, image);
    }
}

pub fn disable<B: ClkRegIo>(desc: &DdnDesc, group: RegisterGroup, io: &mut B) {
    if let Some(gate) = &desc.gate {
        let image = io.read(group, gate.offset) & !(1 << gate.bit);
        io.write(group, gate.offset, image);
    }
}

/// Rate derived from the currently latched numerator/denominator fields.
pub fn get_rate<B: ClkRegIo>(
    desc: &DdnDesc,
    name: &'static str,
    group: RegisterGroup,
    io: &B,
    parent_rate: Hertz,
) -> Result<Hertz, ClockError> {
    let image = io.read(group, desc.ctrl);
    let num = (image & desc.num_mask()) >> desc.num_shift;
    let den = (image & desc.den_mask()) >> desc.den_shift;
    if num == 0 {
        return Err(ClockError::DivisorZero(name));
    }
    Ok(desc.rate_for(parent_rate, num, den))
}

/// Nearest tabulated rate: scan in table order, stop at the first row whose
/// rate exceeds `target` and pick whichever of that row and its predecessor
/// is closer. Ties favor the earlier (lower-frequency) row.
pub fn round_rate(
    desc: &DdnDesc,
    parent_rate: Hertz,
    target: Hertz,
) -> Result<Hertz, ClockError> {
    let mut previous: Option<Hertz> = None;
    for row in desc.table {
        let rate = desc.rate_for(parent_rate, row.num, row.den);
        if rate > target {
            return Ok(match previous {
                None => rate,
                Some(prev) => {
                    if target.raw() - prev.raw() <= rate.raw() - target.raw() {
                        prev
                    } else {
                        rate
                    }
                }
            });
        }
        previous = Some(rate);
    }
    previous.ok_or(ClockError::NoTabulatedRate(target.raw()))
}

/// Commit the table row for `target`: the row before the first one whose
/// rate exceeds it (unless at the table start). Only the numerator and
/// denominator bit-fields are touched; the gate bit is left alone.
pub fn set_rate<B: ClkRegIo>(
    desc: &DdnDesc,
    group: RegisterGroup,
    io: &mut B,
    parent_rate: Hertz,
    target: Hertz,
) -> Result<Hertz, ClockError> {
    if desc.table.is_empty() {
        return Err(ClockError::NoTabulatedRate(target.raw()));
    }
    let mut chosen = desc.table.len() - 1;
    for (i, row) in desc.table.iter().enumerate() {
        if desc.rate_for(parent_rate, row.num, row.den) > target {
            chosen = i.saturating_sub(1);
            break;
        }
    }
    let row = &desc.table[chosen];
    debug_assert!(row.num <= desc.num_mask() >> desc.num_shift);
    debug_assert!(row.den <= desc.den_mask() >> desc.den_shift);
    let mask = desc.num_mask() | desc.den_mask();
    let bits = (row.num << desc.num_shift) | (row.den << desc.den_shift);
    let image = (io.read(group, desc.ctrl) & !mask) | bits;
    io.write(group, desc.ctrl, image);
    Ok(desc.rate_for(parent_rate, row.num, row.den))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clocks::test_support::FakeRegIo;
    use pxa1908::mpmu;

    const GROUP: RegisterGroup = RegisterGroup::Mpmu;

    const UART_PLL: DdnDesc = DdnDesc {
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

    const PARENT: Hertz = Hertz::from_raw(624_000_000);

    fn row_rate(i: usize) -> Hertz {
        UART_PLL.rate_for(PARENT, UART_PLL.table[i].num, UART_PLL.table[i].den)
    }

    #[test]
    fn rate_math_is_scaled_integer() {
        // 624 MHz / 10000 * 1536 / (8125 * 2) * 10000 = 58_980_000 Hz.
        assert_eq!(row_rate(0), Hertz::from_raw(58_980_000));
    }

    #[test]
    fn get_rate_reads_fields() {
        let mut io = FakeRegIo::new();
        io.poke(GROUP, mpmu::UART_PLL_CR, (8125 << 16) | 1536);
        assert_eq!(
            get_rate(&UART_PLL, "uart_pll", GROUP, &io, PARENT),
            Ok(Hertz::from_raw(58_980_000))
        );
        io.poke(GROUP, mpmu::UART_PLL_CR, 1536);
        assert_eq!(
            get_rate(&UART_PLL, "uart_pll", GROUP, &io, PARENT),
            Err(ClockError::DivisorZero("uart_pll"))
        );
    }

    #[test]
    fn round_rate_picks_the_closer_neighbor() {
        let r0 = row_rate(0);
        let r1 = row_rate(1);
        // Just above row 0: row 0 is closer.
        let target = Hertz::from_raw(r0.raw() + 1_000);
        assert_eq!(round_rate(&UART_PLL, PARENT, target), Ok(r0));
        // Just below row 1: row 1 is closer.
        let target = Hertz::from_raw(r1.raw() - 1_000);
        assert_eq!(round_rate(&UART_PLL, PARENT, target), Ok(r1));
        // Below the whole table the first row is returned.
        assert_eq!(
            round_rate(&UART_PLL, PARENT, Hertz::from_raw(1_000_000)),
            Ok(r0)
        );
        // Above the whole table the last row is returned.
        assert_eq!(
            round_rate(&UART_PLL, PARENT, Hertz::from_raw(200_000_000)),
            Ok(row_rate(2))
        );
    }

    #[test]
    fn round_rate_tie_favors_earlier_row() {
        let r0 = row_rate(0);
        let r1 = row_rate(1);
        let gap = r1.raw() - r0.raw();
        if gap % 2 == 0 {
            let midpoint = Hertz::from_raw(r0.raw() + gap / 2);
            assert_eq!(round_rate(&UART_PLL, PARENT, midpoint), Ok(r0));
        }
    }

    #[test]
    fn set_rate_steps_back_one_row() {
        let mut io = FakeRegIo::new();
        // An unrelated control bit is set beforehand; the RMW is restricted
        // to the numerator/denominator fields and must preserve it.
        io.poke(GROUP, mpmu::UART_PLL_CR, 0x8000_0000);
        let target = Hertz::from_raw(row_rate(1).raw() + 1_000);
        assert_eq!(
            set_rate(&UART_PLL, GROUP, &mut io, PARENT, target),
            Ok(row_rate(1))
        );
        let image = io.reg(GROUP, mpmu::UART_PLL_CR);
        assert_eq!((image >> 16) & 0x1FFF, 3521);
        assert_eq!(image & 0x1FFF, 689);
        assert_eq!(image & 0x8000_0000, 0x8000_0000);
    }

    #[test]
    fn set_rate_at_table_start_does_not_step_back() {
        let mut io = FakeRegIo::new();
        assert_eq!(
            set_rate(
                &UART_PLL,
                GROUP,
                &mut io,
                PARENT,
                Hertz::from_raw(1_000_000)
            ),
            Ok(row_rate(0))
        );
    }

    #[test]
    fn gate_toggle() {
        let mut io = FakeRegIo::new();
        assert!(!is_enabled(&UART_PLL, GROUP, &io));
        enable(&UART_PLL, GROUP, &mut io);
        assert!(is_enabled(&UART_PLL, GROUP, &io));
        assert_eq!(io.reg(GROUP, mpmu::UART_PLL_GATE), 1 << 1);
        disable(&UART_PLL, GROUP, &mut io);
        assert!(!is_enabled(&UART_PLL, GROUP, &io));
    }
}
