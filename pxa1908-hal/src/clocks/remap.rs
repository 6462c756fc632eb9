//! Reduced early-boot id space adapter.
//!
//! The pre-bootstrap build variant addresses its (smaller) node set through
//! a secondary, denser id space. This adapter translates between the two
//! spaces through a fixed pair table; the registry core itself only ever
//! sees full ids and stays agnostic of the active variant.
use super::ClockId;

/// Clock id in the reduced early-boot space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducedId(pub u16);

/// Fixed translation table between the full and reduced id spaces.
pub struct IdRemap {
    pairs: &'static [(ClockId, ReducedId)],
}

impl IdRemap {
    pub const fn new(pairs: &'static [(ClockId, ReducedId)]) -> Self {
        Self { pairs }
    }

    /// Full id for a reduced id, if the node exists in the reduced set.
    pub fn to_full(&self, id: ReducedId) -> Option<ClockId> {
        self.pairs
            .iter()
            .find(|(_, reduced)| *reduced == id)
            .map(|(full, _)| *full)
    }

    /// Reduced id for a full id, if the node exists in the reduced set.
    pub fn to_reduced(&self, id: ClockId) -> Option<ReducedId> {
        self.pairs
            .iter()
            .find(|(full, _)| *full == id)
            .map(|(_, reduced)| *reduced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: IdRemap = IdRemap::new(&[
        (ClockId(0), ReducedId(0)),
        (ClockId(11), ReducedId(3)),
        (ClockId(15), ReducedId(4)),
    ]);

    #[test]
    fn translates_both_ways() {
        assert_eq!(MAP.to_full(ReducedId(3)), Some(ClockId(11)));
        assert_eq!(MAP.to_reduced(ClockId(15)), Some(ReducedId(4)));
    }

    #[test]
    fn unknown_ids_do_not_translate() {
        assert_eq!(MAP.to_full(ReducedId(9)), None);
        assert_eq!(MAP.to_reduced(ClockId(12)), None);
    }
}
