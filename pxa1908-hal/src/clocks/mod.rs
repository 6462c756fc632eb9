//! # Clock tree management
//!
//! The clock distribution network is modeled as a registry of statically
//! declared nodes addressed by a dense numeric id. A node is one of a small
//! closed set of kinds: a fixed-rate source, a programmable [PLL](pll), a
//! composite gate/divider/mux ["mix" clock](mix) or a fractional
//! [M/N divider](ddn). Nodes link to their parents by name; the registry
//! resolves the names to arena indices once at init and walks the tree
//! whenever a rate is computed, so no derived state is ever cached across
//! calls.
//!
//! The subsystem is strictly single-threaded and run-to-completion: every
//! hardware wait is a bounded busy-poll, and an expired wait degrades to a
//! reported [ClockError::Unconfirmed] instead of a hang.
use log::debug;
use pxa1908::RegisterGroup;

use crate::time::Hertz;

pub mod ddn;
pub mod mix;
pub mod pll;
pub mod regs;
pub mod remap;
pub mod tables;

#[cfg(test)]
pub(crate) mod test_support;

use mix::ParentDecl;
use regs::ClkRegIo;

/// Capacity of the registry's id space.
pub const MAX_CLOCKS: usize = 200;
/// Maximum number of mux candidate parents per node.
pub const MAX_MUX_PARENTS: usize = 8;

/// Dense numeric clock id, the handle used by the consumer API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockId(pub u16);

/// Errors reported by the clock subsystem.
///
/// None of these leave the subsystem unusable: registers already written
/// stay written and unrelated clocks keep working, since node state is
/// re-read from hardware on every call.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    #[error("invalid clock id {0}")]
    InvalidClock(u16),
    #[error("unknown parent clock {0}")]
    UnknownParent(&'static str),
    #[error("clock {0} declares more mux parents than supported")]
    TooManyParents(&'static str),
    #[error("register group {0:?} has no mapped base address")]
    UnmappedGroup(RegisterGroup),
    /// Registers were written but the hardware did not acknowledge within
    /// the bounded wait. The operation was attempted, not confirmed.
    #[error("clock {0}: hardware did not confirm the operation")]
    Unconfirmed(&'static str),
    #[error("requested rate {requested} Hz outside the valid range {min}..={max} Hz")]
    RateOutOfRange { requested: u32, min: u32, max: u32 },
    #[error("no tabulated rate for {0} Hz")]
    NoTabulatedRate(u32),
    #[error("divider {divider} does not fit a {width} bit field")]
    DividerOverflow { divider: u32, width: u8 },
    #[error("clock {0}: mux selection does not match any candidate parent")]
    MuxSelectionInvalid(&'static str),
    #[error("clock {0}: divider field holds an untabulated value")]
    DividerInvalid(&'static str),
    #[error("clock {0}: divisor read back as zero")]
    DivisorZero(&'static str),
}

/// Build variant selecting which subset of the declared nodes exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Full bootloader node set.
    Full,
    /// Reduced pre-bootstrap node set, see [remap].
    Reduced,
}

/// Which build variants a declaration participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Both,
    FullOnly,
    ReducedOnly,
}

impl Availability {
    pub const fn includes(self, variant: Variant) -> bool {
        match (self, variant) {
            (Availability::Both, _) => true,
            (Availability::FullOnly, Variant::Full) => true,
            (Availability::ReducedOnly, Variant::Reduced) => true,
            _ => false,
        }
    }
}

/// Kind-specific descriptor of a clock node.
pub enum ClockKind {
    /// Terminal fixed-rate source (crystal, fused PLL output).
    Fixed { rate: Hertz },
    Pll(&'static pll::PllDesc),
    Mix(&'static mix::MixDesc),
    Ddn(&'static ddn::DdnDesc),
}

/// One statically declared clock node.
pub struct ClockDecl {
    pub id: ClockId,
    pub name: &'static str,
    pub group: RegisterGroup,
    pub avail: Availability,
    pub kind: ClockKind,
}

impl ClockDecl {
    fn parent_decl(&self) -> ParentDecl {
        match &self.kind {
            ClockKind::Fixed { .. } | ClockKind::Pll(_) => ParentDecl::None,
            ClockKind::Mix(desc) => desc.parents,
            ClockKind::Ddn(desc) => ParentDecl::Named(desc.parent),
        }
    }
}

/// Software image of the one select register that does not read back
/// reliably. Nodes flagged `shadowed` mutate this image and write it out
/// instead of performing read-modify-write against hardware.
#[derive(Debug, Default)]
pub struct ShadowReg {
    value: u32,
}

impl ShadowReg {
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    #[inline]
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Update the image under `mask` and return the new value to write.
    #[inline]
    pub fn apply(&mut self, mask: u32, bits: u32) -> u32 {
        self.value = (self.value & !mask) | bits;
        self.value
    }
}

/// A bound node: the static declaration plus the parent linkage resolved to
/// arena indices. All mutable clock state lives in hardware registers (or
/// the [ShadowReg]); this struct is immutable after init.
struct Node {
    decl: &'static ClockDecl,
    parent: Option<u16>,
    candidates: heapless::Vec<u16, MAX_MUX_PARENTS>,
}

/// Fixed-capacity registry mapping clock ids to bound nodes.
pub struct ClockRegistry<B: ClkRegIo> {
    io: B,
    nodes: [Option<Node>; MAX_CLOCKS],
    shadow: ShadowReg,
}

impl<B: ClkRegIo> ClockRegistry<B> {
    /// Bind the declared nodes to the register backend and apply the
    /// injected startup rates.
    ///
    /// Declarations must be ordered sources-first (ascending id); parent
    /// names are resolved against the nodes already bound, so a forward
    /// reference is an [ClockError::UnknownParent] error. Declarations not
    /// part of `variant` are skipped. For mux nodes without a declared
    /// initial parent the current selection is whatever the boot ROM left
    /// in the mux field; it is read back from hardware on demand rather
    /// than latched here.
    pub fn init(
        io: B,
        decls: &'static [ClockDecl],
        variant: Variant,
        startup_rates: &[(ClockId, Hertz)],
    ) -> Result<Self, ClockError> {
        let mut registry = Self {
            io,
            nodes: [const { None }; MAX_CLOCKS],
            shadow: ShadowReg::new(),
        };
        for decl in decls {
            if !decl.avail.includes(variant) {
                continue;
            }
            if !registry.io.is_mapped(decl.group) {
                return Err(ClockError::UnmappedGroup(decl.group));
            }
            let index = decl.id.0 as usize;
            if index >= MAX_CLOCKS {
                return Err(ClockError::InvalidClock(decl.id.0));
            }
            let mut node = Node {
                decl,
                parent: None,
                candidates: heapless::Vec::new(),
            };
            match decl.parent_decl() {
                ParentDecl::None => {}
                ParentDecl::Named(name) => {
                    node.parent = Some(registry.resolve_name(name)?);
                }
                ParentDecl::Candidates(names) => {
                    for name in names {
                        let resolved = registry.resolve_name(name)?;
                        node.candidates
                            .push(resolved)
                            .map_err(|_| ClockError::TooManyParents(decl.name))?;
                    }
                }
            }
            registry.nodes[index] = Some(node);
            debug!("bound clock {} (id {})", decl.name, decl.id.0);
        }
        for (id, rate) in startup_rates {
            registry.set_rate(*id, *rate)?;
        }
        Ok(registry)
    }

    /// The underlying register backend.
    pub fn io(&self) -> &B {
        &self.io
    }

    fn resolve_name(&self, name: &'static str) -> Result<u16, ClockError> {
        // Init-time only; the hot path works on resolved indices.
        for (index, slot) in self.nodes.iter().enumerate() {
            if let Some(node) = slot {
                if node.decl.name == name {
                    return Ok(index as u16);
                }
            }
        }
        Err(ClockError::UnknownParent(name))
    }

    fn node(&self, id: ClockId) -> Result<&Node, ClockError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(ClockError::InvalidClock(id.0))
    }

    /// Arena index of a mix node's current parent, re-read from hardware
    /// for muxed nodes.
    fn mix_parent(&self, node: &Node, desc: &mix::MixDesc) -> Result<(usize, u16), ClockError> {
        if desc.mux.is_some() {
            let pos = mix::parent_index(desc, node.decl.group, &self.io, &self.shadow)
                .ok_or(ClockError::MuxSelectionInvalid(node.decl.name))?;
            let index = *node
                .candidates
                .get(pos)
                .ok_or(ClockError::MuxSelectionInvalid(node.decl.name))?;
            Ok((pos, index))
        } else {
            let index = node
                .parent
                .ok_or(ClockError::UnknownParent(node.decl.name))?;
            Ok((0, index))
        }
    }

    /// Rate of the node at an arena index, derived by walking to a terminal
    /// source and folding the divider/factor ratios.
    fn rate_of(&self, index: u16) -> Result<Hertz, ClockError> {
        let node = self.node(ClockId(index))?;
        match &node.decl.kind {
            ClockKind::Fixed { rate } => Ok(*rate),
            ClockKind::Pll(desc) => Ok(pll::get_rate(desc, node.decl.group, &self.io)),
            ClockKind::Ddn(desc) => {
                let parent = node
                    .parent
                    .ok_or(ClockError::UnknownParent(node.decl.name))?;
                let parent_rate = self.rate_of(parent)?;
                ddn::get_rate(desc, node.decl.name, node.decl.group, &self.io, parent_rate)
            }
            ClockKind::Mix(desc) => {
                let (_, parent) = self.mix_parent(node, desc)?;
                let parent_rate = self.rate_of(parent)?;
                mix::get_rate(
                    desc,
                    node.decl.name,
                    node.decl.group,
                    &self.io,
                    &self.shadow,
                    parent_rate,
                )
            }
        }
    }

    /// Rates of all mux candidates, in candidate order.
    fn candidate_rates(
        &self,
        node: &Node,
    ) -> Result<heapless::Vec<Hertz, MAX_MUX_PARENTS>, ClockError> {
        let mut rates = heapless::Vec::new();
        for &candidate in &node.candidates {
            // Capacity matches the candidate list by construction.
            let _ = rates.push(self.rate_of(candidate)?);
        }
        Ok(rates)
    }

    /// Turn the clock on. Idempotent for every node kind; kinds without a
    /// gate treat this as a documented no-op.
    pub fn enable(&mut self, id: ClockId) -> Result<(), ClockError> {
        let node = self.node(id)?;
        let (decl, group, name) = (node.decl, node.decl.group, node.decl.name);
        match &decl.kind {
            ClockKind::Fixed { .. } => Ok(()),
            ClockKind::Pll(desc) => pll::enable(desc, name, group, &mut self.io),
            ClockKind::Mix(desc) => {
                mix::enable(desc, name, group, &mut self.io, &mut self.shadow)
            }
            ClockKind::Ddn(desc) => {
                ddn::enable(desc, group, &mut self.io);
                Ok(())
            }
        }
    }

    /// Turn the clock off. The node's rate stays computable; only the
    /// physical output stops.
    pub fn disable(&mut self, id: ClockId) -> Result<(), ClockError> {
        let node = self.node(id)?;
        let (decl, group) = (node.decl, node.decl.group);
        match &decl.kind {
            ClockKind::Fixed { .. } => {}
            ClockKind::Pll(desc) => pll::disable(desc, group, &mut self.io),
            ClockKind::Mix(desc) => mix::disable(desc, group, &mut self.io, &mut self.shadow),
            ClockKind::Ddn(desc) => ddn::disable(desc, group, &mut self.io),
        }
        Ok(())
    }

    pub fn is_enabled(&self, id: ClockId) -> Result<bool, ClockError> {
        let node = self.node(id)?;
        Ok(match &node.decl.kind {
            ClockKind::Fixed { .. } => true,
            ClockKind::Pll(desc) => pll::is_enabled(desc, node.decl.group, &self.io),
            ClockKind::Mix(desc) => {
                mix::is_enabled(desc, node.decl.group, &self.io, &self.shadow)
            }
            ClockKind::Ddn(desc) => ddn::is_enabled(desc, node.decl.group, &self.io),
        })
    }

    /// Current rate, derived from hardware state on every call.
    pub fn get_rate(&self, id: ClockId) -> Result<Hertz, ClockError> {
        self.rate_of(id.0)
    }

    /// Closest achievable rate for `target` without touching hardware.
    pub fn round_rate(&self, id: ClockId, target: Hertz) -> Result<Hertz, ClockError> {
        let node = self.node(id)?;
        match &node.decl.kind {
            ClockKind::Fixed { rate } => Ok(*rate),
            ClockKind::Pll(desc) => pll::round_rate(desc, target),
            ClockKind::Ddn(desc) => {
                let parent = node
                    .parent
                    .ok_or(ClockError::UnknownParent(node.decl.name))?;
                ddn::round_rate(desc, self.rate_of(parent)?, target)
            }
            ClockKind::Mix(desc) => {
                if desc.div.is_none() && desc.mux.is_none() {
                    // No rate control on this node.
                    return self.rate_of(id.0);
                }
                let (current, rates) = self.mix_search_inputs(node, desc)?;
                Ok(mix::best_rate(desc, target, &rates, current)?.rate)
            }
        }
    }

    /// Change the clock's rate, returning the rate actually achieved.
    /// Nodes without rate control report their current rate (legacy
    /// tolerance for callers that don't know a node's capabilities).
    pub fn set_rate(&mut self, id: ClockId, target: Hertz) -> Result<Hertz, ClockError> {
        let node = self.node(id)?;
        let (decl, group, name) = (node.decl, node.decl.group, node.decl.name);
        match &decl.kind {
            ClockKind::Fixed { rate } => Ok(*rate),
            ClockKind::Pll(desc) => pll::set_rate(desc, name, group, &mut self.io, target),
            ClockKind::Ddn(desc) => {
                let parent = node.parent.ok_or(ClockError::UnknownParent(name))?;
                let parent_rate = self.rate_of(parent)?;
                ddn::set_rate(desc, group, &mut self.io, parent_rate, target)
            }
            ClockKind::Mix(desc) => {
                if desc.div.is_none() && desc.mux.is_none() {
                    return self.rate_of(id.0);
                }
                let (current, rates) = self.mix_search_inputs(node, desc)?;
                let best = mix::best_rate(desc, target, &rates, current)?;
                if desc.mux.is_some() && best.parent_index != current {
                    mix::set_parent_by_index(
                        desc,
                        name,
                        group,
                        &mut self.io,
                        &mut self.shadow,
                        best.parent_index,
                    )?;
                }
                if desc.div.is_some() {
                    let latched = mix::divider_raw(desc, group, &self.io, &self.shadow);
                    if latched != Some(best.raw) {
                        mix::write_divider(
                            desc,
                            name,
                            group,
                            &mut self.io,
                            &mut self.shadow,
                            best.raw,
                        )?;
                    }
                }
                Ok(best.rate)
            }
        }
    }

    /// Select a mix node's parent among its declared candidates. Nodes
    /// without a mux facet treat this as a documented no-op.
    pub fn set_parent(&mut self, id: ClockId, parent: ClockId) -> Result<(), ClockError> {
        let node = self.node(id)?;
        let (decl, group, name) = (node.decl, node.decl.group, node.decl.name);
        let ClockKind::Mix(desc) = &decl.kind else {
            return Ok(());
        };
        if desc.mux.is_none() {
            return Ok(());
        }
        let parent_node = self.node(parent)?;
        let position = node
            .candidates
            .iter()
            .position(|&c| c == parent.0)
            .ok_or(ClockError::UnknownParent(parent_node.decl.name))?;
        mix::set_parent_by_index(desc, name, group, &mut self.io, &mut self.shadow, position)
    }

    /// Resolved parent id of a node, if it has one; muxed nodes report the
    /// selection currently latched in hardware.
    pub fn parent_of(&self, id: ClockId) -> Result<Option<ClockId>, ClockError> {
        let node = self.node(id)?;
        match &node.decl.kind {
            ClockKind::Mix(desc) if desc.mux.is_some() => {
                let (_, index) = self.mix_parent(node, desc)?;
                Ok(Some(ClockId(index)))
            }
            _ => Ok(node.parent.map(ClockId)),
        }
    }

    fn mix_search_inputs(
        &self,
        node: &Node,
        desc: &mix::MixDesc,
    ) -> Result<(usize, heapless::Vec<Hertz, MAX_MUX_PARENTS>), ClockError> {
        if desc.mux.is_some() {
            let (position, _) = self.mix_parent(node, desc)?;
            Ok((position, self.candidate_rates(node)?))
        } else {
            let parent = node
                .parent
                .ok_or(ClockError::UnknownParent(node.decl.name))?;
            let mut rates = heapless::Vec::new();
            let _ = rates.push(self.rate_of(parent)?);
            Ok((0, rates))
        }
    }
}
