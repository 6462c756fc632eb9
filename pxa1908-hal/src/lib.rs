//! # Clock tree management for PXA1908-class SoCs
//!
//! This crate models the clock distribution network of the SoC as a registry
//! of composite clock nodes: programmable PLLs, gated/divided/muxed "mix"
//! clocks and fractional M/N ("DDN") dividers. Nodes are declared statically,
//! bound to their register blocks once at init and addressed by a dense
//! numeric id afterwards, mirroring the clock-consumer API of the boot
//! firmware this crate serves.
//!
//! The register layer builds on the [peripheral definitions](pxa1908) of the
//! companion PAC crate. All hardware waits are bounded busy-polls; the
//! subsystem is strictly single-threaded and intended to run early in boot
//! with interrupts disabled.
#![no_std]

pub mod clocks;
pub mod time;
