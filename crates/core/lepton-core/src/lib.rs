//! Foundation library for the Lepton kernel: logging, typed addresses,
//! bounded names and the synchronization primitives every other kernel
//! crate builds on.
//!
//! Everything here is machine-independent. The two machine-dependent
//! seams — interrupt control and thread parking — are expressed as a
//! registration hook ([`sync::interrupt`]) and a trait
//! ([`sync::ThreadPark`]) so that both a bare-metal port and the hosted
//! reference machine can supply their own primitives.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod addr;
pub mod log;
pub mod name;
pub mod sync;
