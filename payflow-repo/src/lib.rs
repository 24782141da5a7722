//! # Payflow Repository
//!
//! Concrete repository implementations (adapters) for the payment
//! orchestration core. This crate provides adapters that implement the
//! `LedgerRepository` port.

mod memory;

pub use memory::MemoryRepo;
