//! Outbound adapters implementing the domain's driven ports.

pub mod memory;
pub mod persistence;
pub mod providers;
pub mod rate_limit;
