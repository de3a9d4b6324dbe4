//! Mobile-money provider adapters.
//!
//! Each adapter owns transport details only: request serialisation, timeout
//! and HTTP error mapping, and JSON decoding into the provider port's status
//! vocabulary. Settlement policy lives in the domain reconciliation worker.

mod airtel;
mod dto;
mod mtn;
mod transport;

pub use airtel::{AirtelMoneyCredentials, AirtelMoneyProvider};
pub use mtn::{MtnMomoCredentials, MtnMomoProvider};
