//! HTTP inbound adapter exposing REST endpoints.

pub mod authorize;
pub mod error;
pub mod health;
pub mod payments;
pub mod state;
pub mod vouchers;

pub use error::ApiResult;
pub use state::HttpState;
