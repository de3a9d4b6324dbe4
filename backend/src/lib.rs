//! Network access authorization engine for a captive portal.
//!
//! The crate follows a hexagonal layout: `domain` holds the entities, ports,
//! and use-case services; `inbound` exposes the HTTP surface the NAS and the
//! portal call; `outbound` implements the driven ports against PostgreSQL,
//! the mobile-money providers, and in-memory fallbacks; `server` wires the
//! pieces into a running process.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;

/// Public OpenAPI surface used by tooling.
pub use doc::ApiDoc;
pub use middleware::Trace;
