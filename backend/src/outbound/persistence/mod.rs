//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the domain repository ports backed by
//! PostgreSQL via Diesel with async support through `diesel-async` and
//! `bb8` connection pooling.
//!
//! Principles:
//!
//! - **Thin adapters**: repositories only translate between Diesel rows and
//!   domain types. No business logic resides here, with one deliberate
//!   exception: the conditional-write discipline the voucher and payment
//!   lifecycles require is expressed in SQL in this layer.
//! - **Internal models**: Diesel row structs (`models.rs`) and schema
//!   definitions (`schema.rs`) are implementation details, never exposed to
//!   the domain layer.
//! - **Strongly typed errors**: database failures map to the port's
//!   `RepositoryError` variants.

mod diesel_error_mapping;
mod diesel_payment_repository;
mod diesel_principal_repository;
mod diesel_session_ledger;
mod diesel_subscription_repository;
mod diesel_voucher_repository;
mod models;
mod pool;
mod schema;

pub use diesel_payment_repository::DieselPaymentRepository;
pub use diesel_principal_repository::DieselPrincipalRepository;
pub use diesel_session_ledger::DieselSessionLedger;
pub use diesel_subscription_repository::DieselSubscriptionRepository;
pub use diesel_voucher_repository::DieselVoucherRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
