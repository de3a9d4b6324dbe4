//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. They are
//! used by Diesel for compile-time query validation and type-safe SQL
//! generation. When migrations change the schema, regenerate or update this
//! file to match (`diesel print-schema`).

diesel::table! {
    /// Principal identities, registered users and voucher-derived logins.
    principals (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Normalised login identifier, unique.
        login -> Varchar,
        /// Whether the account may be granted access.
        active -> Bool,
        /// Hex SHA-256 digest; null for voucher-derived principals.
        password_digest -> Nullable<Varchar>,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Prepaid vouchers with their lifecycle state.
    vouchers (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Normalised redemption code, unique.
        code -> Varchar,
        /// Issuing principal.
        issuer_id -> Uuid,
        /// Sale price in minor currency units.
        price_minor -> Int8,
        /// Session duration limit in hours.
        time_limit_hours -> Nullable<Int4>,
        /// Throughput limit in Mbps.
        speed_limit_mbps -> Nullable<Int4>,
        /// Data cap in GiB.
        data_limit_gib -> Nullable<Int4>,
        /// Earliest redeemable instant.
        valid_from -> Nullable<Timestamptz>,
        /// Latest redeemable instant.
        valid_until -> Nullable<Timestamptz>,
        /// Lifecycle state label.
        status -> Varchar,
        /// Consuming principal; set iff status is USED.
        used_by -> Nullable<Uuid>,
        /// Instant of consumption.
        used_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Recurring subscriptions.
    subscriptions (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Owning principal.
        principal_id -> Uuid,
        /// Lifecycle state label.
        status -> Varchar,
        /// Session duration limit in hours.
        time_limit_hours -> Nullable<Int4>,
        /// Throughput limit in Mbps.
        speed_limit_mbps -> Nullable<Int4>,
        /// Data cap in GiB.
        data_limit_gib -> Nullable<Int4>,
        /// Start of the billing period.
        start_date -> Timestamptz,
        /// End of the billing period, if bounded.
        end_date -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Mobile-money settlement records.
    payments (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Owning principal.
        principal_id -> Uuid,
        /// Voucher activated by this payment, if any.
        voucher_id -> Nullable<Uuid>,
        /// Amount in minor currency units.
        amount_minor -> Int8,
        /// ISO currency code.
        currency -> Varchar,
        /// Collecting scheme label.
        method -> Varchar,
        /// Lifecycle state label.
        status -> Varchar,
        /// Provider transaction identifier, stored verbatim.
        transaction_id -> Varchar,
        /// Settlement instant, once completed.
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Issued access sessions, unique per principal + device.
    access_sessions (token) {
        /// Primary key: opaque bearer token (UUID v4).
        token -> Uuid,
        /// Principal the grant was issued to.
        principal_id -> Uuid,
        /// Normalised device identifier.
        device_id -> Varchar,
        /// Instant the grant lapses.
        expires_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    principals,
    vouchers,
    subscriptions,
    payments,
    access_sessions,
);
