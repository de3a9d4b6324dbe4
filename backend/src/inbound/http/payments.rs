//! Payment status API handler.
//!
//! ```text
//! GET /api/v1/payments/{payment_id}
//! ```
//!
//! Polling this endpoint reconciles the payment against its provider first,
//! so the purchase flow sees settlement as soon as the provider reports it
//! instead of waiting for the next background sweep.

use actix_web::{get, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Payment, PaymentId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Payment status view.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    /// Payment identifier.
    pub payment_id: Uuid,
    /// Lifecycle state label.
    pub status: String,
    /// Collecting scheme label.
    pub method: String,
    /// Amount in minor currency units.
    pub amount_minor: i64,
    /// ISO currency code.
    pub currency: String,
    /// Provider transaction identifier.
    pub transaction_id: String,
    /// Settlement instant, once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Voucher activated by this payment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voucher_id: Option<Uuid>,
}

impl From<Payment> for PaymentStatusResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: *payment.id.as_uuid(),
            status: payment.status.as_str().to_owned(),
            method: payment.method.as_str().to_owned(),
            amount_minor: payment.amount_minor,
            currency: payment.currency,
            transaction_id: payment.transaction_id,
            completed_at: payment.completed_at,
            voucher_id: payment.voucher.map(|id| *id.as_uuid()),
        }
    }
}

/// Fetch a payment's settlement state, reconciling it first.
#[utoipa::path(
    get,
    path = "/api/v1/payments/{payment_id}",
    params(("payment_id" = Uuid, Path, description = "Payment identifier")),
    responses(
        (status = 200, description = "Payment state", body = PaymentStatusResponse),
        (status = 404, description = "Unknown payment", body = crate::domain::DomainError),
        (status = 503, description = "Storage unavailable", body = crate::domain::DomainError),
        (status = 500, description = "Internal server error")
    ),
    tags = ["payments"],
    operation_id = "getPaymentStatus"
)]
#[get("/payments/{payment_id}")]
pub async fn payment_status(
    state: web::Data<HttpState>,
    path: web::Path<Uuid>,
) -> ApiResult<web::Json<PaymentStatusResponse>> {
    let id = PaymentId::from_uuid(path.into_inner());
    let payment = state.payments.poll(&id).await?;
    Ok(web::Json(payment.into()))
}
