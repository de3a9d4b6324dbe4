//! Voucher redemption API handler.
//!
//! ```text
//! POST /api/v1/vouchers/redeem {"code":"CODE-000042"}
//! ```
//!
//! Consumed by the portal's purchase flow. Unlike the NAS boundary this
//! surface reports precise conflict errors; it is authenticated portal
//! traffic, not an enumeration vector.

use actix_web::{post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{PrincipalId, RedemptionReceipt, RedemptionRequest};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Redemption request body.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    /// Redemption code, case-insensitive.
    pub code: String,
    /// Redeeming principal. Absent for walk-up redemptions, where one is
    /// synthesised from the code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<Uuid>,
}

/// Redemption result.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    /// Voucher identifier.
    pub voucher_id: Uuid,
    /// Normalised redemption code.
    pub code: String,
    /// Voucher status after the operation.
    pub status: String,
    /// Principal the voucher is bound to.
    pub principal_id: Uuid,
    /// Instant of consumption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

impl From<RedemptionReceipt> for RedeemResponse {
    fn from(receipt: RedemptionReceipt) -> Self {
        Self {
            voucher_id: *receipt.voucher.id.as_uuid(),
            code: receipt.voucher.code.as_str().to_owned(),
            status: receipt.voucher.status.as_str().to_owned(),
            principal_id: *receipt.principal.as_uuid(),
            used_at: receipt.voucher.used_at,
        }
    }
}

/// Redeem a voucher for a principal.
#[utoipa::path(
    post,
    path = "/api/v1/vouchers/redeem",
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "Voucher redeemed", body = RedeemResponse),
        (status = 400, description = "Malformed code", body = crate::domain::DomainError),
        (status = 404, description = "Unknown voucher", body = crate::domain::DomainError),
        (status = 409, description = "Voucher not redeemable", body = crate::domain::DomainError),
        (status = 503, description = "Storage unavailable", body = crate::domain::DomainError),
        (status = 500, description = "Internal server error")
    ),
    tags = ["vouchers"],
    operation_id = "redeemVoucher"
)]
#[post("/vouchers/redeem")]
pub async fn redeem(
    state: web::Data<HttpState>,
    payload: web::Json<RedeemRequest>,
) -> ApiResult<web::Json<RedeemResponse>> {
    let payload = payload.into_inner();
    let receipt = state
        .redemptions
        .redeem(RedemptionRequest {
            code: payload.code,
            principal: payload.principal_id.map(PrincipalId::from_uuid),
            requested_at: Utc::now(),
        })
        .await?;
    Ok(web::Json(receipt.into()))
}
