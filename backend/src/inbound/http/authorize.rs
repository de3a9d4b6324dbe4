//! Authorization API handlers.
//!
//! ```text
//! POST /api/v1/authorize {"username":"CODE-000042","mac":"AA:BB:CC:DD:EE:FF", ...}
//! POST /api/v1/authorize/check (same body, status and message only)
//! ```
//!
//! The response is the attribute contract the NAS enforces; field names and
//! units are fixed. Optional fields are omitted, never null, so NAS-side
//! parsers with strict schemas keep working.

use actix_web::{HttpResponse, post, web};
use serde::{Deserialize, Serialize};

use crate::domain::{AccessDecision, AccessRequest, DENIAL_MESSAGE, DeviceId, DomainError};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Authorization request body from the network access boundary.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct AuthorizeRequest {
    /// Login email or voucher code.
    pub username: String,
    /// Account secret; absent for voucher-code credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Client device MAC address.
    pub mac: String,
    /// Identifier of the NAS originating the request.
    pub nas_id: String,
    /// Source address of the NAS.
    pub nas_ip: String,
    /// Calling-station identifier as reported by the NAS.
    pub calling_station_id: String,
}

impl AuthorizeRequest {
    fn into_domain(self) -> Result<AccessRequest, DomainError> {
        let device = DeviceId::new(&self.mac)
            .map_err(|err| DomainError::invalid_request(err.to_string()))?;
        Ok(AccessRequest {
            identifier: self.username,
            secret: self.password,
            device,
            nas_id: Some(self.nas_id),
            nas_ip: Some(self.nas_ip),
            calling_station_id: Some(self.calling_station_id),
        })
    }
}

/// Decision status as the NAS expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionStatus {
    /// Access granted.
    Ok,
    /// Access denied.
    Deny,
}

/// Authorization response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuthorizeResponse {
    /// Grant or denial marker.
    pub status: DecisionStatus,
    /// Human-readable outcome. Denials always carry the same generic text.
    pub message: String,
    /// Granted session duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_time: Option<u64>,
    /// Download ceiling in bytes/sec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_limit: Option<u64>,
    /// Upload ceiling in bytes/sec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_limit: Option<u64>,
    /// Data cap in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_limit: Option<u64>,
    /// Issued session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Principal the grant was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AuthorizeResponse {
    fn denied() -> Self {
        Self {
            status: DecisionStatus::Deny,
            message: DENIAL_MESSAGE.to_owned(),
            session_time: None,
            download_limit: None,
            upload_limit: None,
            data_limit: None,
            session_id: None,
            user_id: None,
        }
    }

    fn from_decision(decision: AccessDecision) -> Self {
        match decision {
            AccessDecision::Deny(_) => Self::denied(),
            AccessDecision::Grant(grant) => Self {
                status: DecisionStatus::Ok,
                message: "Access granted".to_owned(),
                session_time: Some(grant.entitlement.session_seconds),
                download_limit: Some(grant.entitlement.down_bps),
                upload_limit: Some(grant.entitlement.up_bps),
                data_limit: Some(grant.entitlement.data_cap_bytes),
                session_id: Some(grant.session.token.to_string()),
                user_id: Some(grant.principal.id.to_string()),
            },
        }
    }

    /// Status and message only, for the pre-authentication check.
    fn status_only(decision: &AccessDecision) -> Self {
        if decision.is_grant() {
            Self {
                status: DecisionStatus::Ok,
                message: "Access granted".to_owned(),
                session_time: None,
                download_limit: None,
                upload_limit: None,
                data_limit: None,
                session_id: None,
                user_id: None,
            }
        } else {
            Self::denied()
        }
    }
}

/// Authorize a client association and issue a session.
#[utoipa::path(
    post,
    path = "/api/v1/authorize",
    request_body = AuthorizeRequest,
    responses(
        (status = 200, description = "Decision envelope", body = AuthorizeResponse),
        (status = 400, description = "Malformed request", body = crate::domain::DomainError),
        (status = 503, description = "Storage unavailable", body = crate::domain::DomainError),
        (status = 500, description = "Internal server error")
    ),
    tags = ["authorize"],
    operation_id = "authorize"
)]
#[post("/authorize")]
pub async fn authorize(
    state: web::Data<HttpState>,
    payload: web::Json<AuthorizeRequest>,
) -> ApiResult<HttpResponse> {
    let request = payload.into_inner().into_domain()?;
    let decision = state.authorize.authorize(request).await?;
    Ok(HttpResponse::Ok().json(AuthorizeResponse::from_decision(decision)))
}

/// Pre-authentication check; evaluates without mutating any state.
#[utoipa::path(
    post,
    path = "/api/v1/authorize/check",
    request_body = AuthorizeRequest,
    responses(
        (status = 200, description = "Status and message only", body = AuthorizeResponse),
        (status = 400, description = "Malformed request", body = crate::domain::DomainError),
        (status = 503, description = "Storage unavailable", body = crate::domain::DomainError),
        (status = 500, description = "Internal server error")
    ),
    tags = ["authorize"],
    operation_id = "authorizeCheck"
)]
#[post("/authorize/check")]
pub async fn authorize_check(
    state: web::Data<HttpState>,
    payload: web::Json<AuthorizeRequest>,
) -> ApiResult<HttpResponse> {
    let request = payload.into_inner().into_domain()?;
    let decision = state.authorize.check(request).await?;
    Ok(HttpResponse::Ok().json(AuthorizeResponse::status_only(&decision)))
}
