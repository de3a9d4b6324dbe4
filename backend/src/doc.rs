//! OpenAPI documentation configuration.
//!
//! Registers the HTTP paths and request/response schemas of the REST API.
//! The generated document is served at `/api-docs/openapi.json` in debug
//! builds and used by external tooling.

use utoipa::OpenApi;

use crate::domain::{DomainError, ErrorCode};
use crate::inbound::http::authorize::{AuthorizeRequest, AuthorizeResponse, DecisionStatus};
use crate::inbound::http::payments::PaymentStatusResponse;
use crate::inbound::http::vouchers::{RedeemRequest, RedeemResponse};

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Captive portal access API",
        description = "NAS-facing authorization, voucher redemption, and payment status."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::authorize::authorize,
        crate::inbound::http::authorize::authorize_check,
        crate::inbound::http::vouchers::redeem,
        crate::inbound::http::payments::payment_status,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        AuthorizeRequest,
        AuthorizeResponse,
        DecisionStatus,
        RedeemRequest,
        RedeemResponse,
        PaymentStatusResponse,
        DomainError,
        ErrorCode,
    )),
    tags(
        (name = "authorize", description = "NAS access decisions"),
        (name = "vouchers", description = "Voucher redemption"),
        (name = "payments", description = "Payment status"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_registers_all_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/authorize",
            "/api/v1/authorize/check",
            "/api/v1/vouchers/redeem",
            "/api/v1/payments/{payment_id}",
            "/health/ready",
            "/health/live",
        ] {
            assert!(
                doc.paths.paths.contains_key(path),
                "OpenAPI document should register {path}"
            );
        }
    }

    #[test]
    fn openapi_registers_decision_schemas() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        assert!(schemas.contains_key("AuthorizeRequest"));
        assert!(schemas.contains_key("AuthorizeResponse"));
        assert!(schemas.contains_key("RedeemResponse"));
    }
}
