//! Wire DTOs for the mobile-money provider APIs.
//!
//! Implementation details of the provider adapters; never exposed to the
//! domain. Field names follow each provider's published schema.

use serde::{Deserialize, Serialize};

/// MTN MoMo collection request body (`POST /collection/v1_0/requesttopay`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MtnRequestToPayDto {
    pub amount: String,
    pub currency: String,
    pub external_id: String,
    pub payer: MtnPayerDto,
    pub payer_message: String,
    pub payee_note: String,
}

/// MTN payer party.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MtnPayerDto {
    pub party_id_type: String,
    pub party_id: String,
}

/// MTN MoMo collection status response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MtnStatusDto {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Airtel Money payment request body (`POST /merchant/v2/payments/`).
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AirtelPaymentRequestDto {
    pub reference: String,
    pub subscriber: AirtelSubscriberDto,
    pub transaction: AirtelTransactionRequestDto,
}

/// Airtel payer subscriber.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AirtelSubscriberDto {
    pub msisdn: String,
}

/// Airtel transaction request section.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AirtelTransactionRequestDto {
    pub amount: String,
    pub currency: String,
    pub id: String,
}

/// Airtel Money status envelope (`GET /standard/v1/payments/{id}`).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AirtelStatusEnvelopeDto {
    pub data: AirtelStatusDataDto,
}

/// Airtel status payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AirtelStatusDataDto {
    pub transaction: AirtelTransactionStatusDto,
}

/// Airtel transaction status section.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AirtelTransactionStatusDto {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}
