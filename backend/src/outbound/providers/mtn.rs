//! MTN MoMo collections adapter.
//!
//! Initiates `requesttopay` collections and polls their settlement state.
//! The reference we pass as `X-Reference-Id` doubles as the provider
//! transaction identifier, so status polls address the same resource.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use uuid::Uuid;

use super::dto::{MtnPayerDto, MtnRequestToPayDto, MtnStatusDto};
use super::transport::{map_status_error, map_transport_error};
use crate::domain::payment::PaymentMethod;
use crate::domain::ports::{
    PaymentChargeRequest, PaymentProvider, PaymentProviderError, ProviderPaymentStatus,
};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const TARGET_ENVIRONMENT_HEADER: &str = "X-Target-Environment";
const REFERENCE_ID_HEADER: &str = "X-Reference-Id";

/// Credentials and routing for the MoMo collections product.
#[derive(Debug, Clone)]
pub struct MtnMomoCredentials {
    /// API subscription key for the collections product.
    pub subscription_key: String,
    /// Target environment name, `sandbox` or a production market.
    pub target_environment: String,
    /// Bearer token obtained from the token endpoint.
    pub access_token: String,
}

/// MoMo adapter performing HTTP calls against one collections endpoint.
pub struct MtnMomoProvider {
    client: Client,
    endpoint: Url,
    credentials: MtnMomoCredentials,
}

impl MtnMomoProvider {
    /// Build an adapter using a reqwest client with an explicit request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoint: Url,
        timeout: Duration,
        credentials: MtnMomoCredentials,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            credentials,
        })
    }

    fn collection_url(&self, suffix: &str) -> Result<Url, PaymentProviderError> {
        self.endpoint
            .join(suffix)
            .map_err(|error| PaymentProviderError::transport(error.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for MtnMomoProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::MtnMomo
    }

    async fn request_payment(
        &self,
        charge: &PaymentChargeRequest,
    ) -> Result<String, PaymentProviderError> {
        let reference = Uuid::new_v4().to_string();
        let body = MtnRequestToPayDto {
            amount: charge.amount_minor.to_string(),
            currency: charge.currency.clone(),
            external_id: charge.payment_id.to_string(),
            payer: MtnPayerDto {
                party_id_type: "MSISDN".to_owned(),
                party_id: charge.payer_msisdn.clone(),
            },
            payer_message: "Hotspot access".to_owned(),
            payee_note: "Captive portal voucher".to_owned(),
        };

        let url = self.collection_url("collection/v1_0/requesttopay")?;
        let response = self
            .client
            .post(url)
            .header(REFERENCE_ID_HEADER, reference.as_str())
            .header(
                SUBSCRIPTION_KEY_HEADER,
                self.credentials.subscription_key.as_str(),
            )
            .header(
                TARGET_ENVIRONMENT_HEADER,
                self.credentials.target_environment.as_str(),
            )
            .bearer_auth(self.credentials.access_token.as_str())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.map_err(map_transport_error)?;
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(reference)
    }

    async fn check_status(
        &self,
        transaction_id: &str,
    ) -> Result<ProviderPaymentStatus, PaymentProviderError> {
        let url =
            self.collection_url(&format!("collection/v1_0/requesttopay/{transaction_id}"))?;
        let response = self
            .client
            .get(url)
            .header(
                SUBSCRIPTION_KEY_HEADER,
                self.credentials.subscription_key.as_str(),
            )
            .header(
                TARGET_ENVIRONMENT_HEADER,
                self.credentials.target_environment.as_str(),
            )
            .bearer_auth(self.credentials.access_token.as_str())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        parse_status(body.as_ref())
    }
}

fn parse_status(body: &[u8]) -> Result<ProviderPaymentStatus, PaymentProviderError> {
    let decoded: MtnStatusDto = serde_json::from_slice(body).map_err(|error| {
        PaymentProviderError::decode(format!("invalid MoMo status payload: {error}"))
    })?;
    Ok(map_momo_status(&decoded.status))
}

/// Anything outside the documented terminal vocabulary stays pending so the
/// sweep retries instead of guessing.
fn map_momo_status(raw: &str) -> ProviderPaymentStatus {
    match raw.to_ascii_uppercase().as_str() {
        "SUCCESSFUL" | "COMPLETED" => ProviderPaymentStatus::Successful,
        "FAILED" => ProviderPaymentStatus::Failed,
        _ => ProviderPaymentStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::successful("SUCCESSFUL", ProviderPaymentStatus::Successful)]
    #[case::completed("COMPLETED", ProviderPaymentStatus::Successful)]
    #[case::lower_case("successful", ProviderPaymentStatus::Successful)]
    #[case::failed("FAILED", ProviderPaymentStatus::Failed)]
    #[case::pending("PENDING", ProviderPaymentStatus::Pending)]
    #[case::unknown("ONGOING", ProviderPaymentStatus::Pending)]
    fn maps_momo_status_vocabulary(#[case] raw: &str, #[case] expected: ProviderPaymentStatus) {
        assert_eq!(map_momo_status(raw), expected);
    }

    #[rstest]
    fn parses_status_payload_with_reason() {
        let body = r#"{"status":"FAILED","reason":"PAYER_NOT_FOUND"}"#;
        let status = parse_status(body.as_bytes()).expect("payload should decode");
        assert_eq!(status, ProviderPaymentStatus::Failed);
    }

    #[rstest]
    fn rejects_unparseable_payloads_as_decode_errors() {
        let error = parse_status(b"not json").expect_err("decode should fail");
        assert!(
            matches!(error, PaymentProviderError::Decode { .. }),
            "malformed bodies should map to Decode",
        );
    }
}
