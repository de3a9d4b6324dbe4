//! Airtel Money collections adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use uuid::Uuid;

use super::dto::{
    AirtelPaymentRequestDto, AirtelStatusEnvelopeDto, AirtelSubscriberDto,
    AirtelTransactionRequestDto,
};
use super::transport::{map_status_error, map_transport_error};
use crate::domain::payment::PaymentMethod;
use crate::domain::ports::{
    PaymentChargeRequest, PaymentProvider, PaymentProviderError, ProviderPaymentStatus,
};

const COUNTRY_HEADER: &str = "X-Country";
const CURRENCY_HEADER: &str = "X-Currency";

/// Credentials and market routing for the Airtel Money API.
#[derive(Debug, Clone)]
pub struct AirtelMoneyCredentials {
    /// Bearer token obtained from the OAuth endpoint.
    pub access_token: String,
    /// ISO country code of the operating market.
    pub country: String,
}

/// Airtel Money adapter performing HTTP calls against one API endpoint.
pub struct AirtelMoneyProvider {
    client: Client,
    endpoint: Url,
    credentials: AirtelMoneyCredentials,
}

impl AirtelMoneyProvider {
    /// Build an adapter using a reqwest client with an explicit request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoint: Url,
        timeout: Duration,
        credentials: AirtelMoneyCredentials,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            credentials,
        })
    }

    fn api_url(&self, suffix: &str) -> Result<Url, PaymentProviderError> {
        self.endpoint
            .join(suffix)
            .map_err(|error| PaymentProviderError::transport(error.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for AirtelMoneyProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::AirtelMoney
    }

    async fn request_payment(
        &self,
        charge: &PaymentChargeRequest,
    ) -> Result<String, PaymentProviderError> {
        let transaction_id = Uuid::new_v4().to_string();
        let body = AirtelPaymentRequestDto {
            reference: charge.payment_id.to_string(),
            subscriber: AirtelSubscriberDto {
                msisdn: charge.payer_msisdn.clone(),
            },
            transaction: AirtelTransactionRequestDto {
                amount: charge.amount_minor.to_string(),
                currency: charge.currency.clone(),
                id: transaction_id.clone(),
            },
        };

        let url = self.api_url("merchant/v2/payments/")?;
        let response = self
            .client
            .post(url)
            .header(COUNTRY_HEADER, self.credentials.country.as_str())
            .header(CURRENCY_HEADER, charge.currency.as_str())
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
        Ok(transaction_id)
    }

    async fn check_status(
        &self,
        transaction_id: &str,
    ) -> Result<ProviderPaymentStatus, PaymentProviderError> {
        let url = self.api_url(&format!("standard/v1/payments/{transaction_id}"))?;
        let response = self
            .client
            .get(url)
            .header(COUNTRY_HEADER, self.credentials.country.as_str())
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
    let decoded: AirtelStatusEnvelopeDto = serde_json::from_slice(body).map_err(|error| {
        PaymentProviderError::decode(format!("invalid Airtel status payload: {error}"))
    })?;
    Ok(map_airtel_status(&decoded.data.transaction.status))
}

/// `TS` is transaction success, `TF` transaction failure. Every other code,
/// including the in-progress and ambiguous ones, stays pending for the next
/// sweep.
fn map_airtel_status(raw: &str) -> ProviderPaymentStatus {
    match raw.to_ascii_uppercase().as_str() {
        "TS" => ProviderPaymentStatus::Successful,
        "TF" => ProviderPaymentStatus::Failed,
        _ => ProviderPaymentStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::success("TS", ProviderPaymentStatus::Successful)]
    #[case::failure("TF", ProviderPaymentStatus::Failed)]
    #[case::in_progress("TIP", ProviderPaymentStatus::Pending)]
    #[case::ambiguous("TA", ProviderPaymentStatus::Pending)]
    #[case::lower_case("ts", ProviderPaymentStatus::Successful)]
    fn maps_airtel_status_vocabulary(#[case] raw: &str, #[case] expected: ProviderPaymentStatus) {
        assert_eq!(map_airtel_status(raw), expected);
    }

    #[rstest]
    fn parses_status_envelope() {
        let body = r#"{"data":{"transaction":{"status":"TS","message":"paid"}}}"#;
        let status = parse_status(body.as_bytes()).expect("payload should decode");
        assert_eq!(status, ProviderPaymentStatus::Successful);
    }

    #[rstest]
    fn rejects_envelopes_missing_the_transaction_section() {
        let error = parse_status(br#"{"data":{}}"#).expect_err("decode should fail");
        assert!(
            matches!(error, PaymentProviderError::Decode { .. }),
            "missing sections should map to Decode",
        );
    }
}
