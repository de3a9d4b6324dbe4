//! HTTP error mapping shared by the mobile-money adapters.

use reqwest::StatusCode;

use crate::domain::ports::PaymentProviderError;

pub(crate) fn map_transport_error(error: reqwest::Error) -> PaymentProviderError {
    if error.is_timeout() {
        PaymentProviderError::timeout(error.to_string())
    } else {
        PaymentProviderError::transport(error.to_string())
    }
}

pub(crate) fn map_status_error(status: StatusCode, body: &[u8]) -> PaymentProviderError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            PaymentProviderError::timeout(message)
        }
        _ if status.is_client_error() => PaymentProviderError::rejected(status.as_u16(), message),
        _ => PaymentProviderError::transport(message),
    }
}

pub(crate) fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::request_timeout(StatusCode::REQUEST_TIMEOUT)]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT)]
    fn maps_timeout_statuses_to_timeout(#[case] status: StatusCode) {
        let error = map_status_error(status, b"");
        assert!(
            matches!(error, PaymentProviderError::Timeout { .. }),
            "timeout statuses should map to Timeout",
        );
    }

    #[rstest]
    fn maps_client_statuses_to_rejected_with_code() {
        let error = map_status_error(StatusCode::UNAUTHORIZED, b"{\"message\":\"bad key\"}");
        match error {
            PaymentProviderError::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("bad key"), "preview should carry the body");
            }
            other => panic!("401 should map to Rejected, got {other:?}"),
        }
    }

    #[rstest]
    fn maps_server_statuses_to_transport() {
        let error = map_status_error(StatusCode::BAD_GATEWAY, b"upstream down");
        assert!(
            matches!(error, PaymentProviderError::Transport { .. }),
            "5xx should map to Transport",
        );
    }

    #[rstest]
    fn truncates_long_bodies_in_previews() {
        let body = "x".repeat(500);
        let preview = body_preview(body.as_bytes());
        assert!(preview.ends_with("..."));
        assert!(preview.chars().count() <= 163);
    }
}
