//! Subscriber token codec.
//!
//! A token is the base64 encoding of a browser `PushSubscription` serialized
//! as JSON: `{"endpoint": "...", "keys": {"p256dh": "...", "auth": "..."}}`.
use crate::model::{SubscriptionKeys, SubscriptionRecord};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TokenDecodeError {
    #[error("token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("token is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("token is not a valid subscription object: {0}")]
    Json(#[from] serde_json::Error),
    #[error("subscription is missing `{0}`")]
    MissingField(&'static str),
    #[error("subscription endpoint is not a valid URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

#[derive(Deserialize)]
struct RawSubscription {
    endpoint: Option<String>,
    keys: Option<RawKeys>,
}

#[derive(Deserialize)]
struct RawKeys {
    p256dh: Option<String>,
    auth: Option<String>,
}

/// Decode one subscriber token. Tokens are independent of each other.
pub fn decode_token(token: &str) -> Result<SubscriptionRecord, TokenDecodeError> {
    let token = token.trim();
    let bytes = if token.contains(['-', '_']) {
        URL_SAFE_LENIENT.decode(token)?
    } else {
        STANDARD_LENIENT.decode(token)?
    };
    let text = String::from_utf8(bytes)?;
    let raw: RawSubscription = serde_json::from_str(&text)?;

    let endpoint = raw
        .endpoint
        .filter(|e| !e.is_empty())
        .ok_or(TokenDecodeError::MissingField("endpoint"))?;
    let keys = raw.keys.ok_or(TokenDecodeError::MissingField("keys"))?;
    let p256dh = keys
        .p256dh
        .filter(|k| !k.is_empty())
        .ok_or(TokenDecodeError::MissingField("keys.p256dh"))?;
    let auth = keys
        .auth
        .filter(|k| !k.is_empty())
        .ok_or(TokenDecodeError::MissingField("keys.auth"))?;

    Ok(SubscriptionRecord {
        endpoint: Url::parse(&endpoint)?,
        keys: SubscriptionKeys { p256dh, auth },
    })
}

/// Build the token a client would send for this subscription.
pub fn encode_token(record: &SubscriptionRecord) -> String {
    let subscription = json!({
        "endpoint": record.endpoint.as_str(),
        "keys": {
            "p256dh": record.keys.p256dh,
            "auth": record.keys.auth,
        }
    });
    STANDARD.encode(subscription.to_string())
}
