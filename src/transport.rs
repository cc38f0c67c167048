//! Push transport: VAPID-signed, encrypted delivery of one message to one subscription.
use crate::config::{PushConfig, VapidConfig};
use crate::model::SubscriptionRecord;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument};
use web_push::{
    ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushError, WebPushMessageBuilder,
};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to build push message: {0}")]
    Build(#[from] WebPushError),
    #[error("push request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("subscription expired or unsubscribed (HTTP {0})")]
    Gone(u16),
    #[error("push service rejected the message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver already-serialized payload bytes to one subscription. One attempt, no retry.
    async fn deliver(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<(), DeliveryError>;
}

/// `PushTransport` backed by the `web-push` crate for RFC 8291 encryption and
/// RFC 8292 VAPID signing, with the HTTP request sent through `reqwest`.
#[derive(Clone)]
pub struct WebPushTransport {
    http: Client,
    vapid: VapidConfig,
    ttl_seconds: u32,
}

impl fmt::Debug for WebPushTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebPushTransport")
            .field("subject", &self.vapid.subject)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl WebPushTransport {
    pub fn new(vapid: VapidConfig, push: &PushConfig) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .user_agent(concat!("webpush-dispatch/", env!("CARGO_PKG_VERSION")))
            .timeout(push.request_timeout())
            .build()?;
        Ok(Self {
            http,
            vapid,
            ttl_seconds: push.ttl_seconds,
        })
    }

    fn build_request(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<reqwest::RequestBuilder, DeliveryError> {
        let sub_info = SubscriptionInfo::new(
            subscription.endpoint.as_str(),
            subscription.keys.p256dh.as_str(),
            subscription.keys.auth.as_str(),
        );

        let mut sig_builder = VapidSignatureBuilder::from_base64(&self.vapid.private_key, &sub_info)?;
        sig_builder.add_claim("sub", self.vapid.subject.as_str());
        let signature = sig_builder.build()?;

        let mut builder = WebPushMessageBuilder::new(&sub_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.set_ttl(self.ttl_seconds);
        let message = builder.build()?;

        let mut request = self
            .http
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }
        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }
        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");
            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }
            request = request.body(push_payload.content);
        }
        Ok(request)
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    #[instrument(skip_all, fields(endpoint = %subscription.endpoint.host_str().unwrap_or_default()))]
    async fn deliver(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        let request = self.build_request(subscription, payload)?;
        let res = request.send().await?;
        let status = res.status();
        debug!(status = status.as_u16(), "push service responded");

        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::GONE || status == StatusCode::NOT_FOUND {
            return Err(DeliveryError::Gone(status.as_u16()));
        }
        let body = res.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
