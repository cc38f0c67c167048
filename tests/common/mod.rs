#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;
use webpush_dispatch::model::{SubscriptionKeys, SubscriptionRecord};
use webpush_dispatch::token::encode_token;
use webpush_dispatch::transport::{DeliveryError, PushTransport};

#[derive(Debug, Clone)]
pub struct DeliveryCall {
    pub endpoint: String,
    pub payload: Vec<u8>,
    pub started: Instant,
}

/// Transport stub that records every delivery and fails the configured endpoints.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<DeliveryCall>>>,
    failing: Arc<HashSet<String>>,
    delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(endpoints: &[&str]) -> Self {
        Self {
            failing: Arc::new(endpoints.iter().map(|e| e.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn calls(&self) -> Vec<DeliveryCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn deliver(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        let endpoint = subscription.endpoint.to_string();
        self.calls.lock().await.push(DeliveryCall {
            endpoint: endpoint.clone(),
            payload: payload.to_vec(),
            started: Instant::now(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&endpoint) {
            return Err(DeliveryError::Gone(410));
        }
        Ok(())
    }
}

pub fn endpoint(n: usize) -> String {
    format!("https://push.example.com/send/{}", n)
}

pub fn token_for(n: usize) -> String {
    encode_token(&SubscriptionRecord {
        endpoint: Url::parse(&endpoint(n)).unwrap(),
        keys: SubscriptionKeys {
            p256dh: format!("p256dh-{}", n),
            auth: format!("auth-{}", n),
        },
    })
}
