//! Dispatch orchestrator: decode tokens, fan the payload out, aggregate outcomes.
//!
//! Two entry points share the same fan-out:
//! - [`Dispatcher::dispatch`] keeps the all-or-nothing contract: one undecodable
//!   token aborts the request before anything is sent, and any failed delivery
//!   fails the whole call.
//! - [`Dispatcher::dispatch_each`] decodes tokens independently, delivers to every
//!   subscription that decoded, and always returns the per-subscriber report.
use crate::model::{
    DeliveryStatus, DispatchOutcome, DispatchReport, DispatchRequest, SubscriptionRecord,
};
use crate::token::{decode_token, TokenDecodeError};
use crate::transport::{DeliveryError, PushTransport};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("subscriber {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: TokenDecodeError,
    },
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("delivery failed for {failed} of {total} subscribers: {reason}")]
    Delivery {
        failed: usize,
        total: usize,
        /// Message of the lowest-index failure.
        reason: String,
        report: DispatchReport,
    },
}

#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn PushTransport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self { transport }
    }

    #[instrument(skip_all, fields(tokens = request.tokens.len()))]
    pub async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReport, DispatchError> {
        let mut subscriptions = Vec::with_capacity(request.tokens.len());
        for (index, token) in request.tokens.iter().enumerate() {
            match decode_token(token) {
                Ok(sub) => subscriptions.push((index, sub)),
                Err(source) => {
                    warn!(index, error = %source, "rejecting dispatch: undecodable token");
                    return Err(DispatchError::Decode { index, source });
                }
            }
        }

        let payload = serde_json::to_vec(&request.payload)?;
        let outcomes = self.fan_out(subscriptions, &payload).await;
        let report = new_report(outcomes);

        match report.first_failure() {
            None => Ok(report),
            Some(first) => Err(DispatchError::Delivery {
                failed: report.failed(),
                total: report.outcomes.len(),
                reason: first.reason.clone().unwrap_or_default(),
                report,
            }),
        }
    }

    #[instrument(skip_all, fields(tokens = request.tokens.len()))]
    pub async fn dispatch_each(
        &self,
        request: &DispatchRequest,
    ) -> Result<DispatchReport, DispatchError> {
        let payload = serde_json::to_vec(&request.payload)?;

        let mut outcomes = Vec::with_capacity(request.tokens.len());
        let mut subscriptions = Vec::with_capacity(request.tokens.len());
        for (index, token) in request.tokens.iter().enumerate() {
            match decode_token(token) {
                Ok(sub) => subscriptions.push((index, sub)),
                Err(err) => {
                    let status = DeliveryStatus::DecodeFailed;
                    warn!(index, status = status.as_str(), error = %err, "skipping undecodable token");
                    outcomes.push(DispatchOutcome::failed(index, status, err.to_string()));
                }
            }
        }

        outcomes.extend(self.fan_out(subscriptions, &payload).await);
        outcomes.sort_by_key(|o| o.subscriber_index);
        Ok(new_report(outcomes))
    }

    /// Issue every delivery at once and wait for all of them to settle.
    async fn fan_out(
        &self,
        subscriptions: Vec<(usize, SubscriptionRecord)>,
        payload: &[u8],
    ) -> Vec<DispatchOutcome> {
        let deliveries = subscriptions.into_iter().map(|(index, sub)| {
            let transport = Arc::clone(&self.transport);
            async move {
                let res: Result<(), DeliveryError> = transport.deliver(&sub, payload).await;
                match res {
                    Ok(()) => DispatchOutcome::delivered(index),
                    Err(err) => {
                        let status = DeliveryStatus::DeliveryFailed;
                        warn!(index, status = status.as_str(), error = %err, "delivery failed");
                        DispatchOutcome::failed(index, status, err.to_string())
                    }
                }
            }
        });
        let outcomes = join_all(deliveries).await;
        let delivered = outcomes
            .iter()
            .filter(|o| o.status == DeliveryStatus::Delivered)
            .count();
        info!(delivered, attempted = outcomes.len(), "fan-out settled");
        outcomes
    }
}

fn new_report(outcomes: Vec<DispatchOutcome>) -> DispatchReport {
    DispatchReport {
        dispatch_id: Uuid::new_v4(),
        dispatched_at: Utc::now(),
        outcomes,
    }
}
