//! Receiving side: turns a delivered push message into a displayed notification.
//!
//! The wire payload is the JSON produced from `NotificationPayload`. The title
//! is pulled out and every other field is passed through as display options.
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// A push event as delivered by the host environment.
#[derive(Debug, Clone, Default)]
pub struct PushEvent {
    pub data: Option<Vec<u8>>,
}

impl PushEvent {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum PayloadParseError {
    #[error("push event carries no data")]
    Empty,
    #[error("push data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("push data must be a JSON object")]
    NotAnObject,
    #[error("push data has no string `title`")]
    MissingTitle,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Parse(#[from] PayloadParseError),
    #[error("failed to present notification: {0}")]
    Present(anyhow::Error),
}

/// Display surface for notifications (the OS notification UI on a device).
#[async_trait]
pub trait NotificationPresenter: Send + Sync {
    async fn show_notification(&self, title: &str, options: Map<String, Value>)
        -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Idle,
    Handling,
}

/// Split push data into the notification title and its remaining display options.
pub fn parse_event_data(data: &[u8]) -> Result<(String, Map<String, Value>), PayloadParseError> {
    let value: Value = serde_json::from_slice(data)?;
    let Value::Object(mut options) = value else {
        return Err(PayloadParseError::NotAnObject);
    };
    match options.remove("title") {
        Some(Value::String(title)) => Ok((title, options)),
        _ => Err(PayloadParseError::MissingTitle),
    }
}

pub struct NotificationRenderer<P> {
    presenter: P,
    in_flight: AtomicUsize,
}

impl<P: NotificationPresenter> NotificationRenderer<P> {
    pub fn new(presenter: P) -> Self {
        Self {
            presenter,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// `Handling` while at least one event is being processed.
    pub fn state(&self) -> RendererState {
        if self.in_flight.load(Ordering::SeqCst) == 0 {
            RendererState::Idle
        } else {
            RendererState::Handling
        }
    }

    /// Handle one event: parse, extract the title, present. Nothing is shown on error.
    #[instrument(skip_all)]
    pub async fn handle(&self, event: &PushEvent) -> Result<(), RenderError> {
        let _guard = InFlight::enter(&self.in_flight);
        let data = event.data.as_deref().ok_or(PayloadParseError::Empty)?;
        let (title, options) = parse_event_data(data)?;
        debug!(%title, fields = options.len(), "presenting notification");
        self.presenter
            .show_notification(&title, options)
            .await
            .map_err(RenderError::Present)
    }

    /// Error boundary for the host event loop: failures are logged and the event dropped.
    pub async fn on_push(&self, event: &PushEvent) {
        match self.handle(event).await {
            Ok(()) => info!("notification shown"),
            Err(err) => warn!(error = %err, "dropping push event"),
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Presenter that writes notifications to the log. Used for local previews.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

#[async_trait]
impl NotificationPresenter for LogPresenter {
    async fn show_notification(
        &self,
        title: &str,
        options: Map<String, Value>,
    ) -> anyhow::Result<()> {
        let body = options
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let options = Value::Object(options);
        info!(%title, %body, %options, "notification");
        Ok(())
    }
}
