//! Request validation: turns an untyped JSON body into a `DispatchRequest`.
//!
//! Every violated constraint is collected, so one response tells the caller
//! everything that needs fixing.
use crate::model::{Direction, DispatchRequest, NotificationAction, NotificationPayload};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid request: {}", join(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn mentions(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

fn join(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

const FLAGS: [&str; 7] = [
    "renotify",
    "requireInteraction",
    "silent",
    "persistent",
    "sticky",
    "notificationCloseEvent",
    "showTrigger",
];

/// Parse a raw HTTP body. Malformed JSON is reported as a validation failure.
pub fn parse_request(body: &[u8]) -> Result<DispatchRequest, ValidationError> {
    let value: Value = serde_json::from_slice(body).map_err(|err| ValidationError {
        violations: vec![FieldViolation {
            path: String::new(),
            message: format!("body is not valid JSON: {}", err),
        }],
    })?;
    validate(&value)
}

pub fn validate(body: &Value) -> Result<DispatchRequest, ValidationError> {
    let mut v = Violations::default();

    let Some(root) = body.as_object() else {
        v.push("", "expected object");
        return Err(v.into_error());
    };

    let tokens = v.tokens(root.get("tokens"));
    let payload = match root.get("payload") {
        None => {
            v.push("payload", "required");
            None
        }
        Some(Value::Object(obj)) => v.payload(obj),
        Some(_) => {
            v.push("payload", "expected object");
            None
        }
    };

    match (tokens, payload) {
        (Some(tokens), Some(payload)) if v.is_empty() => Ok(DispatchRequest { tokens, payload }),
        _ => Err(v.into_error()),
    }
}

/// Integer-valued JSON number, including ones written with a zero fraction (`200.0`).
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

#[derive(Default)]
struct Violations(Vec<FieldViolation>);

impl Violations {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldViolation {
            path: path.into(),
            message: message.into(),
        });
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_error(self) -> ValidationError {
        ValidationError { violations: self.0 }
    }

    fn tokens(&mut self, value: Option<&Value>) -> Option<Vec<String>> {
        let items = match value {
            None => {
                self.push("tokens", "required");
                return None;
            }
            Some(Value::Array(items)) => items,
            Some(_) => {
                self.push("tokens", "expected array of strings");
                return None;
            }
        };
        if items.is_empty() {
            self.push("tokens", "must contain at least 1 token");
            return None;
        }
        let mut tokens = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => tokens.push(s.to_string()),
                None => self.push(format!("tokens[{}]", i), "expected string"),
            }
        }
        (tokens.len() == items.len()).then_some(tokens)
    }

    fn payload(&mut self, obj: &Map<String, Value>) -> Option<NotificationPayload> {
        let before = self.0.len();

        let title = self.required_text(obj, "title");
        let body = self.required_text(obj, "body");

        let mut payload = NotificationPayload {
            title: title.unwrap_or_default(),
            body: body.unwrap_or_default(),
            icon: self.optional_url(obj, "icon"),
            image: self.optional_url(obj, "image"),
            badge: self.optional_string(obj, "badge"),
            tag: self.optional_string(obj, "tag"),
            direction: self.optional_direction(obj),
            vibrate: self.optional_vibrate(obj),
            timestamp: self.optional_integer(obj, "timestamp"),
            actions: self.optional_actions(obj),
            data: self.optional_data(obj),
            ..Default::default()
        };

        for flag in FLAGS {
            let value = self.optional_bool(obj, flag);
            let slot = match flag {
                "renotify" => &mut payload.renotify,
                "requireInteraction" => &mut payload.require_interaction,
                "silent" => &mut payload.silent,
                "persistent" => &mut payload.persistent,
                "sticky" => &mut payload.sticky,
                "notificationCloseEvent" => &mut payload.notification_close_event,
                _ => &mut payload.show_trigger,
            };
            *slot = value;
        }

        (self.0.len() == before).then_some(payload)
    }

    fn required_text(&mut self, obj: &Map<String, Value>, key: &str) -> Option<String> {
        let path = format!("payload.{}", key);
        match obj.get(key) {
            None => {
                self.push(path, "required");
                None
            }
            Some(Value::String(s)) if s.is_empty() => {
                self.push(path, "must be a non-empty string");
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.push(path, "expected string");
                None
            }
        }
    }

    fn optional_string(&mut self, obj: &Map<String, Value>, key: &str) -> Option<String> {
        match obj.get(key)? {
            Value::String(s) => Some(s.clone()),
            _ => {
                self.push(format!("payload.{}", key), "expected string");
                None
            }
        }
    }

    fn optional_url(&mut self, obj: &Map<String, Value>, key: &str) -> Option<String> {
        let s = self.optional_string(obj, key)?;
        match Url::parse(&s) {
            Ok(_) => Some(s),
            Err(err) => {
                self.push(format!("payload.{}", key), format!("invalid url: {}", err));
                None
            }
        }
    }

    fn optional_bool(&mut self, obj: &Map<String, Value>, key: &str) -> Option<bool> {
        match obj.get(key)? {
            Value::Bool(b) => Some(*b),
            _ => {
                self.push(format!("payload.{}", key), "expected boolean");
                None
            }
        }
    }

    fn optional_integer(&mut self, obj: &Map<String, Value>, key: &str) -> Option<i64> {
        match as_integer(obj.get(key)?) {
            Some(n) => Some(n),
            None => {
                self.push(format!("payload.{}", key), "expected integer");
                None
            }
        }
    }

    fn optional_direction(&mut self, obj: &Map<String, Value>) -> Option<Direction> {
        let s = self.optional_string(obj, "dir")?;
        let dir = Direction::parse(&s);
        if dir.is_none() {
            self.push("payload.dir", "expected one of: auto, ltr, rtl");
        }
        dir
    }

    fn optional_vibrate(&mut self, obj: &Map<String, Value>) -> Option<Vec<i64>> {
        let Value::Array(items) = obj.get("vibrate")? else {
            self.push("payload.vibrate", "expected array of numbers");
            return None;
        };
        let mut pattern = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match as_integer(item) {
                Some(n) => pattern.push(n),
                None => self.push(format!("payload.vibrate[{}]", i), "expected integer"),
            }
        }
        (pattern.len() == items.len()).then_some(pattern)
    }

    fn optional_actions(&mut self, obj: &Map<String, Value>) -> Option<Vec<NotificationAction>> {
        let Value::Array(items) = obj.get("actions")? else {
            self.push("payload.actions", "expected array");
            return None;
        };
        let mut actions = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let path = format!("payload.actions[{}]", i);
            let Some(entry) = item.as_object() else {
                self.push(path, "expected object");
                continue;
            };
            let mut field = |key: &str| match entry.get(key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(_) => {
                    self.push(format!("{}.{}", path, key), "expected string");
                    None
                }
                None => {
                    self.push(format!("{}.{}", path, key), "required");
                    None
                }
            };
            let (action, title, icon) = (field("action"), field("title"), field("icon"));
            if let (Some(action), Some(title), Some(icon)) = (action, title, icon) {
                actions.push(NotificationAction {
                    action,
                    title,
                    icon,
                });
            }
        }
        (actions.len() == items.len()).then_some(actions)
    }

    fn optional_data(&mut self, obj: &Map<String, Value>) -> Option<Map<String, Value>> {
        match obj.get("data")? {
            Value::Object(map) => Some(map.clone()),
            _ => {
                self.push("payload.data", "expected object");
                None
            }
        }
    }
}
