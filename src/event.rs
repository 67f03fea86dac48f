//! Inbound domain change events and the queue message parser.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::validation::{normalize_domain, validate_fqdn_ascii};

/// Requested direction for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    #[serde(rename = "Y")]
    Activate,
    #[serde(rename = "N")]
    Deactivate,
}

impl Activation {
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "Y" => Some(Activation::Activate),
            "N" => Some(Activation::Deactivate),
            _ => None,
        }
    }

    pub fn as_status(self) -> &'static str {
        match self {
            Activation::Activate => "Y",
            Activation::Deactivate => "N",
        }
    }
}

/// One activation or deactivation request as published by the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainChangeEvent {
    pub domain: String,
    /// Always present for activations.
    pub tenant_id: Option<String>,
    pub active: Activation,
    pub zone_hint: Option<i64>,
}

impl DomainChangeEvent {
    pub fn activate(domain: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            tenant_id: Some(tenant_id.into()),
            active: Activation::Activate,
            zone_hint: None,
        }
    }

    pub fn deactivate(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            tenant_id: None,
            active: Activation::Deactivate,
            zone_hint: None,
        }
    }

    pub fn with_zone_hint(mut self, zone_hint: i64) -> Self {
        self.zone_hint = Some(zone_hint);
        self
    }
}

#[derive(Debug, Error)]
pub enum MalformedMessage {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("body is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` has the wrong type")]
    WrongType(&'static str),
    #[error("invalid active_status `{0}` (must be 'Y' or 'N')")]
    InvalidStatus(String),
}

/// Parse a queue message body into a [`DomainChangeEvent`].
///
/// Accepts both a bare event object and an SNS notification whose `Message`
/// field carries the event as a JSON string.
pub fn parse_message_body(body: &str) -> Result<DomainChangeEvent, MalformedMessage> {
    let outer: Value = serde_json::from_str(body)?;
    let payload = match outer.get("Message") {
        Some(Value::String(inner)) => serde_json::from_str(inner)?,
        Some(_) => return Err(MalformedMessage::WrongType("Message")),
        None => outer,
    };
    let Value::Object(fields) = payload else {
        return Err(MalformedMessage::NotAnObject);
    };

    let raw_domain = required_str(&fields, "full_url")?;
    let status = required_str(&fields, "active_status")?;
    let active = Activation::from_status(status)
        .ok_or_else(|| MalformedMessage::InvalidStatus(status.to_string()))?;

    let domain = normalize_domain(raw_domain);
    if domain.is_empty() {
        return Err(MalformedMessage::MissingField("full_url"));
    }
    // registry rows may hold names outside strict hostname syntax
    if let Err(err) = validate_fqdn_ascii(&domain) {
        warn!(%domain, error = %err, "domain is not a strict hostname, processing anyway");
    }

    let tenant_id = match fields.get("tenant_id") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(_) => return Err(MalformedMessage::WrongType("tenant_id")),
    };
    if active == Activation::Activate && tenant_id.is_none() {
        return Err(MalformedMessage::MissingField("tenant_id"));
    }

    let zone_hint = match fields.get("hosted_zone_id") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let hint = v.as_i64();
            if hint.is_none() {
                warn!(%domain, value = %v, "ignoring non-integer hosted_zone_id");
            }
            hint
        }
    };

    Ok(DomainChangeEvent {
        domain,
        tenant_id,
        active,
        zone_hint,
    })
}

fn required_str<'a>(
    fields: &'a serde_json::Map<String, Value>,
    name: &'static str,
) -> Result<&'a str, MalformedMessage> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(MalformedMessage::MissingField(name)),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(MalformedMessage::WrongType(name)),
    }
}
