pub mod handler;
pub mod signature;

use serde::Deserialize;
use thiserror::Error;

use crate::messaging::PushMessageRequest;

/// Why an inbound payload could not be turned into an [`Event`].
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("request body is not a webhook payload: {0}")]
    MalformedBody(String),
    #[error("webhook payload contains no events")]
    MissingEvent,
    #[error("event has no source")]
    MissingSource,
    #[error("event source has no type")]
    MissingSourceType,
    #[error("{source_type} source is missing {field}")]
    MissingSourceId {
        source_type: &'static str,
        field: &'static str,
    },
}

/// Where an event came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Group { group_id: String },
    User { user_id: String },
    /// Any other source type (e.g. "room"); carried through but not replied to.
    Other(String),
}

impl Source {
    /// The reply announcing this source's identifier, if the type gets one.
    pub fn id_reply(&self) -> Option<PushMessageRequest> {
        match self {
            Source::Group { group_id } => Some(PushMessageRequest::text(
                group_id.as_str(),
                id_info_message(group_id, "group"),
            )),
            Source::User { user_id } => Some(PushMessageRequest::text(
                user_id.as_str(),
                id_info_message(user_id, "user"),
            )),
            Source::Other(_) => None,
        }
    }
}

fn id_info_message(id: &str, kind: &str) -> String {
    format!("Your API {kind}ID is: {id}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub source: Source,
}

/// A parsed webhook delivery: the first event plus how many were skipped.
#[derive(Debug)]
pub struct FirstEvent {
    pub event: Event,
    pub ignored: usize,
}

/// A rejected payload, with the offending event when there was one.
#[derive(Debug)]
pub struct InvalidPayload {
    pub reason: ValidationError,
    pub event: Option<serde_json::Value>,
}

impl InvalidPayload {
    fn new(reason: ValidationError, event: Option<serde_json::Value>) -> Self {
        Self { reason, event }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    events: Vec<serde_json::Value>,
}

/// JavaScript-style truthiness: null, false, 0 and "" count as absent.
fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn required_id(
    source: &serde_json::Value,
    source_type: &'static str,
    field: &'static str,
) -> Result<String, ValidationError> {
    source
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or(ValidationError::MissingSourceId { source_type, field })
}

impl TryFrom<&serde_json::Value> for Source {
    type Error = ValidationError;

    fn try_from(source: &serde_json::Value) -> Result<Self, Self::Error> {
        let source_type = source
            .get("type")
            .filter(|t| is_truthy(t))
            .ok_or(ValidationError::MissingSourceType)?;

        // Only group and user sources need a usable id; anything else passes
        // through whatever other fields it carries.
        match source_type.as_str() {
            Some("group") => Ok(Source::Group {
                group_id: required_id(source, "group", "groupId")?,
            }),
            Some("user") => Ok(Source::User {
                user_id: required_id(source, "user", "userId")?,
            }),
            Some(other) => Ok(Source::Other(other.to_string())),
            None => Ok(Source::Other(source_type.to_string())),
        }
    }
}

/// Parse a single event object. Fields other than `source` are ignored.
pub fn parse_event(value: &serde_json::Value) -> Result<Event, ValidationError> {
    let source = match value.get("source") {
        Some(s) if is_truthy(s) => s,
        _ => return Err(ValidationError::MissingSource),
    };

    Ok(Event {
        source: Source::try_from(source)?,
    })
}

/// Parse a raw webhook body and keep only `events[0]`. Later events in the
/// batch are counted, not validated.
pub fn parse_first_event(body: &[u8]) -> Result<FirstEvent, InvalidPayload> {
    let payload: WebhookBody = serde_json::from_slice(body).map_err(|e| {
        InvalidPayload::new(ValidationError::MalformedBody(e.to_string()), None)
    })?;

    let mut events = payload.events.into_iter();
    let first = events
        .next()
        .ok_or_else(|| InvalidPayload::new(ValidationError::MissingEvent, None))?;

    let event = match parse_event(&first) {
        Ok(event) => event,
        Err(reason) => return Err(InvalidPayload::new(reason, Some(first))),
    };

    Ok(FirstEvent {
        event,
        ignored: events.count(),
    })
}
