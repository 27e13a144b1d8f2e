//! Self-validating message envelope shared by every topic.
//!
//! On the wire an event is a flat JSON object. The fixed fields are listed in
//! [`FIXED_FIELDS`]; any other top-level field is an extension and round-trips
//! through [`Event::extensions`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const SPEC_VERSION: &str = "1.0";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Top-level wire fields owned by the envelope itself.
pub const FIXED_FIELDS: [&str; 9] = [
    "specversion",
    "id",
    "source",
    "type",
    "datacontenttype",
    "time",
    "data",
    "correlationid",
    "causationid",
];

/// Unix timestamp of `0001-01-01T00:00:00Z`, the zero instant some producers
/// emit instead of omitting `time`.
const ZERO_TIME_UNIX: i64 = -62_135_596_800;

/// A message envelope.
///
/// Construct with [`Event::new`] or [`Event::with_payload`], then chain the
/// `with_*` mutators:
///
/// ```
/// use media_pipeline::Event;
/// use serde_json::json;
///
/// let event = Event::new("com.mediapipeline.job.analyze.requested", json!({ "assetId": "a1" }))
///     .with_source("media-pipeline")
///     .with_correlation_id("job-0123456789abcdef")
///     .with_extension("attempt", 1);
///
/// assert!(event.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireEvent", from = "WireEvent")]
pub struct Event {
    pub spec_version: String,
    pub id: String,
    pub source: String,
    pub event_type: String,
    pub data_content_type: String,
    /// `None` means the zero time; such an event never validates.
    pub time: Option<DateTime<Utc>>,
    pub data: Value,
    pub correlation_id: Option<String>,
    pub causation_id: Option<String>,
    pub extensions: Map<String, Value>,
}

impl Event {
    /// Create an event with a fresh id, the current UTC time and the JSON
    /// content type. Source, correlation and causation start empty.
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            spec_version: SPEC_VERSION.to_string(),
            id: Uuid::new_v4().to_string(),
            source: String::new(),
            event_type: event_type.into(),
            data_content_type: CONTENT_TYPE_JSON.to_string(),
            time: Some(Utc::now()),
            data,
            correlation_id: None,
            causation_id: None,
            extensions: Map::new(),
        }
    }

    /// Create an event whose data is the JSON form of `payload`.
    pub fn with_payload<T: Serialize>(event_type: impl Into<String>, payload: &T) -> Result<Self> {
        let data = serde_json::to_value(payload)?;
        Ok(Self::new(event_type, data))
    }

    /// Set the producing service.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Tag the event with the job it belongs to.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Name the event that caused this one.
    pub fn with_causation_id(mut self, id: impl Into<String>) -> Self {
        self.causation_id = Some(id.into());
        self
    }

    /// Attach an extension field. Keys that collide with a fixed wire field
    /// are ignored.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if FIXED_FIELDS.contains(&key.as_str()) {
            tracing::warn!(
                key = %key,
                event_id = %self.id,
                "ignoring extension that shadows a fixed field"
            );
            return self;
        }
        self.extensions.insert(key, value.into());
        self
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    /// Look up an extension field by its wire name.
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    /// Check the envelope invariant: spec version, id, source and type are
    /// non-empty and the time is set.
    pub fn validate(&self) -> Result<()> {
        if self.spec_version.is_empty() {
            return Err(Error::validation("specversion is required"));
        }
        if self.id.is_empty() {
            return Err(Error::validation("id is required"));
        }
        if self.source.is_empty() {
            return Err(Error::validation("source is required"));
        }
        if self.event_type.is_empty() {
            return Err(Error::validation("type is required"));
        }
        if self.time.is_none() {
            return Err(Error::validation("time is required"));
        }
        Ok(())
    }

    /// Decode `data` into a typed payload.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        if self.data.is_null() {
            return Err(Error::validation(format!("event {} has no data", self.id)));
        }
        T::deserialize(&self.data).map_err(|err| {
            Error::validation(format!("event {} has malformed data: {}", self.id, err))
        })
    }

    /// Serialize to the flat wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse and validate a wire-format event.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let event: Event = serde_json::from_slice(bytes)
            .map_err(|err| Error::validation(format!("malformed event: {}", err)))?;
        event.validate()?;
        Ok(event)
    }

    /// Key used to place this event on a broker partition: the asset id when
    /// the payload carries one, then the bucket id, then the event id.
    pub fn partition_key(&self) -> String {
        ["assetId", "bucketId"]
            .iter()
            .find_map(|field| self.data.get(*field).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| self.id.clone())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(
                f,
                "Event{{ID: {}, Type: {}, Source: {}}}",
                self.id, self.event_type, self.source
            ),
        }
    }
}

/// Flat wire representation. Unknown top-level fields land in `extensions`.
#[derive(Serialize, Deserialize)]
struct WireEvent {
    #[serde(default)]
    specversion: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    source: String,
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    datacontenttype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlationid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    causationid: Option<String>,
    #[serde(flatten)]
    extensions: Map<String, Value>,
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        Self {
            specversion: event.spec_version,
            id: event.id,
            source: event.source,
            event_type: event.event_type,
            datacontenttype: event.data_content_type,
            time: event.time,
            data: event.data,
            correlationid: event.correlation_id,
            causationid: event.causation_id,
            extensions: event.extensions,
        }
    }
}

impl From<WireEvent> for Event {
    fn from(wire: WireEvent) -> Self {
        Self {
            spec_version: wire.specversion,
            id: wire.id,
            source: wire.source,
            event_type: wire.event_type,
            data_content_type: wire.datacontenttype,
            time: wire.time.filter(|t| t.timestamp() != ZERO_TIME_UNIX),
            data: wire.data,
            correlation_id: wire.correlationid.filter(|id| !id.is_empty()),
            causation_id: wire.causationid.filter(|id| !id.is_empty()),
            extensions: wire.extensions,
        }
    }
}
