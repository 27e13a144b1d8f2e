use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::broker::Headers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Dispatched,
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Processing => "processing",
            OutboxStatus::Dispatched => "dispatched",
        })
    }
}

/// A serialized event waiting to be published.
///
/// Ids are UUIDv7, so sorting by id follows creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxRecord {
    pub id: Uuid,
    pub topic: String,
    pub payload: Vec<u8>,
    #[serde(default)]
    pub headers: Headers,
    pub status: OutboxStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxRecord {
    /// A new record in `pending` with a fresh time-ordered id.
    pub fn pending(topic: impl Into<String>, payload: Vec<u8>, headers: Headers) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            topic: topic.into(),
            payload,
            headers,
            status: OutboxStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn transition(&mut self, status: OutboxStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
