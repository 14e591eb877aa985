use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use super::order::OrderStatus;

/// Which path applied a status change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Confirmation,
    Webhook,
}

impl StatusSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusSource::Confirmation => "confirmation",
            StatusSource::Webhook => "webhook",
        }
    }
}

impl fmt::Display for StatusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown status source: {0}")]
pub struct UnknownStatusSource(pub String);

impl FromStr for StatusSource {
    type Err = UnknownStatusSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmation" => Ok(StatusSource::Confirmation),
            "webhook" => Ok(StatusSource::Webhook),
            other => Err(UnknownStatusSource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChanged {
    pub order_id: Uuid,
    pub order_number: String,
    pub user_id: Option<String>,
    pub previous: OrderStatus,
    pub current: OrderStatus,
    pub source: StatusSource,
    pub occurred_at: DateTime<Utc>,
}
