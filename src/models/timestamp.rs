//! Run timestamp model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Last recorded run of a service (one row per plugin, keyed `"plugin <name>"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Timestamp {
    pub id: i32,
    pub service: String,
    pub service_type: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub finish: Option<DateTime<Utc>>,
}

impl Timestamp {
    pub const SCRIPT_TYPE: &'static str = "script";
}
