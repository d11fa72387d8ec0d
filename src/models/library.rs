//! Library model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A library whose plugin settings are scoped to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Library {
    pub id: i32,
    /// Short name used in admin URLs (e.g. "NYPL")
    pub short_name: String,
    pub name: Option<String>,
}
