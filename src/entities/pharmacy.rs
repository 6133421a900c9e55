use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TABLE: &str = "pharmacies";

pub mod col {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const LAST_EXPIRY_CLEANUP_AT: &str = "last_expiry_cleanup_at";
}

/// One pharmacy scope. Carries the timestamp of its last expiry cleanup run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pharmacy {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub last_expiry_cleanup_at: Option<DateTime<Utc>>,
}
