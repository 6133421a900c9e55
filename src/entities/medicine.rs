use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TABLE: &str = "medicines";

pub mod col {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const MANUFACTURER: &str = "manufacturer";
    pub const UNIT_TYPE: &str = "unit_type";
}

/// Catalog entry shared across purchase lines, snapshots, and ledger rows.
/// Reclaimed only once nothing references it anywhere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub manufacturer: String,
    pub unit_type: String,
}

impl Medicine {
    /// A catalog row created on the fly during a line edit, before anyone
    /// has filled in the details.
    pub fn with_placeholder_details(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            manufacturer: "Unknown".to_string(),
            unit_type: "Unknown".to_string(),
        }
    }
}
