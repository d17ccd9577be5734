//! Emoji entity

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Custom emoji entity
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Emoji {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    /// Roles allowed to use this emoji, by id
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub require_colons: bool,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub animated: bool,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}
