//! Role entity

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Role entity
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub permissions: u64,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
}

impl Role {
    /// Check if the role grants a permission bit
    #[inline]
    #[must_use]
    pub fn has_permission(&self, bit: u64) -> bool {
        self.permissions & bit == bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permission_bits() {
        let role = Role {
            id: Snowflake::new(1),
            permissions: 0b1010,
            ..Role::default()
        };
        assert!(role.has_permission(0b0010));
        assert!(role.has_permission(0b1010));
        assert!(!role.has_permission(0b0100));
    }

    #[test]
    fn test_role_from_payload() {
        let role: Role = serde_json::from_str(
            r#"{"id": "7", "name": "admin", "color": 255, "position": 3, "permissions": 8}"#,
        )
        .unwrap();
        assert_eq!(role.id, Snowflake::new(7));
        assert_eq!(role.name, "admin");
        assert!(role.has_permission(8));
    }
}
