//! Member entity - a user's membership in a guild

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::User;
use crate::value_objects::Snowflake;

/// Guild member entity (junction between User and Guild)
///
/// Stored in the per-guild member hash keyed by user id. The embedded user
/// only carries ids and profile scalars; the user table owns the canonical
/// entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: User,
    /// Filled from the enclosing event when the payload omits it
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub nick: Option<String>,
    /// Role ids held by the member
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub premium_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
}

impl Member {
    /// Get display name (nickname if set, otherwise the username)
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or(&self.user.username)
    }

    /// Check if member has a specific role
    #[inline]
    #[must_use]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }

    /// Inherit fields from a previously cached entry
    ///
    /// Update payloads may omit `joined_at`; the cached value survives the
    /// replace.
    pub fn inherit_from(&mut self, cached: &Member) {
        if self.joined_at.is_none() {
            self.joined_at = cached.joined_at;
        }
        if self.guild_id.is_none() {
            self.guild_id = cached.guild_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let mut member = Member {
            user: User {
                id: Snowflake::new(1),
                username: "tester".to_string(),
                ..User::default()
            },
            ..Member::default()
        };
        assert_eq!(member.display_name(), "tester");

        member.nick = Some("nickname".to_string());
        assert_eq!(member.display_name(), "nickname");
    }

    #[test]
    fn test_has_role() {
        let member = Member {
            roles: vec![Snowflake::new(10), Snowflake::new(20)],
            ..Member::default()
        };
        assert!(member.has_role(Snowflake::new(10)));
        assert!(!member.has_role(Snowflake::new(30)));
    }

    #[test]
    fn test_inherit_from_cached() {
        let cached = Member {
            guild_id: Some(Snowflake::new(1)),
            joined_at: Some(chrono::Utc::now()),
            ..Member::default()
        };
        let mut updated = Member::default();
        updated.inherit_from(&cached);
        assert_eq!(updated.guild_id, cached.guild_id);
        assert_eq!(updated.joined_at, cached.joined_at);
    }

    #[test]
    fn test_member_from_payload() {
        let member: Member = serde_json::from_str(
            r#"{"user": {"id": "2", "username": "t"}, "roles": ["5"], "nick": null}"#,
        )
        .unwrap();
        assert_eq!(member.user.id, Snowflake::new(2));
        assert_eq!(member.roles, vec![Snowflake::new(5)]);
        assert!(member.nick.is_none());
    }
}
