//! Typed views of the Discord API responses this service consumes.

use serde::Deserialize;

/// Response to the OAuth authorization-code exchange
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchange {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

/// `/users/@me` response
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Identity {
    /// Display name: the legacy `name#discriminator` form unless the
    /// account has migrated (discriminator "0"), in which case the plain
    /// username is used.
    pub fn display_name(&self) -> String {
        match self.discriminator.as_deref() {
            Some("0") | Some("") | None => self.username.clone(),
            Some(disc) => format!("{}#{}", self.username, disc),
        }
    }
}

/// One entry of `/users/@me/guilds`: the caller's membership snapshot,
/// with an aggregate permission bitfield serialized as a decimal string
#[derive(Debug, Clone, Deserialize)]
pub struct MemberGuild {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub owner: bool,
    #[serde(default)]
    pub permissions: String,
}

impl MemberGuild {
    /// Aggregate permission bits; unparsable values degrade to no
    /// permissions rather than failing the request.
    pub fn permission_bits(&self) -> u64 {
        self.permissions.parse().unwrap_or(0)
    }
}

/// `/guilds/{id}` response (bot token)
#[derive(Debug, Clone, Deserialize)]
pub struct Guild {
    pub id: String,
    pub owner_id: String,
}

/// One role from `/guilds/{id}/roles` (bot token)
#[derive(Debug, Clone, Deserialize)]
pub struct GuildRole {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub permissions: String,
    #[serde(default)]
    pub position: i64,
}

impl GuildRole {
    pub fn permission_bits(&self) -> u64 {
        self.permissions.parse().unwrap_or(0)
    }
}

/// `/guilds/{id}/members/{user_id}` response (bot token)
#[derive(Debug, Clone, Deserialize)]
pub struct GuildMember {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// One channel from `/guilds/{id}/channels` (bot token)
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_legacy_and_migrated() {
        let legacy = Identity {
            id: "1".into(),
            username: "tester".into(),
            discriminator: Some("1234".into()),
            global_name: None,
            avatar: None,
        };
        assert_eq!(legacy.display_name(), "tester#1234");

        let migrated = Identity {
            id: "1".into(),
            username: "tester".into(),
            discriminator: Some("0".into()),
            global_name: Some("Tester".into()),
            avatar: None,
        };
        assert_eq!(migrated.display_name(), "tester");
    }

    #[test]
    fn test_permission_bits_parsing() {
        let guild = MemberGuild {
            id: "1".into(),
            name: "g".into(),
            icon: None,
            owner: false,
            permissions: "1099511627775".into(), // 2^40 - 1, wider than 32 bits
        };
        assert_eq!(guild.permission_bits(), (1u64 << 40) - 1);

        let bad = MemberGuild {
            permissions: "not-a-number".into(),
            ..guild
        };
        assert_eq!(bad.permission_bits(), 0);
    }
}
