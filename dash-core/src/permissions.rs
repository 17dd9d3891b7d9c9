//! Permission-bitmask resolution for guild resources.
//!
//! Pure computation over a snapshot of role data: no I/O, no hidden
//! state, deterministic for a given input. Bitmasks are `u64` because the
//! platform defines permission bits above the 32-bit range.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Administrator permission bit
pub const ADMINISTRATOR: u64 = 1 << 3;
/// Manage-guild ("Manage Server") permission bit
pub const MANAGE_GUILD: u64 = 1 << 5;
/// The policy used by every dashboard write path: either bit suffices.
pub const MANAGE_ANY: u64 = ADMINISTRATOR | MANAGE_GUILD;

/// A single role: id plus its permission bitmask
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub id: String,
    pub permissions: u64,
}

/// Role lookup table for one guild.
///
/// The guild's default (`@everyone`) role has an id equal to the guild's
/// own id; its grant applies to every member.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoleSet {
    roles: HashMap<String, u64>,
}

impl RoleSet {
    pub fn from_roles<I: IntoIterator<Item = Role>>(roles: I) -> Self {
        Self {
            roles: roles
                .into_iter()
                .map(|role| (role.id, role.permissions))
                .collect(),
        }
    }

    pub fn get(&self, role_id: &str) -> Option<u64> {
        self.roles.get(role_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// A guild member as seen by the resolver: identity plus assigned role ids
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub user_id: String,
    pub role_ids: Vec<String>,
}

/// The resource being administered: a guild and its owner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuildResource {
    pub id: String,
    pub owner_id: String,
}

/// Effective permission bitmask for `member` in `resource`: the default
/// role's bits OR-ed with every assigned role that resolves in `roles`.
/// Unknown role ids are skipped silently; a stale assignment is not an
/// error. Order-independent over `member.role_ids`.
pub fn effective_bits(resource: &GuildResource, roles: &RoleSet, member: &Member) -> u64 {
    let mut bits = roles.get(&resource.id).unwrap_or(0);
    for role_id in &member.role_ids {
        if let Some(role_bits) = roles.get(role_id) {
            bits |= role_bits;
        }
    }
    bits
}

/// Whether `member` may administer `resource`.
///
/// The resource owner is always authorized, regardless of role bits.
/// Otherwise the member's effective bits must intersect `required_any`
/// (any single required bit suffices).
pub fn is_authorized(
    resource: &GuildResource,
    roles: &RoleSet,
    member: &Member,
    required_any: u64,
) -> bool {
    if member.user_id == resource.owner_id {
        return true;
    }
    effective_bits(resource, roles, member) & required_any != 0
}

/// Policy check for an aggregate permission snapshot, as returned by the
/// identity API's guild-membership listing (`owner` flag plus a single
/// combined bitmask per guild).
pub fn snapshot_allows(permission_bits: u64, required_any: u64, is_owner: bool) -> bool {
    is_owner || permission_bits & required_any != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guild() -> GuildResource {
        GuildResource {
            id: "555".to_string(),
            owner_id: "owner-1".to_string(),
        }
    }

    fn member(user_id: &str, role_ids: &[&str]) -> Member {
        Member {
            user_id: user_id.to_string(),
            role_ids: role_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn roles(entries: &[(&str, u64)]) -> RoleSet {
        RoleSet::from_roles(entries.iter().map(|(id, bits)| Role {
            id: id.to_string(),
            permissions: *bits,
        }))
    }

    #[test]
    fn test_effective_bits_unions_default_and_assigned() {
        let set = roles(&[("555", 0x1), ("a", 0x8), ("b", 0x20)]);
        let bits = effective_bits(&guild(), &set, &member("u", &["a", "b"]));
        assert_eq!(bits, 0x1 | 0x8 | 0x20);
    }

    #[test]
    fn test_effective_bits_order_independent() {
        let set = roles(&[("555", 0x1), ("a", 0x8), ("b", 0x20), ("c", 0x400)]);
        let forward = effective_bits(&guild(), &set, &member("u", &["a", "b", "c"]));
        let reversed = effective_bits(&guild(), &set, &member("u", &["c", "b", "a"]));
        let shuffled = effective_bits(&guild(), &set, &member("u", &["b", "c", "a"]));
        assert_eq!(forward, reversed);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_unknown_role_ids_skipped() {
        let set = roles(&[("555", 0x0), ("a", 0x8)]);
        let bits = effective_bits(&guild(), &set, &member("u", &["a", "deleted-role"]));
        assert_eq!(bits, 0x8);
    }

    #[test]
    fn test_missing_default_role_contributes_nothing() {
        let set = roles(&[("a", 0x8)]);
        assert_eq!(effective_bits(&guild(), &set, &member("u", &["a"])), 0x8);
        assert_eq!(effective_bits(&guild(), &set, &member("u", &[])), 0);
    }

    #[test]
    fn test_wide_bitmasks_do_not_overflow() {
        let high_bit = 1u64 << 40;
        let set = roles(&[("555", 1 << 35), ("a", high_bit)]);
        let bits = effective_bits(&guild(), &set, &member("u", &["a"]));
        assert_eq!(bits, (1 << 35) | high_bit);
        assert!(bits > u32::MAX as u64);
    }

    #[test]
    fn test_admin_role_authorizes() {
        let set = roles(&[("555", 0x0), ("a", ADMINISTRATOR)]);
        assert!(is_authorized(
            &guild(),
            &set,
            &member("u", &["a"]),
            MANAGE_ANY
        ));
        assert!(!is_authorized(&guild(), &set, &member("u", &[]), MANAGE_ANY));
    }

    #[test]
    fn test_either_required_bit_suffices() {
        let set = roles(&[("555", 0x0), ("m", MANAGE_GUILD)]);
        assert!(is_authorized(
            &guild(),
            &set,
            &member("u", &["m"]),
            MANAGE_ANY
        ));
    }

    #[test]
    fn test_owner_bypasses_role_bits() {
        let empty = RoleSet::default();
        assert!(is_authorized(
            &guild(),
            &empty,
            &member("owner-1", &[]),
            MANAGE_ANY
        ));
        // Non-owner with the same (empty) role set is denied.
        assert!(!is_authorized(
            &guild(),
            &empty,
            &member("someone-else", &[]),
            MANAGE_ANY
        ));
    }

    #[test]
    fn test_determinism() {
        let set = roles(&[("555", 0x3), ("a", 1 << 40)]);
        let m = member("u", &["a"]);
        let first = effective_bits(&guild(), &set, &m);
        for _ in 0..10 {
            assert_eq!(effective_bits(&guild(), &set, &m), first);
        }
    }

    #[test]
    fn test_snapshot_allows() {
        assert!(snapshot_allows(ADMINISTRATOR, MANAGE_ANY, false));
        assert!(snapshot_allows(MANAGE_GUILD, MANAGE_ANY, false));
        assert!(snapshot_allows(0, MANAGE_ANY, true));
        assert!(!snapshot_allows(0x4, MANAGE_ANY, false));
    }
}
