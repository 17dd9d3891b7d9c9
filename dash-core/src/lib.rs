//! Stateless session and authorization primitives for the guild dashboard.
//!
//! Everything in this crate is synchronous and side-effect free: signed
//! token construction/verification ([`token`], [`session`]) and pure
//! permission-bitmask resolution ([`permissions`]). The server crate owns
//! all I/O.

pub mod permissions;
pub mod session;
pub mod token;

pub use permissions::{
    effective_bits, is_authorized, snapshot_allows, GuildResource, Member, Role, RoleSet,
    ADMINISTRATOR, MANAGE_ANY, MANAGE_GUILD,
};
pub use session::{
    SessionIdentity, SessionPayload, StatePayload, Tokens, SESSION_TTL_MAX_SECS,
    SESSION_TTL_MIN_SECS,
};
pub use token::{TokenCodec, TokenError};
