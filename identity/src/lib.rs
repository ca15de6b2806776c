//! Party/identity model for the authorization core.
//!
//! A [`Party`] is any identity that can hold role memberships; [`User`] and
//! [`Group`] are its two concrete kinds. Group rosters live here too, as raw
//! store operations — privilege enforcement for membership changes happens
//! in the authz crate's guarded manager, not at this layer.

pub mod error;
pub mod group;
pub mod party;
pub mod user;

pub use error::{IdentityError, Result};
pub use group::{Group, GroupMembership, GroupRepository};
pub use party::{Party, PartyKind, PartyRepository, validate_name, MAX_NAME_LENGTH};
pub use user::{User, UserRepository};
