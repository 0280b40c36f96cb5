//! Domain definitions.

pub mod member;
pub mod permission;
pub mod role;

pub use self::{member::Member, permission::Permission, role::Role};
