//! [`Command`] definition.

pub mod authorize_member;
pub mod create_member_session;
pub mod delete_member_session;
pub mod register_member;
pub mod validate_member_session;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_member::AuthorizeMember,
    create_member_session::CreateMemberSession,
    delete_member_session::DeleteMemberSession,
    register_member::RegisterMember,
    validate_member_session::ValidateMemberSession,
};
