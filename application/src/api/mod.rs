//! GraphQL API definitions.

pub mod member;
mod mutation;
mod query;
pub mod scalar;
mod subscription;

pub use self::{
    member::{Member, Permission},
    mutation::Mutation,
    query::Query,
    subscription::Subscription,
};

/// GraphQL schema.
pub type Schema = juniper::RootNode<'static, Query, Mutation, Subscription>;
