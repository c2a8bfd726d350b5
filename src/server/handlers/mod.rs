pub mod conversation;
pub mod corpus;
pub mod health;
pub mod query;
