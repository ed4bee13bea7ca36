pub mod auth;
pub mod challenge;
pub mod comments;
pub mod health;
pub mod posts;
pub mod recovery;
pub mod votes;
