//! Application services and the error types they share.

pub mod error;
pub mod posts;
pub mod repos;
pub mod settings;
pub mod users;
