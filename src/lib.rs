//! Blog API with a cascading resource cache and session-bound authentication.

pub mod application;
pub mod auth;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
