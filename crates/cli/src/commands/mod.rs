//! CLI Commands

pub mod config;
pub mod get;
pub mod retry;
pub mod users;
