//! Infrastructure layer - Storage, credentials and logging

pub mod logging;
pub mod user;
