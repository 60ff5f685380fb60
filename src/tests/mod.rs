//! In-memory stand-ins for the database and GitLab, and fixtures to build test data.

pub mod fixtures;
