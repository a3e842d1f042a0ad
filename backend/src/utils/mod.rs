//! Collection of general utility modules.
//!
//! Password policy and hashing, token management and identifier
//! validation. None of these touch the database.

pub mod identifier;
pub mod jwt;
pub mod password;
