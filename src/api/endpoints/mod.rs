//! API endpoint handlers, one module per resource.

pub mod admin;
pub mod auth;
pub mod exports;
pub mod health;
pub mod problems;
pub mod units;
pub mod workbooks;
