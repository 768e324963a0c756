//! Route tables.

pub mod rest;
pub use rest::rest_routes;
