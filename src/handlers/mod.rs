//! HTTP handlers for controller-backed resources.

pub mod rest;
pub use rest::*;
