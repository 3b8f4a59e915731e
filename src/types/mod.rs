//! Shared types for Refiner.

pub mod config;
pub mod errors;
pub mod requests;
pub mod responses;
