//! HTTP handlers for the zone pipeline API.

pub mod operations;
pub mod pipeline;
pub mod staging;
