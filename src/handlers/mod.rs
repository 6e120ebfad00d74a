//! HTTP handlers

pub mod health;
pub mod live;
pub mod pipeline;
