//! Data models

pub mod traffic;
pub mod incident;
pub mod notification;

pub use traffic::*;
pub use incident::*;
pub use notification::*;
