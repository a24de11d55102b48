//! Core types and dispatch rules for the binwatch bin fullness alerter.

/// Deduplication state and SMS fan-out for critical readings.
pub mod dispatch;
/// Alert text rendering.
pub mod message;
/// Domain models and identifiers shared by all adapters.
pub mod model;
/// Contact number normalization and validation.
pub mod phone;
/// Traits describing the document store and SMS gateway.
pub mod ports;
/// Change feed consumption loop.
pub mod watcher;

pub use dispatch::*;
pub use message::*;
pub use model::*;
pub use phone::*;
pub use ports::*;
pub use watcher::*;
