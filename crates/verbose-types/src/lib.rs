//! Core types and traits for verbose permission-check recording.
//!
//! The recorder only talks to its collaborators (filter, notifier, publisher, clock) through
//! the traits defined here, so front-ends can plug in their own implementations.

mod dto;
mod event;
mod traits;

pub use dto::*;
pub use event::*;
pub use traits::*;
