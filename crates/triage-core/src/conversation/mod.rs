//! Conversation control.
//!
//! Decides per turn whether to call the model, when to compact the
//! session history and when the dialogue is over.

mod controller;

pub use controller::*;
