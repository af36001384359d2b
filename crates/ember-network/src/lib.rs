//! Wire framing and peer protocol messages for Ember nodes.

pub mod frame;
pub mod message;
