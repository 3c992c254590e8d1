pub use error::{FrameError, ProtocolError};
pub use message::{Envelope, HubFrame, Message};

pub mod connection;
mod error;
mod message;
