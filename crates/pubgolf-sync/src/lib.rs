//! Peer synchronisation for a pub golf scoreboard.
//!
//! One device hosts a game and is the authority on its state. Every other device joins through a
//! [`channel::SyncChannel`] on the game's topic and mirrors whatever the host broadcasts.

pub mod channel;
pub mod config;
pub mod controller;
pub mod store;
pub mod transport;
