use std::{
    borrow::Borrow,
    fmt::{Debug, Display},
};

use rand::{distributions::Uniform, thread_rng, Rng};
use serde::{Deserialize, Serialize};

pub mod game;
pub mod net;

/// Version exchanged with the hub during the connection handshake.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const GAME_CODE_LEN: usize = 6;
pub const PLAYER_ID_LEN: usize = 11;
pub const MAX_NAME_LEN: usize = 50;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// Setup Newtype pattern for IDs
macro_rules! decl_id {
    ($name:ident) => {
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize, Hash)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Debug for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                <Self as Display>::fmt(self, f)
            }
        }
        impl Display for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(v: String) -> Self {
                Self(v)
            }
        }
        impl From<&str> for $name {
            #[inline]
            fn from(v: &str) -> Self {
                Self(v.to_owned())
            }
        }
        impl From<$name> for String {
            #[inline]
            fn from(v: $name) -> Self {
                v.0
            }
        }

        impl Borrow<str> for $name {
            #[inline]
            fn borrow(&self) -> &str {
                &self.0
            }
        }
        impl PartialEq<str> for $name {
            #[inline]
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }
        impl PartialEq<&str> for $name {
            #[inline]
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

decl_id!(PlayerId);
decl_id!(GameCode);

impl GameCode {
    /// Name of the broadcast topic that every participant of this game subscribes to.
    pub fn topic(&self) -> String {
        format!("pubgolf:{}", self.0)
    }
}

fn random_base36(len: usize) -> String {
    let digits = Uniform::from(0..BASE36.len());
    thread_rng()
        .sample_iter(digits)
        .take(len)
        .map(|i| BASE36[i] as char)
        .collect()
}

/// A fresh six character, upper-case, base-36 game code.
pub fn generate_game_code() -> GameCode {
    random_base36(GAME_CODE_LEN).to_uppercase().into()
}

/// A fresh opaque player token. Also used as the identity of a channel endpoint.
pub fn generate_player_id() -> PlayerId {
    random_base36(PLAYER_ID_LEN).into()
}
