//! Netgear router client for the SOAP control API
//!
//! [`Router`] owns one session: it finds the router, negotiates which login
//! RPC the firmware speaks, and wraps configuration changes in the
//! start/finish bracket the firmware expects.

pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod models;
pub mod parser;
pub mod protocol;
pub mod router;
pub mod session;
pub mod soap;
pub mod utils;
pub mod wol;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{AllowOrBlock, AttachedDevice, DiscoveredRouter, GuestBand};
pub use router::{Commit, LoginOptions, Router};
pub use session::LoginMethod;
