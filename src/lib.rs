//! Records interactions with a web page and turns them into an illustrated
//! step-by-step guide.
//!
//! The browser is reached through the collaborator traits in
//! [`recorder::page`], [`recorder::capture`], [`recorder::video`],
//! [`recorder::manual`] and [`recorder::storage`]. The [`agent`] runs inside
//! the page, the [`control`] panel drives it over [`relay`] and renders
//! the result with [`export`].

pub mod agent;
pub mod config;
pub mod control;
pub mod error;
pub mod export;
pub mod messages;
pub mod recorder;
pub mod relay;

pub use agent::{spawn, AgentDeps, AgentHandle};
pub use control::{ControlError, ControlPanel};
pub use error::{Error, Result};
