//! Unified media player core for the MeeNews client
//!
//! Audio, video and articles (with optional text-to-speech) play behind one
//! transport API: [`controller::PlayerController`]. Content type decides which
//! [`backend::PlaybackBackend`] is live; platform facilities are injected
//! through the traits in [`platform`].

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod model;
pub mod platform;
pub mod tts;
pub mod view;

pub use controller::{Capabilities, PlayerController, PlayerOptions};
pub use error::{PlayerError, Result};
