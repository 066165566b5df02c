//! # versus-core
//! Foundation types, store traits, configuration and the pure ranking
//! building blocks (score formulas, spoiler policy, diversity filter).

pub mod comparison;
pub mod config;
pub mod diversity;
pub mod error;
pub mod score;
pub mod spoiler;
pub mod traits;
pub mod types;

pub use config::EngineConfig;
pub use error::VersusError;
pub use spoiler::{ItemScope, SpoilerLevel};
