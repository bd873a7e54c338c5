//! Access to the `fortune` program.
//!
//! Handlers depend on the [`FortuneBackend`] trait; [`CommandBackend`]
//! implements it by running the executable.

mod backend;
mod command;
mod options;

pub use backend::{FortuneBackend, FortuneResponse, SearchResponse};
pub use command::CommandBackend;
pub use options::FortuneOptions;
