//! CLI commands module.

mod config;
mod resolve;
mod track;
mod util;

pub use config::ConfigCommand;
pub use resolve::ResolveCommand;
pub use track::TrackCommand;

pub(crate) use util::*;
