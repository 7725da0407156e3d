//! layerconf CLI library
//!
//! Exposes the CLI entry point plus the clap adapter that lets other
//! binaries bind their parsed arguments into a resolver.

mod cli;
pub mod flags;

pub use cli::run;
pub use flags::{bind_arg_matches, ClapFlag};
