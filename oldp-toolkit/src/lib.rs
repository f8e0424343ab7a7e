pub mod cli;
pub mod upload;

pub use cli::{run, Cli, Commands};
