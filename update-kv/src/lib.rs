pub mod cli;
pub mod consul;
pub mod load_config;

pub use cli::{run, Cli};
