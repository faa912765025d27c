pub mod cli;
pub mod output;

pub use cli::{dispatch, Cli, Command};
pub use output::{describe_error, failure_summary, render};
