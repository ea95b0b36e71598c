//! CLI command handlers, one file per subcommand.

mod completions;
mod config;
mod dates;
mod download;

pub use completions::run_completions;
pub use config::run_config;
pub use dates::run_dates;
pub use download::run_download;
