//! Command implementations for the CLI.

mod brightness;
mod color;
mod config;
mod lightning;
mod mode;
mod name;
mod power;
mod scan;
mod status;
mod watch;

pub use brightness::cmd_brightness;
pub use color::{ColorArgs, cmd_color};
pub use config::cmd_config;
pub use lightning::cmd_lightning;
pub use mode::cmd_mode;
pub use name::cmd_name;
pub use power::cmd_power;
pub use scan::cmd_scan;
pub use status::cmd_status;
pub use watch::cmd_watch;
