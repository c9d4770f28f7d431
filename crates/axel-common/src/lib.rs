pub mod config;
pub mod logging;
pub mod paths;
pub mod repos;

pub const APP_NAME: &str = "axel";

pub use config::{AxelConfig, ConfigError, DiscordConfig, TokenPlaceConfig};
pub use repos::RepoList;
