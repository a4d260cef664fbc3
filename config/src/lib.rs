pub mod paths;
pub mod settings;

pub use paths::PathManager;
pub use settings::{ProfileSettings, Settings};

/// Environment variable that overrides `base_url` from settings.toml
pub const BASE_URL_ENV: &str = "LIVESYNC_BASE_URL";

/// Load environment variables from .env files.
/// Values from ./.env (project directory) take precedence over ~/.env.
/// dotenv never overwrites a variable that is already set, so the project
/// file is read first. Call this before parsing CLI args.
pub fn load_env_file() {
    dotenv::dotenv().ok();

    if let Some(home) = dirs::home_dir() {
        dotenv::from_path(home.join(".env")).ok();
    }
}
