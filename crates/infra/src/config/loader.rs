//! Configuration loading.
//!
//! A config file (TOML or JSON) supplies the base configuration and
//! `TRELLIS_*` environment variables override individual settings on top
//! of it. With no file present the compiled-in defaults are the base, so a
//! deployment can be driven entirely by environment variables.
//!
//! The file is taken from `TRELLIS_CONFIG` when set; otherwise the working
//! directory is probed for `trellis.toml`, `trellis.json`, `config.toml`,
//! `config.json` in that order.
//!
//! Environment overrides:
//! - `TRELLIS_DB_PATH`, `TRELLIS_DB_POOL_SIZE`
//! - `TRELLIS_BIND_ADDR`
//! - `TRELLIS_GOOGLE_BASE_URL`, `TRELLIS_OUTLOOK_BASE_URL`,
//!   `TRELLIS_APPLE_BASE_URL`, `TRELLIS_FETCH_TIMEOUT_SECS`
//! - `TRELLIS_GOOGLE_CLIENT_ID` / `TRELLIS_GOOGLE_CLIENT_SECRET`
//! - `TRELLIS_OUTLOOK_CLIENT_ID` / `TRELLIS_OUTLOOK_CLIENT_SECRET`

use std::path::{Path, PathBuf};

use trellis_domain::{Config, OAuthClientConfig, Result, TrellisError};

const PROBE_NAMES: [&str; 4] = ["trellis.toml", "trellis.json", "config.toml", "config.json"];

/// Load the effective configuration: file base, environment on top.
pub fn load() -> Result<Config> {
    let mut config = match config_file_path() {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration file");
            read_config_file(&path)?
        }
        None => {
            tracing::debug!("no configuration file found, starting from defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Parse a single config file, with the format chosen by extension.
pub fn read_config_file(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TrellisError::Config(format!("cannot read config file {}: {e}", path.display()))
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&contents)
            .map_err(|e| TrellisError::Config(format!("invalid TOML in {}: {e}", path.display()))),
        Some("json") => serde_json::from_str(&contents)
            .map_err(|e| TrellisError::Config(format!("invalid JSON in {}: {e}", path.display()))),
        other => Err(TrellisError::Config(format!(
            "unsupported config extension {:?} for {}",
            other.unwrap_or(""),
            path.display()
        ))),
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("TRELLIS_CONFIG") {
        return Some(PathBuf::from(explicit));
    }

    let cwd = std::env::current_dir().ok()?;
    PROBE_NAMES.iter().map(|name| cwd.join(name)).find(|p| p.exists())
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(path) = std::env::var("TRELLIS_DB_PATH") {
        config.database.path = path;
    }
    if let Ok(size) = std::env::var("TRELLIS_DB_POOL_SIZE") {
        config.database.pool_size = size
            .parse()
            .map_err(|e| TrellisError::Config(format!("invalid TRELLIS_DB_POOL_SIZE: {e}")))?;
    }
    if let Ok(addr) = std::env::var("TRELLIS_BIND_ADDR") {
        config.server.bind_addr = addr;
    }

    let providers = &mut config.providers;
    if let Ok(url) = std::env::var("TRELLIS_GOOGLE_BASE_URL") {
        providers.google_base_url = url;
    }
    if let Ok(url) = std::env::var("TRELLIS_OUTLOOK_BASE_URL") {
        providers.outlook_base_url = url;
    }
    if let Ok(url) = std::env::var("TRELLIS_APPLE_BASE_URL") {
        providers.apple_base_url = url;
    }
    if let Ok(secs) = std::env::var("TRELLIS_FETCH_TIMEOUT_SECS") {
        providers.fetch_timeout_secs = secs
            .parse()
            .map_err(|e| TrellisError::Config(format!("invalid TRELLIS_FETCH_TIMEOUT_SECS: {e}")))?;
    }

    if let Some(oauth) = oauth_from_env("TRELLIS_GOOGLE_CLIENT_ID", "TRELLIS_GOOGLE_CLIENT_SECRET")?
    {
        providers.google_oauth = Some(oauth);
    }
    if let Some(oauth) =
        oauth_from_env("TRELLIS_OUTLOOK_CLIENT_ID", "TRELLIS_OUTLOOK_CLIENT_SECRET")?
    {
        providers.outlook_oauth = Some(oauth);
    }

    Ok(())
}

/// Both halves of a credential pair must be present; one without the other
/// is a misconfiguration worth failing on.
fn oauth_from_env(id_key: &str, secret_key: &str) -> Result<Option<OAuthClientConfig>> {
    match (std::env::var(id_key), std::env::var(secret_key)) {
        (Ok(client_id), Ok(client_secret)) => {
            Ok(Some(OAuthClientConfig { client_id, client_secret }))
        }
        (Err(_), Err(_)) => Ok(None),
        (Ok(_), Err(_)) => {
            Err(TrellisError::Config(format!("{id_key} is set but {secret_key} is not")))
        }
        (Err(_), Ok(_)) => {
            Err(TrellisError::Config(format!("{secret_key} is set but {id_key} is not")))
        }
    }
}
