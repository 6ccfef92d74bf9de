//! Layered run configuration.
//!
//! # Precedence (lowest first)
//!
//! ```text
//! defaults            source = cwd, target = basename(cwd), watchman = "watchman"
//! ~/.config/gobin/config.yaml
//! <cwd>/.gobin.yaml
//! GOBIN_* environment variables
//! command-line flags
//! ~/.ssh/config Host block matching the resolved hostname
//! ```
//!
//! # API pattern
//!
//! [`resolve_at`] takes home, working directory and an environment lookup
//! explicitly and is what tests call; [`resolve`] derives all three from the
//! process and delegates.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

pub const USER_CONFIG_FILE: &str = "config.yaml";
pub const PROJECT_CONFIG_FILE: &str = ".gobin.yaml";
pub const DEFAULT_WATCHMAN: &str = "watchman";

/// One source's worth of settings. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identityfile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchman: Option<String>,
}

impl ConfigLayer {
    /// Values from `top` win wherever they are set.
    pub fn overlay(self, top: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            hostname: top.hostname.or(self.hostname),
            user: top.user.or(self.user),
            identityfile: top.identityfile.or(self.identityfile),
            source: top.source.or(self.source),
            target: top.target.or(self.target),
            watchman: top.watchman.or(self.watchman),
        }
    }
}

/// Fully resolved and validated settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub hostname: String,
    pub user: String,
    pub identity_file: PathBuf,
    /// Local directory to watch.
    pub source: PathBuf,
    /// Remote directory, relative to the remote user's home unless absolute.
    pub target: String,
    /// Watch daemon executable.
    pub watchman: PathBuf,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.config/gobin/config.yaml`
pub fn user_config_path(home: &Path) -> PathBuf {
    home.join(".config").join("gobin").join(USER_CONFIG_FILE)
}

/// `<cwd>/.gobin.yaml`
pub fn project_config_path(cwd: &Path) -> PathBuf {
    cwd.join(PROJECT_CONFIG_FILE)
}

/// `<home>/.ssh/config`
pub fn ssh_config_path(home: &Path) -> PathBuf {
    home.join(".ssh").join("config")
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

pub fn defaults(cwd: &Path) -> ConfigLayer {
    ConfigLayer {
        source: Some(cwd.to_path_buf()),
        target: cwd
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        watchman: Some(DEFAULT_WATCHMAN.to_string()),
        ..ConfigLayer::default()
    }
}

/// Load a YAML layer. A missing file is an empty layer.
pub fn load_file(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ConfigLayer::default()),
        Err(err) => return Err(io_err(path, err)),
    };
    if contents.trim().is_empty() {
        return Ok(ConfigLayer::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `GOBIN_HOSTNAME`, `GOBIN_USER`, `GOBIN_IDENTITYFILE`, `GOBIN_SOURCE`,
/// `GOBIN_TARGET`. Empty values count as unset.
pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> ConfigLayer {
    let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
    ConfigLayer {
        hostname: get("GOBIN_HOSTNAME"),
        user: get("GOBIN_USER"),
        identityfile: get("GOBIN_IDENTITYFILE"),
        source: get("GOBIN_SOURCE").map(PathBuf::from),
        target: get("GOBIN_TARGET"),
        watchman: None,
    }
}

/// Settings from the first `Host` block in an ssh config that names `alias`.
///
/// Only `HostName`, `User` and `IdentityFile` are read. Keywords are matched
/// case-insensitively; within a block the first value for a keyword wins,
/// as ssh itself does.
pub fn ssh_host_layer(contents: &str, alias: &str) -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    let mut in_block = false;
    let mut matched = false;

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(|c: char| c.is_whitespace() || c == '=') else {
            continue;
        };
        let key = key.to_ascii_lowercase();
        let value = value.trim_start_matches([' ', '\t', '=']).trim();

        if key == "host" || key == "match" {
            if matched {
                break;
            }
            in_block = key == "host"
                && value
                    .split_whitespace()
                    .any(|pattern| pattern.eq_ignore_ascii_case(alias));
            matched = in_block;
            continue;
        }
        if !in_block {
            continue;
        }

        let value = value.trim_matches('"').to_string();
        match key.as_str() {
            "hostname" if layer.hostname.is_none() => layer.hostname = Some(value),
            "user" if layer.user.is_none() => layer.user = Some(value),
            "identityfile" if layer.identityfile.is_none() => layer.identityfile = Some(value),
            _ => {}
        }
    }

    layer
}

fn load_ssh_layer(home: &Path, alias: &str) -> Result<ConfigLayer, ConfigError> {
    let path = ssh_config_path(home);
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(ssh_host_layer(&contents, alias)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(ConfigLayer::default()),
        Err(err) => Err(io_err(&path, err)),
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Merge every layer without validating.
pub fn merge_at(
    home: &Path,
    cwd: &Path,
    env: impl Fn(&str) -> Option<String>,
    flags: ConfigLayer,
) -> Result<ConfigLayer, ConfigError> {
    let merged = defaults(cwd)
        .overlay(load_file(&user_config_path(home))?)
        .overlay(load_file(&project_config_path(cwd))?)
        .overlay(from_env(env))
        .overlay(flags);

    match merged.hostname.clone() {
        Some(alias) => Ok(merged.overlay(load_ssh_layer(home, &alias)?)),
        None => Ok(merged),
    }
}

/// Merge and validate with explicit home, working directory and environment.
pub fn resolve_at(
    home: &Path,
    cwd: &Path,
    env: impl Fn(&str) -> Option<String>,
    flags: ConfigLayer,
) -> Result<Config, ConfigError> {
    validate(home, cwd, merge_at(home, cwd, env, flags)?)
}

/// Resolve from the real process environment.
pub fn resolve(flags: ConfigLayer) -> Result<Config, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
    resolve_at(&home, &cwd, |key| std::env::var(key).ok(), flags)
}

fn validate(home: &Path, cwd: &Path, layer: ConfigLayer) -> Result<Config, ConfigError> {
    let hostname = required(layer.hostname, "hostname")?;
    let user = required(layer.user, "user")?;
    let identityfile = required(layer.identityfile, "identityfile")?;

    let identity_file = expand_home(home, &identityfile);
    if !identity_file.exists() {
        return Err(ConfigError::IdentityFileNotFound(identity_file));
    }

    let source = source_dir(home, cwd, layer.source)?;

    Ok(Config {
        hostname,
        user,
        identity_file,
        source,
        target: layer.target.unwrap_or_default(),
        watchman: PathBuf::from(
            layer
                .watchman
                .unwrap_or_else(|| DEFAULT_WATCHMAN.to_string()),
        ),
    })
}

/// Absolute, canonical source directory. Relative paths are taken from `cwd`.
fn source_dir(home: &Path, cwd: &Path, source: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    let source = source.unwrap_or_else(|| cwd.to_path_buf());
    let source = match source.to_str() {
        Some(text) if text.starts_with("~/") => expand_home(home, text),
        _ => source,
    };
    let path = if source.is_absolute() {
        source
    } else {
        cwd.join(source)
    };

    let canonical = path
        .canonicalize()
        .map_err(|err| ConfigError::SourceNotFound {
            path: path.clone(),
            source: err,
        })?;
    if !canonical.is_dir() {
        return Err(ConfigError::SourceNotDirectory(canonical));
    }
    Ok(canonical)
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Expand a leading `~/` against `home`.
pub fn expand_home(home: &Path, path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_prefers_top_values() {
        let bottom = ConfigLayer {
            hostname: Some("low".into()),
            user: Some("alice".into()),
            ..ConfigLayer::default()
        };
        let top = ConfigLayer {
            hostname: Some("high".into()),
            ..ConfigLayer::default()
        };
        let merged = bottom.overlay(top);
        assert_eq!(merged.hostname.as_deref(), Some("high"));
        assert_eq!(merged.user.as_deref(), Some("alice"));
    }

    #[test]
    fn defaults_use_cwd_basename_as_target() {
        let layer = defaults(Path::new("/work/my-project"));
        assert_eq!(layer.source, Some(PathBuf::from("/work/my-project")));
        assert_eq!(layer.target.as_deref(), Some("my-project"));
        assert_eq!(layer.watchman.as_deref(), Some("watchman"));
    }

    #[test]
    fn env_layer_skips_empty_values() {
        let layer = from_env(|key| match key {
            "GOBIN_HOSTNAME" => Some("box".to_string()),
            "GOBIN_USER" => Some(String::new()),
            _ => None,
        });
        assert_eq!(layer.hostname.as_deref(), Some("box"));
        assert_eq!(layer.user, None);
    }

    #[test]
    fn ssh_host_block_is_scoped_to_alias() {
        let contents = "\
Host other
    HostName other.example.com
    User bob

Host dev devbox
    HostName 10.0.0.5
    User Alice
    IdentityFile ~/.ssh/id_dev
    IdentityFile ~/.ssh/id_fallback

Host *
    User nobody
";
        let layer = ssh_host_layer(contents, "devbox");
        assert_eq!(layer.hostname.as_deref(), Some("10.0.0.5"));
        assert_eq!(layer.user.as_deref(), Some("Alice"));
        assert_eq!(layer.identityfile.as_deref(), Some("~/.ssh/id_dev"));

        assert_eq!(ssh_host_layer(contents, "missing"), ConfigLayer::default());
    }

    #[test]
    fn ssh_host_accepts_equals_syntax() {
        let layer = ssh_host_layer("Host=box\n  HostName=box.lan\n", "box");
        assert_eq!(layer.hostname.as_deref(), Some("box.lan"));
    }

    #[test]
    fn expand_home_only_touches_tilde_prefix() {
        let home = Path::new("/home/me");
        assert_eq!(
            expand_home(home, "~/.ssh/id"),
            PathBuf::from("/home/me/.ssh/id")
        );
        assert_eq!(expand_home(home, "/etc/key"), PathBuf::from("/etc/key"));
    }
}
