use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "zen3d";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_PACKER: &str = "gltfpack";

/// Persisted per-user configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// External engine that hosts the conversion core.
    #[serde(default, alias = "blender", skip_serializing_if = "Option::is_none")]
    pub engine: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packer: Option<PathBuf>,
}

impl Config {
    pub fn engine(&self) -> Result<&Path> {
        self.engine
            .as_deref()
            .ok_or_else(|| anyhow!("no engine executable configured (set \"engine\")"))
    }

    pub fn packer(&self) -> &Path {
        self.packer
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_PACKER))
    }
}

/// Resolve the config directory from an environment lookup:
/// `ZEN3D_CONFIG_DIR`, then `XDG_CONFIG_HOME/zen3d`, then `HOME/.config/zen3d`.
pub fn config_dir_from(lookup: impl Fn(&str) -> Option<OsString>) -> Result<PathBuf> {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
    if let Some(dir) = non_empty("ZEN3D_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join(APP_NAME));
    }
    if let Some(home) = non_empty("HOME").or_else(|| non_empty("USERPROFILE")) {
        return Ok(PathBuf::from(home).join(".config").join(APP_NAME));
    }
    Err(anyhow!("cannot determine config directory (HOME is not set)"))
}

pub fn config_dir() -> Result<PathBuf> {
    config_dir_from(|key| std::env::var_os(key))
}

/// Load `<dir>/config.json`, creating the directory and an empty `{}` file
/// on first use.
pub fn load_or_init(dir: &Path) -> Result<Config> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create config dir {}", dir.display()))?;
    let path = dir.join(CONFIG_FILE_NAME);

    if !path.is_file() {
        std::fs::write(&path, "{}")
            .with_context(|| format!("failed to write default config at {}", path.display()))?;
        log::info!("created empty config at {}", path.display());
        return Ok(Config::default());
    }

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config json in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn unique_temp_dir() -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be monotonic enough for tests")
            .as_nanos();
        std::env::temp_dir().join(format!("zen3d-config-{nonce}"))
    }

    #[test]
    fn config_dir_precedence() {
        let dir = config_dir_from(env(&[
            ("ZEN3D_CONFIG_DIR", "/cfg"),
            ("XDG_CONFIG_HOME", "/xdg"),
            ("HOME", "/home/u"),
        ]))
        .unwrap();
        assert_eq!(dir, PathBuf::from("/cfg"));

        let dir = config_dir_from(env(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/u")])).unwrap();
        assert_eq!(dir, PathBuf::from("/xdg/zen3d"));

        let dir = config_dir_from(env(&[("XDG_CONFIG_HOME", ""), ("HOME", "/home/u")])).unwrap();
        assert_eq!(dir, PathBuf::from("/home/u/.config/zen3d"));

        assert!(config_dir_from(env(&[])).is_err());
    }

    #[test]
    fn first_load_writes_empty_config() {
        let dir = unique_temp_dir();
        let config = load_or_init(&dir).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(std::fs::read_to_string(dir.join(CONFIG_FILE_NAME)).unwrap(), "{}");
        assert!(config.engine().is_err());
        assert_eq!(config.packer(), Path::new(DEFAULT_PACKER));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn legacy_blender_key_is_accepted() {
        let config: Config = serde_json::from_str(r#"{ "blender": "/opt/blender/blender" }"#).unwrap();
        assert_eq!(config.engine().unwrap(), Path::new("/opt/blender/blender"));

        let config: Config =
            serde_json::from_str(r#"{ "engine": "/bin/engine", "packer": "/bin/pack" }"#).unwrap();
        assert_eq!(config.packer(), Path::new("/bin/pack"));
    }
}
