use amrview_core::PayloadTemplate;
use amrview_link::{Backoff, BackendEndpoints};
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub rest_url: Option<String>,
    pub rcs_url: Option<String>,
    pub ws_url: Option<String>,
    /// Legacy positional form: `[rest, rcs]`. Only read when `rest_url` is unset.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub server_ips: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            rest_url: None,
            rcs_url: None,
            ws_url: None,
            server_ips: Vec::new(),
            timeout_ms: 10_000,
        }
    }
}

impl BackendConfig {
    pub fn endpoints(&self) -> anyhow::Result<BackendEndpoints> {
        let rest = match (&self.rest_url, self.server_ips.first()) {
            (Some(rest), _) => rest.clone(),
            (None, Some(legacy)) => legacy.clone(),
            (None, None) => anyhow::bail!("backend.rest_url is not configured"),
        };
        let rcs = self
            .rcs_url
            .clone()
            .or_else(|| self.server_ips.get(1).cloned())
            .unwrap_or_else(|| rest.clone());
        let ws = self.ws_url.clone().unwrap_or_else(|| {
            rest.replacen("https://", "wss://", 1)
                .replacen("http://", "ws://", 1)
        });
        BackendEndpoints::new(&rest, &rcs, &ws).context("invalid backend address")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub process_code: String,
    pub origin_system: String,
    pub cooldown_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let template = PayloadTemplate::default();
        Self {
            process_code: template.process_code,
            origin_system: template.origin_system,
            cooldown_ms: 4_000,
        }
    }
}

impl DispatchConfig {
    pub fn template(&self) -> PayloadTemplate {
        PayloadTemplate {
            process_code: self.process_code.clone(),
            origin_system: self.origin_system.clone(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub reconnect_base_ms: u64,
    pub reconnect_cap_ms: u64,
    pub reconnect_jitter: f64,
    pub watch_interval_ms: u64,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            reconnect_base_ms: 3_000,
            reconnect_cap_ms: 30_000,
            reconnect_jitter: 0.2,
            watch_interval_ms: 5_000,
        }
    }
}

impl ChannelsConfig {
    pub fn backoff(&self) -> Backoff {
        let base = Duration::from_millis(self.reconnect_base_ms);
        Backoff {
            base,
            cap: Duration::from_millis(self.reconnect_cap_ms).max(base),
            jitter: self.reconnect_jitter.clamp(0.0, 1.0),
        }
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(100))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub initial_zoom: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { initial_zoom: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub username: String,
    pub area_id: Option<i64>,
    pub monitor_groups: Vec<String>,
    pub backend: BackendConfig,
    pub dispatch: DispatchConfig,
    pub channels: ChannelsConfig,
    pub render: RenderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            username: "operator".to_string(),
            area_id: None,
            monitor_groups: Vec::new(),
            backend: BackendConfig::default(),
            dispatch: DispatchConfig::default(),
            channels: ChannelsConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

const CONFIG_FILE: &str = "viewer.toml";

pub fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from("", "", "amrview").context("no per-user directories available for amrview")
}

pub fn resolve_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(project_dirs()?.config_dir().join(CONFIG_FILE)),
    }
}

/// A missing file yields defaults. A file that exists but does not parse is logged and ignored.
pub fn load(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return AppConfig::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "amrview config unreadable; using defaults");
            return AppConfig::default();
        }
    };
    toml::from_str(&contents).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "amrview config does not parse; using defaults");
        AppConfig::default()
    })
}

pub fn store(cfg: &AppConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create amrview config directory {}", parent.display()))?;
    }
    let data = toml::to_string_pretty(cfg).context("amrview config is not representable as TOML")?;
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, data).with_context(|| format!("cannot write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("cannot replace amrview config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "amrview config written");
    Ok(())
}
