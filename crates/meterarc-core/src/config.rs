use crate::interval::DateRange;
use crate::models::{Group, Quantity};
use crate::synthetic::SyntheticArchive;
use crate::timeutils::{parse_range, parse_timestamp};
use anyhow::{bail, Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use time::Duration as TimeDuration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub synthetic: SyntheticSection,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub presets: HashMap<String, Preset>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            synthetic: SyntheticSection::default(),
            logging: LoggingConfig::default(),
            presets: Preset::default_presets(),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "meterarc", "meterarc")
            .context("cannot locate config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(PathBuf::from).unwrap_or_else(|| {
            Config::default_path().unwrap_or_else(|_| PathBuf::from("./config.toml"))
        });
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading config at {:?}", path))?;
            let mut cfg: Config = toml::from_str(&content).context("parsing config")?;
            cfg.expand_paths();
            Ok(cfg)
        } else {
            let mut cfg = Config::default();
            cfg.expand_paths();
            Ok(cfg)
        }
    }

    pub fn expand_paths(&mut self) {
        self.store.path = expand_tilde(&self.store.path);
        if let Some(file) = &self.logging.file {
            self.logging.file = Some(expand_tilde(file));
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    Sqlite,
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_mode")]
    pub mode: StoreMode,
    #[serde(default = "StoreConfig::default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: Self::default_mode(),
            path: Self::default_store_path(),
        }
    }
}

impl StoreConfig {
    fn default_mode() -> StoreMode {
        StoreMode::Synthetic
    }

    fn default_store_path() -> PathBuf {
        PathBuf::from("~/.local/share/meterarc/archive.db")
    }
}

/// The universe of the synthetic generator: base seed, overall span and
/// the groups/quantities it answers for. Timestamps are RFC 3339 strings
/// and parsed when the generator is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticSection {
    #[serde(default)]
    pub seed: i64,
    #[serde(default = "SyntheticSection::default_start")]
    pub start: String,
    #[serde(default = "SyntheticSection::default_end")]
    pub end: String,
    #[serde(default = "SyntheticSection::default_groups")]
    pub groups: Vec<GroupEntry>,
    #[serde(default = "SyntheticSection::default_quantities")]
    pub quantities: Vec<String>,
}

impl Default for SyntheticSection {
    fn default() -> Self {
        Self {
            seed: 0,
            start: Self::default_start(),
            end: Self::default_end(),
            groups: Self::default_groups(),
            quantities: Self::default_quantities(),
        }
    }
}

impl SyntheticSection {
    fn default_start() -> String {
        "2024-01-01T00:00:00Z".into()
    }

    fn default_end() -> String {
        "2024-01-02T00:00:00Z".into()
    }

    fn default_groups() -> Vec<GroupEntry> {
        vec![GroupEntry {
            id: "b6f9f6a0-5c72-4d66-9e0c-3f1a2d4c8e10".into(),
            name: "Demo site".into(),
        }]
    }

    fn default_quantities() -> Vec<String> {
        vec!["U1".into(), "I1".into(), "P".into()]
    }

    pub fn span(&self) -> Result<DateRange> {
        let start = parse_timestamp(&self.start).context("synthetic.start")?;
        let end = parse_timestamp(&self.end).context("synthetic.end")?;
        if start > end {
            bail!("synthetic span start is after its end");
        }
        Ok(DateRange::new(start, end))
    }

    pub fn build(&self) -> Result<SyntheticArchive> {
        let span = self.span()?;
        let groups = self
            .groups
            .iter()
            .map(|entry| {
                let id = Uuid::parse_str(&entry.id)
                    .with_context(|| format!("invalid group id: {}", entry.id))?;
                Ok(Group::new(id, entry.name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        let catalog = self
            .quantities
            .iter()
            .map(|property| Quantity::new(property.clone(), None))
            .collect();
        Ok(SyntheticArchive::new(self.seed, span, groups).with_quantities(catalog))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".into()
    }
}

/// A saved query the CLI can run by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default = "Preset::default_arch")]
    pub arch: String,
    #[serde(default)]
    pub quantities: Vec<String>,
    #[serde(default)]
    pub range: Option<String>,
}

impl Preset {
    fn default_arch() -> String {
        "main".into()
    }

    pub fn default_presets() -> HashMap<String, Preset> {
        let mut map = HashMap::new();
        map.insert(
            "voltage_hour".into(),
            Preset {
                group: None,
                arch: "main".into(),
                quantities: vec!["U1".into()],
                range: Some("1h".into()),
            },
        );
        map.insert(
            "meter_day".into(),
            Preset {
                group: None,
                arch: "meter".into(),
                quantities: vec!["P".into()],
                range: Some("1d".into()),
            },
        );
        map
    }

    /// Duration back from "now" this preset covers, when set.
    pub fn range(&self) -> Result<Option<TimeDuration>> {
        self.range.as_deref().map(parse_range).transpose()
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if !path_str.starts_with('~') {
        return path.to_path_buf();
    }

    let home = BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    if path_str == "~" {
        home
    } else {
        let mut expanded = home;
        expanded.push(path_str.trim_start_matches("~/"));
        expanded
    }
}
