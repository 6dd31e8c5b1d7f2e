use crate::error::{FolioError, IoContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "folio.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub content_root: PathBuf,
    pub static_root: PathBuf,
    pub templates_root: PathBuf,
    pub output_root: PathBuf,
    pub site: SiteMeta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    paths: PathsSection,
    #[serde(default)]
    site: SiteMeta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsSection {
    content: Option<PathBuf>,
    #[serde(rename = "static")]
    static_assets: Option<PathBuf>,
    templates: Option<PathBuf>,
    output: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::rooted_at(Path::new(""))
    }
}

impl BuildConfig {
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            content_root: dir.join("content"),
            static_root: dir.join("static"),
            templates_root: dir.join("templates"),
            output_root: dir.join("build"),
            site: SiteMeta::default(),
        }
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let mut config = Self::rooted_at(dir);
        let config_path = dir.join(CONFIG_FILE);

        if !config_path.is_file() {
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path).read_context(&config_path)?;
        let file: ConfigFile = toml::from_str(&content).map_err(|error| FolioError::Config {
            path: config_path.clone(),
            message: error.to_string(),
        })?;

        let resolve = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                dir.join(path)
            }
        };

        if let Some(path) = file.paths.content {
            config.content_root = resolve(path);
        }
        if let Some(path) = file.paths.static_assets {
            config.static_root = resolve(path);
        }
        if let Some(path) = file.paths.templates {
            config.templates_root = resolve(path);
        }
        if let Some(path) = file.paths.output {
            config.output_root = resolve(path);
        }
        config.site = file.site;
        config.site.base_url = config.site.base_url.trim_end_matches('/').to_string();

        Ok(config)
    }

    pub fn blog_root(&self) -> PathBuf {
        self.content_root.join("blog")
    }

    pub fn projects_root(&self) -> PathBuf {
        self.content_root.join("projects")
    }
}
