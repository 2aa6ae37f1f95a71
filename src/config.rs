//! Job file and translation provider configuration.
//!
//! `docsync.toml` is discovered in the current directory or any parent. All
//! keys are optional:
//!
//! ```toml
//! extensions = [".md", ".mdx"]
//! passthrough_segment = "LLMs"
//! verbose = true
//!
//! [provider]
//! name = "deepseek"          # skip the environment scan
//! model = "deepseek-chat"
//! stream = true
//!
//! [[job]]
//! source = "docs/en"
//! target = "docs/fr"
//! language = "Français"
//! ```
//!
//! Relative job paths are resolved against the config file's directory.
//! Without any `[[job]]` table the built-in language list is used.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::job::{SyncJob, SyncOptions};

const CONFIG_FILENAME: &str = "docsync.toml";

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// A provider known by name, with where to find its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownProvider {
    pub name: &'static str,
    pub api_key_env: &'static str,
    pub base_url: &'static str,
    pub model: &'static str,
}

/// Scanned in order; the first one with a key in the environment wins.
pub const PROVIDERS: [KnownProvider; 3] = [
    KnownProvider {
        name: "moonshot",
        api_key_env: "MOONSHOT_API_KEY",
        base_url: "https://api.moonshot.cn/v1",
        model: "kimi-k2-turbo-preview",
    },
    KnownProvider {
        name: "deepseek",
        api_key_env: "DEEPSEEK_API_KEY",
        base_url: "https://api.deepseek.com/v1",
        model: "deepseek-chat",
    },
    KnownProvider {
        name: "openai",
        api_key_env: "OPENAI_API_KEY",
        base_url: "https://api.openai.com/v1",
        model: "gpt-3.5-turbo",
    },
];

/// Source, target and label for each language the site ships.
const DEFAULT_JOBS: [(&str, &str, &str); 7] = [
    ("docs/zh-hans", "docs/ja", "日本語"),
    ("docs/zh-hans", "docs/zh-hant", "繁體中文"),
    ("docs/en", "docs/it", "Italiano"),
    ("docs/en", "docs/de", "Deutsch"),
    ("docs/en", "docs/fr", "Français"),
    ("docs/en", "docs/es", "Español"),
    ("docs/en", "docs/pt", "Português"),
];

/// `[provider]` table as written in the file.
#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderSection {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub stream: Option<bool>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved provider settings, built once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub stream: bool,
    pub timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("stream", &self.stream)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve from the `[provider]` table, falling back to the first known
    /// provider whose API key variable is set. `env` looks up a variable.
    pub fn resolve<F>(section: &ProviderSection, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let known = match section.name.as_deref() {
            Some(name) => match PROVIDERS.iter().find(|p| p.name.eq_ignore_ascii_case(name)) {
                Some(p) => Some(*p),
                // unknown names are fine as long as the table says where to go
                None if section.base_url.is_some()
                    && section.model.is_some()
                    && section.api_key_env.is_some() =>
                {
                    None
                }
                None => return Err(ConfigError::UnknownProvider(name.to_string())),
            },
            None if section.base_url.is_some()
                && section.model.is_some()
                && section.api_key_env.is_some() =>
            {
                None
            }
            None => {
                let found = PROVIDERS.iter().find(|p| lookup(p.api_key_env).is_some());
                match found {
                    Some(p) => Some(*p),
                    None => {
                        let names: Vec<&str> = PROVIDERS.iter().map(|p| p.api_key_env).collect();
                        return Err(ConfigError::NoProvider(names.join(", ")));
                    }
                }
            }
        };

        let pick = |explicit: &Option<String>, fallback: Option<&str>| {
            explicit
                .clone()
                .or_else(|| fallback.map(str::to_string))
                .unwrap_or_default()
        };

        let api_key_env = pick(&section.api_key_env, known.map(|p| p.api_key_env));
        let api_key = lookup(&api_key_env).ok_or(ConfigError::MissingApiKey(api_key_env))?;

        let name = pick(&section.name, known.map(|p| p.name));
        let base_url = pick(&section.base_url, known.map(|p| p.base_url));
        let model = pick(&section.model, known.map(|p| p.model));

        Ok(Self {
            name: if name.is_empty() { "custom".to_string() } else { name },
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            stream: section.stream.unwrap_or(true),
            timeout: Duration::from_secs(section.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }

    /// Resolve against the process environment.
    pub fn from_env(section: &ProviderSection) -> Result<Self, ConfigError> {
        Self::resolve(section, |key| std::env::var(key).ok())
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Command-line overrides. Only `Some` values replace loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub options: SyncOptions,

    pub provider: ProviderSection,

    #[serde(rename = "job")]
    jobs: Vec<SyncJob>,

    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Config {
    /// Load from `config_path`, or discover `docsync.toml`, or fall back to
    /// defaults relative to the current directory.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        for job in &mut config.jobs {
            job.source = config_dir.join(&job.source);
            job.target = config_dir.join(&job.target);
        }
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(provider) = &settings.provider {
            if self.provider.name.as_ref() != Some(provider) {
                // a different provider must not inherit the file's endpoint or key
                self.provider = ProviderSection {
                    name: Some(provider.clone()),
                    stream: self.provider.stream,
                    timeout_secs: self.provider.timeout_secs,
                    ..ProviderSection::default()
                };
            }
        }
        if let Some(model) = &settings.model {
            self.provider.model = Some(model.clone());
        }
        if let Some(extensions) = &settings.extensions {
            self.options.extensions.clone_from(extensions);
        }
        if let Some(verbose) = settings.verbose {
            self.options.verbose = verbose;
        }
    }

    /// Configured jobs, or the built-in language list when none are set.
    pub fn jobs(&self) -> Vec<SyncJob> {
        if !self.jobs.is_empty() {
            return self.jobs.clone();
        }
        let base = self
            .config_path
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(Path::new(""));
        DEFAULT_JOBS
            .iter()
            .map(|(src, dst, lang)| SyncJob::new(base.join(src), base.join(dst), *lang))
            .collect()
    }

    pub fn resolve_provider(&self) -> Result<ProviderConfig, ConfigError> {
        ProviderConfig::from_env(&self.provider)
    }
}
