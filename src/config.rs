use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::RagError;
use crate::query::DEFAULT_TOP_K;

pub const DEFAULT_CONFIG_FILE: &str = "product-rag.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAI,
    Mock,
}

impl FromStr for Provider {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAI),
            "mock" => Ok(Provider::Mock),
            other => Err(RagError::Config(format!("unknown provider '{}'", other))),
        }
    }
}

/// Optional settings read from the TOML config file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub provider: Option<Provider>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub top_k: Option<usize>,
    pub auto_init: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, RagError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| RagError::Config(format!("invalid config {}: {}", path.display(), e)))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub provider: Provider,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub static_dir: PathBuf,
    pub top_k: usize,
    pub auto_init: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            provider: Provider::Gemini,
            gemini_api_key: None,
            openai_api_key: None,
            openai_base_url: crate::openai::DEFAULT_BASE_URL.to_string(),
            chat_model: None,
            embedding_model: None,
            catalog_path: None,
            static_dir: PathBuf::from("public"),
            top_k: DEFAULT_TOP_K,
            auto_init: false,
        }
    }
}

impl Config {
    /// Defaults, then the config file (`RAG_CONFIG` or `product-rag.toml` when present),
    /// then process environment variables.
    pub fn load() -> Result<Self, RagError> {
        let file = match std::env::var("RAG_CONFIG") {
            Ok(path) => Some(FileConfig::load(Path::new(&path))?),
            Err(_) => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Some(FileConfig::load(default_path)?)
                } else {
                    None
                }
            }
        };

        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    pub fn from_sources<F>(file: Option<FileConfig>, env: F) -> Result<Self, RagError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(file) = file {
            config.apply_file(file);
        }

        if let Some(host) = env("HOST") {
            config.host = host;
        }
        if let Some(port) = env("PORT") {
            config.port = parse_var("PORT", &port)?;
        }
        if let Some(provider) = env("RAG_PROVIDER") {
            config.provider = provider.parse()?;
        }
        if let Some(key) = env("GEMINI_API_KEY") {
            config.gemini_api_key = Some(key);
        }
        if let Some(key) = env("OPENAI_API_KEY") {
            config.openai_api_key = Some(key);
        }
        if let Some(url) = env("OPENAI_BASE_URL") {
            config.openai_base_url = url;
        }
        if let Some(model) = env("RAG_CHAT_MODEL") {
            config.chat_model = Some(model);
        }
        if let Some(model) = env("RAG_EMBEDDING_MODEL") {
            config.embedding_model = Some(model);
        }
        if let Some(path) = env("RAG_CATALOG") {
            config.catalog_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = env("RAG_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(top_k) = env("RAG_TOP_K") {
            config.top_k = parse_var("RAG_TOP_K", &top_k)?;
        }
        if let Some(auto_init) = env("RAG_AUTO_INIT") {
            config.auto_init = parse_bool("RAG_AUTO_INIT", &auto_init)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(provider) = file.provider {
            self.provider = provider;
        }
        self.gemini_api_key = file.gemini_api_key.or(self.gemini_api_key.take());
        self.openai_api_key = file.openai_api_key.or(self.openai_api_key.take());
        if let Some(url) = file.openai_base_url {
            self.openai_base_url = url;
        }
        self.chat_model = file.chat_model.or(self.chat_model.take());
        self.embedding_model = file.embedding_model.or(self.embedding_model.take());
        self.catalog_path = file.catalog_path.or(self.catalog_path.take());
        if let Some(dir) = file.static_dir {
            self.static_dir = dir;
        }
        if let Some(top_k) = file.top_k {
            self.top_k = top_k;
        }
        if let Some(auto_init) = file.auto_init {
            self.auto_init = auto_init;
        }
    }

    fn validate(&self) -> Result<(), RagError> {
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".to_string()));
        }

        let missing_key = match self.provider {
            Provider::Gemini => is_blank(&self.gemini_api_key).then_some("GEMINI_API_KEY"),
            Provider::OpenAI => is_blank(&self.openai_api_key).then_some("OPENAI_API_KEY"),
            Provider::Mock => None,
        };
        if let Some(name) = missing_key {
            return Err(RagError::Config(format!(
                "{} must be set for the {:?} provider",
                name, self.provider
            )));
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, RagError> {
    value
        .trim()
        .parse()
        .map_err(|_| RagError::Config(format!("invalid value for {}: '{}'", name, value)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, RagError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(RagError::Config(format!("invalid value for {}: '{}'", name, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_mock_provider_needs_no_keys() {
        let config = Config::from_sources(None, env_of(&[("RAG_PROVIDER", "mock")])).unwrap();
        assert_eq!(config.provider, Provider::Mock);
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
        assert_eq!(config.top_k, DEFAULT_TOP_K);
        assert!(!config.auto_init);
    }

    #[test]
    fn test_gemini_requires_api_key() {
        let result = Config::from_sources(None, env_of(&[]));
        assert!(matches!(result, Err(RagError::Config(_))));

        let config = Config::from_sources(None, env_of(&[("GEMINI_API_KEY", "abc")])).unwrap();
        assert_eq!(config.gemini_api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_env_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            provider = "openai"
            openai_api_key = "from-file"
            port = 8080
            top_k = 5
            "#,
        )
        .unwrap();

        let config =
            Config::from_sources(Some(file), env_of(&[("PORT", "9000"), ("RAG_AUTO_INIT", "yes")]))
                .unwrap();

        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.openai_api_key.as_deref(), Some("from-file"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.top_k, 5);
        assert!(config.auto_init);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_port = env_of(&[("RAG_PROVIDER", "mock"), ("PORT", "not-a-port")]);
        assert!(Config::from_sources(None, bad_port).is_err());

        let bad_provider = env_of(&[("RAG_PROVIDER", "llama")]);
        assert!(Config::from_sources(None, bad_provider).is_err());

        let zero_k = env_of(&[("RAG_PROVIDER", "mock"), ("RAG_TOP_K", "0")]);
        assert!(Config::from_sources(None, zero_k).is_err());
    }

    #[test]
    fn test_unknown_file_keys_rejected() {
        assert!(toml::from_str::<FileConfig>("prot = 1").is_err());
    }
}
