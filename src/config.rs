use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_LLM_ENDPOINT: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "GLM-4.5-Flash";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub storage: StorageConfig,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

/// Built-in remote model defaults. Persisted overrides are merged over these.
#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub api_endpoint: String,
    pub model: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub typesetting_enabled: bool,
    pub plot_samples: u32,
    pub plot_width: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            llm: LLMConfig {
                api_endpoint: env::var("LLM_API_ENDPOINT")
                    .unwrap_or_else(|_| DEFAULT_LLM_ENDPOINT.to_string()),
                model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
                api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            },
            storage: StorageConfig {
                data_dir: env::var("LATEX_LAB_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_data_dir()),
            },
            render: RenderConfig {
                typesetting_enabled: env::var("TYPESETTING_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                plot_samples: env::var("PLOT_SAMPLES")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()?,
                plot_width: env::var("PLOT_WIDTH")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()?,
            },
            logging: LoggingConfig {
                log_dir: env::var("LOG_DIR").ok().map(PathBuf::from),
            },
        })
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("latex-lab")
}

impl Default for Config {
    /// Built-in defaults without consulting the environment.
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
                cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            llm: LLMConfig {
                api_endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
                model: DEFAULT_LLM_MODEL.to_string(),
                api_key: String::new(),
            },
            storage: StorageConfig {
                data_dir: default_data_dir(),
            },
            render: RenderConfig {
                typesetting_enabled: true,
                plot_samples: 1000,
                plot_width: 600,
            },
            logging: LoggingConfig { log_dir: None },
        }
    }
}
