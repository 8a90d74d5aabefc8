use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub board: BoardConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub stages: StageConfig,
    #[serde(default = "default_attributes")]
    pub attributes: Vec<AttributeConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub geometry: PathBuf,
    pub board_csv: Option<PathBuf>, // Saved board snapshot, used instead of the live API
    #[serde(default = "default_key_column")]
    pub key_column: String,
    #[serde(default = "default_group_column")]
    pub group_column: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BoardConfig {
    pub board_id: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_status_column")]
    pub status_column_id: String,
    #[serde(default = "default_location_column")]
    pub location_column_id: String,
}

/// Where the board API key comes from. Chosen explicitly in the config file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum CredentialsConfig {
    Env {
        #[serde(default = "default_key_variable")]
        variable: String,
    },
    SecretFile {
        path: PathBuf,
        #[serde(default = "default_secret_key")]
        key: String,
    },
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        CredentialsConfig::Env {
            variable: default_key_variable(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StageConfig {
    #[serde(default = "default_stage_colours")]
    pub colours: BTreeMap<String, String>,
    #[serde(default = "default_fallback_colour")]
    pub fallback: String,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            colours: default_stage_colours(),
            fallback: default_fallback_colour(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AttributeConfig {
    pub name: String,
    pub label: String,
    pub column: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Columns the geo loader keeps as numeric attributes.
    pub fn attribute_columns(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.column.clone()).collect()
    }
}

fn default_key_column() -> String {
    "name".to_string()
}

fn default_group_column() -> String {
    "msa".to_string()
}

fn default_endpoint() -> String {
    "https://api.monday.com/v2".to_string()
}

fn default_api_version() -> String {
    "2024-04".to_string()
}

fn default_page_size() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_status_column() -> String {
    "status".to_string()
}

fn default_location_column() -> String {
    "location".to_string()
}

fn default_key_variable() -> String {
    "MONDAY_API_KEY".to_string()
}

fn default_secret_key() -> String {
    "monday-api-key".to_string()
}

fn default_port() -> u16 {
    8050
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_fallback_colour() -> String {
    "rgb(128, 128, 128)".to_string()
}

pub fn default_stage_colours() -> BTreeMap<String, String> {
    [
        ("Engaged", "rgb(253, 171, 61)"),
        ("Enrolled", "rgb(255, 100, 46)"),
        ("Matched", "rgb(156, 211, 38)"),
        ("Activated", "rgb(3, 127, 76)"),
        ("Lead", "rgb(196, 196, 196)"),
        ("Contact", "rgb(255, 203, 0)"),
        ("Churned", "rgb(223, 47, 74)"),
    ]
    .into_iter()
    .map(|(stage, colour)| (stage.to_string(), colour.to_string()))
    .collect()
}

pub fn default_attributes() -> Vec<AttributeConfig> {
    vec![
        AttributeConfig {
            name: "score".to_string(),
            label: "Geoscore".to_string(),
            column: "geoscore".to_string(),
            min: 0.0,
            max: 10.0,
        },
        AttributeConfig {
            name: "density".to_string(),
            label: "Population density".to_string(),
            column: "pop_density".to_string(),
            min: 0.0,
            max: 20000.0,
        },
        AttributeConfig {
            name: "household_size".to_string(),
            label: "Household size".to_string(),
            column: "household_size".to_string(),
            min: 1.0,
            max: 5.0,
        },
        AttributeConfig {
            name: "spend".to_string(),
            label: "Spend index".to_string(),
            column: "spend_index".to_string(),
            min: 50.0,
            max: 150.0,
        },
    ]
}
