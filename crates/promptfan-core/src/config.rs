use crate::error::{PromptfanError, PromptfanResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Full gateway configuration: the TOML file overlaid with environment credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// `[server]`: listen address.
    #[serde(default)]
    pub server: ServerConfig,
    /// `[default]`: active provider or providers.
    #[serde(default)]
    pub default: DefaultConfig,
    /// `[execution]`: attempt count, delay and deadline.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// `[providers.<name>]` sections.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    /// `[sink]`: where log records go.
    #[serde(default)]
    pub sink: SinkConfig,
    /// Never read from the file; filled by [`GatewayConfig::apply_env`].
    #[serde(skip)]
    pub credentials: Credentials,
}

impl GatewayConfig {
    /// Parse and validate a TOML document. Credentials stay empty.
    pub fn from_toml_str(s: &str) -> PromptfanResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.execution.validate()?;
        Ok(config)
    }

    /// Read `path`, parse it and overlay the process environment.
    pub fn load(path: &Path) -> PromptfanResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PromptfanError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay credentials and deployment overrides from `lookup`.
    ///
    /// Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        self.credentials = Credentials {
            openai_api_key: get("OPENAI_API_KEY"),
            aws_region: get("AWS_REGION"),
            aws_bearer_token: get("AWS_BEARER_TOKEN_BEDROCK"),
            aws_anthropic_version: get("AWS_ANTHROPIC_VERSION"),
            gcp_project_id: get("GCP_PROJECT_ID"),
            vertex_location: get("VERTEX_AI_LOCATION"),
            gcp_access_token: get("GCP_ACCESS_TOKEN"),
        };

        if let Some(port) = get("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let SinkConfig::BigQuery {
            project_id,
            dataset_id,
            table_id,
            ..
        } = &mut self.sink
        {
            if project_id.is_none() {
                *project_id = self.credentials.gcp_project_id.clone();
            }
            if dataset_id.is_none() {
                *dataset_id = get("BIGQUERY_DATASET_ID");
            }
            if table_id.is_none() {
                *table_id = get("BIGQUERY_TABLE_ID");
            }
        }
    }

    /// The `[providers.<name>]` section.
    pub fn provider(&self, name: &str) -> PromptfanResult<&ProviderConfig> {
        self.providers
            .get(name)
            .ok_or_else(|| PromptfanError::Config(format!("no [providers.{name}] section")))
    }
}

/// HTTP listen address.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Overridden by `PORT`.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Which providers a request exercises.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultConfig {
    /// Single-provider deployment.
    #[serde(default)]
    pub provider: Option<String>,
    /// Fan-out deployment; takes precedence over `provider` when non-empty.
    #[serde(default)]
    pub providers: Vec<String>,
}

/// Resolved deployment shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderMode {
    /// One provider; the response is keyed by model.
    Single(String),
    /// Several providers; the response is keyed by provider, then model.
    Multi(Vec<String>),
}

impl ProviderMode {
    /// Provider names in configured order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Single(name) => vec![name.as_str()],
            Self::Multi(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl DefaultConfig {
    /// Resolve the deployment shape; errors when no provider is named.
    pub fn mode(&self) -> PromptfanResult<ProviderMode> {
        if !self.providers.is_empty() {
            return Ok(ProviderMode::Multi(self.providers.clone()));
        }
        match &self.provider {
            Some(name) if !name.is_empty() => Ok(ProviderMode::Single(name.clone())),
            _ => Err(PromptfanError::Config(
                "no default provider configured: set [default] provider or providers".into(),
            )),
        }
    }
}

/// Per-provider settings from `[providers.<name>]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// Models exercised, in order.
    #[serde(default)]
    pub models: Vec<String>,
    /// Prompt sent on every attempt.
    #[serde(default)]
    pub prompt: String,
    /// Overrides the backend's default base URL.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// How attempts are repeated for each model.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// K, the attempts per model. At least 1.
    #[serde(default = "default_attempts")]
    pub attempts: usize,
    /// Fixes the jitter sequence when set.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Per-attempt deadline; absent means none.
    #[serde(default)]
    pub attempt_timeout_secs: Option<u64>,
    /// Pause between sequential attempts.
    #[serde(default)]
    pub delay: DelayConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            seed: None,
            attempt_timeout_secs: None,
            delay: DelayConfig::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> PromptfanResult<()> {
        if self.attempts == 0 {
            return Err(PromptfanError::Config(
                "execution.attempts must be at least 1".into(),
            ));
        }
        if let DelayConfig::Jitter { min_ms, max_ms } = self.delay {
            if min_ms > max_ms {
                return Err(PromptfanError::Config(format!(
                    "execution.delay.min_ms ({min_ms}) exceeds max_ms ({max_ms})"
                )));
            }
        }
        if self.attempt_timeout_secs == Some(0) {
            return Err(PromptfanError::Config(
                "execution.attempt_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_attempts() -> usize {
    10
}

/// Pause inserted between sequential attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DelayConfig {
    /// Uniform draw from `[min_ms, max_ms)`.
    Jitter {
        #[serde(default = "default_min_delay_ms")]
        min_ms: u64,
        #[serde(default = "default_max_delay_ms")]
        max_ms: u64,
    },
    /// `base_ms + step_ms * n`, where `n` counts the attempts completed so far
    /// (1 after the first attempt).
    Linear {
        #[serde(default)]
        base_ms: u64,
        #[serde(default = "default_step_delay_ms")]
        step_ms: u64,
    },
    /// No pause between attempts.
    None,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self::Jitter {
            min_ms: default_min_delay_ms(),
            max_ms: default_max_delay_ms(),
        }
    }
}

fn default_min_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_step_delay_ms() -> u64 {
    1000
}

/// Destination of per-attempt log records.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    /// Stream rows into a BigQuery table; missing coordinates come from the
    /// environment.
    BigQuery {
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        dataset_id: Option<String>,
        #[serde(default)]
        table_id: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
    },
    /// Append JSON lines to a local file.
    Jsonl {
        #[serde(default = "default_jsonl_path")]
        path: PathBuf,
    },
    #[default]
    None,
}

fn default_jsonl_path() -> PathBuf {
    PathBuf::from("./data/generation_log.jsonl")
}

/// Secrets and cloud coordinates, taken from the environment only.
#[derive(Clone, Default)]
pub struct Credentials {
    /// `OPENAI_API_KEY`
    pub openai_api_key: Option<String>,
    /// `AWS_REGION`
    pub aws_region: Option<String>,
    /// `AWS_BEARER_TOKEN_BEDROCK`
    pub aws_bearer_token: Option<String>,
    /// `AWS_ANTHROPIC_VERSION`
    pub aws_anthropic_version: Option<String>,
    /// `GCP_PROJECT_ID`
    pub gcp_project_id: Option<String>,
    /// `VERTEX_AI_LOCATION`
    pub vertex_location: Option<String>,
    /// `GCP_ACCESS_TOKEN`, a short-lived OAuth token.
    pub gcp_access_token: Option<String>,
}

impl Credentials {
    /// Fetch a required value or fail with a message naming `env_var`.
    pub fn require<'a>(value: &'a Option<String>, env_var: &str) -> PromptfanResult<&'a str> {
        value
            .as_deref()
            .ok_or_else(|| PromptfanError::Config(format!("{env_var} is not set")))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("Credentials")
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("aws_region", &self.aws_region)
            .field("aws_bearer_token", &mask(&self.aws_bearer_token))
            .field("aws_anthropic_version", &self.aws_anthropic_version)
            .field("gcp_project_id", &self.gcp_project_id)
            .field("vertex_location", &self.vertex_location)
            .field("gcp_access_token", &mask(&self.gcp_access_token))
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_uses_defaults() {
        let config = GatewayConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.execution.attempts, 10);
        assert_eq!(
            config.execution.delay,
            DelayConfig::Jitter {
                min_ms: 1000,
                max_ms: 5000
            }
        );
        assert!(matches!(config.sink, SinkConfig::None));
        assert!(config.default.mode().is_err());
    }

    #[test]
    fn providers_list_wins_over_single_provider() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [default]
            provider = "openai"
            providers = ["openai", "aws_bedrock"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.default.mode().unwrap(),
            ProviderMode::Multi(vec!["openai".into(), "aws_bedrock".into()])
        );
    }

    #[test]
    fn linear_delay_parses() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [execution]
            attempts = 3
            [execution.delay]
            kind = "linear"
            base_ms = 100
            step_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.execution.attempts, 3);
        assert_eq!(
            config.execution.delay,
            DelayConfig::Linear {
                base_ms: 100,
                step_ms: 50
            }
        );
    }

    #[test]
    fn linear_delay_defaults_are_independent_of_jitter() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [execution.delay]
            kind = "linear"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.execution.delay,
            DelayConfig::Linear {
                base_ms: 0,
                step_ms: default_step_delay_ms()
            }
        );
        assert_eq!(default_step_delay_ms(), 1000);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = GatewayConfig::from_toml_str("[execution]\nattempts = 0\n").unwrap_err();
        assert!(err.to_string().contains("attempts"));
    }

    #[test]
    fn inverted_jitter_window_rejected() {
        let err = GatewayConfig::from_toml_str(
            "[execution.delay]\nkind = \"jitter\"\nmin_ms = 10\nmax_ms = 5\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("min_ms"));
    }

    #[test]
    fn env_fills_credentials_and_bigquery_coordinates() {
        let mut config = GatewayConfig::from_toml_str(
            r#"
            [sink]
            kind = "bigquery"
            table_id = "from_file"
            "#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("GCP_PROJECT_ID", "proj"),
            ("BIGQUERY_DATASET_ID", "logs"),
            ("BIGQUERY_TABLE_ID", "from_env"),
            ("PORT", "9090"),
            ("AWS_REGION", ""),
        ]
        .into_iter()
        .collect();
        config.apply_env(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.credentials.openai_api_key.as_deref(), Some("sk-test"));
        assert!(config.credentials.aws_region.is_none());
        assert_eq!(config.server.port, 9090);
        match &config.sink {
            SinkConfig::BigQuery {
                project_id,
                dataset_id,
                table_id,
                ..
            } => {
                assert_eq!(project_id.as_deref(), Some("proj"));
                assert_eq!(dataset_id.as_deref(), Some("logs"));
                assert_eq!(table_id.as_deref(), Some("from_file"));
            }
            other => panic!("expected bigquery sink, got {other:?}"),
        }
    }

    #[test]
    fn missing_provider_section_is_config_error() {
        let config = GatewayConfig::default();
        let err = config.provider("openai").unwrap_err();
        assert!(matches!(err, PromptfanError::Config(_)));
    }

    #[test]
    fn credentials_debug_masks_secrets() {
        let creds = Credentials {
            openai_api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("***"));
    }
}
