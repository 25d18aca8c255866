use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::models::{builtin_agents, AccessCode, AccessGrant, Agent};

#[derive(Debug, Deserialize, Clone)]
pub struct GateConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub code_checker: CodeCheckerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default = "builtin_agents")]
    pub agents: Vec<Agent>,
    #[serde(default = "default_access_codes")]
    pub access_codes: Vec<AccessCode>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            http: HttpConfig::default(),
            proxy: ProxyConfig::default(),
            code_checker: CodeCheckerConfig::default(),
            client: ClientConfig::default(),
            agents: builtin_agents(),
            access_codes: default_access_codes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Upstream request timeout; 0 leaves the client default in place.
    pub request_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8787,
            request_timeout_seconds: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProxyConfig {
    pub allowed_prefixes: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allowed_prefixes: vec![
                "https://n8n.halo-vision.com/webhook/".to_string(),
                "https://n8n.halo-vision.com/webhook-test/".to_string(),
            ],
        }
    }
}

impl ProxyConfig {
    pub fn is_allowed(&self, url: &str) -> bool {
        self.allowed_prefixes.iter().any(|p| url.starts_with(p.as_str()))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CodeCheckerConfig {
    pub webhook_url: String,
    pub test_webhook_url: String,
}

impl Default for CodeCheckerConfig {
    fn default() -> Self {
        Self {
            webhook_url: "https://n8n.halovisionai.cloud/webhook/codechecker-9413-4c88-8232-ab9ff53d4c9d"
                .to_string(),
            test_webhook_url:
                "https://n8n.halovisionai.cloud/webhook-test/codechecker-9413-4c88-8232-ab9ff53d4c9d"
                    .to_string(),
        }
    }
}

impl CodeCheckerConfig {
    pub fn url_for(&self, test_mode: bool) -> &str {
        if test_mode {
            &self.test_webhook_url
        } else {
            &self.webhook_url
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub context_window: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8787".to_string(),
            context_window: crate::pipeline::CONTEXT_WINDOW,
        }
    }
}

fn default_access_codes() -> Vec<AccessCode> {
    vec![AccessCode {
        code: "69696969".to_string(),
        allowed_agents: AccessGrant::All,
    }]
}

impl GateConfig {
    /// Load from a TOML file (optional) with `GATECHAT__SECTION__KEY` env overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("GATECHAT").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = GateConfig::load("/nonexistent/gatechat-config").unwrap();
        assert_eq!(config.http.port, 8787);
        assert_eq!(config.agents.len(), 4);
        assert_eq!(config.access_codes.len(), 1);
        assert_eq!(config.client.context_window, 10);
    }

    #[test]
    fn test_load_toml_overrides() {
        let dir = std::env::temp_dir().join(format!("gatechat-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gatechat.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
[http]
enabled = true
host = "0.0.0.0"
port = 9000

[proxy]
allowed_prefixes = ["https://hooks.example.com/"]

[[agents]]
id = "demo"
name = "Demo"
description = "Demo agent"
webhook = "https://hooks.example.com/demo"
domain = "example.com"

[[access_codes]]
code = "1234"
allowed_agents = ["demo"]

[[access_codes]]
code = "9999"
allowed_agents = "all"
"#
        )
        .unwrap();

        let config = GateConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.http.port, 9000);
        assert!(config.proxy.is_allowed("https://hooks.example.com/demo"));
        assert!(!config.proxy.is_allowed("https://evil.example.com/"));
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].id, "demo");
        assert_eq!(config.agents[0].test_webhook, None);
        assert_eq!(config.access_codes[0].allowed_agents, AccessGrant::agents(["demo"]));
        assert_eq!(config.access_codes[1].allowed_agents, AccessGrant::All);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        let dir = std::env::temp_dir().join(format!("gatechat-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gatechat.toml");
        std::fs::write(
            &path,
            "[client]\nserver_url = \"http://relay.internal:8787\"\n\n[http]\nport = 9100\n",
        )
        .unwrap();

        let config = GateConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.client.server_url, "http://relay.internal:8787");
        assert_eq!(config.client.context_window, 10);
        assert_eq!(config.http.port, 9100);
        assert!(config.http.enabled);
        assert_eq!(config.http.host, "127.0.0.1");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_override_single_field() {
        std::env::set_var("GATECHAT__SERVICE__LOG_LEVEL", "debug");
        let loaded = GateConfig::load("/nonexistent/gatechat-config");
        std::env::remove_var("GATECHAT__SERVICE__LOG_LEVEL");

        let config = loaded.unwrap();
        assert_eq!(config.service.log_level, "debug");
        assert_eq!(config.http.port, 8787);
    }

    #[test]
    fn test_code_checker_url_for() {
        let c = CodeCheckerConfig::default();
        assert!(c.url_for(true).contains("/webhook-test/"));
        assert!(c.url_for(false).contains("/webhook/"));
    }
}
