use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub webhook: String,
    #[serde(default)]
    pub test_webhook: Option<String>,
    pub domain: String,
}

impl Agent {
    /// Webhook to call for this agent. Falls back to the live webhook when
    /// test mode is on but the agent has no test endpoint.
    pub fn webhook_for(&self, test_mode: bool) -> &str {
        match (&self.test_webhook, test_mode) {
            (Some(url), true) => url,
            _ => &self.webhook,
        }
    }
}

fn builtin(id: &str, name: &str, description: &str, path: &str, domain: &str) -> Agent {
    Agent {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        webhook: format!("https://n8n.halo-vision.com/webhook/{}", path),
        test_webhook: Some(format!("https://n8n.halo-vision.com/webhook-test/{}", path)),
        domain: domain.to_string(),
    }
}

/// Catalog compiled into the binaries; `[[agents]]` in the config replaces it.
pub fn builtin_agents() -> Vec<Agent> {
    vec![
        builtin(
            "halovision",
            "Halo Vision AI",
            "Custom AI agent solutions",
            "halovisionchatbot99",
            "halovisionai.cloud",
        ),
        builtin(
            "chiroli",
            "Chiro.li",
            "Chiropractor assistant",
            "chiroli-86767",
            "chiro.li",
        ),
        builtin(
            "safe3d",
            "Safe-3D",
            "Messtechniker assistant",
            "01f863a3-331a-495d-bdc1-4972c1657f5d",
            "safe-3d.ch",
        ),
        builtin(
            "simplygerman",
            "Simply German",
            "German language lessons",
            "deutschbot",
            "simply-german.bolt.host",
        ),
    ]
}
