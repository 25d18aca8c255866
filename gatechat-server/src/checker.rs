//! Code-checker relay: forwards a candidate access code to the validation
//! webhook and turns whatever comes back into a `{valid, allowedAgents}`
//! verdict.

use axum::http::StatusCode;
use gatechat_core::reply::is_truthy;
use gatechat_core::{AccessGrant, CodeVerdict, WebhookClient};
use serde::Deserialize;
use serde_json::{json, Value};

use gatechat_core::config::CodeCheckerConfig;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckerRequest {
    pub code: Option<String>,
    pub test_mode: Option<bool>,
}

/// Heuristic read of the validation webhook's answer.
///
/// Strings count as valid when they mention "true" or "valid". Objects are
/// judged by `valid`, then `success`, then `result`, whichever is present
/// first. A valid verdict without an agent list unlocks everything.
pub fn interpret_verdict(data: &Value) -> CodeVerdict {
    let mut valid = false;
    let mut allowed = AccessGrant::default();

    match data {
        Value::String(s) => {
            let s = s.to_lowercase();
            valid = s.contains("true") || s.contains("valid");
        }
        Value::Object(obj) => {
            if let Some(v) = obj.get("valid") {
                valid = is_truthy(v);
            } else if let Some(v) = obj.get("success") {
                valid = is_truthy(v);
            } else if let Some(v) = obj.get("result") {
                valid = js_string(v).to_lowercase().contains("true");
            }

            if let Some(grant) = obj.get("allowedAgents").and_then(grant_from_value) {
                allowed = grant;
            }
        }
        _ => {}
    }

    if valid && allowed.is_empty() {
        allowed = AccessGrant::All;
    }

    CodeVerdict {
        valid,
        allowed_agents: allowed,
    }
}

fn grant_from_value(value: &Value) -> Option<AccessGrant> {
    match value {
        Value::String(s) if s == "all" => Some(AccessGrant::All),
        Value::Array(items) => Some(AccessGrant::agents(
            items.iter().filter_map(|i| i.as_str()),
        )),
        _ => None,
    }
}

/// String coercion the way a loosely typed webhook author would expect it.
fn js_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|i| match i {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        other => other.to_string(),
    }
}

/// Inner code check: validates, forwards `{code}` and interprets the answer.
pub async fn checker_inner(
    client: &WebhookClient,
    config: &CodeCheckerConfig,
    req: CheckerRequest,
) -> (StatusCode, Value) {
    let code = match req.code {
        Some(c) if !c.trim().is_empty() => c,
        _ => return (StatusCode::BAD_REQUEST, json!({"error": "Missing code"})),
    };

    let url = config.url_for(req.test_mode.unwrap_or(false));
    match client.post_json(url, &json!({ "code": code })).await {
        Ok((status, data)) => {
            let verdict = interpret_verdict(&data);
            tracing::info!(
                upstream_status = status.as_u16(),
                valid = verdict.valid,
                "Code checker answered"
            );
            match serde_json::to_value(&verdict) {
                Ok(body) => (StatusCode::OK, body),
                Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": e.to_string()})),
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Code checker error");
            (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": e.to_string()}))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_verdicts() {
        assert!(interpret_verdict(&json!("TRUE")).valid);
        assert!(interpret_verdict(&json!("code is Valid")).valid);
        assert!(!interpret_verdict(&json!("nope")).valid);
        // Substring match: "invalid" contains "valid".
        assert!(interpret_verdict(&json!("invalid")).valid);
    }

    #[test]
    fn test_field_priority() {
        let v = interpret_verdict(&json!({"valid": false, "success": true}));
        assert!(!v.valid);
        assert_eq!(v.allowed_agents, AccessGrant::default());

        assert!(interpret_verdict(&json!({"success": 1})).valid);
        assert!(interpret_verdict(&json!({"result": "True"})).valid);
        assert!(interpret_verdict(&json!({"result": true})).valid);
        assert!(!interpret_verdict(&json!({"result": {"ok": true}})).valid);
        assert!(!interpret_verdict(&json!({"valid": null, "success": true})).valid);
    }

    #[test]
    fn test_valid_without_agents_defaults_to_all() {
        let v = interpret_verdict(&json!({"valid": true}));
        assert_eq!(v.allowed_agents, AccessGrant::All);

        let v = interpret_verdict(&json!({"valid": true, "allowedAgents": []}));
        assert_eq!(v.allowed_agents, AccessGrant::All);
    }

    #[test]
    fn test_explicit_agents_kept() {
        let v = interpret_verdict(&json!({"valid": true, "allowedAgents": ["chiroli", 7]}));
        assert_eq!(v.allowed_agents, AccessGrant::agents(["chiroli"]));

        let v = interpret_verdict(&json!({"success": "yes", "allowedAgents": "all"}));
        assert!(v.valid);
        assert_eq!(v.allowed_agents, AccessGrant::All);
    }

    #[test]
    fn test_other_shapes_invalid() {
        assert!(!interpret_verdict(&json!(1)).valid);
        assert!(!interpret_verdict(&json!([true])).valid);
        assert!(!interpret_verdict(&json!(null)).valid);
    }

    #[test]
    fn test_invalid_serializes_empty_list() {
        let body = serde_json::to_value(interpret_verdict(&json!({"valid": false}))).unwrap();
        assert_eq!(body, json!({"valid": false, "allowedAgents": []}));
    }
}
