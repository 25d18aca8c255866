use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Agents unlocked by access codes. Only ever widens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GrantRepr", into = "GrantRepr")]
pub enum AccessGrant {
    All,
    Agents(BTreeSet<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GrantRepr {
    Keyword(String),
    Agents(Vec<String>),
}

impl TryFrom<GrantRepr> for AccessGrant {
    type Error = String;

    fn try_from(repr: GrantRepr) -> Result<Self, Self::Error> {
        match repr {
            GrantRepr::Keyword(k) if k == "all" => Ok(AccessGrant::All),
            GrantRepr::Keyword(k) => Err(format!("unknown grant keyword: {}", k)),
            GrantRepr::Agents(ids) => Ok(AccessGrant::Agents(ids.into_iter().collect())),
        }
    }
}

impl From<AccessGrant> for GrantRepr {
    fn from(grant: AccessGrant) -> Self {
        match grant {
            AccessGrant::All => GrantRepr::Keyword("all".to_string()),
            AccessGrant::Agents(ids) => GrantRepr::Agents(ids.into_iter().collect()),
        }
    }
}

impl Default for AccessGrant {
    fn default() -> Self {
        AccessGrant::Agents(BTreeSet::new())
    }
}

impl AccessGrant {
    pub fn agents<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AccessGrant::Agents(ids.into_iter().map(Into::into).collect())
    }

    /// Set union; `All` absorbs everything.
    pub fn merge(&mut self, other: &AccessGrant) {
        if matches!(other, AccessGrant::All) {
            *self = AccessGrant::All;
            return;
        }
        if let (AccessGrant::Agents(mine), AccessGrant::Agents(theirs)) = (self, other) {
            mine.extend(theirs.iter().cloned());
        }
    }

    pub fn allows(&self, agent_id: &str) -> bool {
        match self {
            AccessGrant::All => true,
            AccessGrant::Agents(ids) => ids.contains(agent_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AccessGrant::Agents(ids) if ids.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCode {
    pub code: String,
    pub allowed_agents: AccessGrant,
}

/// Code-checker response body: `{valid, allowedAgents}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeVerdict {
    pub valid: bool,
    pub allowed_agents: AccessGrant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_union() {
        let mut grant = AccessGrant::agents(["a", "b"]);
        grant.merge(&AccessGrant::agents(["b", "c"]));
        assert_eq!(grant, AccessGrant::agents(["a", "b", "c"]));
    }

    #[test]
    fn test_all_absorbs() {
        let mut grant = AccessGrant::agents(["a"]);
        grant.merge(&AccessGrant::All);
        assert_eq!(grant, AccessGrant::All);

        grant.merge(&AccessGrant::agents(["z"]));
        assert_eq!(grant, AccessGrant::All);
    }

    #[test]
    fn test_deserialize_keyword_and_list() {
        let all: AccessGrant = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, AccessGrant::All);

        let some: AccessGrant = serde_json::from_str("[\"chiroli\"]").unwrap();
        assert!(some.allows("chiroli"));
        assert!(!some.allows("safe3d"));

        assert!(serde_json::from_str::<AccessGrant>("\"some\"").is_err());
    }

    #[test]
    fn test_serialize_all_as_keyword() {
        assert_eq!(serde_json::to_value(AccessGrant::All).unwrap(), "all");
        assert_eq!(
            serde_json::to_value(AccessGrant::agents(["x"])).unwrap(),
            serde_json::json!(["x"])
        );
    }
}
