//! Passcode gate.
//!
//! Codes are matched by exact string equality against a static table. This is
//! a feature toggle rather than a security boundary: no hashing, no lockout.

use std::time::{Duration, Instant};

use crate::models::{AccessCode, AccessGrant, Agent};

/// How long the "invalid code" indicator stays visible after a miss.
pub const ERROR_FLASH: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// The code matched; carries the grant it contributed.
    Granted(AccessGrant),
    Denied,
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    codes: Vec<AccessCode>,
    grant: Option<AccessGrant>,
    error_until: Option<Instant>,
}

impl AccessGate {
    pub fn new(codes: Vec<AccessCode>) -> Self {
        Self {
            codes,
            grant: None,
            error_until: None,
        }
    }

    pub fn lookup(&self, code: &str) -> Option<&AccessGrant> {
        self.codes
            .iter()
            .find(|c| c.code == code)
            .map(|c| &c.allowed_agents)
    }

    /// Try a code against the local table.
    pub fn attempt(&mut self, code: &str, now: Instant) -> GateOutcome {
        match self.lookup(code).cloned() {
            Some(grant) => {
                self.apply(&grant);
                GateOutcome::Granted(grant)
            }
            None => {
                self.deny(now);
                GateOutcome::Denied
            }
        }
    }

    /// Merge a grant obtained elsewhere (e.g. from the remote code checker).
    pub fn apply(&mut self, grant: &AccessGrant) {
        match &mut self.grant {
            Some(current) => current.merge(grant),
            None => self.grant = Some(grant.clone()),
        }
        self.error_until = None;
        tracing::info!(grant = ?self.grant, "Access grant updated");
    }

    pub fn deny(&mut self, now: Instant) {
        self.error_until = Some(now + ERROR_FLASH);
        tracing::warn!("Access code rejected");
    }

    pub fn error_visible(&self, now: Instant) -> bool {
        self.error_until.is_some_and(|until| now < until)
    }

    pub fn unlocked(&self) -> bool {
        self.grant.is_some()
    }

    pub fn grant(&self) -> Option<&AccessGrant> {
        self.grant.as_ref()
    }

    pub fn allows(&self, agent_id: &str) -> bool {
        self.grant.as_ref().is_some_and(|g| g.allows(agent_id))
    }

    pub fn visible_agents<'a>(&self, catalog: &'a [Agent]) -> Vec<&'a Agent> {
        catalog.iter().filter(|a| self.allows(&a.id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::builtin_agents;

    fn gate() -> AccessGate {
        AccessGate::new(vec![
            AccessCode {
                code: "1111".to_string(),
                allowed_agents: AccessGrant::agents(["chiroli"]),
            },
            AccessCode {
                code: "2222".to_string(),
                allowed_agents: AccessGrant::agents(["safe3d", "simplygerman"]),
            },
            AccessCode {
                code: "9999".to_string(),
                allowed_agents: AccessGrant::All,
            },
        ])
    }

    #[test]
    fn test_unknown_code_is_denied_with_error_flash() {
        let mut gate = gate();
        let now = Instant::now();
        assert_eq!(gate.attempt("0000", now), GateOutcome::Denied);
        assert!(!gate.unlocked());
        assert!(gate.error_visible(now));
        assert!(gate.error_visible(now + Duration::from_millis(1999)));
        assert!(!gate.error_visible(now + ERROR_FLASH));
    }

    #[test]
    fn test_codes_match_exactly() {
        let mut gate = gate();
        let now = Instant::now();
        assert_eq!(gate.attempt("1111 ", now), GateOutcome::Denied);
        assert_eq!(gate.attempt("111", now), GateOutcome::Denied);
        assert!(!gate.unlocked());
    }

    #[test]
    fn test_known_code_applies_grant_exactly() {
        let mut gate = gate();
        let outcome = gate.attempt("1111", Instant::now());
        assert_eq!(outcome, GateOutcome::Granted(AccessGrant::agents(["chiroli"])));
        assert!(gate.unlocked());

        let catalog = builtin_agents();
        let visible: Vec<_> = gate.visible_agents(&catalog).iter().map(|a| a.id.clone()).collect();
        assert_eq!(visible, vec!["chiroli".to_string()]);
    }

    #[test]
    fn test_further_codes_widen_grant() {
        let mut gate = gate();
        let now = Instant::now();
        gate.attempt("1111", now);
        gate.attempt("2222", now);
        assert_eq!(
            gate.grant(),
            Some(&AccessGrant::agents(["chiroli", "safe3d", "simplygerman"]))
        );

        // A miss never narrows what is already granted.
        gate.attempt("bogus", now);
        assert!(gate.allows("chiroli"));

        gate.attempt("9999", now);
        assert_eq!(gate.grant(), Some(&AccessGrant::All));
        assert_eq!(gate.visible_agents(&builtin_agents()).len(), 4);
    }

    #[test]
    fn test_success_clears_error_flash() {
        let mut gate = gate();
        let now = Instant::now();
        gate.attempt("nope", now);
        gate.attempt("9999", now);
        assert!(!gate.error_visible(now));
    }
}
