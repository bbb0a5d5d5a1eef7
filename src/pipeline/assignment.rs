//! Team assignment: override table first, least-loaded active team second.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::emails::EmailIntent;
use crate::error::{AssignmentError, DatabaseError};
use crate::store::Store;
use crate::teams::Team;

/// Default routing: intent → team name.
pub const DEFAULT_RULES: &[(EmailIntent, &str)] = &[
    (EmailIntent::RefundRequest, "billing-team"),
    (EmailIntent::BillingIssue, "billing-team"),
    (EmailIntent::BugReport, "technical-team"),
    (EmailIntent::TechnicalSupport, "technical-team"),
    (EmailIntent::AccountAccess, "technical-team"),
    (EmailIntent::FeatureRequest, "product-team"),
    (EmailIntent::GeneralInquiry, "support-team"),
    (EmailIntent::Complaint, "support-team"),
];

// ── Override table ──────────────────────────────────────────────────

/// Operator-settable intent → team name mapping.
///
/// Read on every assignment, written rarely.
#[derive(Debug)]
pub struct AssignmentRules {
    rules: RwLock<HashMap<EmailIntent, String>>,
}

impl Default for AssignmentRules {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl AssignmentRules {
    /// Table with no overrides; every intent goes to the fallback search.
    pub fn empty() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(intent, team)| (*intent, team.to_string()))
            .collect();
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Route `intent` to the team named `team`, replacing any previous rule.
    pub fn set(&self, intent: EmailIntent, team: &str) -> Result<(), AssignmentError> {
        if intent == EmailIntent::Unknown {
            return Err(AssignmentError::UnroutableIntent(intent.to_string()));
        }
        let team = team.trim();
        if team.is_empty() {
            return Err(AssignmentError::EmptyTeamName);
        }

        let previous = self
            .rules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(intent, team.to_string());
        info!(
            intent = %intent,
            team,
            previous = previous.as_deref().unwrap_or("none"),
            "Assignment rule updated"
        );
        Ok(())
    }

    pub fn get(&self, intent: EmailIntent) -> Option<String> {
        self.rules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&intent)
            .cloned()
    }

    /// All rules, in intent declaration order.
    pub fn snapshot(&self) -> Vec<(EmailIntent, String)> {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        EmailIntent::ALL
            .into_iter()
            .filter_map(|intent| rules.get(&intent).map(|team| (intent, team.clone())))
            .collect()
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// Resolves an intent to a team id and charges the chosen team's workload.
pub struct TeamAssignmentEngine {
    store: Arc<dyn Store>,
    rules: Arc<AssignmentRules>,
}

impl TeamAssignmentEngine {
    pub fn new(store: Arc<dyn Store>, rules: Arc<AssignmentRules>) -> Self {
        Self { store, rules }
    }

    pub fn rules(&self) -> &Arc<AssignmentRules> {
        &self.rules
    }

    /// Pick a team for `intent` and charge its workload.
    ///
    /// `Ok(None)` means nothing qualifies; the email stays unassigned.
    pub async fn assign_team(
        &self,
        intent: Option<EmailIntent>,
    ) -> Result<Option<String>, DatabaseError> {
        let Some(team_id) = self.select_team(intent).await? else {
            return Ok(None);
        };
        self.charge(&team_id).await?;
        Ok(Some(team_id))
    }

    /// Pick a team for `intent` without touching any workload counter.
    pub async fn select_team(
        &self,
        intent: Option<EmailIntent>,
    ) -> Result<Option<String>, DatabaseError> {
        let intent = match intent {
            None | Some(EmailIntent::Unknown) => return Ok(None),
            Some(intent) => intent,
        };

        let team = match self.override_team(intent).await? {
            Some(team) => Some(team),
            None => self.least_loaded_team(intent).await?,
        };

        match team {
            Some(team) => Ok(Some(team.id)),
            None => {
                debug!(intent = %intent, "No team qualifies for intent");
                Ok(None)
            }
        }
    }

    /// Record one more routed email against `team_id`.
    pub async fn charge(&self, team_id: &str) -> Result<(), DatabaseError> {
        if !self.store.increment_team_load(team_id).await? {
            warn!(team_id, "Team disappeared before its load could be recorded");
        }
        Ok(())
    }

    async fn override_team(&self, intent: EmailIntent) -> Result<Option<Team>, DatabaseError> {
        let Some(name) = self.rules.get(intent) else {
            return Ok(None);
        };
        let team = self.store.find_team_by_name(&name).await?;
        match &team {
            Some(t) => debug!(intent = %intent, team = %t.name, "Override rule matched"),
            None => warn!(
                intent = %intent,
                team = %name,
                "Override names a team that does not exist, falling back"
            ),
        }
        Ok(team)
    }

    async fn least_loaded_team(&self, intent: EmailIntent) -> Result<Option<Team>, DatabaseError> {
        let candidates = self.store.teams_handling(intent).await?;
        Ok(pick_least_loaded(candidates))
    }
}

/// Lowest `total_emails_handled` among active teams; first wins on ties.
fn pick_least_loaded(candidates: Vec<Team>) -> Option<Team> {
    candidates
        .into_iter()
        .filter(Team::is_active)
        .fold(None, |best: Option<Team>, team| match best {
            Some(b) if b.total_emails_handled <= team.total_emails_handled => Some(b),
            _ => Some(team),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;
    use crate::teams::TeamStatus;

    fn team(name: &str, intents: Vec<EmailIntent>, load: u64) -> Team {
        let mut t = Team::new(name, "", intents);
        t.total_emails_handled = load;
        t
    }

    async fn engine_with(
        teams: &[Team],
        rules: AssignmentRules,
    ) -> (TeamAssignmentEngine, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        for t in teams {
            store.save_team(t).await.unwrap();
        }
        (
            TeamAssignmentEngine::new(Arc::clone(&store), Arc::new(rules)),
            store,
        )
    }

    // ── Rules ───────────────────────────────────────────────────────

    #[test]
    fn defaults_cover_every_routable_intent() {
        let rules = AssignmentRules::with_defaults();
        assert_eq!(rules.get(EmailIntent::RefundRequest).as_deref(), Some("billing-team"));
        assert_eq!(rules.get(EmailIntent::AccountAccess).as_deref(), Some("technical-team"));
        assert_eq!(rules.get(EmailIntent::FeatureRequest).as_deref(), Some("product-team"));
        assert_eq!(rules.get(EmailIntent::Complaint).as_deref(), Some("support-team"));
        assert_eq!(rules.get(EmailIntent::Unknown), None);
        assert_eq!(rules.snapshot().len(), 8);
    }

    #[test]
    fn set_replaces_rule_and_rejects_unknown() {
        let rules = AssignmentRules::with_defaults();
        rules.set(EmailIntent::BugReport, " qa-team ").unwrap();
        assert_eq!(rules.get(EmailIntent::BugReport).as_deref(), Some("qa-team"));

        assert!(matches!(
            rules.set(EmailIntent::Unknown, "anyone"),
            Err(AssignmentError::UnroutableIntent(_))
        ));
        assert!(matches!(
            rules.set(EmailIntent::BugReport, "  "),
            Err(AssignmentError::EmptyTeamName)
        ));
    }

    // ── Engine ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn none_and_unknown_resolve_to_none() {
        let teams = [team(
            "catch-all",
            EmailIntent::ALL.to_vec(),
            0,
        )];
        let (engine, _) = engine_with(&teams, AssignmentRules::with_defaults()).await;
        assert_eq!(engine.assign_team(None).await.unwrap(), None);
        assert_eq!(
            engine.assign_team(Some(EmailIntent::Unknown)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn override_returns_named_team_and_charges_it() {
        let billing = team("billing-team", vec![], 10);
        let idle = team("idle-team", vec![EmailIntent::RefundRequest], 0);
        let (engine, store) =
            engine_with(&[billing.clone(), idle], AssignmentRules::with_defaults()).await;

        let chosen = engine
            .assign_team(Some(EmailIntent::RefundRequest))
            .await
            .unwrap();
        assert_eq!(chosen.as_deref(), Some(billing.id.as_str()));

        let loaded = store.get_team(&billing.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_emails_handled, 11);
    }

    #[tokio::test]
    async fn select_leaves_load_alone_until_charged() {
        let billing = team("billing-team", vec![EmailIntent::BillingIssue], 3);
        let (engine, store) = engine_with(&[billing.clone()], AssignmentRules::with_defaults()).await;

        let chosen = engine
            .select_team(Some(EmailIntent::BillingIssue))
            .await
            .unwrap();
        assert_eq!(chosen.as_deref(), Some(billing.id.as_str()));
        let loaded = store.get_team(&billing.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_emails_handled, 3);

        engine.charge(&billing.id).await.unwrap();
        engine.charge("no-such-team").await.unwrap();
        let loaded = store.get_team(&billing.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_emails_handled, 4);
    }

    #[tokio::test]
    async fn every_default_override_hits_existing_team() {
        let teams: Vec<Team> = ["billing-team", "technical-team", "product-team", "support-team"]
            .into_iter()
            .map(|name| team(name, vec![], 0))
            .collect();
        let (engine, store) = engine_with(&teams, AssignmentRules::with_defaults()).await;

        for (intent, name) in DEFAULT_RULES {
            let id = engine.assign_team(Some(*intent)).await.unwrap().unwrap();
            let chosen = store.get_team(&id).await.unwrap().unwrap();
            assert_eq!(chosen.name, *name);
        }
    }

    #[tokio::test]
    async fn missing_override_team_falls_back_to_least_loaded() {
        let busy = team("busy", vec![EmailIntent::BugReport], 5);
        let quiet = team("quiet", vec![EmailIntent::BugReport], 2);
        let (engine, _) = engine_with(
            &[busy, quiet.clone()],
            AssignmentRules::with_defaults(),
        )
        .await;

        let chosen = engine.assign_team(Some(EmailIntent::BugReport)).await.unwrap();
        assert_eq!(chosen, Some(quiet.id));
    }

    #[tokio::test]
    async fn fallback_skips_inactive_and_breaks_ties_by_order() {
        let mut archived = team("archived", vec![EmailIntent::Complaint], 0);
        archived.status = TeamStatus::Archived;
        let first = team("first", vec![EmailIntent::Complaint], 3);
        let second = team("second", vec![EmailIntent::Complaint], 3);
        let (engine, _) = engine_with(
            &[archived, first.clone(), second],
            AssignmentRules::empty(),
        )
        .await;

        let chosen = engine.assign_team(Some(EmailIntent::Complaint)).await.unwrap();
        assert_eq!(chosen, Some(first.id));
    }

    #[tokio::test]
    async fn fallback_balances_as_load_accumulates() {
        let a = team("a", vec![EmailIntent::GeneralInquiry], 0);
        let b = team("b", vec![EmailIntent::GeneralInquiry], 0);
        let (engine, _) = engine_with(&[a.clone(), b.clone()], AssignmentRules::empty()).await;

        let mut picks = Vec::new();
        for _ in 0..4 {
            picks.push(
                engine
                    .assign_team(Some(EmailIntent::GeneralInquiry))
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        assert_eq!(picks, vec![a.id.clone(), b.id.clone(), a.id, b.id]);
    }

    #[tokio::test]
    async fn no_capable_active_team_is_none() {
        let mut inactive = team("inactive", vec![EmailIntent::FeatureRequest], 0);
        inactive.status = TeamStatus::Inactive;
        let (engine, _) = engine_with(&[inactive], AssignmentRules::empty()).await;
        assert_eq!(
            engine
                .assign_team(Some(EmailIntent::FeatureRequest))
                .await
                .unwrap(),
            None
        );
    }

    #[test]
    fn pick_least_loaded_prefers_first_on_tie() {
        let a = team("a", vec![], 1);
        let b = team("b", vec![], 1);
        let c = team("c", vec![], 2);
        let chosen = pick_least_loaded(vec![c, a.clone(), b]).unwrap();
        assert_eq!(chosen.id, a.id);
    }
}
