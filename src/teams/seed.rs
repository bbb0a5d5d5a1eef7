//! Default teams and users for a fresh store.

use tracing::info;

use crate::emails::EmailIntent;
use crate::error::DatabaseError;
use crate::store::Store;
use crate::teams::model::{Team, User, UserRole};

fn default_teams() -> Vec<Team> {
    vec![
        Team::new(
            "billing-team",
            "Handles billing, payment and refund requests",
            vec![EmailIntent::BillingIssue, EmailIntent::RefundRequest],
        ),
        Team::new(
            "technical-team",
            "Handles bug reports, technical support and account access",
            vec![
                EmailIntent::BugReport,
                EmailIntent::TechnicalSupport,
                EmailIntent::AccountAccess,
            ],
        ),
        Team::new(
            "product-team",
            "Handles feature requests",
            vec![EmailIntent::FeatureRequest],
        ),
        Team::new(
            "support-team",
            "Handles general inquiries and complaints",
            vec![EmailIntent::GeneralInquiry, EmailIntent::Complaint],
        ),
    ]
}

/// Create the default teams and users when the store has none.
///
/// Each collection is seeded independently, so an existing team roster is
/// left alone even when users are missing (and vice versa).
pub async fn seed_defaults(store: &dyn Store) -> Result<(), DatabaseError> {
    let mut teams = Vec::new();
    if store.list_teams().await?.is_empty() {
        for team in default_teams() {
            store.save_team(&team).await?;
            teams.push(team);
        }
        info!(count = teams.len(), "Seeded default teams");
    }

    if store.list_users().await?.is_empty() {
        let mut admin = User::new("admin@emailassistant.com", "Admin User", UserRole::Manager);
        let mut tech = User::new("tech@emailassistant.com", "Tech Agent", UserRole::Agent);
        tech.expertise = vec![EmailIntent::BugReport, EmailIntent::TechnicalSupport];

        if let Some(team) = teams.iter().find(|t| t.name == "support-team") {
            admin.team_ids.push(team.id.clone());
        }
        if let Some(team) = teams.iter().find(|t| t.name == "technical-team") {
            tech.team_ids.push(team.id.clone());
        }

        store.save_user(&admin).await?;
        store.save_user(&tech).await?;
        info!("Seeded default users");
    }

    Ok(())
}
