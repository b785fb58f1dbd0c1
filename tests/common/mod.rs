// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use grouppy::application::TrackerService;
use grouppy::domain::FriendId;
use tempfile::TempDir;

/// The account every fixture operates on.
pub const OWNER: &str = "marco";

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(TrackerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = TrackerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Test fixture: one registered owner plus a standard roster
pub struct StandardRoster;

impl StandardRoster {
    /// Register the owner account only
    pub async fn create_owner(service: &TrackerService) -> Result<()> {
        service
            .register_user(OWNER.into(), "marco@example.com".into(), None)
            .await?;
        Ok(())
    }

    /// Register the owner and four friends; returns their ids in insertion
    /// order (Luca, Anna, Paolo, Giulia)
    pub async fn create_with_friends(service: &TrackerService) -> Result<Vec<FriendId>> {
        Self::create_owner(service).await?;
        let mut ids = Vec::new();
        for (nome, cognome) in [
            ("Luca", "Bianchi"),
            ("Anna", "Rossi"),
            ("Paolo", "Verdi"),
            ("Giulia", "Russo"),
        ] {
            let email = format!("{}@example.com", nome.to_lowercase());
            let friend = service
                .add_friend(OWNER, nome.into(), cognome.into(), email)
                .await?;
            ids.push(friend.id);
        }
        Ok(ids)
    }
}
