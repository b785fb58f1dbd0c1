mod common;

use anyhow::Result;
use common::{OWNER, StandardRoster, parse_date, test_service};
use grouppy::application::{AppError, TripPlan};
use grouppy::io::Exporter;

#[tokio::test]
async fn test_duplicate_username_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardRoster::create_owner(&service).await?;

    let err = service
        .register_user(OWNER.into(), "other@example.com".into(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UserAlreadyExists(_)));

    Ok(())
}

#[tokio::test]
async fn test_password_is_stored_as_digest() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let user = service
        .register_user("sara".into(), "sara@example.com".into(), Some("segreto"))
        .await?;

    let hash = user.password_hash.expect("hash should be stored");
    assert_ne!(hash, "segreto");
    assert_eq!(hash.len(), 64, "SHA-256 hex digest");

    Ok(())
}

#[tokio::test]
async fn test_friend_lifecycle() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardRoster::create_owner(&service).await?;

    let friend = service
        .add_friend(OWNER, "Luca".into(), "Bianchi".into(), "luca@example.com".into())
        .await?;
    assert!(friend.id > 0);

    let edited = service
        .edit_friend(
            OWNER,
            friend.id,
            None,
            Some("Bianconi".into()),
            Some("luca.b@example.com".into()),
        )
        .await?;
    assert_eq!(edited.display_name(), "Luca Bianconi");
    assert_eq!(edited.email, "luca.b@example.com");

    service.delete_friend(OWNER, friend.id).await?;
    let err = service.get_friend(OWNER, friend.id).await.unwrap_err();
    assert!(matches!(err, AppError::FriendNotFound(_)));
    assert!(service.list_friends(OWNER).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unknown_owner_is_rejected_everywhere() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service.list_friends("nessuno").await.unwrap_err();
    assert!(matches!(err, AppError::UserNotFound(_)));

    let err = service.dashboard("nessuno").await.unwrap_err();
    assert!(matches!(err, AppError::UserNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_dashboard_ranks_the_roster() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ids = StandardRoster::create_with_friends(&service).await?;
    let (luca, anna, paolo, giulia) = (ids[0], ids[1], ids[2], ids[3]);

    // Luca drives a lot, Giulia only rides.
    service
        .record_trip(
            OWNER,
            &TripPlan {
                distance: 20.0,
                drivers: vec![luca],
                passengers: vec![paolo, giulia],
            },
        )
        .await?;
    service
        .record_trip(
            OWNER,
            &TripPlan {
                distance: 6.0,
                drivers: vec![anna],
                passengers: vec![giulia],
            },
        )
        .await?;
    service
        .add_transazione(OWNER, "Pedaggio".into(), "".into(), parse_date("2024-03-01"), -700)
        .await?;

    let dashboard = service.dashboard(OWNER).await?;

    // Scores: Luca +20, Anna +6, Paolo -10, Giulia -16.
    let order: Vec<i64> = dashboard.friends.iter().map(|f| f.id).collect();
    assert_eq!(order, [luca, anna, paolo, giulia]);

    let best: Vec<i64> = dashboard.best_friends.iter().map(|f| f.id).collect();
    assert_eq!(best, [luca, anna]);

    let worst: Vec<i64> = dashboard.worst_friends.iter().map(|f| f.id).collect();
    assert_eq!(worst, [paolo, giulia]);

    assert_eq!(dashboard.user.cassa, -700);
    assert_eq!(dashboard.transazioni.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_csv_export_of_transazioni() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardRoster::create_owner(&service).await?;

    service
        .add_transazione(OWNER, "Cena".into(), "Pizzeria".into(), parse_date("2024-03-10"), -4000)
        .await?;
    service
        .add_transazione(OWNER, "Quota".into(), "".into(), parse_date("2024-03-12"), 1500)
        .await?;

    let exporter = Exporter::new(&service);
    let mut buffer = Vec::new();
    let count = exporter.export_transazioni_csv(OWNER, &mut buffer).await?;
    assert_eq!(count, 2);

    let csv = String::from_utf8(buffer)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "id,data,titolo,descrizione,costo");
    assert!(lines[1].contains("Quota"), "most recent first: {}", lines[1]);
    assert!(lines[2].contains("Cena"));
    assert!(lines[2].contains("-40.00"));

    Ok(())
}

#[tokio::test]
async fn test_csv_export_of_friends() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardRoster::create_with_friends(&service).await?;

    let exporter = Exporter::new(&service);
    let mut buffer = Vec::new();
    let count = exporter.export_friends_csv(OWNER, &mut buffer).await?;
    assert_eq!(count, 4);

    let csv = String::from_utf8(buffer)?;
    assert!(csv.starts_with("id,nome,cognome,email,score"));
    assert!(csv.contains("Luca,Bianchi"));

    Ok(())
}

#[tokio::test]
async fn test_json_snapshot_round_trips() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ids = StandardRoster::create_with_friends(&service).await?;

    service
        .record_trip(
            OWNER,
            &TripPlan {
                distance: 10.0,
                drivers: vec![ids[0]],
                passengers: vec![ids[1], ids[2]],
            },
        )
        .await?;
    service
        .add_transazione(OWNER, "Quota".into(), "".into(), parse_date("2024-03-12"), 1500)
        .await?;

    let exporter = Exporter::new(&service);
    let mut buffer = Vec::new();
    exporter.export_snapshot_json(OWNER, &mut buffer).await?;

    let parsed: serde_json::Value = serde_json::from_slice(&buffer)?;
    assert_eq!(parsed["user"]["username"], OWNER);
    assert_eq!(parsed["user"]["cassa"], 1500);
    assert_eq!(parsed["friends"].as_array().unwrap().len(), 4);
    assert_eq!(parsed["transazioni"].as_array().unwrap().len(), 1);
    // The exported roster keeps the score ordering.
    assert_eq!(parsed["friends"][0]["score"], 10);

    Ok(())
}
