// Persistence tests - documents on disk, reload fidelity, corruption
// recovery

use std::fs;

use lge_backend_core::models::Plan;
use lge_backend_core::services::{CreditLedger, GrantKind};
use lge_backend_core::store::JsonStore;

mod common;
use common::setup_ledger;

#[tokio::test]
async fn test_documents_written_with_expected_names_and_format() {
    let (ledger, _store, dir) = setup_ledger().await;
    ledger
        .create_user("alice", "alice@example.com", "Passw0rd!")
        .await
        .unwrap();
    ledger.consume_demo_lead("alice").await.unwrap();

    let users_path = dir.path().join("users_credits.json");
    let tx_path = dir.path().join("transactions.json");
    assert!(users_path.exists());
    assert!(tx_path.exists());

    // Pretty-printed with 4-space indent, keyed by username
    let text = fs::read_to_string(&users_path).unwrap();
    assert!(text.contains("    \"alice\""));
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["alice"]["email"], "alice@example.com");
    assert_eq!(value["alice"]["plan"], "demo");
    assert_eq!(value["alice"]["demo_leads_used"], 1);

    let tx_value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&tx_path).unwrap()).unwrap();
    assert!(tx_value.is_array());
    assert_eq!(tx_value[0]["type"], "demo_usage");
}

#[tokio::test]
async fn test_reload_reproduces_state() {
    let (ledger, store, _dir) = setup_ledger().await;
    ledger
        .create_user("alice", "alice@example.com", "Passw0rd!")
        .await
        .unwrap();
    ledger
        .create_user("bob", "bob@example.com", "Passw0rd!")
        .await
        .unwrap();
    ledger
        .add_credits("bob", 500, GrantKind::PlanUpgrade(Plan::Starter), "cs_1")
        .await
        .unwrap();
    ledger.consume_credits("bob", 100, 100, "twitter").await.unwrap();
    ledger.consume_demo_lead("alice").await.unwrap();

    // A second ledger instance over the same directory sees identical state
    let reloaded = CreditLedger::open(store).await;

    let alice = reloaded.get_user("alice").await.unwrap();
    assert_eq!(alice.demo_leads_used, 1);
    assert_eq!(alice.plan, Plan::Demo);

    let bob = reloaded.get_user("bob").await.unwrap();
    assert_eq!(bob.credits, 400);
    assert_eq!(bob.plan, Plan::Starter);
    assert_eq!(bob.total_leads_downloaded, 100);
    assert_eq!(bob.transactions.len(), 2);

    let stats = reloaded.admin_stats().await;
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.total_transactions, 3);

    // The duplicate-session guard survives the reload too
    let err = reloaded
        .add_credits("bob", 500, GrantKind::CreditPurchase, "cs_1")
        .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn test_corrupted_users_file_never_blocks_startup() {
    let (ledger, store, dir) = setup_ledger().await;
    ledger
        .create_user("alice", "alice@example.com", "Passw0rd!")
        .await
        .unwrap();
    drop(ledger);

    // Mangle the users document on disk
    let users_path = dir.path().join("users_credits.json");
    fs::write(&users_path, b"{\"alice\": {\"email\": truncated garbage").unwrap();

    let reloaded = CreditLedger::open(store).await;
    let health = reloaded.system_health().await;
    assert_eq!(health.users_count, 0);

    // The bad file was quarantined, not deleted
    assert!(!users_path.exists());
    let quarantined = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("users_credits.json.corrupted.")
        });
    assert!(quarantined);

    // And the ledger is fully usable afterwards
    reloaded
        .create_user("fresh", "fresh@example.com", "Passw0rd!")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_in_memory_mode_stays_operational() {
    // No writable directory at all
    let store = JsonStore::new(
        Some(std::path::PathBuf::from("/proc/no_such_dir")),
        Vec::new(),
        std::time::Duration::from_secs(5),
    );
    let ledger = CreditLedger::open(store).await;

    ledger
        .create_user("alice", "alice@example.com", "Passw0rd!")
        .await
        .unwrap();
    ledger.consume_demo_lead("alice").await.unwrap();

    // State is served from memory despite every save failing
    let user = ledger.get_user("alice").await.unwrap();
    assert_eq!(user.demo_leads_used, 1);

    let health = ledger.system_health().await;
    assert_eq!(health.status, "degraded");
    assert!(!health.issues.is_empty());
}

#[tokio::test]
async fn test_emergency_copies_land_in_backup_dir() {
    let backup = tempfile::tempdir().unwrap();
    let store = JsonStore::new(
        Some(std::path::PathBuf::from("/proc/no_such_dir")),
        vec![backup.path().to_path_buf()],
        std::time::Duration::from_secs(5),
    );
    let ledger = CreditLedger::open(store).await;

    ledger
        .create_user("alice", "alice@example.com", "Passw0rd!")
        .await
        .unwrap();

    let emergency_files: Vec<_> = fs::read_dir(backup.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.contains(".emergency."))
        .collect();
    assert!(
        emergency_files
            .iter()
            .any(|name| name.starts_with("users_credits.emergency.")),
        "expected users emergency copy, got {:?}",
        emergency_files
    );
}
