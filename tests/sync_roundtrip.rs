//! Two offline clients sharing records through a live document server.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tempfile::TempDir;

use school_erp::app::AppContext;
use school_erp::config::SyncConfig;
use school_erp::models::{Student, StudentStatus, Transaction, TransactionKind};
use school_erp::server::{router, ApiKeyEntry, ApiKeyStore, ServerState, ServerStorage};
use school_erp::sync::{DocumentClient, SyncWorker};

const API_KEY: &str = "greenfield-key";

async fn start_server(data_dir: &TempDir) -> String {
    let state = ServerState {
        api_keys: Arc::new(ApiKeyStore::from_entries(vec![ApiKeyEntry {
            key: API_KEY.to_string(),
            org_id: "greenfield".to_string(),
        }])),
        storage: ServerStorage::new(data_dir.path()),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

struct Client {
    ctx: AppContext,
    worker: SyncWorker,
    _dir: TempDir,
}

async fn client(server_url: &str) -> Client {
    let dir = TempDir::new().unwrap();
    let ctx = AppContext::open(&dir.path().join("erp.db")).await.unwrap();
    let remote = DocumentClient::new(server_url.to_string(), API_KEY.to_string()).unwrap();
    let worker = ctx.sync_worker(Arc::new(remote), &SyncConfig::default());
    Client { ctx, worker, _dir: dir }
}

#[tokio::test]
async fn test_changes_flow_between_clients() {
    let server_dir = TempDir::new().unwrap();
    let url = start_server(&server_dir).await;
    let office = client(&url).await;
    let bursary = client(&url).await;

    let student = Student::new("ADM-100", "Ada", "Eze", "JSS1");
    office.ctx.students.save(&student).await.unwrap();
    let fees = Transaction::new(
        TransactionKind::Income,
        Decimal::from(45_000),
        "fees",
        NaiveDate::from_ymd_opt(2025, 9, 8).unwrap(),
    );
    office.ctx.transactions.save(&fees).await.unwrap();

    let report = office.worker.sync_once().await.unwrap();
    assert_eq!(report.push.pushed, 2);
    assert!(!report.is_interrupted());
    assert_eq!(office.ctx.outbox.pending_count().await.unwrap(), 0);

    let report = bursary.worker.sync_once().await.unwrap();
    assert_eq!(report.pull.upserted(), 2);
    assert_eq!(bursary.ctx.students.list().await.unwrap(), vec![student.clone()]);
    assert_eq!(bursary.ctx.transactions.list().await.unwrap(), vec![fees]);

    assert!(bursary.ctx.students.delete(&student.id).await.unwrap());
    bursary.worker.sync_once().await.unwrap();

    let report = office.worker.sync_once().await.unwrap();
    assert_eq!(report.pull.removed(), 1);
    assert!(office.ctx.students.list().await.unwrap().is_empty());

    let stored = server_dir.path().join("greenfield").join("transactions.json");
    assert!(stored.exists());
}

#[tokio::test]
async fn test_unpushed_local_edit_survives_pull() {
    let server_dir = TempDir::new().unwrap();
    let url = start_server(&server_dir).await;
    let office = client(&url).await;

    let student = Student::new("ADM-200", "Bayo", "Ojo", "JSS2");
    office.ctx.students.save(&student).await.unwrap();
    office.worker.sync_once().await.unwrap();

    let mut withdrawn = student.clone();
    withdrawn.status = StudentStatus::Withdrawn;
    office.ctx.students.save(&withdrawn).await.unwrap();

    // Pull alone must not overwrite the queued edit with the server copy.
    let pulled = office.worker.pull().await.unwrap();
    let stats = pulled
        .collections
        .iter()
        .find(|(c, _)| *c == school_erp::models::Collection::Students)
        .map(|(_, s)| *s)
        .unwrap();
    assert_eq!(stats.protected, 1);
    assert_eq!(
        office.ctx.students.get_by_id(&student.id).await.unwrap().unwrap().status,
        StudentStatus::Withdrawn
    );

    office.worker.sync_once().await.unwrap();
    let fresh = client(&url).await;
    fresh.worker.sync_once().await.unwrap();
    assert_eq!(
        fresh.ctx.students.get_by_id(&student.id).await.unwrap().unwrap().status,
        StudentStatus::Withdrawn
    );
}

#[tokio::test]
async fn test_wrong_key_keeps_changes_queued() {
    let server_dir = TempDir::new().unwrap();
    let url = start_server(&server_dir).await;

    let dir = TempDir::new().unwrap();
    let ctx = AppContext::open(&dir.path().join("erp.db")).await.unwrap();
    let remote = DocumentClient::new(url, "not-a-key".to_string()).unwrap();
    let worker = ctx.sync_worker(Arc::new(remote), &SyncConfig::default());

    ctx.students
        .save(&Student::new("ADM-300", "Chika", "Obi", "SS1"))
        .await
        .unwrap();

    // A rejected key stops the drain; the change stays queued.
    let report = worker.push().await.unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(report.dead_lettered, 0);
    assert!(report.interrupted.is_some());
    assert!(ctx.outbox.failed().await.unwrap().is_empty());
    assert_eq!(ctx.outbox.pending_count().await.unwrap(), 1);
}
