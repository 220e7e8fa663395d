//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use store::{
    Entity, EntityId, PostgresRepository, Repository, RepositoryExt, StoreError, Transaction,
    Version,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let repo = PostgresRepository::connect(&connection_string, 1)
                .await
                .unwrap();
            repo.run_migrations().await.unwrap();
            repo.pool().close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh repository with its own pool and a cleared table
async fn get_test_repository() -> PostgresRepository {
    let info = get_container_info().await;

    let repo = PostgresRepository::connect(&info.connection_string, 5)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE entities")
        .execute(repo.pool())
        .await
        .unwrap();

    repo
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
    id: EntityId,
    balance: i64,
}

impl Entity for Account {
    fn entity_type() -> &'static str {
        "Account"
    }

    fn id(&self) -> EntityId {
        self.id
    }
}

fn account(id: i64, balance: i64) -> Account {
    Account {
        id: EntityId::new(id),
        balance,
    }
}

#[tokio::test]
async fn insert_and_read_entity() {
    let repo = get_test_repository().await;

    let version = repo.insert(account(42, 100)).await.unwrap();
    assert_eq!(version, Version::first());

    let record = repo
        .read::<Account>(EntityId::new(42))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.entity, account(42, 100));
    assert_eq!(record.version, Version::first());
}

#[tokio::test]
async fn read_missing_entity_returns_none() {
    let repo = get_test_repository().await;
    let record = repo.read::<Account>(EntityId::new(7)).await.unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn update_bumps_version() {
    let repo = get_test_repository().await;
    repo.insert(account(1, 10)).await.unwrap();

    let mut tx = repo.begin().await.unwrap();
    let mut record = tx.load::<Account>(EntityId::new(1)).await.unwrap().unwrap();
    record.entity.balance = 20;
    let version = tx.save(&record).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(version, Version::new(2));
    let record = repo
        .read::<Account>(EntityId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.entity.balance, 20);
    assert_eq!(record.version, Version::new(2));
}

#[tokio::test]
async fn rollback_discards_changes() {
    let repo = get_test_repository().await;
    repo.insert(account(1, 10)).await.unwrap();

    let mut tx = repo.begin().await.unwrap();
    let mut record = tx.load::<Account>(EntityId::new(1)).await.unwrap().unwrap();
    record.entity.balance = 999;
    tx.save(&record).await.unwrap();
    tx.rollback().await.unwrap();

    let record = repo
        .read::<Account>(EntityId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.entity.balance, 10);
}

#[tokio::test]
async fn dropped_transaction_is_rolled_back() {
    let repo = get_test_repository().await;
    repo.insert(account(1, 10)).await.unwrap();

    {
        let mut tx = repo.begin().await.unwrap();
        let mut record = tx.load::<Account>(EntityId::new(1)).await.unwrap().unwrap();
        record.entity.balance = 0;
        tx.save(&record).await.unwrap();
    }

    let record = repo
        .read::<Account>(EntityId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.entity.balance, 10);
}

#[tokio::test]
async fn stale_write_is_rejected() {
    let repo = get_test_repository().await;
    repo.insert(account(1, 10)).await.unwrap();

    let stale = repo
        .read::<Account>(EntityId::new(1))
        .await
        .unwrap()
        .unwrap();

    // Another actor commits in between
    let mut tx = repo.begin().await.unwrap();
    let mut fresh = tx.load::<Account>(EntityId::new(1)).await.unwrap().unwrap();
    fresh.entity.balance = 11;
    tx.save(&fresh).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = repo.begin().await.unwrap();
    let mut stale = stale;
    stale.entity.balance = 12;
    let result = tx.save(&stale).await;
    tx.rollback().await.unwrap();

    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict { expected, actual, .. })
            if expected == Version::first() && actual == Version::new(2)
    ));
}

#[tokio::test]
async fn duplicate_insert_is_rejected() {
    let repo = get_test_repository().await;
    repo.insert(account(5, 1)).await.unwrap();

    let result = repo.insert(account(5, 2)).await;
    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict { .. })
    ));
}
