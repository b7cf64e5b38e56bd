//! Integration tests for the account lifecycle: register, sign in, choose
//! categories, restart, sign out.
//!
//! Sessions are persisted through a real `FileStore` in a per-test temp
//! directory, so a "restart" is simply a second `SessionStore` over the same
//! file.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use news_digest::api::{CannedApi, Latency, NewsApi, RepositoryApi};
use news_digest::repository::{DEMO_EMAIL, DEMO_PASSWORD, DEMO_USERNAME};
use news_digest::storage::{FileStore, KeyValueStore, MemoryStore};
use news_digest::stores::{SessionError, SessionStore, DEFAULT_SESSION_KEY};
use news_digest::types::{Category, LoginCredentials, PersistedSession, RegisterCredentials};
use pretty_assertions::assert_eq;

fn temp_session_file(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("news_digest_session_{name}"));
    std::fs::remove_dir_all(&dir).ok();
    dir.join("session.json")
}

fn demo_api() -> Arc<dyn NewsApi> {
    Arc::new(RepositoryApi::with_demo_data(Latency::NONE))
}

// ============================================================================
// Persistence across restarts
// ============================================================================

#[tokio::test]
async fn test_session_survives_restart() {
    let path = temp_session_file("restart");
    let api = demo_api();

    let first = SessionStore::new(Arc::clone(&api), Arc::new(FileStore::new(&path)));
    first
        .login(&LoginCredentials::new(DEMO_USERNAME, DEMO_PASSWORD))
        .await
        .unwrap();
    first
        .update_categories(&BTreeSet::from([Category::Business, Category::Health]))
        .await
        .unwrap();

    let second = SessionStore::new(api, Arc::new(FileStore::new(&path)));
    assert!(second.restore_from_storage());
    assert_eq!(second.session(), first.session());
    assert_eq!(
        second.user_categories(),
        BTreeSet::from([Category::Business, Category::Health])
    );

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains(DEMO_PASSWORD));

    std::fs::remove_dir_all(path.parent().unwrap()).ok();
}

#[tokio::test]
async fn test_logout_removes_persisted_entry() {
    let path = temp_session_file("logout");
    let storage = Arc::new(FileStore::new(&path));
    let store = SessionStore::new(demo_api(), Arc::clone(&storage) as Arc<dyn KeyValueStore>);

    store
        .login(&LoginCredentials::new(DEMO_EMAIL, DEMO_PASSWORD))
        .await
        .unwrap();
    assert!(storage.get(DEFAULT_SESSION_KEY).unwrap().is_some());

    store.logout();
    assert!(!store.is_authenticated());
    assert!(store.current_user().is_none());
    assert_eq!(storage.get(DEFAULT_SESSION_KEY).unwrap(), None);

    let restarted = SessionStore::new(demo_api(), storage);
    assert!(!restarted.restore_from_storage());

    std::fs::remove_dir_all(path.parent().unwrap()).ok();
}

#[tokio::test]
async fn test_custom_storage_key() {
    let storage = Arc::new(MemoryStore::new());
    let store = SessionStore::with_storage_key(
        demo_api(),
        Arc::clone(&storage) as Arc<dyn KeyValueStore>,
        "briefSession",
    );

    store
        .login(&LoginCredentials::new(DEMO_EMAIL, DEMO_PASSWORD))
        .await
        .unwrap();

    assert_eq!(storage.get(DEFAULT_SESSION_KEY).unwrap(), None);
    let raw = storage.get("briefSession").unwrap().unwrap();
    let record: PersistedSession = serde_json::from_str(&raw).unwrap();
    assert!(record.is_signed_in);
    assert!(record.token.unwrap().starts_with("mock-jwt-token-"));
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_then_sign_in_again() {
    let storage = Arc::new(MemoryStore::new());
    let store = SessionStore::new(demo_api(), storage);

    store
        .register(&RegisterCredentials::new(
            "reader",
            "reader@example.com",
            "secret1",
            "secret1",
        ))
        .await
        .unwrap();
    let registered = store.current_user().unwrap();
    assert_ne!(registered.id, "1");

    store.logout();
    store
        .login(&LoginCredentials::new("reader@example.com", "secret1"))
        .await
        .unwrap();
    assert_eq!(store.current_user().unwrap().id, registered.id);
}

#[tokio::test]
async fn test_register_conflicts() {
    let store = SessionStore::new(demo_api(), Arc::new(MemoryStore::new()));

    let err = store
        .register(&RegisterCredentials::new("fresh", DEMO_EMAIL, "abcdef", "abcdef"))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::EmailTaken);

    let err = store
        .register(&RegisterCredentials::new(
            DEMO_USERNAME,
            "fresh@example.com",
            "abcdef",
            "abcdef",
        ))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::UsernameTaken);
    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn test_canned_backend_conflicts() {
    let store = SessionStore::new(Arc::new(CannedApi::default()), Arc::new(MemoryStore::new()));

    let err = store
        .register(&RegisterCredentials::new(
            "someone",
            "test@example.com",
            "abcdef",
            "abcdef",
        ))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::EmailTaken);

    let err = store
        .login(&LoginCredentials::new("anyone@example.com", "abcdef"))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::InvalidCredentials);

    store
        .login(&LoginCredentials::new(DEMO_EMAIL, DEMO_PASSWORD))
        .await
        .unwrap();
    assert!(store.is_authenticated());
}

// ============================================================================
// Backend restarts
// ============================================================================

#[tokio::test]
async fn test_registered_account_survives_backend_restart() {
    let accounts: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let sessions: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let first_api = Arc::new(RepositoryApi::with_persisted_users(
        Arc::clone(&accounts),
        Latency::NONE,
    ));
    let first = SessionStore::new(first_api, Arc::clone(&sessions));
    first
        .register(&RegisterCredentials::new(
            "reader",
            "reader@example.com",
            "abcdef",
            "abcdef",
        ))
        .await
        .unwrap();
    let registered = first.current_user().unwrap();

    let second_api = Arc::new(RepositoryApi::with_persisted_users(
        Arc::clone(&accounts),
        Latency::NONE,
    ));
    let second = SessionStore::new(second_api, Arc::clone(&sessions));
    assert!(second.restore_from_storage());

    let world = BTreeSet::from([Category::World]);
    assert_eq!(second.update_categories(&world).await, Ok(true));
    assert!(second.is_authenticated());
    assert!(second.refresh_user().await.unwrap());
    assert_eq!(second.current_user().unwrap().selected_categories, world);

    second.logout();
    second
        .login(&LoginCredentials::new("reader", "abcdef"))
        .await
        .unwrap();
    assert_eq!(second.current_user().unwrap().id, registered.id);
}

#[tokio::test]
async fn test_registered_accounts_persist_to_file() {
    let path = temp_session_file("accounts");
    let accounts_path = path.with_file_name("users.json");

    let api = RepositoryApi::with_persisted_users(
        Arc::new(FileStore::new(&accounts_path)),
        Latency::NONE,
    );
    api.register(&RegisterCredentials::new(
        "filed",
        "filed@example.com",
        "abcdef",
        "abcdef",
    ))
    .await
    .unwrap();

    let reopened = RepositoryApi::with_persisted_users(
        Arc::new(FileStore::new(&accounts_path)),
        Latency::NONE,
    );
    let payload = reopened
        .login(&LoginCredentials::new("filed@example.com", "abcdef"))
        .await
        .unwrap()
        .data;
    assert_eq!(payload.user.username, "filed");
    assert!(reopened
        .login(&LoginCredentials::new(DEMO_EMAIL, DEMO_PASSWORD))
        .await
        .is_ok());

    std::fs::remove_dir_all(accounts_path.parent().unwrap()).ok();
}

// ============================================================================
// Repudiated sessions
// ============================================================================

#[tokio::test]
async fn test_session_for_unknown_account_is_repudiated() {
    // The second backend keeps its accounts elsewhere and never saw "transient".
    let storage = Arc::new(MemoryStore::new());
    let first = SessionStore::new(demo_api(), Arc::clone(&storage) as Arc<dyn KeyValueStore>);
    first
        .register(&RegisterCredentials::new(
            "transient",
            "transient@example.com",
            "abcdef",
            "abcdef",
        ))
        .await
        .unwrap();

    let second = SessionStore::new(demo_api(), Arc::clone(&storage) as Arc<dyn KeyValueStore>);
    assert!(second.restore_from_storage());

    let err = second.refresh_user().await.unwrap_err();
    assert_eq!(err, SessionError::Unauthorized);
    assert!(!second.is_authenticated());
    assert!(storage.is_empty());
}
