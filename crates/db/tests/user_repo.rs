//! Integration tests for the Postgres credential store.

use assert_matches::assert_matches;
use catalog_core::roles::Role;
use catalog_core::types::new_id;
use catalog_db::models::user::{CreateUser, UpdateUser};
use catalog_db::postgres::PgCredentialStore;
use catalog_db::store::{constraints, CredentialStore, StoreError};
use sqlx::PgPool;

fn new_user(username: &str, email: &str) -> CreateUser {
    CreateUser {
        id: new_id(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
        display_name: username.to_string(),
        role: Role::Member,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_and_find_user(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    let created = store.create(&new_user("alice", "alice@x.com")).await.unwrap();

    assert_eq!(created.role, Role::Member);
    assert!(!created.is_verified);

    let by_name = store.find_by_username("Alice").await.unwrap().unwrap();
    assert_eq!(by_name.id, created.id);

    let by_email = store.find_by_email("ALICE@x.com").await.unwrap().unwrap();
    assert_eq!(by_email.id, created.id);

    let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(by_id.username, "alice");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_username_and_email_are_classified(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    store.create(&new_user("alice", "alice@x.com")).await.unwrap();

    let err = store
        .create(&new_user("ALICE", "someone@x.com"))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::UniqueViolation { constraint } if constraint == constraints::USERS_USERNAME);

    let err = store
        .create(&new_user("alicia", "Alice@X.com"))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::UniqueViolation { constraint } if constraint == constraints::USERS_EMAIL);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_applies_only_given_fields(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    let created = store.create(&new_user("bob", "bob@x.com")).await.unwrap();

    let updated = store
        .update(
            created.id,
            &UpdateUser {
                role: Some(Role::Moderator),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.role, Role::Moderator);
    assert_eq!(updated.email, "bob@x.com");
    assert_eq!(updated.password_hash, created.password_hash);
    assert!(updated.updated_at >= created.updated_at);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_soft_deleted_user_is_invisible(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    let created = store.create(&new_user("carol", "carol@x.com")).await.unwrap();

    assert!(store.soft_delete(created.id).await.unwrap());
    assert!(!store.soft_delete(created.id).await.unwrap());

    assert!(store.find_by_id(created.id).await.unwrap().is_none());
    assert!(store.find_by_username("carol").await.unwrap().is_none());
    assert!(store.find_by_email("carol@x.com").await.unwrap().is_none());
    assert!(store
        .update(created.id, &UpdateUser::default())
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_ping(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    store.ping().await.unwrap();
}
