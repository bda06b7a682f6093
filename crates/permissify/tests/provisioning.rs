//! Role provisioning against a file-backed database.

use permissify::store::{SqliteStore, Store, StoreExt};
use permissify::{AuthorizationBackend, NewUser, Permissify, PermissifyConfig, PermissifyError};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn open(dir: &TempDir) -> Permissify<SqliteStore> {
    let store = SqliteStore::open(dir.path().join("permissify.db")).unwrap();
    let permissify = Permissify::new(store, PermissifyConfig::default());
    permissify.install_default_catalog().await.unwrap();
    permissify
}

#[tokio::test]
async fn test_provisioned_role_survives_reopen() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    {
        let permissify = open(&dir).await;
        let alice = permissify
            .store()
            .create_user(&NewUser::new("alice"))
            .await
            .unwrap();
        let provisioned = permissify
            .add_role("auditor", &["view_user,auth,user", "view_group,auth,group"])
            .await
            .unwrap();
        assert!(provisioned.created);
        permissify
            .store()
            .add_user_to_role(&alice, &provisioned.role)
            .await
            .unwrap();
    }

    let permissify = open(&dir).await;
    let again = permissify
        .add_role("auditor", &["view_user,auth,user", "view_group,auth,group"])
        .await
        .unwrap();
    assert!(!again.created);
    assert_eq!(again.permissions.len(), 2);

    let alice = permissify
        .filter_principals_with_permission("auth.view_user".into(), false, Some(true), None)
        .unwrap()
        .fetch()
        .await
        .unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].username, "alice");

    let perms = permissify.get_all_permissions(&alice[0], None).await.unwrap();
    assert!(perms.contains("auth.view_group"));
}

#[tokio::test]
async fn test_remove_role_persists() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    {
        let permissify = open(&dir).await;
        permissify
            .add_role("editor", &["change_group,auth,group"])
            .await
            .unwrap();
        assert!(permissify.remove_role("editor").await.unwrap());
    }

    let permissify = open(&dir).await;
    assert!(permissify.store().get_role("editor").await.unwrap().is_none());
    assert!(!permissify.remove_role("editor").await.unwrap());
}

#[tokio::test]
async fn test_unknown_permission_rejected_before_create() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let permissify = open(&dir).await;

    let err = permissify
        .add_role("ghost", &["haunt_user,auth,user"])
        .await
        .unwrap_err();
    assert!(matches!(err, PermissifyError::UnknownRolePermission(_)));
    assert!(permissify.store().get_role("ghost").await.unwrap().is_none());

    let err = permissify
        .add_role("ghost", &["auth.view_user"])
        .await
        .unwrap_err();
    assert!(matches!(err, PermissifyError::InvalidRolePermission(_)));
}
