#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests through the public client returned by module init.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use permissions::{InMemoryPermissionStore, PermissionsConfig, PermissionsModule};
use permissions_sdk::{
    GroupNames, NewGroup, NewPermission, PermissionRef, PermissionsClient, PermissionsError,
    Principal, PrincipalId, PrincipalKey, PrincipalRef,
};
use uuid::Uuid;

/// Host-side admin account type.
struct AdminAccount {
    id: PrincipalId,
}

impl Principal for AdminAccount {
    fn principal_id(&self) -> PrincipalId {
        self.id
    }

    fn principal_type(&self) -> &str {
        "admin"
    }
}

fn config() -> PermissionsConfig {
    PermissionsConfig {
        guards: BTreeMap::from([
            ("web".to_owned(), "user".to_owned()),
            ("admin".to_owned(), "admin".to_owned()),
        ]),
        ..PermissionsConfig::default()
    }
}

fn client_with(cfg: &PermissionsConfig) -> (Arc<dyn PermissionsClient>, Arc<InMemoryPermissionStore>) {
    let store = Arc::new(InMemoryPermissionStore::new());
    let module = PermissionsModule::new();
    let client = module.init(cfg, store.clone()).expect("module init");
    (client, store)
}

fn client() -> Arc<dyn PermissionsClient> {
    client_with(&config()).0
}

fn user() -> PrincipalRef {
    PrincipalRef::new("user", Uuid::new_v4())
}

#[tokio::test]
async fn editor_can_edit_until_leaving() {
    let perms = client();
    let alice = user();

    let edit = perms
        .create_permission(NewPermission::new("edit-articles"))
        .await
        .unwrap();
    let editors = perms.create_group(NewGroup::new("editors")).await.unwrap();
    perms
        .attach_permission_to_group(editors.clone().into(), edit.into(), None)
        .await
        .unwrap();

    assert!(!perms.can(&alice, "edit-articles").await);

    perms
        .join_group(&alice, "editors".into(), None, None)
        .await
        .unwrap();
    assert!(perms.can(&alice, "edit-articles").await);
    assert!(perms.is_member_of_any(&alice, "editors|writers".into()).await);

    perms.leave_group(&alice, editors.into()).await.unwrap();
    assert!(!perms.can(&alice, "edit-articles").await);
    assert!(!perms.belongs_to_any_group(&alice).await);
}

#[tokio::test]
async fn guards_keep_admins_and_users_apart() {
    let perms = client();
    let alice = user();
    let root = AdminAccount { id: Uuid::new_v4() };

    perms
        .create_permission(NewPermission::new("manage").guard("admin"))
        .await
        .unwrap();
    perms
        .create_permission(NewPermission::new("manage"))
        .await
        .unwrap();

    // Names resolve in each principal's own guard
    perms.grant_permission(&root, "manage".into(), None).await.unwrap();
    assert!(perms.can(&root, "manage").await);
    assert!(!perms.can(&alice, "manage").await);

    let admin_manage = perms
        .find_permission("manage".into(), Some("admin"))
        .await
        .unwrap();
    let err = perms
        .grant_permission(&alice, admin_manage.into(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PermissionsError::GuardMismatch { .. }));
}

#[tokio::test]
async fn duplicate_and_missing_entities_are_reported() {
    let perms = client();

    perms
        .create_permission(NewPermission::new("edit"))
        .await
        .unwrap();
    assert!(matches!(
        perms.create_permission(NewPermission::new("edit")).await,
        Err(PermissionsError::AlreadyExists { .. })
    ));
    assert!(matches!(
        perms.find_group("nope".into(), None).await,
        Err(PermissionsError::NotFound { .. })
    ));
    assert!(matches!(
        perms.delete_permission("nope".into(), None).await,
        Err(PermissionsError::NotFound { .. })
    ));
}

#[tokio::test]
async fn unknown_permission_denies_without_error() {
    let perms = client();
    let alice = user();

    assert!(!perms.can(&alice, "launch-rockets").await);
    assert!(!perms.has_permission(&alice, None, None).await);
    assert!(!perms.is_member_of_any(&alice, GroupNames::default()).await);
}

#[tokio::test]
async fn direct_permissions_sync_and_listing() {
    let perms = client();
    let alice = user();
    for name in ["read", "write", "delete"] {
        perms
            .create_permission(NewPermission::new(name))
            .await
            .unwrap();
    }

    perms
        .sync_permissions(&alice, vec!["read".into(), "write".into(), "read".into()])
        .await
        .unwrap();
    let mut names: Vec<String> = perms
        .direct_permissions_of(&alice)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    names.sort();
    assert_eq!(names, ["read", "write"]);

    perms
        .revoke_permission(&alice, "write".into(), None)
        .await
        .unwrap();
    assert!(perms.can(&alice, "read").await);
    assert!(!perms.can(&alice, "write").await);

    perms.sync_permissions(&alice, Vec::new()).await.unwrap();
    assert!(perms.direct_permissions_of(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn teams_track_owner_role_and_current_group() {
    let perms = client();
    let alice = user();
    let bob = user();

    let acme = perms.create_owned_group(&alice, "acme").await.unwrap();
    assert!(acme.is_team());
    assert_eq!(perms.current_group_name(&alice).await.unwrap().as_deref(), Some("acme"));
    assert!(perms.has_role_on(&alice, "acme".into(), "Owner").await);

    perms
        .join_group(&bob, "acme".into(), Some("User".to_owned()), None)
        .await
        .unwrap();
    assert_eq!(perms.role_on(&bob, "acme".into()).await.unwrap().as_deref(), Some("User"));

    let mut members = perms.members_of("acme".into(), None).await.unwrap();
    members.sort();
    let mut expected = vec![alice.key(), bob.key()];
    expected.sort();
    assert_eq!(members, expected);

    let err = perms
        .switch_current_group(&user(), "acme".into())
        .await
        .unwrap_err();
    assert!(matches!(err, PermissionsError::NotAMember { .. }));

    perms.leave_group(&alice, "acme".into()).await.unwrap();
    assert!(perms.refresh_current_group(&alice).await.unwrap().is_none());
}

#[tokio::test]
async fn permission_holders_span_grants_and_groups() {
    let perms = client();
    let alice = user();
    let bob = user();

    perms
        .create_permission(NewPermission::new("publish"))
        .await
        .unwrap();
    perms.create_group(NewGroup::new("publishers")).await.unwrap();
    perms
        .sync_group_permissions("publishers".into(), vec!["publish".into()], None)
        .await
        .unwrap();
    assert!(
        perms
            .group_has_permission("publishers".into(), "publish".into(), None)
            .await
    );

    perms
        .grant_permission(&alice, "publish".into(), None)
        .await
        .unwrap();
    perms
        .sync_groups(&bob, vec!["publishers".into()])
        .await
        .unwrap();

    let mut expected = vec![
        PrincipalKey::new("user", alice.id),
        PrincipalKey::new("user", bob.id),
    ];
    expected.sort();
    assert_eq!(
        perms
            .principals_with_permission(PermissionRef::from("publish"), None)
            .await
            .unwrap(),
        expected
    );
}

#[tokio::test]
async fn slow_store_fails_closed() {
    let cfg = PermissionsConfig {
        storage_timeout: Duration::from_millis(20),
        ..config()
    };
    let (perms, store) = client_with(&cfg);
    let alice = user();
    perms
        .create_permission(NewPermission::new("edit"))
        .await
        .unwrap();
    perms.grant_permission(&alice, "edit".into(), None).await.unwrap();
    assert!(perms.can(&alice, "edit").await);

    store.set_latency(Duration::from_millis(200));
    assert!(!perms.can(&alice, "edit").await);
    assert!(matches!(
        perms.create_group(NewGroup::new("late")).await,
        Err(PermissionsError::StorageUnavailable(_))
    ));
}
