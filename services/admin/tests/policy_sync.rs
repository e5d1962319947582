//! Policy graph maintenance through the use cases

mod common;

use std::time::Duration;

use admin::{
    AppError,
    models::{UpdateButton, UpdateMenu, UpdatePermission, UpdateRole},
    policy::{PolicySynchronizer, Subject},
};
use common::{MemoryDb, TestApp};

fn edge(sub: Subject, obj: Subject) -> (String, String) {
    (sub.encode(), obj.encode())
}

#[tokio::test]
async fn test_menu_edges_follow_parent_and_permissions() {
    let app = TestApp::new().await;
    let p1 = app.permission("/api/v1/users", "GET").await;
    let p2 = app.permission("/api/v1/users", "POST").await;
    let root = app.menu("system", None, vec![]).await;
    let child = app.menu("users", Some(root.id), vec![p1.id]).await;

    assert_eq!(
        app.group_edges().await,
        vec![
            edge(Subject::Menu(child.id), Subject::Menu(root.id)),
            edge(Subject::Menu(child.id), Subject::Permission(p1.id)),
        ]
    );

    app.state
        .menus
        .update(
            &app.cancel,
            child.id,
            UpdateMenu {
                parent_id: Some(None),
                permission_ids: Some(vec![p2.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        app.group_edges().await,
        vec![edge(Subject::Menu(child.id), Subject::Permission(p2.id))]
    );
}

#[tokio::test]
async fn test_button_edges_and_delete() {
    let app = TestApp::new().await;
    let p1 = app.permission("/api/v1/roles", "POST").await;
    let p2 = app.permission("/api/v1/roles/:id", "PUT").await;
    let menu = app.menu("roles", None, vec![]).await;
    let button = app.button("save", menu.id, vec![p1.id, p2.id]).await;
    let role = app.role("editor", vec![], vec![], vec![button.id]).await;

    let b = Subject::Button(button.id);
    assert!(app.has_edge(&b.encode(), &Subject::Menu(menu.id).encode()).await);
    assert!(app.has_edge(&b.encode(), &Subject::Permission(p1.id).encode()).await);
    assert!(app.has_edge(&b.encode(), &Subject::Permission(p2.id).encode()).await);
    assert!(app.has_edge(&Subject::Role(role.id).encode(), &b.encode()).await);

    app.state.buttons.delete(&app.cancel, button.id).await.unwrap();

    let edges = app.group_edges().await;
    assert!(
        edges.iter().all(|(s, o)| *s != b.encode() && *o != b.encode()),
        "button edges left behind: {edges:?}"
    );
}

#[tokio::test]
async fn test_create_then_delete_restores_edge_set() {
    let app = TestApp::new().await;
    let list = app.permission("/api/v1/users", "GET").await;
    let create = app.permission("/api/v1/users", "POST").await;
    let root = app.menu("system", None, vec![list.id]).await;
    let users = app.menu("users", Some(root.id), vec![list.id]).await;
    let save = app.button("save", users.id, vec![create.id]).await;
    app.role("viewer", vec![list.id], vec![root.id, users.id], vec![save.id])
        .await;
    let before = app.group_edges().await;

    let audit = app.menu("audit", Some(root.id), vec![list.id, create.id]).await;
    let export = app.button("export", audit.id, vec![list.id]).await;
    let auditor = app
        .role(
            "auditor",
            vec![create.id],
            vec![root.id, audit.id],
            vec![save.id, export.id],
        )
        .await;
    assert_ne!(app.group_edges().await, before);

    app.state.roles.delete(&app.cancel, auditor.id).await.unwrap();
    app.state.buttons.delete(&app.cancel, export.id).await.unwrap();
    app.state.menus.delete(&app.cancel, audit.id).await.unwrap();

    assert_eq!(app.group_edges().await, before);
}

#[tokio::test]
async fn test_button_moves_to_another_menu() {
    let app = TestApp::new().await;
    let first = app.menu("first", None, vec![]).await;
    let second = app.menu("second", None, vec![]).await;
    let button = app.button("export", first.id, vec![]).await;

    app.state
        .buttons
        .update(
            &app.cancel,
            button.id,
            UpdateButton {
                menu_id: Some(second.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        app.group_edges().await,
        vec![edge(Subject::Button(button.id), Subject::Menu(second.id))]
    );
}

#[tokio::test]
async fn test_update_keeps_dependent_edges() {
    let app = TestApp::new().await;
    let parent = app.menu("parent", None, vec![]).await;
    let child = app.menu("child", Some(parent.id), vec![]).await;

    // Non-cascading removal leaves edges pointing at the node
    let sync = PolicySynchronizer::new(app.enforcer.clone());
    sync.remove_group_policy(&app.cancel, &parent, false)
        .await
        .unwrap();
    assert!(
        app.has_edge(
            &Subject::Menu(child.id).encode(),
            &Subject::Menu(parent.id).encode()
        )
        .await
    );

    // Cascading removal drops them
    sync.remove_group_policy(&app.cancel, &parent, true)
        .await
        .unwrap();
    assert!(app.group_edges().await.is_empty());
}

#[tokio::test]
async fn test_permission_update_moves_tuple() {
    let app = TestApp::new().await;
    let permission = app.permission("/api/v1/menus", "get").await;
    assert_eq!(permission.method, "GET");

    app.state
        .permissions
        .update(
            &app.cancel,
            permission.id,
            UpdatePermission {
                url: Some("/api/v2/menus".to_string()),
                method: Some("post".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let policies = app.enforcer.policies().await;
    let subject = Subject::Permission(permission.id).encode();
    assert_eq!(
        policies,
        vec![vec![subject, "/api/v2/menus".to_string(), "POST".to_string()]]
    );
}

#[tokio::test]
async fn test_permission_delete_cuts_inheritance() {
    let app = TestApp::new().await;
    let permission = app.permission("/api/v1/users", "GET").await;
    let menu = app.menu("users", None, vec![permission.id]).await;
    let role = app.role("viewer", vec![permission.id], vec![menu.id], vec![]).await;
    let role_subject = Subject::Role(role.id).encode();

    assert!(
        app.enforcer
            .enforce(&role_subject, "/api/v1/users", "GET")
            .await
            .unwrap()
    );

    app.state
        .permissions
        .delete(&app.cancel, permission.id)
        .await
        .unwrap();

    assert!(
        !app.enforcer
            .enforce(&role_subject, "/api/v1/users", "GET")
            .await
            .unwrap()
    );
    assert!(app.enforcer.policies().await.is_empty());
    assert_eq!(
        app.group_edges().await,
        vec![edge(Subject::Role(role.id), Subject::Menu(menu.id))]
    );
}

#[tokio::test]
async fn test_role_reaches_permission_through_menu() {
    let app = TestApp::new().await;
    let list = app.permission("/api/v1/users", "GET").await;
    app.permission("/api/v1/users", "DELETE").await;
    let root = app.menu("system", None, vec![]).await;
    let users = app.menu("users", Some(root.id), vec![list.id]).await;
    let role = app.role("viewer", vec![], vec![users.id], vec![]).await;
    let subject = Subject::Role(role.id).encode();

    assert!(
        app.enforcer
            .enforce(&subject, "/api/v1/users", "GET")
            .await
            .unwrap()
    );
    assert!(
        !app.enforcer
            .enforce(&subject, "/api/v1/users", "DELETE")
            .await
            .unwrap()
    );

    app.state
        .roles
        .update(
            &app.cancel,
            role.id,
            UpdateRole {
                menu_ids: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(
        !app.enforcer
            .enforce(&subject, "/api/v1/users", "GET")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_unknown_association_is_rejected() {
    let app = TestApp::new().await;
    let menu = app.menu("users", None, vec![]).await;

    let err = app
        .state
        .menus
        .update(
            &app.cancel,
            menu.id,
            UpdateMenu {
                permission_ids: Some(vec![999]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err:?}");

    let err = app
        .state
        .buttons
        .update(
            &app.cancel,
            999,
            UpdateButton {
                name: Some("x".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err:?}");
    assert!(app.group_edges().await.is_empty());
}

#[tokio::test]
async fn test_menu_cannot_become_its_own_ancestor() {
    let app = TestApp::new().await;
    let top = app.menu("top", None, vec![]).await;
    let middle = app.menu("middle", Some(top.id), vec![]).await;
    let bottom = app.menu("bottom", Some(middle.id), vec![]).await;

    let err = app
        .state
        .menus
        .update(
            &app.cancel,
            top.id,
            UpdateMenu {
                parent_id: Some(Some(bottom.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn test_menu_with_buttons_cannot_be_deleted() {
    let app = TestApp::new().await;
    let menu = app.menu("users", None, vec![]).await;
    app.button("add", menu.id, vec![]).await;

    let err = app.state.menus.delete(&app.cancel, menu.id).await.unwrap_err();
    assert!(matches!(err, AppError::Database(_)), "got {err:?}");
    assert_eq!(app.group_edges().await.len(), 1);
}

#[tokio::test]
async fn test_cancelled_request_writes_nothing() {
    let app = TestApp::new().await;
    let permission = app.permission("/api/v1/users", "GET").await;

    app.cancel.cancel();
    let err = app
        .state
        .menus
        .create(
            &app.cancel,
            admin::models::NewMenu {
                path: "/users".to_string(),
                component: "Users".to_string(),
                name: "users".to_string(),
                meta: Default::default(),
                arrange_order: 0,
                is_active: true,
                descr: String::new(),
                parent_id: None,
                permission_ids: vec![permission.id],
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Policy(_)), "got {err:?}");
    assert!(app.group_edges().await.is_empty());
}

#[tokio::test]
async fn test_reload_rebuilds_graph_on_fresh_enforcer() {
    let app = TestApp::new().await;
    let p1 = app.permission("/api/v1/users", "GET").await;
    let p2 = app.permission("/api/v1/users", "POST").await;
    let root = app.menu("system", None, vec![]).await;
    let users = app.menu("users", Some(root.id), vec![p1.id]).await;
    let add = app.button("add", users.id, vec![p2.id]).await;
    app.role("admin", vec![p1.id], vec![users.id], vec![add.id])
        .await;

    let expected_edges = app.group_edges().await;
    let mut expected_policies = app.enforcer.policies().await;

    let fresh = TestApp::over(MemoryDb::clone(&app.db), 5, Duration::from_secs(60)).await;
    assert!(fresh.group_edges().await.is_empty());

    let summary = fresh.state.reloader.reload_all(&fresh.cancel).await.unwrap();
    assert_eq!(summary.permissions, 2);
    assert_eq!(summary.menus, 2);
    assert_eq!(summary.buttons, 1);
    assert_eq!(summary.roles, 1);

    assert_eq!(fresh.group_edges().await, expected_edges);

    for (url, method) in admin::usecases::BASE_ROLE_POLICIES {
        expected_policies.push(vec![
            Subject::BASE_ROLE.encode(),
            url.to_string(),
            method.to_string(),
        ]);
    }
    let mut policies = fresh.enforcer.policies().await;
    policies.sort();
    expected_policies.sort();
    assert_eq!(policies, expected_policies);

    // A second reload adds nothing
    fresh.state.reloader.reload_all(&fresh.cancel).await.unwrap();
    assert_eq!(fresh.group_edges().await, expected_edges);
}
