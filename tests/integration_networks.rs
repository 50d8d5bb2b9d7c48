mod common;

use axum::http::StatusCode;
use common::{TestApp, generate_unique_name, id_of, ids};
use genera_models::roles::RoleType;
use serde_json::json;

#[tokio::test]
async fn test_admin_manages_networks() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let school = app.create_school(false).await;
    let name = generate_unique_name("Red");

    let (status, body) = app
        .post(
            "/api/networks",
            &admin.token,
            json!({ "name": name, "description": "Red de colegios del sur" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created_by"], admin.id().to_string());
    let network_id = id_of(&body);

    let (status, _) = app
        .post("/api/networks", &admin.token, json!({ "name": name }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let membership = format!("/api/networks/{network_id}/schools/{}", school.id);
    let (status, first) = app.put(&membership, &admin.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["school_id"], school.id.to_string());

    let (status, second) = app.put(&membership, &admin.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["assigned_at"], second["assigned_at"]);

    let (status, body) = app
        .get(&format!("/api/networks/{network_id}/schools"), &admin.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], name.as_str());
    assert_eq!(ids(&body["schools"]), vec![school.id.to_string()]);

    let (status, _) = app.delete(&membership, &admin.token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete(&membership, &admin.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/networks", &admin.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![network_id]);
}

#[tokio::test]
async fn test_supervisor_sees_only_own_network() {
    let app = TestApp::new().await;
    let school = app.create_school(false).await;
    let network = app.create_network(&[school.id]).await;
    let other_network = app.create_network(&[]).await;
    let supervisor = app.supervisor(network.id).await;

    let (status, body) = app
        .get(&format!("/api/networks/{}/schools", network.id), &supervisor.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["schools"]), vec![school.id.to_string()]);

    let (status, _) = app
        .get(
            &format!("/api/networks/{}/schools", other_network.id),
            &supervisor.token,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/networks", &supervisor.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .put(
            &format!("/api/networks/{}/schools/{}", other_network.id, school.id),
            &supervisor.token,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_network_or_school() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let network = app.create_network(&[]).await;

    let (status, _) = app
        .get(
            &format!("/api/networks/{}/schools", uuid::Uuid::new_v4()),
            &admin.token,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .put(
            &format!("/api/networks/{}/schools/{}", network.id, uuid::Uuid::new_v4()),
            &admin.token,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_school_staff_cannot_manage_networks() {
    let app = TestApp::new().await;
    let school = app.create_school(false).await;
    let director = app
        .user_with_role(RoleType::EquipoDirectivo, Some(school.id))
        .await;

    let (status, _) = app
        .post("/api/networks", &director.token, json!({ "name": "Red Propia" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rename_network_rejects_taken_name() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let north = app.create_network(&[]).await;
    let south = app.create_network(&[]).await;

    let (status, body) = app
        .put(
            &format!("/api/networks/{}", north.id),
            &admin.token,
            Some(json!({ "name": south.name })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Ya existe una red con este nombre");

    let (status, body) = app
        .put(
            &format!("/api/networks/{}", north.id),
            &admin.token,
            Some(json!({ "name": "  Red Cordillera  ", "description": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Red Cordillera");
    assert!(body["description"].is_null());

    let (status, _) = app
        .put(
            &format!("/api/networks/{}", uuid::Uuid::new_v4()),
            &admin.token,
            Some(json!({ "name": "Red Fantasma" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_network_with_active_supervisor_conflicts() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let school = app.create_school(false).await;
    let network = app.create_network(&[school.id]).await;
    let supervisor = app.supervisor(network.id).await;
    let uri = format!("/api/networks/{}", network.id);

    let (status, body) = app.delete(&uri, &admin.token).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"],
        "No se puede eliminar la red porque tiene supervisores activos asignados"
    );

    let assignment = &app
        .store()
        .list_assignments(supervisor.id(), false)
        .await
        .unwrap()[0];
    let (status, _) = app
        .delete(
            &format!("/api/users/{}/roles/{}", supervisor.id(), assignment.id),
            &admin.token,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.delete(&uri, &admin.token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.store().network_ids_of_school(school.id).await.unwrap().is_empty());

    let (status, _) = app.delete(&uri, &admin.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_supervisor_cannot_edit_or_delete_network() {
    let app = TestApp::new().await;
    let network = app.create_network(&[]).await;
    let supervisor = app.supervisor(network.id).await;
    let uri = format!("/api/networks/{}", network.id);

    let (status, _) = app
        .put(&uri, &supervisor.token, Some(json!({ "name": "Red Tomada" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&uri, &supervisor.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
