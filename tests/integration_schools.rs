mod common;

use axum::http::StatusCode;
use common::{TestApp, generate_unique_name, id_of, ids};
use genera_models::roles::RoleType;
use serde_json::json;

#[tokio::test]
async fn test_admin_creates_school() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let name = generate_unique_name("Colegio");

    let (status, body) = app
        .post(
            "/api/schools",
            &admin.token,
            json!({ "name": name, "has_generations": true }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], name.as_str());
    assert_eq!(body["has_generations"], true);

    let (status, _) = app
        .post("/api/schools", &admin.token, json!({ "name": name }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_school_requires_permission_and_name() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let school = app.create_school(false).await;
    let director = app
        .user_with_role(RoleType::EquipoDirectivo, Some(school.id))
        .await;

    let (status, _) = app
        .post("/api/schools", &director.token, json!({ "name": "Colegio Nuevo" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post("/api/schools", &admin.token, json!({ "name": "" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_school_list_follows_visibility() {
    let app = TestApp::new().await;
    let in_network = app.create_school(false).await;
    let outside = app.create_school(false).await;
    let network = app.create_network(&[in_network.id]).await;

    let director = app
        .user_with_role(RoleType::EquipoDirectivo, Some(in_network.id))
        .await;
    let docente = app.user_with_role(RoleType::Docente, Some(in_network.id)).await;
    let supervisor = app.supervisor(network.id).await;

    let (status, body) = app.get("/api/schools?limit=100", &director.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 2);

    let (status, body) = app.get("/api/schools", &supervisor.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["data"]), vec![in_network.id.to_string()]);

    let (status, _) = app
        .get(&format!("/api/schools/{}", outside.id), &supervisor.token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/schools", &docente.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_director_edits_only_own_school() {
    let app = TestApp::new().await;
    let own = app.create_school(false).await;
    let other = app.create_school(false).await;
    let director = app.user_with_role(RoleType::EquipoDirectivo, Some(own.id)).await;

    let (status, body) = app
        .patch(
            &format!("/api/schools/{}", own.id),
            &director.token,
            json!({ "has_generations": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_generations"], true);

    let (status, _) = app
        .patch(
            &format!("/api/schools/{}", other.id),
            &director.token,
            json!({ "name": "Renombrado" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .patch(
            &format!("/api/schools/{}", uuid::Uuid::new_v4()),
            &director.token,
            json!({ "name": "Fantasma" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generations_are_managed_by_school_staff() {
    let app = TestApp::new().await;
    let school = app.create_school(true).await;
    let director = app
        .user_with_role(RoleType::EquipoDirectivo, Some(school.id))
        .await;
    let docente = app.user_with_role(RoleType::Docente, Some(school.id)).await;
    let uri = format!("/api/schools/{}/generations", school.id);

    let (status, body) = app
        .post(
            &uri,
            &director.token,
            json!({ "name": "Generación 2025", "grade_range": "1° a 4° básico" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["school_id"], school.id.to_string());
    let generation_id = id_of(&body);

    let (status, _) = app
        .post(&uri, &docente.token, json!({ "name": "Generación 2026" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get(&uri, &director.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![generation_id]);
}

#[tokio::test]
async fn test_community_creation_rules() {
    let app = TestApp::new().await;
    let school = app.create_school(true).await;
    let other_school = app.create_school(true).await;
    let generation = app.create_generation(school.id).await;
    let foreign_generation = app.create_generation(other_school.id).await;
    let director = app
        .user_with_role(RoleType::EquipoDirectivo, Some(school.id))
        .await;
    let uri = format!("/api/schools/{}/communities", school.id);

    let (status, _) = app
        .post(&uri, &director.token, json!({ "name": "Comunidad sin generación" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &uri,
            &director.token,
            json!({ "name": "Comunidad ajena", "generation_id": foreign_generation.id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            &uri,
            &director.token,
            json!({ "name": "Comunidad A", "generation_id": generation.id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["max_teachers"], 16);
    assert_eq!(body["generation_id"], generation.id.to_string());

    let (status, _) = app
        .post(
            &uri,
            &director.token,
            json!({ "name": "Comunidad B", "generation_id": generation.id, "max_teachers": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app.get(&uri, &director.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_flat_school_communities_need_no_generation() {
    let app = TestApp::new().await;
    let school = app.create_school(false).await;
    let director = app
        .user_with_role(RoleType::EquipoDirectivo, Some(school.id))
        .await;

    let (status, body) = app
        .post(
            &format!("/api/schools/{}/communities", school.id),
            &director.token,
            json!({ "name": "Comunidad Única", "max_teachers": 8 }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["generation_id"], serde_json::Value::Null);
    assert_eq!(body["max_teachers"], 8);
}
