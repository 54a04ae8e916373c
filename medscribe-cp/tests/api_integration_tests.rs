//! Integration tests for medscribe-cp API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::json;
use tower::util::ServiceExt;
use uuid::Uuid;

use medscribe_common::events::EventBus;
use medscribe_cp::config::ProviderConfig;
use medscribe_cp::models::Patient;
use medscribe_cp::storage::FsBlobStore;
use medscribe_cp::AppState;

/// Test helper: app with in-memory database and a temp blob store
async fn create_test_app() -> (axum::Router, sqlx::SqlitePool, tempfile::TempDir) {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    medscribe_cp::db::init_tables(&pool)
        .await
        .expect("Failed to initialize database schema");

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let blob = FsBlobStore::new(temp_dir.path());
    let event_bus = EventBus::new(100);

    let state = AppState::new(pool.clone(), event_bus, blob, ProviderConfig::default());
    let app = medscribe_cp::build_router(state);

    (app, pool, temp_dir)
}

async fn seed_patient(pool: &sqlx::SqlitePool, doctor_id: Uuid) -> Uuid {
    let patient = Patient {
        id: Uuid::new_v4(),
        doctor_id,
        name: "Test Patient".to_string(),
        birth_date: None,
    };
    medscribe_cp::db::patients::save_patient(pool, &patient)
        .await
        .expect("Failed to seed patient");
    patient.id
}

fn upload_body(patient_id: Uuid, audio: &[u8]) -> serde_json::Value {
    json!({
        "patient_id": patient_id,
        "consultation_type": "general",
        "duration_seconds": 120,
        "audio_base64": base64::engine::general_purpose::STANDARD.encode(audio),
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _pool, _dir) = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "medscribe-cp");
    assert_eq!(json["database_ok"], true);
}

#[tokio::test]
async fn test_health_degrades_when_database_is_gone() {
    let (app, pool, _dir) = create_test_app().await;
    pool.close().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "degraded");
    assert_eq!(json["database_ok"], false);
}

#[tokio::test]
async fn test_upload_requires_doctor_header() {
    let (app, pool, _dir) = create_test_app().await;
    let patient_id = seed_patient(&pool, Uuid::new_v4()).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/consultations/upload")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_string(&upload_body(patient_id, b"audio")).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_upload_then_fetch_record() {
    let (app, pool, _dir) = create_test_app().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = seed_patient(&pool, doctor_id).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/consultations/upload")
                .header("content-type", "application/json")
                .header("x-doctor-id", doctor_id.to_string())
                .body(Body::from(
                    serde_json::to_string(&upload_body(patient_id, b"fake audio bytes")).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(created["status"], "PROCESSING");
    let record_id = created["record_id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/consultations/{}", record_id))
                .header("x-doctor-id", doctor_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let record: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(record["id"].as_str().unwrap(), record_id);
    assert_eq!(record["status"], "PROCESSING");
    assert_eq!(record["ledger"][0]["step"], "download");
    assert_eq!(record["ledger"][0]["status"], "completed");
}

#[tokio::test]
async fn test_upload_rejects_ambiguous_source() {
    let (app, pool, _dir) = create_test_app().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = seed_patient(&pool, doctor_id).await;

    let mut body = upload_body(patient_id, b"audio");
    body["chunk_session_id"] = json!("sess-1");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/consultations/upload")
                .header("content-type", "application/json")
                .header("x-doctor-id", doctor_id.to_string())
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_consultation_is_not_found() {
    let (app, _pool, _dir) = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/consultations/{}", Uuid::new_v4()))
                .header("x-doctor-id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_retry_unknown_step_name_is_validation_error() {
    let (app, pool, _dir) = create_test_app().await;
    let doctor_id = Uuid::new_v4();
    seed_patient(&pool, doctor_id).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!(
                    "/consultations/{}/steps/flavoring/retry",
                    Uuid::new_v4()
                ))
                .header("x-doctor-id", doctor_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}
