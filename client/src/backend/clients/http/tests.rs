use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};

use super::HttpBackend;
use crate::{
    backend::{BackendClient, BackendError},
    models::{Attachment, VehicleRequest},
    storage::{TokenKind, TokenStorage, clients::memory::MemoryStorage},
};

/// A request as seen by the mock backend.
#[derive(Debug, Clone)]
struct Seen {
    authorization: Option<String>,
    content_type: String,
    body: String,
}

#[derive(Default)]
struct Mock {
    seen: Mutex<Vec<Seen>>,
}

impl Mock {
    fn record(&self, headers: &HeaderMap, body: &Bytes) -> usize {
        let read = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let mut seen = self.seen.lock().unwrap();
        seen.push(Seen {
            authorization: read(header::AUTHORIZATION),
            content_type: read(header::CONTENT_TYPE).unwrap_or_default(),
            body: String::from_utf8_lossy(body).into_owned(),
        });
        seen.len()
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

async fn token(State(mock): State<Arc<Mock>>, headers: HeaderMap, body: Bytes) -> Response {
    mock.record(&headers, &body);
    let credentials: Value = serde_json::from_slice(&body).unwrap_or_default();
    if credentials["phone"] == "+998901234567" && credentials["password"] == "Secret1!" {
        Json(json!({ "access": "access-token", "refresh": "refresh-token" })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found with the given credentials" })),
        )
            .into_response()
    }
}

async fn vehicle_types(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Response {
    mock.record(&headers, &Bytes::new());
    Json(json!([{ "id": 1, "v_type": "Sedan" }, { "id": 2, "v_type": "SUV" }])).into_response()
}

async fn vehicles(State(mock): State<Arc<Mock>>, headers: HeaderMap, body: Bytes) -> Response {
    let n = mock.record(&headers, &body);
    let text = String::from_utf8_lossy(&body);
    if text.contains("DUPLICATE") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "vin": ["vehicle with this vin already exists."] })),
        )
            .into_response();
    }
    if let Ok(Value::Array(records)) = serde_json::from_slice::<Value>(&body) {
        let created: Vec<Value> = records
            .iter()
            .enumerate()
            .map(|(i, record)| json!({ "id": i + 1, "vin": record["vin"] }))
            .collect();
        return (StatusCode::CREATED, Json(Value::Array(created))).into_response();
    }
    (StatusCode::CREATED, Json(json!({ "id": n, "vin": format!("VIN-{n}") }))).into_response()
}

/// Starts a mock backend on an ephemeral port and returns a client pointing at it.
async fn tools() -> (Arc<Mock>, HttpBackend, MemoryStorage) {
    // Enable debug logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let mock = Arc::new(Mock::default());
    let app = Router::new()
        .route("/api/v1/accounts/token/", post(token))
        .route("/api/v1/autotrips/vehicles-types/", get(vehicle_types))
        .route("/api/v1/autotrips/vehicles/", post(vehicles))
        .with_state(Arc::clone(&mock));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("expected binding an ephemeral port to succeed");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let storage = MemoryStorage::new();
    let base_url = format!("http://{addr}/api/v1").parse().unwrap();
    let backend = HttpBackend::new(base_url, Arc::new(storage.clone()));
    (mock, backend, storage)
}

fn vehicle(vin: &str, photos: &[&str]) -> VehicleRequest {
    VehicleRequest {
        client: 9,
        year_brand_model: "2023 Chevrolet Tahoe".to_string(),
        vin: vin.to_string(),
        v_type: Some(2),
        price: None,
        container_number: Some("MSCU7654321".to_string()),
        arrival_date: None,
        transporter: None,
        recipient: None,
        comment: None,
        status: None,
        document_photos: photos
            .iter()
            .map(|name| Attachment::new(*name, "image/jpeg", b"jpeg-bytes".to_vec()))
            .collect(),
    }
}

#[tokio::test]
async fn test_obtain_tokens() {
    let (mock, backend, _) = tools().await;
    let pair = backend
        .obtain_tokens("+998901234567", "Secret1!")
        .await
        .expect("expected credential exchange to succeed");
    assert_eq!(pair.access, "access-token");
    assert_eq!(pair.refresh, "refresh-token");

    let seen = mock.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].content_type.starts_with("application/json"));
    assert_eq!(seen[0].authorization, None);
}

#[tokio::test]
async fn test_obtain_tokens_rejected() {
    let (_, backend, _) = tools().await;
    let error = backend
        .obtain_tokens("+998901234567", "wrong")
        .await
        .unwrap_err();
    assert_eq!(error.status(), Some(401));
    assert_eq!(
        error.body().and_then(|b| b.detail()),
        Some("No active account found with the given credentials")
    );
}

#[tokio::test]
async fn test_stored_access_token_is_sent_as_bearer() {
    let (mock, backend, storage) = tools().await;
    storage
        .store(TokenKind::Access, "stored-access")
        .await
        .unwrap();

    let types = backend.list_vehicle_types().await.unwrap();
    assert_eq!(types.len(), 2);
    assert_eq!(types[1].label, "SUV");
    assert_eq!(
        mock.seen()[0].authorization.as_deref(),
        Some("Bearer stored-access")
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let storage = MemoryStorage::new();
    // port 9 (discard) is never served by the test host
    let backend = HttpBackend::new(
        "http://127.0.0.1:9/api/v1".parse().unwrap(),
        Arc::new(storage),
    );
    let error = backend.list_vehicle_types().await.unwrap_err();
    assert!(error.is_network(), "unexpected error: {error:?}");
}

#[tokio::test]
async fn test_create_without_photos_sends_one_json_request() {
    let (mock, backend, _) = tools().await;
    let created = backend
        .create_vehicles(&[vehicle("VIN-A", &[]), vehicle("VIN-B", &[])])
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(created[1].vin, "VIN-B");

    let seen = mock.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].content_type.starts_with("application/json"));
}

#[tokio::test]
async fn test_create_with_photos_sends_each_record_its_own_files() {
    let (mock, backend, _) = tools().await;
    let created = backend
        .create_vehicles(&[
            vehicle("VIN-A", &["front.jpg"]),
            vehicle("VIN-B", &["rear.jpg", "plate.jpg"]),
        ])
        .await
        .unwrap();
    assert_eq!(created.len(), 2);

    let seen = mock.seen();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|s| s.content_type.starts_with("multipart/form-data")));

    assert!(seen[0].body.contains("filename=\"front.jpg\""));
    assert!(!seen[0].body.contains("rear.jpg"));
    assert!(!seen[0].body.contains("plate.jpg"));
    assert!(seen[0].body.contains("VIN-A"));

    assert!(seen[1].body.contains("filename=\"rear.jpg\""));
    assert!(seen[1].body.contains("filename=\"plate.jpg\""));
    assert!(!seen[1].body.contains("front.jpg"));
    assert!(seen[1].body.contains("name=\"uploaded_document_photos\""));
}

#[tokio::test]
async fn test_per_record_error_is_reported_at_its_index() {
    let (mock, backend, _) = tools().await;
    let error = backend
        .create_vehicles(&[
            vehicle("VIN-A", &["front.jpg"]),
            vehicle("DUPLICATE", &["rear.jpg"]),
        ])
        .await
        .unwrap_err();

    let BackendError::Status { status, body } = &error else {
        panic!("expected a status error, got {error:?}");
    };
    assert_eq!(*status, 400);
    let issues = body.record_issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].0, 1);
    assert_eq!(
        issues[0].1["vin"].message,
        "vehicle with this vin already exists."
    );
    assert_eq!(mock.seen().len(), 2);
}
