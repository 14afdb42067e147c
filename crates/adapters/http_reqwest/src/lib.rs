//! # lens-adapter-http-reqwest
//!
//! Outbound adapter implementing [`ActionsBackend`] over the backend's REST API.
//!
//! ## Endpoints
//! | Method | Path                         | Port method      |
//! |--------|------------------------------|------------------|
//! | GET    | `/settings/devices/data`     | `list_devices`   |
//! | GET    | `/actions/schema/{device}`   | `device_schema`  |
//! | GET    | `/actions/data`              | `list_actions`   |
//! | GET    | `/actions/{id}`              | `get_action`     |
//! | POST   | `/actions/`                  | `create_action`  |
//! | PUT    | `/actions/{id}`              | `update_action`  |
//! | DELETE | `/actions/{id}`              | `delete_action`  |
//!
//! Non-2xx answers become [`BackendError::Rejected`] carrying the body's
//! `message` (or `error`) field, else its plain text, else the status reason.

pub mod config;
pub mod error;

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use lens_app::ports::ActionsBackend;
use lens_domain::action::{Action, ActionSummary};
use lens_domain::device::DeviceSummary;
use lens_domain::error::BackendError;
use lens_domain::id::{ActionId, DeviceId};
use lens_domain::schema::DeviceSchema;

pub use config::HttpBackendConfig;
pub use error::HttpError;

/// [`ActionsBackend`] backed by a shared reqwest [`Client`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a backend client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::ClientBuild`] if the TLS stack cannot be set up.
    pub fn new(config: &HttpBackendConfig) -> Result<Self, HttpError> {
        let mut builder = Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder.build().map_err(HttpError::ClientBuild)?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Response, HttpError> {
        let response = request.send().await.map_err(|source| HttpError::Transport {
            url: url.to_string(),
            source,
        })?;
        check_response(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        let response = self.send(self.client.get(&url), &url).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| HttpError::Decode { url, source })
    }

    async fn post_action(&self, action: &Action) -> Result<ActionId, HttpError> {
        let url = self.url("/actions/");
        tracing::debug!(%url, "POST");
        let response = self.send(self.client.post(&url).json(action), &url).await?;
        let ack: WriteAck = response.json().await.map_err(|source| HttpError::Decode {
            url: url.clone(),
            source,
        })?;
        ack.id.ok_or(HttpError::MissingId { url })
    }

    async fn put_action(&self, id: ActionId, action: &Action) -> Result<(), HttpError> {
        let url = self.url(&format!("/actions/{id}"));
        tracing::debug!(%url, "PUT");
        self.send(self.client.put(&url).json(action), &url).await?;
        Ok(())
    }

    async fn remove_action(&self, id: ActionId) -> Result<(), HttpError> {
        let url = self.url(&format!("/actions/{id}"));
        tracing::debug!(%url, "DELETE");
        self.send(self.client.delete(&url), &url).await?;
        Ok(())
    }
}

/// Acknowledgement body of a write.
#[derive(Debug, Deserialize)]
struct WriteAck {
    #[serde(default)]
    id: Option<ActionId>,
}

/// Shapes a backend error body may take.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Pass 2xx responses through; turn anything else into [`HttpError::Status`].
async fn check_response(response: Response) -> Result<Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HttpError::Status {
        status: status.as_u16(),
        message: rejection_message(status, &body),
    })
}

/// The text shown to the user for a rejected request.
fn rejection_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message.or(parsed.error).filter(|m| !m.is_empty()) {
            return message;
        }
    }
    let text = body.trim();
    if !text.is_empty() && !text.starts_with('{') && !text.starts_with('<') {
        return text.to_string();
    }
    status
        .canonical_reason()
        .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
}

impl ActionsBackend for HttpBackend {
    fn list_devices(
        &self,
    ) -> impl Future<Output = Result<Vec<DeviceSummary>, BackendError>> + Send {
        async move {
            self.get_json::<Vec<DeviceSummary>>("/settings/devices/data")
                .await
                .map_err(BackendError::from)
        }
    }

    fn device_schema(
        &self,
        device: DeviceId,
    ) -> impl Future<Output = Result<DeviceSchema, BackendError>> + Send {
        async move {
            self.get_json::<DeviceSchema>(&format!("/actions/schema/{device}"))
                .await
                .map_err(BackendError::from)
        }
    }

    fn list_actions(
        &self,
    ) -> impl Future<Output = Result<Vec<ActionSummary>, BackendError>> + Send {
        async move {
            self.get_json::<Vec<ActionSummary>>("/actions/data")
                .await
                .map_err(BackendError::from)
        }
    }

    fn get_action(
        &self,
        id: ActionId,
    ) -> impl Future<Output = Result<Action, BackendError>> + Send {
        async move {
            self.get_json::<Action>(&format!("/actions/{id}"))
                .await
                .map_err(BackendError::from)
        }
    }

    fn create_action(
        &self,
        action: &Action,
    ) -> impl Future<Output = Result<ActionId, BackendError>> + Send {
        async move { self.post_action(action).await.map_err(BackendError::from) }
    }

    fn update_action(
        &self,
        id: ActionId,
        action: &Action,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        async move { self.put_action(id, action).await.map_err(BackendError::from) }
    }

    fn delete_action(&self, id: ActionId) -> impl Future<Output = Result<(), BackendError>> + Send {
        async move { self.remove_action(id).await.map_err(BackendError::from) }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;

    #[derive(Default)]
    struct Stub {
        received: Mutex<Vec<serde_json::Value>>,
    }

    async fn devices() -> Json<serde_json::Value> {
        Json(serde_json::json!([
            {"id": 1, "name": "Boiler sensor", "category": "iot", "enabled": true},
            {"id": 2, "name": "Yard camera", "category": "camera", "enabled": false}
        ]))
    }

    async fn schema(Path(id): Path<u64>) -> impl IntoResponse {
        if id == 1 {
            Json(serde_json::json!({"topics": {"temp": {"type": "number"}}})).into_response()
        } else {
            (AxumStatus::NOT_FOUND, "no such device").into_response()
        }
    }

    async fn action_item(Path(id): Path<u64>) -> impl IntoResponse {
        if id == 7 {
            Json(serde_json::json!({
                "id": 7,
                "name": "Boiler guard",
                "description": null,
                "enabled": true,
                "chain": [
                    {
                        "device_id": 1,
                        "source": "io",
                        "topic": "temp",
                        "cmp": ">",
                        "match": {"value": "75"}
                    },
                    {"device_id": 1, "topic": "relay", "command": "off", "ignore_input": false}
                ]
            }))
            .into_response()
        } else {
            (AxumStatus::NOT_FOUND, Json(serde_json::json!({"message": "action not found"})))
                .into_response()
        }
    }

    async fn delete_item(Path(id): Path<u64>) -> impl IntoResponse {
        if id == 7 {
            Json(serde_json::json!({"ok": true})).into_response()
        } else {
            (AxumStatus::NOT_FOUND, Json(serde_json::json!({"message": "device not found"})))
                .into_response()
        }
    }

    async fn update_item(
        State(stub): State<Arc<Stub>>,
        Path(_id): Path<u64>,
        Json(body): Json<serde_json::Value>,
    ) -> impl IntoResponse {
        stub.received.lock().unwrap().push(body);
        (AxumStatus::BAD_REQUEST, Json(serde_json::json!({"error": "chain is invalid"})))
    }

    async fn create(
        State(stub): State<Arc<Stub>>,
        Json(body): Json<serde_json::Value>,
    ) -> Json<serde_json::Value> {
        stub.received.lock().unwrap().push(body);
        Json(serde_json::json!({"ok": true, "id": 42}))
    }

    async fn serve() -> (HttpBackend, Arc<Stub>) {
        let stub = Arc::new(Stub::default());
        let app = Router::new()
            .route("/settings/devices/data", get(devices))
            .route("/actions/schema/{id}", get(schema))
            .route("/actions/", post(create))
            .route(
                "/actions/{id}",
                get(action_item).put(update_item).delete(delete_item),
            )
            .with_state(Arc::clone(&stub));
        (listen(app).await, stub)
    }

    async fn listen(app: Router) -> HttpBackend {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let config = HttpBackendConfig {
            url: format!("http://{addr}/"),
            ..HttpBackendConfig::default()
        };
        HttpBackend::new(&config).unwrap()
    }

    async fn create_with_ack(ack: &'static str) -> BackendError {
        let app = Router::new()
            .route("/actions/{id}", get(action_item))
            .route("/actions/", post(move || async move { ack }));
        let backend = listen(app).await;
        let action = backend.get_action(ActionId::new(7)).await.unwrap();
        backend.create_action(&Action { id: None, ..action }).await.unwrap_err()
    }

    #[tokio::test]
    async fn should_list_devices_when_backend_answers() {
        let (backend, _) = serve().await;
        let devices = backend.list_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert!(!devices[1].enabled);
    }

    #[tokio::test]
    async fn should_decode_schema_when_device_exists() {
        let (backend, _) = serve().await;
        let schema = backend.device_schema(DeviceId::new(1)).await.unwrap();
        assert!(schema.topics.contains_key("temp"));
    }

    #[tokio::test]
    async fn should_use_plain_text_body_when_rejected_without_json() {
        let (backend, _) = serve().await;
        let err = backend.device_schema(DeviceId::new(9)).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.user_message(), "no such device");
    }

    #[tokio::test]
    async fn should_decode_stored_action_positionally() {
        let (backend, _) = serve().await;
        let action = backend.get_action(ActionId::new(7)).await.unwrap();
        assert_eq!(action.id, Some(ActionId::new(7)));
        assert_eq!(action.description, "");
        assert_eq!(action.chain.result.command, "off");
    }

    #[tokio::test]
    async fn should_surface_backend_message_when_delete_is_rejected() {
        let (backend, _) = serve().await;
        let err = backend.delete_action(ActionId::new(3)).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.user_message(), "device not found");
        backend.delete_action(ActionId::new(7)).await.unwrap();
    }

    #[tokio::test]
    async fn should_post_chain_array_and_return_new_id() {
        let (backend, stub) = serve().await;
        let action = backend.get_action(ActionId::new(7)).await.unwrap();
        let new = Action { id: None, ..action };

        let id = backend.create_action(&new).await.unwrap();

        assert_eq!(id, ActionId::new(42));
        let received = stub.received.lock().unwrap();
        assert!(received[0].get("id").is_none());
        assert_eq!(received[0]["chain"][0]["source"], "io");
        assert_eq!(received[0]["chain"][1]["ignore_input"], false);
    }

    #[tokio::test]
    async fn should_fail_create_when_ack_has_no_id() {
        let err = create_with_ack("{}").await;
        assert!(matches!(err, BackendError::InvalidBody(_)));
        assert_eq!(err.user_message(), "unexpected response from backend");
    }

    #[tokio::test]
    async fn should_fail_create_when_ack_is_not_json() {
        let err = create_with_ack("saved").await;
        assert!(matches!(err, BackendError::InvalidBody(_)));
    }

    #[tokio::test]
    async fn should_fall_back_to_error_field_when_update_is_rejected() {
        let (backend, _) = serve().await;
        let action = backend.get_action(ActionId::new(7)).await.unwrap();
        let err = backend.update_action(ActionId::new(7), &action).await.unwrap_err();
        assert_eq!(err.user_message(), "chain is invalid");
    }

    #[tokio::test]
    async fn should_report_unreachable_when_nothing_listens() {
        let config = HttpBackendConfig {
            url: "http://127.0.0.1:9".to_string(),
            ..HttpBackendConfig::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        let err = backend.list_actions().await.unwrap_err();
        assert!(matches!(err, BackendError::Unreachable(_)));
    }

    #[test]
    fn should_use_status_reason_when_body_is_empty() {
        assert_eq!(rejection_message(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
        assert_eq!(
            rejection_message(StatusCode::NOT_FOUND, r#"{"message": "device not found"}"#),
            "device not found"
        );
    }
}
