use crate::error::{RegistryError, Result};
use crate::patient::{PatientRecord, PatientRequest, PatientSummary, RegistrationResponse};
use crate::record_store::RecordStore;
use crate::upload_authorizer::{exam_object_key, UploadAuthorizer, EXAM_CONTENT_TYPE};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

pub const REGISTERED_MESSAGE: &str = "Paciente cadastrado";
pub const EMPTY_BODY_MESSAGE: &str = "Body vazio";
pub const MISSING_ID_MESSAGE: &str = "ID do paciente obrigatorio na URL";
pub const NOT_FOUND_MESSAGE: &str = "Paciente nao encontrado";
pub const METHOD_NOT_ALLOWED_BODY: &str = "Method Not Allowed";

/// Header set attached to every response
pub const RESPONSE_HEADERS: [(&str, &str); 3] = [
    ("Content-Type", "application/json"),
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "POST,GET,OPTIONS"),
];

/// Transport-neutral response produced by the service
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: String,
}

impl HttpResponse {
    fn new(status: StatusCode, body: String) -> Self {
        Self {
            status,
            headers: RESPONSE_HEADERS.to_vec(),
            body,
        }
    }

    fn json<T: Serialize>(status: StatusCode, payload: &T) -> Result<Self> {
        let body = serde_json::to_string(payload)
            .map_err(|e| RegistryError::Internal(anyhow::Error::new(e)))?;
        Ok(Self::new(status, body))
    }

    fn from_error(err: &RegistryError) -> Self {
        match err {
            // 405 keeps its plain-text body
            RegistryError::MethodNotSupported(_) => {
                Self::new(err.status_code(), METHOD_NOT_ALLOWED_BODY.to_string())
            }
            _ => Self::new(
                err.status_code(),
                serde_json::json!({ "error": err.to_string() }).to_string(),
            ),
        }
    }

    /// Parse the body as JSON
    pub fn json_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        let headers = response.headers_mut();
        // Replace the text/plain content type axum picks for String bodies
        headers.remove(header::CONTENT_TYPE);
        for (name, value) in self.headers {
            if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
                headers.insert(name, HeaderValue::from_static(value));
            }
        }
        response
    }
}

/// Registers patients and serves their records
#[derive(Clone)]
pub struct PatientService {
    store: Arc<dyn RecordStore>,
    authorizer: Arc<dyn UploadAuthorizer>,
    upload_url_expiry: Duration,
}

impl PatientService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        authorizer: Arc<dyn UploadAuthorizer>,
        upload_url_expiry: Duration,
    ) -> Self {
        Self {
            store,
            authorizer,
            upload_url_expiry,
        }
    }

    /// Dispatch on method and turn every failure into a response
    #[instrument(skip(self, path_params, body))]
    pub async fn handle_request(
        &self,
        method: &str,
        path_params: &HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> HttpResponse {
        info!(method = %method, "Request received");

        let result = if method.eq_ignore_ascii_case("POST") {
            self.create(body).await
        } else if method.eq_ignore_ascii_case("GET") {
            self.fetch(path_params).await
        } else {
            Err(RegistryError::MethodNotSupported(method.to_string()))
        };

        result.unwrap_or_else(|err| {
            match err.status_code() {
                StatusCode::INTERNAL_SERVER_ERROR => {
                    metrics::counter!("registry.requests.failed").increment(1);
                    error!(error = %err, "Request failed");
                }
                status => warn!(status = status.as_u16(), error = %err, "Request rejected"),
            }
            HttpResponse::from_error(&err)
        })
    }

    /// Register a patient and hand back an upload URL for the exam image
    pub async fn create(&self, body: Option<&[u8]>) -> Result<HttpResponse> {
        let request = parse_request(body)?;
        let record = PatientRecord::register(request);
        let key = exam_object_key(&record.id);

        // Presigning is local, so do it first: a failure leaves nothing behind
        let upload_url = self
            .authorizer
            .authorize(&key, EXAM_CONTENT_TYPE, self.upload_url_expiry)
            .await
            .map_err(RegistryError::Authorization)?;

        self.store.put(&record).await.map_err(RegistryError::Store)?;

        metrics::counter!("registry.patients.created").increment(1);
        info!(patient_id = %record.id, key = %key, "Patient registered");

        HttpResponse::json(
            StatusCode::OK,
            &RegistrationResponse {
                message: REGISTERED_MESSAGE.to_string(),
                paciente_id: record.id,
                upload_url,
                bucket: self.authorizer.bucket().to_string(),
                key,
            },
        )
    }

    /// Look up a patient by the `id` path parameter
    pub async fn fetch(&self, path_params: &HashMap<String, String>) -> Result<HttpResponse> {
        let id = path_params
            .get("id")
            .ok_or_else(|| RegistryError::Validation(MISSING_ID_MESSAGE.to_string()))?;

        let record = self.store.get(id).await.map_err(RegistryError::Store)?;

        let Some(record) = record else {
            metrics::counter!("registry.patients.not_found").increment(1);
            return Err(RegistryError::NotFound(NOT_FOUND_MESSAGE.to_string()));
        };

        metrics::counter!("registry.patients.fetched").increment(1);

        HttpResponse::json(StatusCode::OK, &PatientSummary::from(record))
    }
}

/// Parse raw body bytes; bytes that are not UTF-8 JSON are a validation error
fn parse_request(body: Option<&[u8]>) -> Result<PatientRequest> {
    let body = body
        .map(<[u8]>::trim_ascii)
        .filter(|b| !b.is_empty() && *b != b"null")
        .ok_or_else(|| RegistryError::Validation(EMPTY_BODY_MESSAGE.to_string()))?;

    serde_json::from_slice(body).map_err(|e| RegistryError::Validation(format!("Body invalido: {e}")))
}
