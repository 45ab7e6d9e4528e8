use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use uuid::Uuid;

/// Status assigned to every new record; the analyzer moves it on from here
pub const STATUS_PENDING: &str = "PENDING";

/// Stored when the caller sends no name (or an empty one)
pub const UNKNOWN_NAME: &str = "Unknown";

/// Stored when the caller sends no history
pub const HISTORY_NOT_INFORMED: &str = "Not Informed";

/// Registration payload sent by the frontend.
///
/// The Portuguese field names are accepted too, since the legacy intake
/// form posts `nome`/`idade`/`historico`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PatientRequest {
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
    #[serde(alias = "idade")]
    pub age: i64,
    #[serde(default, alias = "historico")]
    pub history: Option<String>,
}

/// A patient as persisted in the record store
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    /// Primary key, assigned once at creation
    pub id: String,
    /// Always set at creation; rows written elsewhere may lack it
    pub name: Option<String>,
    pub age: i64,
    pub history: String,
    /// PENDING until the analyzer writes a result
    pub status: String,
    /// Creation time in epoch milliseconds
    pub created_at: String,
    /// Written by the analyzer, never by this service
    pub risk: Option<String>,
    /// Written by the analyzer, never by this service. Kept as the
    /// stored number text so no digits are lost.
    pub score: Option<String>,
}

impl PatientRecord {
    /// Build a fresh PENDING record from a registration request
    pub fn register(request: PatientRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: Some(
                request
                    .name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            ),
            age: request.age,
            history: request
                .history
                .unwrap_or_else(|| HISTORY_NOT_INFORMED.to_string()),
            status: STATUS_PENDING.to_string(),
            created_at: Utc::now().timestamp_millis().to_string(),
            risk: None,
            score: None,
        }
    }
}

/// Response body for a successful registration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub message: String,
    pub paciente_id: String,
    pub upload_url: String,
    pub bucket: String,
    pub key: String,
}

/// Read-path projection of a stored record
#[derive(Debug, Clone, Serialize)]
pub struct PatientSummary {
    #[serde(rename = "pacienteId")]
    pub paciente_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
    /// Emitted verbatim as a JSON number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Box<RawValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
}

impl From<PatientRecord> for PatientSummary {
    fn from(record: PatientRecord) -> Self {
        Self {
            paciente_id: record.id,
            status: record.status,
            risk: record.risk,
            score: record.score.and_then(|raw| RawValue::from_string(raw).ok()),
            nome: record.name,
        }
    }
}
