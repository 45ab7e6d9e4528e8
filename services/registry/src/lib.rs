//! OncoVision Patient Registry
//!
//! Intake service for the OncoVision exam platform. A clinician registers a
//! patient, gets back a short-lived URL to upload the exam image straight to
//! S3, and later polls the record until the analyzer has written a result.
//!
//! ## Features
//!
//! - **Registration**: `POST /patients` stores a `PENDING` record in DynamoDB
//!   and returns a presigned `PUT` URL for `exams/{id}.jpg`
//! - **Lookup**: `GET /patients/{id}` returns the status, plus the risk and
//!   score once the analyzer has filled them in
//! - **Two runtimes**: the same router serves plain HTTP or Lambda invocations
//!
//! ## Architecture
//!
//! ```text
//!  Client                 Registry                    AWS
//! ┌──────────┐  POST    ┌──────────────┐  PutItem   ┌──────────────┐
//! │ Frontend │─────────▶│ Patient      │───────────▶│ DynamoDB     │
//! │          │  GET     │ Service      │◀───────────│ patients     │
//! └──────────┘─────────▶└──────────────┘  GetItem   └──────────────┘
//!      │                       │                           ▲
//!      │                       │ presign                   │ risco/score
//!      │                       ▼                           │
//!      │                ┌──────────────┐            ┌──────────────┐
//!      └───────────────▶│ S3 exams/    │───────────▶│ Analyzer     │
//!        upload (PUT)   └──────────────┘   event    └──────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod patient;
pub mod record_store;
pub mod service;
pub mod upload_authorizer;

pub use api::{create_router, run_lambda, start_api_server};
pub use config::{Config, ConfigError, StoreBackend};
pub use error::RegistryError;
pub use patient::{PatientRecord, PatientRequest, PatientSummary, RegistrationResponse};
pub use record_store::{DynamoDbRecordStore, InMemoryRecordStore, RecordStore};
pub use service::{HttpResponse, PatientService};
pub use upload_authorizer::{exam_object_key, S3UploadAuthorizer, UploadAuthorizer};
