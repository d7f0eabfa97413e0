//! temps-ingest: authenticated event admission
//!
//! Client SDKs post events with Sentry-style credentials. Each request is
//! authenticated against a project key, its payload canonicalized and parked
//! in the payload cache, and a preprocessing job referencing the cache key is
//! sent to the job queue.

pub mod auth;
pub mod body;
pub mod canonical;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod handlers;

pub use auth::{AuthClaim, AuthExtractor, RequestParts, SentryAuthExtractor};
pub use canonical::{cache_key_for_event, CanonicalEvent, SubmittedEvent};
pub use config::{AuthScheme, GatewayConfig};
pub use context::{AdmissionContext, ProjectScope};
pub use credentials::{
    CachedCredentialStore, CredentialCacheConfig, CredentialResolver, CredentialStore,
    CredentialStoreError, DatabaseCredentialStore, ProjectCredential, StaticCredentialStore,
};
pub use error::IngestError;
pub use gateway::{
    Admission, AdmissionOutcome, AdmissionState, AdmittedEvent, IngestRequest, IngestionGateway,
    InsertOptions,
};
pub use handlers::{configure_routes, ApiDoc, AppState};
