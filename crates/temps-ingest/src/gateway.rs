//! The admission flow: extract, resolve, authorize, cache, enqueue.

use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use chrono::Utc;
use temps_core::{IngestTask, Job, JobQueue, UtcDateTime};
use temps_payload_cache::{Attachment, PayloadCache};
use tracing::{debug, error, field, info, info_span, warn, Instrument, Span};

use crate::auth::{AuthClaim, AuthExtractor, RequestParts};
use crate::body::{decode_body, parse_event_body};
use crate::canonical::{prepare_event, CanonicalEvent};
use crate::config::GatewayConfig;
use crate::context::AdmissionContext;
use crate::credentials::origin::is_allowed_origin;
use crate::credentials::{CredentialResolver, ProjectCredential};
use crate::error::{FailureKind, IngestError};

/// Progress of a single admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    Received,
    Authenticating,
    Authorized,
    Cached,
    Enqueued,
}

impl fmt::Display for AdmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdmissionState::Received => "received",
            AdmissionState::Authenticating => "authenticating",
            AdmissionState::Authorized => "authorized",
            AdmissionState::Cached => "cached",
            AdmissionState::Enqueued => "enqueued",
        };
        f.write_str(name)
    }
}

/// How an authorized event is handed to the pipeline
#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    /// `None` means the event was submitted without attachments
    pub attachments: Option<Vec<Attachment>>,
    /// Admission wall-clock; defaults to now
    pub start_time: Option<UtcDateTime>,
    /// Route to the reprocessing queue instead of the normal one
    pub from_reprocessing: bool,
}

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub parts: RequestParts,
    /// Project named in the URL, if the route carries one
    pub project_id: Option<i32>,
    pub body: Bytes,
    pub options: InsertOptions,
}

impl IngestRequest {
    pub fn new(parts: RequestParts, body: impl Into<Bytes>) -> Self {
        Self {
            parts,
            project_id: None,
            body: body.into(),
            options: InsertOptions::default(),
        }
    }

    pub fn with_project_id(mut self, project_id: Option<i32>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn with_options(mut self, options: InsertOptions) -> Self {
        self.options = options;
        self
    }
}

/// Successful admission, returned to the transport layer
#[derive(Debug, Clone)]
pub struct Admission {
    pub cache_key: String,
    pub event_id: String,
    pub context: AdmissionContext,
}

/// Event that made it through the whole flow
#[derive(Debug, Clone)]
pub struct AdmittedEvent {
    pub cache_key: String,
    pub event_id: String,
}

/// Result of one admission together with the context bound before it ended.
///
/// On rejection the context still carries whatever project and client tags
/// were resolved, so the transport can report them.
#[derive(Debug)]
pub struct AdmissionOutcome {
    pub context: AdmissionContext,
    pub result: Result<AdmittedEvent, IngestError>,
}

impl AdmissionOutcome {
    pub fn into_result(self) -> Result<Admission, IngestError> {
        let context = self.context;
        self.result.map(|event| Admission {
            cache_key: event.cache_key,
            event_id: event.event_id,
            context,
        })
    }
}

pub struct IngestionGateway {
    extractor: Arc<dyn AuthExtractor>,
    resolver: CredentialResolver,
    cache: Arc<dyn PayloadCache>,
    queue: Arc<dyn JobQueue>,
    config: GatewayConfig,
}

impl IngestionGateway {
    pub fn new(
        resolver: CredentialResolver,
        cache: Arc<dyn PayloadCache>,
        queue: Arc<dyn JobQueue>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            extractor: config.auth_scheme.extractor(),
            resolver,
            cache,
            queue,
            config,
        }
    }

    /// Replace the extractor chosen by `config.auth_scheme`
    pub fn with_extractor(mut self, extractor: Arc<dyn AuthExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run one request through the full admission flow.
    ///
    /// Nothing is cached or enqueued unless authentication and authorization
    /// succeed, and nothing is enqueued unless the payload was cached.
    pub async fn admit(&self, request: IngestRequest) -> Result<Admission, IngestError> {
        self.process(request).await.into_result()
    }

    /// Like [`admit`](Self::admit), but hands back the admission context
    /// whether or not the event was accepted
    pub async fn process(&self, request: IngestRequest) -> AdmissionOutcome {
        let span = info_span!(
            "ingest",
            project_id = field::Empty,
            agent = field::Empty,
            protocol = field::Empty,
            event_id = field::Empty,
        );
        let mut context = AdmissionContext::new(request.project_id, request.parts.client_ip);
        let result = self
            .run_admission(request, &mut context)
            .instrument(span)
            .await;
        AdmissionOutcome { context, result }
    }

    async fn run_admission(
        &self,
        request: IngestRequest,
        context: &mut AdmissionContext,
    ) -> Result<AdmittedEvent, IngestError> {
        let IngestRequest {
            parts,
            body,
            mut options,
            ..
        } = request;
        if options.start_time.is_none() {
            options.start_time = Some(Utc::now());
        }

        let mut state = AdmissionState::Received;
        debug!(state = %state, client_ip = ?context.client_ip, "Received event submission");

        state = self.transition(state, AdmissionState::Authenticating);
        let (claim, credential) = self
            .authenticate(&parts, context)
            .await
            .map_err(|e| log_exit(state, e))?;
        state = self.transition(state, AdmissionState::Authorized);

        self.check_origin(&claim, &credential)
            .map_err(|e| log_exit(state, e))?;

        let event = self
            .decode_event(&parts, &body, credential.project_id)
            .map_err(|e| log_exit(state, e))?;
        Span::current().record("event_id", event.event_id.as_str());

        let cache_key = self.insert_data_to_cache(&event, options).await?;

        info!(
            project_id = credential.project_id,
            event_id = %event.event_id,
            agent = ?context.agent,
            "Event admitted"
        );

        Ok(AdmittedEvent {
            cache_key,
            event_id: event.event_id,
        })
    }

    /// Extract and resolve the request credentials, binding the project and
    /// client identity onto `context`
    pub async fn authenticate(
        &self,
        parts: &RequestParts,
        context: &mut AdmissionContext,
    ) -> Result<(AuthClaim, ProjectCredential), IngestError> {
        let claim = self.extractor.extract_auth(parts)?;
        let credential = self.resolver.resolve(&claim).await?;

        if let Some(url_project) = context.project_id {
            if url_project != credential.project_id {
                return Err(IngestError::malformed(
                    "Two different projects were specified",
                ));
            }
        }

        context
            .bind_project(credential.scope())
            .map_err(|e| IngestError::Internal(e.to_string()))?;
        context
            .bind_auth(&claim)
            .map_err(|e| IngestError::Internal(e.to_string()))?;
        context.record_on(&Span::current());

        Ok((claim, credential))
    }

    fn check_origin(
        &self,
        claim: &AuthClaim,
        credential: &ProjectCredential,
    ) -> Result<(), IngestError> {
        if !self.config.enforce_origins || !claim.is_public {
            return Ok(());
        }

        match claim.origin.as_deref() {
            Some(origin) if !is_allowed_origin(origin, &credential.allowed_origins) => Err(
                IngestError::Forbidden(format!("Invalid origin: '{}'", origin)),
            ),
            _ => Ok(()),
        }
    }

    fn decode_event(
        &self,
        parts: &RequestParts,
        body: &[u8],
        project_id: i32,
    ) -> Result<CanonicalEvent, IngestError> {
        let encoding = parts.header("content-encoding");
        let decoded = decode_body(body, encoding.as_deref(), self.config.max_event_size)?;
        let value = parse_event_body(&decoded)?;
        prepare_event(value, project_id)
    }

    /// Cache the canonical event (and its attachments), then enqueue the
    /// preprocessing task referencing it. Returns the cache key.
    pub async fn insert_data_to_cache(
        &self,
        event: &CanonicalEvent,
        options: InsertOptions,
    ) -> Result<String, IngestError> {
        let cache_key = event.cache_key();
        let ttl = self.config.cache_ttl();

        self.cache
            .put(&cache_key, &event.payload, ttl)
            .await
            .map_err(|e| log_exit(AdmissionState::Authorized, e.into()))?;

        if let Some(attachments) = &options.attachments {
            self.cache
                .put_attachments(&cache_key, attachments, ttl)
                .await
                .map_err(|e| log_exit(AdmissionState::Authorized, e.into()))?;
        }
        self.transition(AdmissionState::Authorized, AdmissionState::Cached);

        let task = IngestTask {
            cache_key: cache_key.clone(),
            event_id: event.event_id.clone(),
            start_time: options.start_time.unwrap_or_else(Utc::now),
            from_reprocessing: options.from_reprocessing,
        };
        let job = Job::from(task);
        let queue_name = job.queue_name();

        self.queue
            .send(job)
            .await
            .map_err(|e| log_exit(AdmissionState::Cached, e.into()))?;
        debug!(queue = queue_name, cache_key = %cache_key, "Enqueued preprocessing task");
        self.transition(AdmissionState::Cached, AdmissionState::Enqueued);

        Ok(cache_key)
    }

    fn transition(&self, from: AdmissionState, to: AdmissionState) -> AdmissionState {
        debug!("Admission state {} -> {}", from, to);
        to
    }
}

fn log_exit(state: AdmissionState, error: IngestError) -> IngestError {
    match error.kind() {
        FailureKind::Rejected => {
            warn!(state = %state, "Rejected event submission: {}", error);
            if let IngestError::Unauthenticated { reason } = &error {
                debug!("Authentication failure reason: {}", reason);
            }
        }
        FailureKind::Failed => {
            error!(state = %state, "Failed to admit event: {:?}", error);
        }
    }
    error
}
