//! Per-request admission state.
//!
//! Diagnostic tags live on the context itself and on the request's tracing
//! span, never in process-wide state, so concurrent requests cannot see each
//! other's project or agent.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::Serialize;
use thiserror::Error;
use tracing::Span;

use crate::auth::AuthClaim;

pub const TAG_PROJECT: &str = "project";
pub const TAG_AGENT: &str = "agent";
pub const TAG_PROTOCOL: &str = "protocol";

/// Project a credential is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectScope {
    pub project_id: i32,
    pub environment_id: Option<i32>,
    pub deployment_id: Option<i32>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContextError {
    #[error("{0} already bound on admission context")]
    AlreadyBound(&'static str),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AdmissionContext {
    pub agent: Option<String>,
    pub protocol_version: Option<String>,
    /// Project named in the request URL, if any, until a project is bound
    pub project_id: Option<i32>,
    pub project: Option<ProjectScope>,
    pub client_ip: Option<IpAddr>,
    pub tags: BTreeMap<&'static str, String>,
    #[serde(skip)]
    auth_bound: bool,
}

impl AdmissionContext {
    pub fn new(project_id: Option<i32>, client_ip: Option<IpAddr>) -> Self {
        Self {
            project_id,
            client_ip,
            ..Default::default()
        }
    }

    pub fn bind_project(&mut self, project: ProjectScope) -> Result<(), ContextError> {
        if self.project.is_some() {
            return Err(ContextError::AlreadyBound("project"));
        }
        self.project_id = Some(project.project_id);
        self.project = Some(project);
        self.tags
            .insert(TAG_PROJECT, project.project_id.to_string());
        Ok(())
    }

    pub fn bind_auth(&mut self, claim: &AuthClaim) -> Result<(), ContextError> {
        if self.auth_bound {
            return Err(ContextError::AlreadyBound("auth"));
        }
        self.auth_bound = true;
        self.agent = claim.client.clone();
        self.protocol_version = claim.protocol_version.clone();
        if let Some(agent) = &self.agent {
            self.tags.insert(TAG_AGENT, agent.clone());
        }
        if let Some(protocol) = &self.protocol_version {
            self.tags.insert(TAG_PROTOCOL, protocol.clone());
        }
        Ok(())
    }

    /// Copy the tags onto the fields of an `ingest` span
    pub fn record_on(&self, span: &Span) {
        if let Some(project) = &self.project {
            span.record("project_id", project.project_id);
        }
        if let Some(agent) = &self.agent {
            span.record("agent", agent.as_str());
        }
        if let Some(protocol) = &self.protocol_version {
            span.record("protocol", protocol.as_str());
        }
    }
}
