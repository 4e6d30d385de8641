//! Actor identity resolution for ingestion runs and application writes.
//!
//! A verified bearer token always wins. Without one, `IdentityPolicy`
//! decides: `Required` rejects the request, `BatchActor` writes on behalf of
//! an identity that was provisioned in configuration. No identity is ever
//! made up here.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;

/// The batch identity existing deployments provision for unauthenticated
/// runs. Only used when configured through `BATCH_ACTOR_ID`.
pub const LEGACY_PLACEHOLDER_ACTOR_ID: Uuid =
    Uuid::from_u128(0xb518c5d5_2139_413e_ba3d_2e0f9dcd30aa);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Unverified requests are rejected with 401.
    Required,
    /// Unverified requests act as this provisioned identity.
    BatchActor(Uuid),
}

impl IdentityPolicy {
    /// Builds the policy from `ANONYMOUS_RUNS` and `BATCH_ACTOR_ID`.
    pub fn from_settings(mode: &str, batch_actor: Option<&str>) -> anyhow::Result<Self> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "reject" | "required" => Ok(IdentityPolicy::Required),
            "batch" => {
                let raw = batch_actor
                    .filter(|s| !s.trim().is_empty())
                    .context("BATCH_ACTOR_ID must be set when ANONYMOUS_RUNS=batch")?;
                let id = Uuid::parse_str(raw.trim())
                    .with_context(|| format!("BATCH_ACTOR_ID '{raw}' is not a valid UUID"))?;
                Ok(IdentityPolicy::BatchActor(id))
            }
            other => bail!("ANONYMOUS_RUNS must be 'reject' or 'batch', got '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorSource {
    Verified,
    BatchActor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedActor {
    pub id: Uuid,
    pub source: ActorSource,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Turns a bearer token into a user id.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Uuid, VerifyError>;
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
}

/// Verifies tokens against the hosted auth service (`GET /auth/v1/user`).
#[derive(Clone)]
pub struct SupabaseAuthVerifier {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseAuthVerifier {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, VerifyError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(10)).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl IdentityVerifier for SupabaseAuthVerifier {
    async fn verify(&self, token: &str) -> Result<Uuid, VerifyError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VerifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let user: AuthUser = response.json().await?;
        Ok(user.id)
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolves who a request acts on behalf of.
///
/// Verification is best-effort: a verifier failure is logged and the
/// request falls through to the policy, same as a missing header.
pub async fn resolve_actor(
    token: Option<&str>,
    verifier: &dyn IdentityVerifier,
    policy: IdentityPolicy,
) -> Result<ResolvedActor, AppError> {
    match token {
        Some(token) => match verifier.verify(token).await {
            Ok(id) => {
                info!("Acting on behalf of user {id}");
                return Ok(ResolvedActor {
                    id,
                    source: ActorSource::Verified,
                });
            }
            Err(e) => warn!("Error verifying bearer token: {e}"),
        },
        None => warn!("No Authorization header found"),
    }

    match policy {
        IdentityPolicy::Required => Err(AppError::Unauthorized),
        IdentityPolicy::BatchActor(id) => {
            warn!("No authenticated user context, acting as provisioned batch actor {id}");
            Ok(ResolvedActor {
                id,
                source: ActorSource::BatchActor,
            })
        }
    }
}
