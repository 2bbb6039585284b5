// SPDX-License-Identifier: Apache-2.0

//! Reconciliation cadence and the optimistic write path. Polling is the
//! design, not a stopgap: the ordering and idempotence guarantees of the
//! mirror are derived for replacing-set deltas, so do not swap this for
//! push delivery without re-deriving them.

use crate::{LocalMirror, SyncError};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_api::{BootstrapResponse, ChangesResponse, UpsertRequest, UpsertResponse};
use tally_model::{EntityKind, EntityRecord};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What to do with the mirror when the server rejects a write with a
/// version conflict. The server record is always handed back to the
/// caller; the core never merges field-by-field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Overwrite the optimistic local value with the server's record.
    #[default]
    AcceptServer,
    /// Keep the optimistic local value; the caller resolves.
    KeepLocal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { version: u64 },
    Conflict { server_record: EntityRecord },
    PeriodLocked,
    /// Server unreachable; the optimistic write stays locally
    /// authoritative until a future sync delivers a server record for it.
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// A cycle was already in flight; this tick did nothing.
    Skipped,
    Offline,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    pub actor_id: String,
    pub interval: Duration,
    pub request_timeout: Duration,
    pub conflict_policy: ConflictPolicy,
}

impl SyncConfig {
    #[must_use]
    pub fn new(base_url: &str, actor_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            actor_id: actor_id.to_string(),
            interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

pub struct SyncOrchestrator {
    config: SyncConfig,
    http: reqwest::Client,
    mirror: Arc<Mutex<LocalMirror>>,
    in_flight: AtomicBool,
    online: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(config: SyncConfig, mirror: Arc<Mutex<LocalMirror>>) -> Result<Arc<Self>, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Arc::new(Self {
            config,
            http,
            mirror,
            in_flight: AtomicBool::new(false),
            online: AtomicBool::new(false),
        }))
    }

    #[must_use]
    pub fn mirror(&self) -> Arc<Mutex<LocalMirror>> {
        Arc::clone(&self.mirror)
    }

    /// Soft indicator for the UI; never escalated to a hard failure.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Periodic reconciliation. Abandoning the task mid-cycle is safe:
    /// each entity type is independently overwritten, so the next
    /// successful cycle self-heals any partial application.
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let me = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(me.config.interval);
            loop {
                interval.tick().await;
                if let Err(e) = me.sync_once().await {
                    warn!("sync cycle failed: {e}");
                }
            }
        })
    }

    /// One reconciliation cycle: bootstrap (locks + directory), then the
    /// delta from the last watermark. A tick that finds a cycle already
    /// in flight skips — it never queues behind it.
    pub async fn sync_once(&self) -> Result<CycleOutcome, SyncError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("sync tick skipped: cycle already in flight");
            return Ok(CycleOutcome::Skipped);
        }
        let result = self.reconcile().await;
        self.in_flight.store(false, Ordering::SeqCst);
        match result {
            Ok(()) => {
                self.online.store(true, Ordering::Relaxed);
                Ok(CycleOutcome::Completed)
            }
            Err(SyncError::Offline(reason)) => {
                self.online.store(false, Ordering::Relaxed);
                warn!("server unreachable, staying in local-only mode: {reason}");
                Ok(CycleOutcome::Offline)
            }
            Err(other) => Err(other),
        }
    }

    async fn reconcile(&self) -> Result<(), SyncError> {
        let bootstrap: BootstrapResponse = self
            .get_json("/api/bootstrap")
            .await?;
        let watermark = { self.mirror.lock().await.watermark().to_string() };
        let changes: ChangesResponse = self
            .get_json(&format!("/api/changes?since={watermark}"))
            .await?;
        let mut mirror = self.mirror.lock().await;
        mirror.apply_bootstrap(bootstrap.periods, bootstrap.users)?;
        mirror.apply_changes(&changes.watermark, &changes.tables)?;
        info!(watermark = %changes.watermark, "reconciliation complete");
        Ok(())
    }

    /// Optimistic write: the mirror is updated immediately, then the
    /// upsert is attempted. Rejections behave per their nature — a locked
    /// period rolls the mirror back (it can never succeed later), a
    /// conflict resolves per [`ConflictPolicy`], and an unreachable
    /// server leaves the local value standing for the next sweep.
    pub async fn submit(
        &self,
        kind: EntityKind,
        record: EntityRecord,
    ) -> Result<SubmitOutcome, SyncError> {
        let id = record.id.as_str().to_string();
        let previous = {
            let mut mirror = self.mirror.lock().await;
            mirror.apply_local(kind, record.clone())?
        };

        let url = format!("{}/api/upsert", self.config.base_url);
        let request = UpsertRequest {
            entity: kind,
            record: record.clone(),
        };
        let response = self
            .http
            .post(&url)
            .header("x-actor-id", &self.config.actor_id)
            .json(&request)
            .send()
            .await;
        let response = match response {
            Ok(v) => v,
            Err(e) => {
                let err = SyncError::from(e);
                if let SyncError::Offline(reason) = &err {
                    self.online.store(false, Ordering::Relaxed);
                    warn!("upsert deferred, saving locally only: {reason}");
                    return Ok(SubmitOutcome::Offline);
                }
                return Err(err);
            }
        };

        match response.status() {
            StatusCode::OK => {
                let accepted: UpsertResponse = response
                    .json()
                    .await
                    .map_err(|e| SyncError::Decode(e.to_string()))?;
                let mut confirmed = record;
                confirmed.version = accepted.version;
                let mut mirror = self.mirror.lock().await;
                mirror.apply_local(kind, confirmed)?;
                self.online.store(true, Ordering::Relaxed);
                Ok(SubmitOutcome::Accepted {
                    version: accepted.version,
                })
            }
            StatusCode::CONFLICT => {
                let server_record = error_server_record(response).await?;
                if self.config.conflict_policy == ConflictPolicy::AcceptServer {
                    let mut mirror = self.mirror.lock().await;
                    mirror.apply_local(kind, server_record.clone())?;
                }
                Ok(SubmitOutcome::Conflict { server_record })
            }
            StatusCode::FORBIDDEN => {
                let mut mirror = self.mirror.lock().await;
                mirror.restore(kind, &id, previous)?;
                Ok(SubmitOutcome::PeriodLocked)
            }
            status => {
                // Any other rejection is final for this attempt; the
                // optimistic value must not linger as if it were accepted.
                let mut mirror = self.mirror.lock().await;
                mirror.restore(kind, &id, previous)?;
                Err(SyncError::Http(format!("upsert returned {status}")))
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let url = format!("{}{}", self.config.base_url, path);
        let response = self
            .http
            .get(&url)
            .header("x-actor-id", &self.config.actor_id)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Http(format!(
                "{path} returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| SyncError::Decode(e.to_string()))
    }
}

async fn error_server_record(response: reqwest::Response) -> Result<EntityRecord, SyncError> {
    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| SyncError::Decode(e.to_string()))?;
    let err: tally_api::ApiError = serde_json::from_value(body["error"].clone())
        .map_err(|e| SyncError::Decode(e.to_string()))?;
    err.server_record()
        .ok_or_else(|| SyncError::Decode("conflict body missing server_record".to_string()))
}
