//! Cluster client: maps manifest documents onto the fixed Kubernetes REST
//! paths, retries transient failures with bounded backoff, and normalizes
//! responses into a uniform outcome.

#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use manifesto_core::{ApplyOutcome, Config, Error, ManifestDocument, Result, WorkloadKind};
use metrics::{counter, histogram};
use reqwest::{Method, StatusCode};
use serde_json::Value as Json;
use tracing::{info, warn};

mod summary;

pub use summary::{ClusterSnapshot, CronJobSummary, DeploymentSummary, JobSummary, PodSummary};

const BACKOFF_CAP_MS: u64 = 5_000;

/// Exponential backoff before retry `attempt` (1-based), capped.
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    Duration::from_millis((base_ms.saturating_mul(1u64 << exp)).min(BACKOFF_CAP_MS))
}

/// How a create response is handled. Only 409 takes the update path; any
/// other 4xx is surfaced immediately, 5xx goes through the retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateDisposition {
    Created,
    Conflict,
    Rejected,
    Transient,
}

pub fn classify_create_status(status: u16) -> CreateDisposition {
    match status {
        200..=299 => CreateDisposition::Created,
        409 => CreateDisposition::Conflict,
        400..=499 => CreateDisposition::Rejected,
        _ => CreateDisposition::Transient,
    }
}

/// Pull the cluster's own message out of a Status body, falling back to
/// the raw text.
fn cluster_message(body: &str) -> String {
    serde_json::from_str::<Json>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// HTTP client over the cluster's REST API. Holds no cross-call mutable
/// state; safe to share across concurrent callers.
#[derive(Clone)]
pub struct ClusterClient {
    http: reqwest::Client,
    base_url: String,
    namespace: String,
    bearer_token: Option<String>,
    max_attempts: u32,
    backoff_base_ms: u64,
}

impl ClusterClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .danger_accept_invalid_certs(!cfg.verify_tls)
            .build()
            .map_err(|e| Error::Internal(format!("http client init: {e}")))?;
        Ok(Self {
            http,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            namespace: cfg.namespace.clone(),
            bearer_token: cfg.bearer_token.clone(),
            max_attempts: cfg.max_attempts.max(1),
            backoff_base_ms: cfg.backoff_base_ms,
        })
    }

    fn collection_path(kind: WorkloadKind, ns: &str) -> String {
        format!("/apis/{}/namespaces/{}/{}", kind.api_version(), ns, kind.plural())
    }

    fn resource_path(kind: WorkloadKind, ns: &str, name: &str) -> String {
        format!("{}/{}", Self::collection_path(kind, ns), name)
    }

    /// One request with the transient-failure retry loop. Connection
    /// errors, timeouts and 5xx are retried up to the attempt ceiling;
    /// anything else is returned to the caller for interpretation.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Json>,
        query: &[(&str, String)],
    ) -> std::result::Result<(StatusCode, String), String> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_failure = String::new();
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                counter!("cluster_retry_total", 1u64);
                tokio::time::sleep(backoff_delay(self.backoff_base_ms, attempt)).await;
            }
            let mut req = self.http.request(method.clone(), &url);
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(token) = &self.bearer_token {
                req = req.bearer_auth(token);
            }
            if let Some(b) = body {
                req = req.json(b);
            }
            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_server_error() {
                        warn!(%status, attempt, "cluster: server error; will retry");
                        last_failure = format!("{status}: {}", cluster_message(&text));
                        continue;
                    }
                    return Ok((status, text));
                }
                Err(e) => {
                    warn!(error = %e, attempt, "cluster: request failed; will retry");
                    last_failure = e.to_string();
                }
            }
        }
        Err(format!(
            "{} {} failed after {} attempts: {}",
            method, path, self.max_attempts, last_failure
        ))
    }

    /// Create the resource; on 409 fetch the live object and replace it
    /// exactly once. Every terminal outcome is a variant, never a fault.
    pub async fn apply(&self, doc: &ManifestDocument) -> ApplyOutcome {
        let t0 = Instant::now();
        counter!("apply_attempts", 1u64);
        let kind = match doc.kind() {
            Ok(k) => k,
            Err(e) => {
                return ApplyOutcome::RejectedByCluster { status: 400, message: e.to_string() }
            }
        };
        let ns = doc.namespace().unwrap_or(&self.namespace).to_string();
        let name = doc.name().unwrap_or("<unnamed>").to_string();
        let path = Self::collection_path(kind, &ns);

        let (status, text) = match self.request(Method::POST, &path, Some(doc.as_value()), &[]).await
        {
            Ok(r) => r,
            Err(reason) => {
                counter!("apply_transport_failures", 1u64);
                return ApplyOutcome::TransportFailure { reason };
            }
        };

        let outcome = match classify_create_status(status.as_u16()) {
            CreateDisposition::Created => {
                let rv = resource_version_of(&text);
                info!(kind = %kind, name = %name, ns = %ns, "cluster: created");
                ApplyOutcome::Created { name, resource_version: rv }
            }
            CreateDisposition::Conflict => {
                counter!("apply_conflicts", 1u64);
                self.update_existing(kind, &ns, &name, doc).await
            }
            CreateDisposition::Rejected | CreateDisposition::Transient => {
                ApplyOutcome::RejectedByCluster {
                    status: status.as_u16(),
                    message: cluster_message(&text),
                }
            }
        };
        histogram!("apply_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        outcome
    }

    /// The single update attempt behind a 409: read the live object's
    /// resourceVersion, stamp it, PUT the named resource.
    async fn update_existing(
        &self,
        kind: WorkloadKind,
        ns: &str,
        name: &str,
        doc: &ManifestDocument,
    ) -> ApplyOutcome {
        let path = Self::resource_path(kind, ns, name);
        let live = match self.request(Method::GET, &path, None, &[]).await {
            Ok((status, text)) if status.is_success() => text,
            Ok((status, text)) => {
                return ApplyOutcome::RejectedByCluster {
                    status: status.as_u16(),
                    message: cluster_message(&text),
                }
            }
            Err(reason) => return ApplyOutcome::TransportFailure { reason },
        };
        let mut updated = doc.clone();
        if let Some(rv) = resource_version_of(&live) {
            updated.set_resource_version(&rv);
        }
        match self.request(Method::PUT, &path, Some(updated.as_value()), &[]).await {
            Ok((status, text)) if status.is_success() => {
                info!(kind = %kind, name = %name, ns = %ns, "cluster: conflict resolved via update");
                ApplyOutcome::Conflict {
                    existing: name.to_string(),
                    resource_version: resource_version_of(&text),
                }
            }
            Ok((status, text)) => ApplyOutcome::RejectedByCluster {
                status: status.as_u16(),
                message: cluster_message(&text),
            },
            Err(reason) => ApplyOutcome::TransportFailure { reason },
        }
    }

    /// List workloads of one kind. Items come back without apiVersion or
    /// kind, so both are re-stamped before wrapping.
    pub async fn list(&self, kind: WorkloadKind, namespace: Option<&str>) -> Result<Vec<ManifestDocument>> {
        let ns = namespace.unwrap_or(&self.namespace);
        let path = Self::collection_path(kind, ns);
        let (status, text) = self
            .request(Method::GET, &path, None, &[])
            .await
            .map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(Error::Rejected {
                status: status.as_u16(),
                message: cluster_message(&text),
            });
        }
        let body: Json =
            serde_json::from_str(&text).map_err(|e| Error::Internal(format!("list body: {e}")))?;
        let items = body.get("items").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        Ok(items
            .into_iter()
            .map(|mut item| {
                if let Some(obj) = item.as_object_mut() {
                    obj.insert("apiVersion".into(), Json::String(kind.api_version().into()));
                    obj.insert("kind".into(), Json::String(kind.as_str().into()));
                }
                ManifestDocument::from_cluster_value(item)
            })
            .collect())
    }

    pub async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<PodSummary>> {
        let ns = namespace.unwrap_or(&self.namespace);
        let path = format!("/api/v1/namespaces/{ns}/pods");
        let (status, text) = self
            .request(Method::GET, &path, None, &[])
            .await
            .map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(Error::Rejected {
                status: status.as_u16(),
                message: cluster_message(&text),
            });
        }
        let body: Json =
            serde_json::from_str(&text).map_err(|e| Error::Internal(format!("pods body: {e}")))?;
        Ok(summary::pods_from_list(&body))
    }

    /// Plain-text logs for one pod.
    pub async fn pod_logs(
        &self,
        pod: &str,
        namespace: Option<&str>,
        tail_lines: Option<u32>,
    ) -> Result<String> {
        let ns = namespace.unwrap_or(&self.namespace);
        let path = format!("/api/v1/namespaces/{ns}/pods/{pod}/log");
        let tail = tail_lines.unwrap_or(100);
        let query = [("tailLines", tail.to_string())];
        let (status, text) = self
            .request(Method::GET, &path, None, &query)
            .await
            .map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(Error::Rejected {
                status: status.as_u16(),
                message: cluster_message(&text),
            });
        }
        Ok(text)
    }

    /// Dashboard-style snapshot of the namespace: one list call per
    /// workload kind plus the pods.
    pub async fn snapshot(&self, namespace: Option<&str>) -> Result<ClusterSnapshot> {
        let ns = namespace.unwrap_or(&self.namespace).to_string();
        let mut snap = ClusterSnapshot { namespace: ns.clone(), ..Default::default() };
        for kind in [WorkloadKind::Job, WorkloadKind::Deployment, WorkloadKind::CronJob] {
            let path = Self::collection_path(kind, &ns);
            let (status, text) = self
                .request(Method::GET, &path, None, &[])
                .await
                .map_err(Error::Transport)?;
            if !status.is_success() {
                return Err(Error::Rejected {
                    status: status.as_u16(),
                    message: cluster_message(&text),
                });
            }
            let body: Json = serde_json::from_str(&text)
                .map_err(|e| Error::Internal(format!("snapshot body: {e}")))?;
            summary::fold_into_snapshot(&mut snap, kind, &body);
        }
        snap.pods = self.list_pods(Some(&ns)).await?;
        Ok(snap)
    }
}

fn resource_version_of(body: &str) -> Option<String> {
    serde_json::from_str::<Json>(body).ok().and_then(|v| {
        v.get("metadata")
            .and_then(|m| m.get("resourceVersion"))
            .and_then(|rv| rv.as_str())
            .map(str::to_string)
    })
}
