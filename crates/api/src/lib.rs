//! Manifesto public API façade (in-process).
//!
//! This crate defines the stable trait frontends depend on. The
//! in-process implementation composes the translation pipeline and the
//! cluster client; a mock is provided for frontend tests.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use manifesto_core::{ApplyOutcome, Config, ManifestDocument, Result, WorkloadKind};
use manifesto_refine::{ModelRefiner, NoopRefiner, Refiner};

pub use manifesto_cluster::{ClusterClient, ClusterSnapshot, PodSummary};
pub use manifesto_core::Error;

/// The entire contract the UI collaborator may rely on.
#[async_trait::async_trait]
pub trait WorkloadApi: Send + Sync {
    /// Instruction text → schema-complete manifest (heuristics plus the
    /// optional refinement pass).
    async fn translate(&self, instruction: &str) -> Result<ManifestDocument>;

    /// Submit a manifest; every terminal outcome is a variant of
    /// [`ApplyOutcome`].
    async fn apply(&self, doc: &ManifestDocument) -> Result<ApplyOutcome>;

    /// List workloads of one kind in a namespace.
    async fn list(
        &self,
        kind: WorkloadKind,
        namespace: Option<&str>,
    ) -> Result<Vec<ManifestDocument>>;

    /// Plain-text logs for one pod.
    async fn logs(
        &self,
        pod: &str,
        namespace: Option<&str>,
        tail_lines: Option<u32>,
    ) -> Result<String>;

    /// Workload and pod summaries for a namespace.
    async fn snapshot(&self, namespace: Option<&str>) -> Result<ClusterSnapshot>;
}

// ----------------- In-process implementation -----------------

/// Stateless orchestrator: holds only injected configuration, the
/// cluster client and the refinement strategy chosen at construction.
pub struct InProcApi {
    cfg: Config,
    cluster: ClusterClient,
    refiner: Arc<dyn Refiner>,
}

impl InProcApi {
    pub fn new(cfg: Config) -> Result<Self> {
        let cluster = ClusterClient::new(&cfg)?;
        // Strategy object, not a flag check scattered through the
        // pipeline: composition below is identical either way.
        let refiner: Arc<dyn Refiner> = if cfg.refine.enabled {
            Arc::new(ModelRefiner::new(cfg.refine.clone()))
        } else {
            Arc::new(NoopRefiner)
        };
        Ok(Self { cfg, cluster, refiner })
    }

    pub fn with_refiner(cfg: Config, refiner: Arc<dyn Refiner>) -> Result<Self> {
        let cluster = ClusterClient::new(&cfg)?;
        Ok(Self { cfg, cluster, refiner })
    }
}

#[async_trait::async_trait]
impl WorkloadApi for InProcApi {
    async fn translate(&self, instruction: &str) -> Result<ManifestDocument> {
        let t0 = Instant::now();
        info!("api: translate start");
        let draft = manifesto_translate::draft(instruction, &self.cfg)?;
        let doc = self.refiner.refine(instruction, draft).await;
        info!(kind = %doc.kind()?, name = %doc.name().unwrap_or("-"), took_ms = %t0.elapsed().as_millis(), "api: translate ok");
        Ok(doc)
    }

    async fn apply(&self, doc: &ManifestDocument) -> Result<ApplyOutcome> {
        let t0 = Instant::now();
        info!(name = %doc.name().unwrap_or("-"), "api: apply start");
        let outcome = self.cluster.apply(doc).await;
        info!(outcome = ?outcome, took_ms = %t0.elapsed().as_millis(), "api: apply done");
        Ok(outcome)
    }

    async fn list(
        &self,
        kind: WorkloadKind,
        namespace: Option<&str>,
    ) -> Result<Vec<ManifestDocument>> {
        let t0 = Instant::now();
        let docs = self.cluster.list(kind, namespace).await?;
        info!(kind = %kind, count = docs.len(), took_ms = %t0.elapsed().as_millis(), "api: list ok");
        Ok(docs)
    }

    async fn logs(
        &self,
        pod: &str,
        namespace: Option<&str>,
        tail_lines: Option<u32>,
    ) -> Result<String> {
        let t0 = Instant::now();
        let text = self.cluster.pod_logs(pod, namespace, tail_lines).await?;
        info!(pod = %pod, bytes = text.len(), took_ms = %t0.elapsed().as_millis(), "api: logs ok");
        Ok(text)
    }

    async fn snapshot(&self, namespace: Option<&str>) -> Result<ClusterSnapshot> {
        let t0 = Instant::now();
        let snap = self.cluster.snapshot(namespace).await?;
        info!(
            jobs = snap.jobs.len(),
            deployments = snap.deployments.len(),
            cronjobs = snap.cronjobs.len(),
            pods = snap.pods.len(),
            took_ms = %t0.elapsed().as_millis(),
            "api: snapshot ok"
        );
        Ok(snap)
    }
}

// ----------------- Mock implementation -----------------

/// Canned implementation for frontends' tests.
#[derive(Default)]
pub struct MockApi {
    pub translated: Option<ManifestDocument>,
    pub outcome: Option<ApplyOutcome>,
    pub listed: Vec<ManifestDocument>,
    pub log_text: Option<String>,
    pub snap: Option<ClusterSnapshot>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl WorkloadApi for MockApi {
    async fn translate(&self, _instruction: &str) -> Result<ManifestDocument> {
        self.translated
            .clone()
            .ok_or_else(|| Error::Internal("no translation configured".into()))
    }

    async fn apply(&self, _doc: &ManifestDocument) -> Result<ApplyOutcome> {
        self.outcome
            .clone()
            .ok_or_else(|| Error::Internal("no outcome configured".into()))
    }

    async fn list(
        &self,
        _kind: WorkloadKind,
        _namespace: Option<&str>,
    ) -> Result<Vec<ManifestDocument>> {
        Ok(self.listed.clone())
    }

    async fn logs(
        &self,
        _pod: &str,
        _namespace: Option<&str>,
        _tail_lines: Option<u32>,
    ) -> Result<String> {
        self.log_text
            .clone()
            .ok_or_else(|| Error::Internal("no logs configured".into()))
    }

    async fn snapshot(&self, _namespace: Option<&str>) -> Result<ClusterSnapshot> {
        self.snap
            .clone()
            .ok_or_else(|| Error::Internal("no snapshot configured".into()))
    }
}
