//! Manifesto core types: workload kinds, slots, intents, outcomes, errors.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod config;
pub mod manifest;

pub use config::{Config, RefineConfig};
pub use manifest::ManifestDocument;

/// The three workload kinds the translator can produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Job,
    Deployment,
    CronJob,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Job => "Job",
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::CronJob => "CronJob",
        }
    }

    /// apiVersion the cluster expects for this kind.
    pub fn api_version(&self) -> &'static str {
        match self {
            WorkloadKind::Job | WorkloadKind::CronJob => "batch/v1",
            WorkloadKind::Deployment => "apps/v1",
        }
    }

    /// Plural collection segment used in REST paths.
    pub fn plural(&self) -> &'static str {
        match self {
            WorkloadKind::Job => "jobs",
            WorkloadKind::Deployment => "deployments",
            WorkloadKind::CronJob => "cronjobs",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "job" | "jobs" => Some(WorkloadKind::Job),
            "deployment" | "deployments" | "deploy" => Some(WorkloadKind::Deployment),
            "cronjob" | "cronjobs" | "cron" => Some(WorkloadKind::CronJob),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured fields pulled out of a raw instruction.
///
/// Every field is either a validated value or absent; extraction never
/// substitutes placeholder sentinels for things it could not find.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotSet {
    pub kind_hint: Option<WorkloadKind>,
    pub image: Option<String>,
    pub command_tokens: Option<Vec<String>>,
    pub replica_count: Option<u32>,
    /// Five-field cron expression, already normalized.
    pub schedule: Option<String>,
    /// DNS-1123 label, at most 63 characters.
    pub name: Option<String>,
    pub port: Option<u16>,
    pub gpu: bool,
}

/// A classified workload kind plus the validated slots that kind requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Job {
        name: Option<String>,
        image: Option<String>,
        command: Option<Vec<String>>,
        gpu: bool,
    },
    Deployment {
        name: Option<String>,
        image: Option<String>,
        replicas: u32,
        port: Option<u16>,
    },
    CronJob {
        name: Option<String>,
        image: Option<String>,
        command: Option<Vec<String>>,
        schedule: String,
        gpu: bool,
    },
}

impl Intent {
    /// Bind a kind to its required slots. The only hard requirement is a
    /// schedule for CronJob; everything else has build-time defaults.
    pub fn new(kind: WorkloadKind, slots: SlotSet) -> Result<Self> {
        match kind {
            WorkloadKind::Job => Ok(Intent::Job {
                name: slots.name,
                image: slots.image,
                command: slots.command_tokens,
                gpu: slots.gpu,
            }),
            WorkloadKind::Deployment => Ok(Intent::Deployment {
                name: slots.name,
                image: slots.image,
                replicas: slots.replica_count.unwrap_or(1).max(1),
                port: slots.port,
            }),
            WorkloadKind::CronJob => {
                let schedule = slots
                    .schedule
                    .ok_or_else(|| Error::Validation("CronJob intent requires a schedule".into()))?;
                Ok(Intent::CronJob {
                    name: slots.name,
                    image: slots.image,
                    command: slots.command_tokens,
                    schedule,
                    gpu: slots.gpu,
                })
            }
        }
    }

    pub fn kind(&self) -> WorkloadKind {
        match self {
            Intent::Job { .. } => WorkloadKind::Job,
            Intent::Deployment { .. } => WorkloadKind::Deployment,
            Intent::CronJob { .. } => WorkloadKind::CronJob,
        }
    }
}

/// Terminal outcome of a single `apply` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Resource did not exist and was created.
    Created {
        name: String,
        resource_version: Option<String>,
    },
    /// Resource already existed; the conflict was resolved with a single
    /// update of the live object.
    Conflict {
        existing: String,
        resource_version: Option<String>,
    },
    /// Cluster rejected the manifest (4xx other than 409); not retried.
    RejectedByCluster { status: u16, message: String },
    /// Network error, timeout or 5xx after the retry budget was spent.
    TransportFailure { reason: String },
}

/// Errors suitable for transport over RPC later.
#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
pub enum Error {
    #[error("validation: {0}")]
    Validation(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("rejected by cluster ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
