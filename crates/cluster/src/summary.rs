//! Lightweight dashboard rows shaped from list responses.

use manifesto_core::WorkloadKind;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSummary {
    pub name: String,
    pub namespace: String,
    pub succeeded: u64,
    pub failed: u64,
    pub active: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentSummary {
    pub name: String,
    pub namespace: String,
    pub replicas: u64,
    pub ready: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CronJobSummary {
    pub name: String,
    pub namespace: String,
    pub active: u64,
    pub last_schedule: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PodSummary {
    pub name: String,
    pub phase: String,
    pub node: Option<String>,
}

/// One namespace's workloads and pods at a point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub namespace: String,
    pub jobs: Vec<JobSummary>,
    pub deployments: Vec<DeploymentSummary>,
    pub cronjobs: Vec<CronJobSummary>,
    pub pods: Vec<PodSummary>,
}

fn items(body: &Json) -> impl Iterator<Item = &Json> {
    body.get("items").and_then(|v| v.as_array()).map(|a| a.iter()).into_iter().flatten()
}

fn meta_str<'a>(item: &'a Json, field: &str) -> &'a str {
    item.get("metadata").and_then(|m| m.get(field)).and_then(|v| v.as_str()).unwrap_or("")
}

fn status_u64(item: &Json, field: &str) -> u64 {
    item.get("status").and_then(|s| s.get(field)).and_then(|v| v.as_u64()).unwrap_or(0)
}

/// Fold one kind's list response into the snapshot.
pub fn fold_into_snapshot(snap: &mut ClusterSnapshot, kind: WorkloadKind, body: &Json) {
    match kind {
        WorkloadKind::Job => {
            for item in items(body) {
                snap.jobs.push(JobSummary {
                    name: meta_str(item, "name").to_string(),
                    namespace: meta_str(item, "namespace").to_string(),
                    succeeded: status_u64(item, "succeeded"),
                    failed: status_u64(item, "failed"),
                    active: status_u64(item, "active"),
                });
            }
        }
        WorkloadKind::Deployment => {
            for item in items(body) {
                snap.deployments.push(DeploymentSummary {
                    name: meta_str(item, "name").to_string(),
                    namespace: meta_str(item, "namespace").to_string(),
                    replicas: status_u64(item, "replicas"),
                    ready: status_u64(item, "readyReplicas"),
                });
            }
        }
        WorkloadKind::CronJob => {
            for item in items(body) {
                let active = item
                    .get("status")
                    .and_then(|s| s.get("active"))
                    .and_then(|v| v.as_array())
                    .map(|a| a.len() as u64)
                    .unwrap_or(0);
                let last_schedule = item
                    .get("status")
                    .and_then(|s| s.get("lastScheduleTime"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                snap.cronjobs.push(CronJobSummary {
                    name: meta_str(item, "name").to_string(),
                    namespace: meta_str(item, "namespace").to_string(),
                    active,
                    last_schedule,
                });
            }
        }
    }
}

pub fn pods_from_list(body: &Json) -> Vec<PodSummary> {
    items(body)
        .map(|item| PodSummary {
            name: meta_str(item, "name").to_string(),
            phase: item
                .get("status")
                .and_then(|s| s.get("phase"))
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown")
                .to_string(),
            node: item
                .get("status")
                .and_then(|s| s.get("nodeName"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_rows_pick_up_status_counts() {
        let body = json!({ "items": [ {
            "metadata": { "name": "j1", "namespace": "default" },
            "status": { "succeeded": 1, "failed": 0, "active": 2 }
        } ] });
        let mut snap = ClusterSnapshot::default();
        fold_into_snapshot(&mut snap, WorkloadKind::Job, &body);
        assert_eq!(snap.jobs, vec![JobSummary {
            name: "j1".into(),
            namespace: "default".into(),
            succeeded: 1,
            failed: 0,
            active: 2,
        }]);
    }

    #[test]
    fn cronjob_active_counts_array_entries() {
        let body = json!({ "items": [ {
            "metadata": { "name": "c1", "namespace": "default" },
            "status": { "active": [ {}, {} ], "lastScheduleTime": "2026-01-01T00:00:00Z" }
        } ] });
        let mut snap = ClusterSnapshot::default();
        fold_into_snapshot(&mut snap, WorkloadKind::CronJob, &body);
        assert_eq!(snap.cronjobs[0].active, 2);
        assert_eq!(snap.cronjobs[0].last_schedule.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn pods_tolerate_missing_status() {
        let body = json!({ "items": [ { "metadata": { "name": "p1" } } ] });
        let pods = pods_from_list(&body);
        assert_eq!(pods[0].phase, "Unknown");
        assert_eq!(pods[0].node, None);
    }
}
