//! JSON-backed manifest documents and their per-kind schema checks.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::{Error, Result, WorkloadKind};

/// Paths (dot-separated) that must be present and non-null for each kind.
/// Container lists get an extra non-empty/image check below.
const JOB_REQUIRED: &[&str] = &[
    "metadata.name",
    "metadata.namespace",
    "spec.template.spec.restartPolicy",
    "spec.template.spec.containers",
];

const DEPLOYMENT_REQUIRED: &[&str] = &[
    "metadata.name",
    "metadata.namespace",
    "spec.replicas",
    "spec.selector.matchLabels",
    "spec.template.metadata.labels",
    "spec.template.spec.containers",
];

const CRONJOB_REQUIRED: &[&str] = &[
    "metadata.name",
    "metadata.namespace",
    "spec.schedule",
    "spec.jobTemplate.spec.template.spec.restartPolicy",
    "spec.jobTemplate.spec.template.spec.containers",
];

/// A fully-populated structural representation of a workload object.
///
/// Construction through [`ManifestDocument::from_value`] enforces the
/// per-kind required-field schema, so a value of this type is always
/// independently valid; partially built documents are never exposed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ManifestDocument {
    json: Json,
}

impl ManifestDocument {
    pub fn from_value(json: Json) -> Result<Self> {
        let doc = Self { json };
        doc.validate()?;
        Ok(doc)
    }

    /// Wrap a list item returned by the cluster without re-validating it.
    /// The cluster is authoritative for objects it already accepted.
    pub fn from_cluster_value(json: Json) -> Self {
        Self { json }
    }

    pub fn as_value(&self) -> &Json {
        &self.json
    }

    pub fn into_value(self) -> Json {
        self.json
    }

    fn lookup(&self, dotted: &str) -> Option<&Json> {
        let mut cur = &self.json;
        for seg in dotted.split('.') {
            cur = cur.get(seg)?;
        }
        Some(cur)
    }

    fn str_at(&self, dotted: &str) -> Option<&str> {
        self.lookup(dotted).and_then(|v| v.as_str())
    }

    pub fn api_version(&self) -> Option<&str> {
        self.str_at("apiVersion")
    }

    pub fn kind(&self) -> Result<WorkloadKind> {
        let k = self
            .str_at("kind")
            .ok_or_else(|| Error::Validation("manifest missing kind".into()))?;
        WorkloadKind::parse(k)
            .ok_or_else(|| Error::Validation(format!("unsupported kind: {k}")))
    }

    pub fn name(&self) -> Option<&str> {
        self.str_at("metadata.name")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.str_at("metadata.namespace")
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.str_at("metadata.resourceVersion")
    }

    /// Stamp the live object's resourceVersion before a replace (PUT).
    pub fn set_resource_version(&mut self, rv: &str) {
        if let Some(meta) = self.json.get_mut("metadata").and_then(|m| m.as_object_mut()) {
            meta.insert("resourceVersion".into(), Json::String(rv.to_string()));
        }
    }

    /// Append a short random suffix to `metadata.name` and keep the
    /// name-keyed `app` labels consistent, so the same manifest can be
    /// re-submitted without colliding with an earlier run.
    pub fn with_unique_suffix(&self) -> Self {
        let Some(old) = self.name().map(str::to_string) else {
            return self.clone();
        };
        let suffix: String = uuid::Uuid::new_v4().simple().to_string()[..5].to_string();
        // Keep the full name within the DNS-1123 63 character cap.
        let base: String = old.chars().take(63 - 6).collect();
        let new = format!("{base}-{suffix}");

        let mut json = self.json.clone();
        rewrite_name_labels(&mut json, &old, &new);
        if let Some(meta) = json.get_mut("metadata").and_then(|m| m.as_object_mut()) {
            meta.insert("name".into(), Json::String(new));
        }
        Self { json }
    }

    /// Check schema completeness against the target kind. This is the
    /// guard both ManifestBuilder output and refined documents must pass.
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind()?;
        let api_version = self
            .api_version()
            .ok_or_else(|| Error::Validation("manifest missing apiVersion".into()))?;
        if api_version != kind.api_version() {
            return Err(Error::Validation(format!(
                "apiVersion {} does not match kind {} (expected {})",
                api_version,
                kind,
                kind.api_version()
            )));
        }

        let (required, containers_at) = match kind {
            WorkloadKind::Job => (JOB_REQUIRED, "spec.template.spec.containers"),
            WorkloadKind::Deployment => (DEPLOYMENT_REQUIRED, "spec.template.spec.containers"),
            WorkloadKind::CronJob => (
                CRONJOB_REQUIRED,
                "spec.jobTemplate.spec.template.spec.containers",
            ),
        };
        for path in required {
            match self.lookup(path) {
                Some(v) if !v.is_null() => {}
                _ => {
                    return Err(Error::Validation(format!(
                        "{kind} manifest missing required field {path}"
                    )))
                }
            }
        }

        let containers = self
            .lookup(containers_at)
            .and_then(|v| v.as_array())
            .ok_or_else(|| Error::Validation(format!("{containers_at} must be an array")))?;
        if containers.is_empty() {
            return Err(Error::Validation(format!("{containers_at} must not be empty")));
        }
        for c in containers {
            if c.get("name").and_then(|v| v.as_str()).unwrap_or("").is_empty() {
                return Err(Error::Validation("container missing name".into()));
            }
            if c.get("image").and_then(|v| v.as_str()).unwrap_or("").is_empty() {
                return Err(Error::Validation("container missing image".into()));
            }
        }

        if kind == WorkloadKind::Deployment {
            let replicas = self
                .lookup("spec.replicas")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| Error::Validation("spec.replicas must be an integer".into()))?;
            if replicas < 1 {
                return Err(Error::Validation("spec.replicas must be at least 1".into()));
            }
        }

        if kind == WorkloadKind::CronJob {
            let schedule = self
                .str_at("spec.schedule")
                .ok_or_else(|| Error::Validation("spec.schedule must be a string".into()))?;
            if schedule.split_whitespace().count() != 5 {
                return Err(Error::Validation(format!(
                    "spec.schedule is not a five-field cron expression: {schedule:?}"
                )));
            }
        }

        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.json).map_err(|e| Error::Internal(e.to_string()))
    }
}

/// Rewrite `app: <old>` labels (selectors included) to the new name so a
/// renamed Deployment still selects its own pods.
fn rewrite_name_labels(v: &mut Json, old: &str, new: &str) {
    match v {
        Json::Object(map) => {
            for (k, vv) in map.iter_mut() {
                if k == "app" && vv.as_str() == Some(old) {
                    *vv = Json::String(new.to_string());
                } else {
                    rewrite_name_labels(vv, old, new);
                }
            }
        }
        Json::Array(arr) => {
            for vv in arr.iter_mut() {
                rewrite_name_labels(vv, old, new);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_value() -> Json {
        json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": { "name": "demo", "namespace": "default", "labels": { "app": "demo" } },
            "spec": {
                "template": {
                    "metadata": { "labels": { "app": "demo" } },
                    "spec": {
                        "restartPolicy": "Never",
                        "containers": [ { "name": "main", "image": "busybox:1.36" } ]
                    }
                }
            }
        })
    }

    #[test]
    fn valid_job_passes() {
        let doc = ManifestDocument::from_value(job_value()).unwrap();
        assert_eq!(doc.kind().unwrap(), WorkloadKind::Job);
        assert_eq!(doc.name(), Some("demo"));
        assert_eq!(doc.namespace(), Some("default"));
    }

    #[test]
    fn missing_restart_policy_is_rejected() {
        let mut v = job_value();
        v["spec"]["template"]["spec"]
            .as_object_mut()
            .unwrap()
            .remove("restartPolicy");
        let err = ManifestDocument::from_value(v).unwrap_err();
        assert!(err.to_string().contains("restartPolicy"), "err={err}");
    }

    #[test]
    fn empty_containers_are_rejected() {
        let mut v = job_value();
        v["spec"]["template"]["spec"]["containers"] = json!([]);
        assert!(ManifestDocument::from_value(v).is_err());
    }

    #[test]
    fn mismatched_api_version_is_rejected() {
        let mut v = job_value();
        v["apiVersion"] = json!("apps/v1");
        let err = ManifestDocument::from_value(v).unwrap_err();
        assert!(err.to_string().contains("apiVersion"), "err={err}");
    }

    #[test]
    fn cronjob_schedule_must_have_five_fields() {
        let v = json!({
            "apiVersion": "batch/v1",
            "kind": "CronJob",
            "metadata": { "name": "tick", "namespace": "default" },
            "spec": {
                "schedule": "*/5 * * *",
                "jobTemplate": { "spec": { "template": { "spec": {
                    "restartPolicy": "Never",
                    "containers": [ { "name": "main", "image": "busybox:1.36" } ]
                } } } }
            }
        });
        assert!(ManifestDocument::from_value(v).is_err());
    }

    #[test]
    fn unique_suffix_renames_and_fixes_labels() {
        let doc = ManifestDocument::from_value(job_value()).unwrap();
        let renamed = doc.with_unique_suffix();
        let new_name = renamed.name().unwrap().to_string();
        assert_ne!(new_name, "demo");
        assert!(new_name.starts_with("demo-"));
        assert!(new_name.len() <= 63);
        assert_eq!(
            renamed.as_value()["spec"]["template"]["metadata"]["labels"]["app"],
            json!(new_name)
        );
        // Still schema-complete after the rename.
        renamed.validate().unwrap();
    }
}
