//! Manifest templates: turn a classified intent into a schema-complete
//! document with defaults filled in.

use manifesto_core::{Config, Intent, ManifestDocument, Result, WorkloadKind};
use serde_json::{json, Value as Json};

/// Requests/limits applied to every container we emit. A GPU mention in
/// the instruction bumps the tier.
fn resources(gpu: bool) -> Json {
    let (cpu, memory) = if gpu { ("2000m", "8Gi") } else { ("500m", "512Mi") };
    json!({
        "requests": { "cpu": cpu, "memory": memory },
        "limits": { "cpu": cpu, "memory": memory }
    })
}

fn container(image: &str, command: Option<&[String]>, port: Option<u16>, gpu: bool) -> Json {
    let mut c = json!({
        "name": "main",
        "image": image,
        "resources": resources(gpu)
    });
    let obj = c.as_object_mut().unwrap();
    if let Some(cmd) = command {
        obj.insert("command".into(), json!(cmd));
    }
    if let Some(p) = port {
        obj.insert("ports".into(), json!([{ "containerPort": p }]));
    }
    c
}

fn default_name(kind: WorkloadKind) -> String {
    format!("manifesto-{}", kind.as_str().to_lowercase())
}

/// Fill the per-kind template. Every emitted document passes the same
/// validation the refinement guard uses; callers never see a partial one.
pub fn build(intent: &Intent, cfg: &Config) -> Result<ManifestDocument> {
    let value = match intent {
        Intent::Job { name, image, command, gpu } => {
            let name = name.clone().unwrap_or_else(|| default_name(WorkloadKind::Job));
            let image = image.as_deref().unwrap_or(&cfg.default_image);
            json!({
                "apiVersion": "batch/v1",
                "kind": "Job",
                "metadata": {
                    "name": name,
                    "namespace": cfg.namespace,
                    "labels": { "app": name }
                },
                "spec": {
                    "template": {
                        "metadata": { "labels": { "app": name } },
                        "spec": {
                            "restartPolicy": "Never",
                            "containers": [ container(image, command.as_deref(), None, *gpu) ]
                        }
                    }
                }
            })
        }
        Intent::Deployment { name, image, replicas, port } => {
            let name = name.clone().unwrap_or_else(|| default_name(WorkloadKind::Deployment));
            let image = image.as_deref().unwrap_or(&cfg.default_image);
            json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {
                    "name": name,
                    "namespace": cfg.namespace,
                    "labels": { "app": name }
                },
                "spec": {
                    "replicas": (*replicas).max(1),
                    "selector": { "matchLabels": { "app": name } },
                    "template": {
                        "metadata": { "labels": { "app": name } },
                        "spec": {
                            "containers": [ container(image, None, *port, false) ]
                        }
                    }
                }
            })
        }
        Intent::CronJob { name, image, command, schedule, gpu } => {
            let name = name.clone().unwrap_or_else(|| default_name(WorkloadKind::CronJob));
            let image = image.as_deref().unwrap_or(&cfg.default_image);
            json!({
                "apiVersion": "batch/v1",
                "kind": "CronJob",
                "metadata": {
                    "name": name,
                    "namespace": cfg.namespace,
                    "labels": { "app": name }
                },
                "spec": {
                    "schedule": schedule,
                    "jobTemplate": {
                        "spec": {
                            "template": {
                                "metadata": { "labels": { "app": name } },
                                "spec": {
                                    "restartPolicy": "Never",
                                    "containers": [ container(image, command.as_deref(), None, *gpu) ]
                                }
                            }
                        }
                    }
                }
            })
        }
    };
    // from_value re-validates independently of how the intent was formed.
    ManifestDocument::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifesto_core::SlotSet;

    fn cfg() -> Config {
        Config::default()
    }

    #[test]
    fn job_defaults_fill_in() {
        let intent = Intent::new(WorkloadKind::Job, SlotSet::default()).unwrap();
        let doc = build(&intent, &cfg()).unwrap();
        let v = doc.as_value();
        assert_eq!(v["metadata"]["name"], "manifesto-job");
        assert_eq!(v["metadata"]["namespace"], "default");
        assert_eq!(v["spec"]["template"]["spec"]["restartPolicy"], "Never");
        assert_eq!(
            v["spec"]["template"]["spec"]["containers"][0]["image"],
            cfg().default_image
        );
    }

    #[test]
    fn deployment_labels_are_consistent() {
        let slots = SlotSet {
            name: Some("web".into()),
            image: Some("nginx:1.27-alpine".into()),
            replica_count: Some(3),
            ..Default::default()
        };
        let intent = Intent::new(WorkloadKind::Deployment, slots).unwrap();
        let doc = build(&intent, &cfg()).unwrap();
        let v = doc.as_value();
        assert_eq!(v["spec"]["replicas"], 3);
        assert_eq!(
            v["spec"]["selector"]["matchLabels"]["app"],
            v["spec"]["template"]["metadata"]["labels"]["app"]
        );
        // No served port implied, so none emitted.
        assert!(v["spec"]["template"]["spec"]["containers"][0].get("ports").is_none());
    }

    #[test]
    fn deployment_port_emitted_when_present() {
        let slots = SlotSet { port: Some(8080), ..Default::default() };
        let intent = Intent::new(WorkloadKind::Deployment, slots).unwrap();
        let doc = build(&intent, &cfg()).unwrap();
        assert_eq!(
            doc.as_value()["spec"]["template"]["spec"]["containers"][0]["ports"][0]["containerPort"],
            8080
        );
    }

    #[test]
    fn cronjob_nests_a_never_restart_job() {
        let slots = SlotSet {
            schedule: Some("*/5 * * * *".into()),
            command_tokens: Some(vec!["cleanup.sh".into()]),
            ..Default::default()
        };
        let intent = Intent::new(WorkloadKind::CronJob, slots).unwrap();
        let doc = build(&intent, &cfg()).unwrap();
        let v = doc.as_value();
        assert_eq!(v["spec"]["schedule"], "*/5 * * * *");
        let pod = &v["spec"]["jobTemplate"]["spec"]["template"]["spec"];
        assert_eq!(pod["restartPolicy"], "Never");
        assert_eq!(pod["containers"][0]["command"][0], "cleanup.sh");
    }

    #[test]
    fn gpu_bumps_resource_tier() {
        let slots = SlotSet { gpu: true, ..Default::default() };
        let intent = Intent::new(WorkloadKind::Job, slots).unwrap();
        let doc = build(&intent, &cfg()).unwrap();
        assert_eq!(
            doc.as_value()["spec"]["template"]["spec"]["containers"][0]["resources"]["requests"]["cpu"],
            "2000m"
        );
    }

    #[test]
    fn every_kind_builds_schema_complete() {
        for kind in [WorkloadKind::Job, WorkloadKind::Deployment, WorkloadKind::CronJob] {
            let slots = SlotSet {
                schedule: (kind == WorkloadKind::CronJob).then(|| "0 * * * *".to_string()),
                ..Default::default()
            };
            let intent = Intent::new(kind, slots).unwrap();
            let doc = build(&intent, &cfg()).unwrap();
            doc.validate().unwrap();
            assert_eq!(doc.kind().unwrap(), kind);
        }
    }
}
