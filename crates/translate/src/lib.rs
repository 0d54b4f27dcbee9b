//! Manifesto translate: instruction text → schema-complete manifest draft.

#![forbid(unsafe_code)]

pub mod build;
pub mod classify;
pub mod extract;

pub use build::build;
pub use classify::classify;
pub use extract::extract;

use manifesto_core::{Config, Intent, ManifestDocument, Result};
use tracing::debug;

/// Heuristic half of the pipeline: extract, classify, build. Pure except
/// for logging; refinement (if any) happens above this layer.
pub fn draft(text: &str, cfg: &Config) -> Result<ManifestDocument> {
    let slots = extract::extract(text);
    let kind = classify::classify(text, &slots);
    debug!(kind = %kind, slots = ?slots, "instruction classified");
    let intent = Intent::new(kind, slots)?;
    build::build(&intent, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifesto_core::WorkloadKind;

    fn cfg() -> Config {
        Config::default()
    }

    #[test]
    fn python_preprocess_becomes_a_job() {
        let doc = draft("run a python job to preprocess data", &cfg()).unwrap();
        assert_eq!(doc.kind().unwrap(), WorkloadKind::Job);
        let v = doc.as_value();
        assert_eq!(v["spec"]["template"]["spec"]["restartPolicy"], "Never");
        assert_eq!(
            v["spec"]["template"]["spec"]["containers"][0]["image"],
            "python:3.11-slim"
        );
        assert!(v["spec"].get("replicas").is_none());
    }

    #[test]
    fn nginx_with_replicas_becomes_a_deployment() {
        let doc = draft("create an nginx deployment with 3 replicas", &cfg()).unwrap();
        assert_eq!(doc.kind().unwrap(), WorkloadKind::Deployment);
        let v = doc.as_value();
        assert_eq!(v["spec"]["replicas"], 3);
        assert_eq!(
            v["spec"]["template"]["spec"]["containers"][0]["image"],
            "nginx:1.27-alpine"
        );
        assert!(v["spec"]["template"]["spec"]["containers"][0].get("ports").is_none());
    }

    #[test]
    fn scheduled_cleanup_becomes_a_cronjob() {
        let doc = draft("schedule a python cleanup script every 5 minutes", &cfg()).unwrap();
        assert_eq!(doc.kind().unwrap(), WorkloadKind::CronJob);
        let v = doc.as_value();
        assert_eq!(v["spec"]["schedule"], "*/5 * * * *");
        assert_eq!(
            v["spec"]["jobTemplate"]["spec"]["template"]["spec"]["restartPolicy"],
            "Never"
        );
    }

    #[test]
    fn drafting_is_deterministic() {
        let text = "schedule a python cleanup script every 5 minutes";
        assert_eq!(draft(text, &cfg()).unwrap(), draft(text, &cfg()).unwrap());
    }
}
