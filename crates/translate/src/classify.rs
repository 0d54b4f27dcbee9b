//! Intent classification: a fixed priority list, not a scored model.

use manifesto_core::{SlotSet, WorkloadKind};

const DEPLOYMENT_SIGNALS: &[&str] = &["deployment", "replicas", "replica", "scale", "serve", "serving"];

/// Decide which workload kind the instruction describes.
///
/// Priority is deliberate and fixed: a schedule always wins (CronJob),
/// then deployment signals (explicit kind word, replica count above one,
/// or a signaling keyword), and Job is the single-run default. Ties
/// resolve to the earliest matching rule; no signal at all yields Job.
pub fn classify(text: &str, slots: &SlotSet) -> WorkloadKind {
    if slots.schedule.is_some() {
        return WorkloadKind::CronJob;
    }
    if slots.kind_hint == Some(WorkloadKind::Deployment)
        || slots.replica_count.map(|n| n > 1).unwrap_or(false)
        || has_deployment_signal(text)
    {
        return WorkloadKind::Deployment;
    }
    WorkloadKind::Job
}

fn has_deployment_signal(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|w| DEPLOYMENT_SIGNALS.contains(&w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    fn classify_text(text: &str) -> WorkloadKind {
        classify(text, &extract(text))
    }

    #[test]
    fn schedule_always_wins() {
        // Replica phrasing plus a schedule: CronJob > Deployment is fixed.
        assert_eq!(
            classify_text("scale the cleanup with 3 replicas every 5 minutes"),
            WorkloadKind::CronJob
        );
        assert_eq!(
            classify_text("schedule a python cleanup script every 5 minutes"),
            WorkloadKind::CronJob
        );
    }

    #[test]
    fn replicas_or_keywords_mean_deployment() {
        assert_eq!(
            classify_text("create an nginx deployment with 3 replicas"),
            WorkloadKind::Deployment
        );
        assert_eq!(classify_text("serve the model"), WorkloadKind::Deployment);
        // "1 replica" alone still signals Deployment via the keyword.
        assert_eq!(classify_text("an app with 1 replica"), WorkloadKind::Deployment);
    }

    #[test]
    fn job_is_the_default() {
        assert_eq!(classify_text("run a python job to preprocess data"), WorkloadKind::Job);
        assert_eq!(classify_text("do the thing"), WorkloadKind::Job);
    }

    #[test]
    fn classification_is_deterministic() {
        let text = "create an nginx deployment with 3 replicas";
        let slots = extract(text);
        assert_eq!(classify(text, &slots), classify(text, &slots));
    }
}
