//! Optional refinement pass: hand the heuristic draft to an external
//! model and merge back a validated improvement. Strictly best-effort —
//! every failure path returns the original draft unchanged, so the
//! orchestrator composes identically whether refinement is on or off.

#![forbid(unsafe_code)]

use std::time::Duration;

use manifesto_core::{ManifestDocument, RefineConfig};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Capability interface for the refinement pass.
#[async_trait::async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(&self, instruction: &str, draft: ManifestDocument) -> ManifestDocument;
}

/// Used when refinement is disabled; returns the draft untouched.
pub struct NoopRefiner;

#[async_trait::async_trait]
impl Refiner for NoopRefiner {
    async fn refine(&self, _instruction: &str, draft: ManifestDocument) -> ManifestDocument {
        draft
    }
}

/// Calls an OpenAI-compatible chat-completions endpoint.
pub struct ModelRefiner {
    cfg: RefineConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl ModelRefiner {
    pub fn new(cfg: RefineConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { cfg, http }
    }

    async fn call_model(&self, instruction: &str, draft: &ManifestDocument) -> Option<String> {
        let prompt = format!(
            "Instruction: {instruction}\n\nDraft Kubernetes manifest (JSON):\n{}\n\n\
             Improve the manifest if needed. Reply with a single JSON object, \
             same kind, no commentary.",
            draft.as_value()
        );
        let body = json!({
            "model": self.cfg.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": "You refine Kubernetes workload manifests." },
                { "role": "user", "content": prompt }
            ]
        });
        let mut req = self.http.post(&self.cfg.endpoint).json(&body);
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }
        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "refine: request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "refine: non-success from model endpoint");
            return None;
        }
        match resp.json::<ChatReply>().await {
            Ok(reply) => reply.choices.into_iter().next().map(|c| c.message.content),
            Err(e) => {
                warn!(error = %e, "refine: malformed reply body");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl Refiner for ModelRefiner {
    async fn refine(&self, instruction: &str, draft: ManifestDocument) -> ManifestDocument {
        match self.call_model(instruction, &draft).await {
            Some(reply) => match merge_reply(&draft, &reply) {
                Some(refined) => {
                    debug!("refine: accepted model manifest");
                    refined
                }
                None => {
                    warn!("refine: model reply rejected; keeping draft");
                    draft
                }
            },
            None => draft,
        }
    }
}

/// Validate a model reply against the same schema-completeness rule the
/// builder enforces. The reply must parse, pass validation and keep the
/// draft's kind; name and namespace are always taken from the draft so
/// the model cannot redirect the submission.
pub fn merge_reply(draft: &ManifestDocument, reply: &str) -> Option<ManifestDocument> {
    let text = strip_code_fences(reply);
    let mut value: serde_json::Value = serde_json::from_str(text).ok()?;

    let draft_kind = draft.kind().ok()?;
    let meta = value.get_mut("metadata")?.as_object_mut()?;
    if let Some(name) = draft.name() {
        meta.insert("name".into(), json!(name));
    }
    if let Some(ns) = draft.namespace() {
        meta.insert("namespace".into(), json!(ns));
    }

    let refined = ManifestDocument::from_value(value).ok()?;
    if refined.kind().ok()? != draft_kind {
        return None;
    }
    Some(refined)
}

fn strip_code_fences(s: &str) -> &str {
    let t = s.trim();
    let Some(t) = t.strip_prefix("```") else { return t };
    // Drop an optional language tag on the fence line.
    let t = t.strip_prefix("json").unwrap_or(t);
    t.trim_start_matches(['\r', '\n'])
        .trim_end()
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifesto_core::{Config, Intent, SlotSet, WorkloadKind};
    use manifesto_translate::build;

    fn draft() -> ManifestDocument {
        let intent = Intent::new(WorkloadKind::Job, SlotSet::default()).unwrap();
        build(&intent, &Config::default()).unwrap()
    }

    #[test]
    fn garbage_reply_is_rejected() {
        assert!(merge_reply(&draft(), "not json at all").is_none());
        assert!(merge_reply(&draft(), "{\"kind\": \"Job\"}").is_none());
    }

    #[test]
    fn kind_change_is_rejected() {
        let d = draft();
        let mut v = d.as_value().clone();
        v["kind"] = json!("Deployment");
        let reply = v.to_string();
        assert!(merge_reply(&d, &reply).is_none());
    }

    #[test]
    fn valid_reply_keeps_draft_identity() {
        let d = draft();
        let mut v = d.as_value().clone();
        v["metadata"]["name"] = json!("hijacked");
        v["metadata"]["namespace"] = json!("kube-system");
        v["spec"]["template"]["spec"]["containers"][0]["image"] = json!("python:3.11-slim");
        let refined = merge_reply(&d, &v.to_string()).unwrap();
        assert_eq!(refined.name(), d.name());
        assert_eq!(refined.namespace(), d.namespace());
        assert_eq!(
            refined.as_value()["spec"]["template"]["spec"]["containers"][0]["image"],
            json!("python:3.11-slim")
        );
    }

    #[test]
    fn code_fences_are_tolerated() {
        let d = draft();
        let fenced = format!("```json\n{}\n```", d.as_value());
        assert!(merge_reply(&d, &fenced).is_some());
    }

    #[tokio::test]
    async fn noop_refiner_returns_draft_unchanged() {
        let d = draft();
        let out = NoopRefiner.refine("whatever", d.clone()).await;
        assert_eq!(out, d);
    }

    #[tokio::test]
    async fn model_refiner_falls_back_on_unreachable_endpoint() {
        let cfg = RefineConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:1/never".into(),
            timeout_secs: 1,
            ..Default::default()
        };
        let d = draft();
        let out = ModelRefiner::new(cfg).refine("anything", d.clone()).await;
        assert_eq!(out, d);
    }
}
