//! Slot extraction: an ordered list of pure rules over the raw text.
//!
//! Each rule is a standalone `fn(&str) -> Option<_>` so its behavior can
//! be audited and tested on its own. `extract` applies them in a fixed
//! priority order and never fails; a rule that finds nothing simply
//! leaves its slot absent.

use manifesto_core::{SlotSet, WorkloadKind};
use once_cell::sync::Lazy;
use regex::Regex;

/// Base names we recognize without an explicit `image` keyword, mapped to
/// the full image reference we submit.
const KNOWN_IMAGES: &[(&str, &str)] = &[
    ("pytorch", "pytorch/pytorch:2.3.0-cuda12.1-cudnn9-runtime"),
    ("python", "python:3.11-slim"),
    ("nginx", "nginx:1.27-alpine"),
    ("redis", "redis:7-alpine"),
    ("busybox", "busybox:1.36"),
];

/// Words that carry no subject information when deriving a name.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "to", "of", "for", "with", "and", "in", "on", "at", "that", "please",
    "create", "make", "start", "launch", "run", "running", "execute", "deploy", "schedule",
    "scheduled", "job", "jobs", "deployment", "deployments", "cronjob", "cronjobs", "cron",
    "pod", "pods", "replica", "replicas", "instance", "instances", "image", "every", "each",
    "minute", "minutes", "hour", "hours", "day", "days", "daily", "hourly", "script", "using",
    "named", "called", "port", "gpu",
];

static IMAGE_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bimage\s+([a-z0-9][a-z0-9._/-]*(?::[A-Za-z0-9._-]+)?)").unwrap()
});
static COMMAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:run|execute|exec|script)\s+(.+)$").unwrap());
static REPLICAS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(\d+)\s+(?:replicas?|instances?)|(?:replicas?|instances?)\s*[:=]?\s*(\d+))")
        .unwrap()
});
static EVERY_N_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bevery\s+(\d+)\s+(minute|hour|day)s?\b").unwrap());
static EVERY_UNIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bevery\s+(minute|hour|day)\b").unwrap());
static CRON_FIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9*,/-]+$").unwrap());
static EXPLICIT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:named|called)\s+([A-Za-z0-9][A-Za-z0-9_.-]*)").unwrap());
static PORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bport\s+(\d{1,5})\b").unwrap());
static KIND_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(cron\s?job|deployment|job)\b").unwrap());
static CLAUSE_CUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\s)(?:every\s.*|with\s+\d+\s+(?:replicas?|instances?).*)$").unwrap()
});

/// Pull structured fields out of a raw instruction. Pure and total: the
/// same text always yields the same `SlotSet`.
pub fn extract(text: &str) -> SlotSet {
    SlotSet {
        kind_hint: kind_hint_rule(text),
        image: image_rule(text),
        command_tokens: command_rule(text),
        replica_count: replicas_rule(text),
        schedule: schedule_rule(text),
        name: name_rule(text),
        port: port_rule(text),
        gpu: gpu_rule(text),
    }
}

/// Rule 1: container image, either after the `image` keyword or via a
/// recognized base name. Keyword wins.
pub fn image_rule(text: &str) -> Option<String> {
    if let Some(c) = IMAGE_KEYWORD_RE.captures(text) {
        let tok = c.get(1).unwrap().as_str();
        // Bare known base names still get the pinned tag.
        for (base, full) in KNOWN_IMAGES {
            if tok == *base {
                return Some((*full).to_string());
            }
        }
        return Some(tok.to_string());
    }
    let lower = text.to_lowercase();
    for (base, full) in KNOWN_IMAGES {
        if word_present(&lower, base) {
            return Some((*full).to_string());
        }
    }
    None
}

/// Rule 2: ordered command tokens following a run/execute verb. Trailing
/// schedule or replica clauses are not part of the command. A remainder
/// that starts with an article is prose, not a command.
pub fn command_rule(text: &str) -> Option<Vec<String>> {
    let c = COMMAND_RE.captures(text)?;
    let rest = c.get(1).unwrap().as_str();
    let rest = CLAUSE_CUT_RE.replace(rest, "");
    let rest = rest.trim().trim_end_matches(['.', '!']);
    let tokens: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
    match tokens.first().map(|t| t.to_lowercase()) {
        None => None,
        Some(first) if matches!(first.as_str(), "a" | "an" | "the") => None,
        Some(_) => Some(tokens),
    }
}

/// Rule 3: first integer adjacent to "replicas" or "instances".
pub fn replicas_rule(text: &str) -> Option<u32> {
    let c = REPLICAS_RE.captures(text)?;
    c.get(1)
        .or_else(|| c.get(2))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Rule 4: schedule, either an explicit five-field cron expression or a
/// natural phrase converted deterministically.
pub fn schedule_rule(text: &str) -> Option<String> {
    if let Some(cron) = explicit_cron(text) {
        return Some(cron);
    }
    if let Some(c) = EVERY_N_RE.captures(text) {
        let n: u32 = c.get(1).unwrap().as_str().parse().ok()?;
        let n = n.max(1);
        return Some(match c.get(2).unwrap().as_str().to_lowercase().as_str() {
            "minute" => {
                if n == 1 { "* * * * *".into() } else { format!("*/{n} * * * *") }
            }
            "hour" => {
                if n == 1 { "0 * * * *".into() } else { format!("0 */{n} * * *") }
            }
            _ => {
                if n == 1 { "0 0 * * *".into() } else { format!("0 0 */{n} * *") }
            }
        });
    }
    if let Some(c) = EVERY_UNIT_RE.captures(text) {
        return Some(match c.get(1).unwrap().as_str().to_lowercase().as_str() {
            "minute" => "* * * * *".into(),
            "hour" => "0 * * * *".into(),
            _ => "0 0 * * *".into(),
        });
    }
    if word_present(&text.to_lowercase(), "daily") {
        return Some("0 0 * * *".into());
    }
    if word_present(&text.to_lowercase(), "hourly") {
        return Some("0 * * * *".into());
    }
    None
}

/// Five consecutive cron-shaped tokens, at least one carrying `*` or `/`
/// so a plain run of integers is not mistaken for a schedule.
fn explicit_cron(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for window in tokens.windows(5) {
        if window.iter().all(|t| CRON_FIELD_RE.is_match(t))
            && window.iter().any(|t| t.contains('*') || t.contains('/'))
        {
            return Some(window.join(" "));
        }
    }
    None
}

/// Rule 5: explicit name (`named X` / `called X`) or a slug derived from
/// the subject of the instruction.
pub fn name_rule(text: &str) -> Option<String> {
    if let Some(c) = EXPLICIT_NAME_RE.captures(text) {
        return Some(slugify(c.get(1).unwrap().as_str()));
    }
    let subject: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|w| !w.is_empty())
        .filter(|w| w.chars().any(|c| c.is_ascii_alphabetic()))
        .filter(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .take(3)
        .collect();
    if subject.is_empty() {
        return None;
    }
    let slug = slugify(&subject.join("-"));
    if slug.is_empty() { None } else { Some(slug) }
}

/// Rule 6: served port, when the instruction names one.
pub fn port_rule(text: &str) -> Option<u16> {
    PORT_RE
        .captures(text)
        .and_then(|c| c.get(1).unwrap().as_str().parse::<u16>().ok())
}

/// Rule 7: GPU mention bumps the resource tier.
pub fn gpu_rule(text: &str) -> bool {
    let lower = text.to_lowercase();
    word_present(&lower, "gpu") || word_present(&lower, "cuda")
}

/// Explicit kind word, if any. Classification still owns priority.
pub fn kind_hint_rule(text: &str) -> Option<WorkloadKind> {
    let c = KIND_WORD_RE.captures(text)?;
    let w = c.get(1).unwrap().as_str().to_lowercase().replace(' ', "");
    WorkloadKind::parse(&w)
}

fn word_present(lower: &str, word: &str) -> bool {
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|w| w == word)
}

/// Lowercase, non-alphanumeric to `-`, collapsed, trimmed, capped at the
/// DNS-1123 label limit of 63 characters.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_dash = true; // suppress leading dashes
    for c in s.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out.truncate(63);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_keyword_beats_known_bases() {
        assert_eq!(
            image_rule("run python with image alpine:3.20"),
            Some("alpine:3.20".into())
        );
        assert_eq!(image_rule("use image python"), Some("python:3.11-slim".into()));
    }

    #[test]
    fn known_base_names_map_to_pinned_images() {
        assert_eq!(
            image_rule("run a python job to preprocess data"),
            Some("python:3.11-slim".into())
        );
        assert_eq!(
            image_rule("create an nginx deployment with 3 replicas"),
            Some("nginx:1.27-alpine".into())
        );
        assert_eq!(
            image_rule("train a pytorch model on gpu"),
            Some("pytorch/pytorch:2.3.0-cuda12.1-cudnn9-runtime".into())
        );
        assert_eq!(image_rule("do something unrelated"), None);
    }

    #[test]
    fn command_captures_tokens_after_verb() {
        assert_eq!(
            command_rule("execute python main.py --fast"),
            Some(vec!["python".into(), "main.py".into(), "--fast".into()])
        );
    }

    #[test]
    fn command_stops_before_schedule_clause() {
        assert_eq!(
            command_rule("run cleanup.sh every 5 minutes"),
            Some(vec!["cleanup.sh".into()])
        );
    }

    #[test]
    fn command_ignores_prose_after_verb() {
        assert_eq!(command_rule("run a python job to preprocess data"), None);
        assert_eq!(command_rule("nothing worth extracting"), None);
        // "script" used as a noun leaves nothing behind once the
        // schedule clause is cut.
        assert_eq!(command_rule("schedule a cleanup script every 5 minutes"), None);
    }

    #[test]
    fn replicas_adjacent_integer() {
        assert_eq!(replicas_rule("create an nginx deployment with 3 replicas"), Some(3));
        assert_eq!(replicas_rule("scale to replicas: 5"), Some(5));
        assert_eq!(replicas_rule("2 instances of redis"), Some(2));
        assert_eq!(replicas_rule("an nginx deployment"), None);
    }

    #[test]
    fn cron_phrases_convert_deterministically() {
        assert_eq!(schedule_rule("every 5 minutes"), Some("*/5 * * * *".into()));
        assert_eq!(schedule_rule("every hour"), Some("0 * * * *".into()));
        assert_eq!(schedule_rule("every 1 minute"), Some("* * * * *".into()));
        assert_eq!(schedule_rule("every 2 hours"), Some("0 */2 * * *".into()));
        assert_eq!(schedule_rule("every 3 days"), Some("0 0 */3 * *".into()));
        assert_eq!(schedule_rule("run it daily"), Some("0 0 * * *".into()));
        assert_eq!(schedule_rule("no schedule here"), None);
    }

    #[test]
    fn explicit_cron_expression_is_recognized() {
        assert_eq!(
            schedule_rule("schedule backup at 0 3 * * 1"),
            Some("0 3 * * 1".into())
        );
        // A run of plain integers is not a schedule.
        assert_eq!(schedule_rule("add 1 2 3 4 5 together"), None);
    }

    #[test]
    fn name_prefers_explicit_over_slug() {
        assert_eq!(
            name_rule("run a job named Nightly_Sync for me"),
            Some("nightly-sync".into())
        );
        assert_eq!(
            name_rule("run a python job to preprocess data"),
            Some("python-preprocess-data".into())
        );
        assert_eq!(
            name_rule("schedule a python cleanup script every 5 minutes"),
            Some("python-cleanup".into())
        );
        assert_eq!(name_rule("create an nginx deployment with 3 replicas"), Some("nginx".into()));
    }

    #[test]
    fn slugify_enforces_dns1123() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("--weird--input--"), "weird-input");
        let long = "x".repeat(100);
        assert_eq!(slugify(&long).len(), 63);
    }

    #[test]
    fn port_and_gpu_rules() {
        assert_eq!(port_rule("serve nginx on port 8080"), Some(8080));
        assert_eq!(port_rule("no port mentioned"), None);
        assert!(gpu_rule("train on a GPU node"));
        assert!(!gpu_rule("plain cpu work"));
    }

    #[test]
    fn kind_hint_words() {
        assert_eq!(kind_hint_rule("make a cron job"), Some(WorkloadKind::CronJob));
        assert_eq!(kind_hint_rule("an nginx deployment"), Some(WorkloadKind::Deployment));
        assert_eq!(kind_hint_rule("a quick job"), Some(WorkloadKind::Job));
        assert_eq!(kind_hint_rule("nothing"), None);
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = "schedule a python cleanup script every 5 minutes";
        assert_eq!(extract(text), extract(text));
    }
}
