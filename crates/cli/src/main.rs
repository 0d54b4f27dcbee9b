use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::info;

use manifesto_api::{InProcApi, WorkloadApi};
use manifesto_core::{Config, ManifestDocument, WorkloadKind};

#[derive(Parser, Debug)]
#[command(name = "manifestoctl", version, about = "Natural-language Kubernetes workloads")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace (default: configured namespace)
    #[arg(long = "ns", global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate an instruction into a manifest (and optionally apply it)
    Translate {
        /// Free-form instruction, e.g. "create an nginx deployment with 3 replicas"
        instruction: Vec<String>,
        /// Submit the translated manifest to the cluster
        #[arg(long = "apply", action = ArgAction::SetTrue)]
        apply: bool,
        /// Suffix the name so re-runs do not collide
        #[arg(long = "unique", action = ArgAction::SetTrue)]
        unique: bool,
    },
    /// Apply a manifest from a YAML file ("-" reads stdin)
    Apply {
        #[arg(short = 'f', long = "file")]
        file: String,
        #[arg(long = "unique", action = ArgAction::SetTrue)]
        unique: bool,
    },
    /// List workloads of a kind (job, deployment, cronjob)
    Ls { kind: String },
    /// Print logs for a pod
    Logs {
        pod: String,
        #[arg(long = "tail", default_value_t = 100)]
        tail: u32,
    },
    /// Workload and pod summaries for the namespace
    Snapshot,
}

fn init_tracing() {
    let env = std::env::var("MANIFESTO_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("MANIFESTO_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid MANIFESTO_METRICS_ADDR; expected host:port");
        }
    }
}

fn read_manifest(path: &str) -> Result<ManifestDocument> {
    let text = if path == "-" {
        use std::io::Read;
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    let yaml: serde_yaml::Value = serde_yaml::from_str(&text)?;
    let json = serde_json::to_value(yaml)?;
    Ok(ManifestDocument::from_value(json)?)
}

fn print_doc(doc: &ManifestDocument, output: Output) -> Result<()> {
    match output {
        Output::Human => print!("{}", doc.to_yaml()?),
        Output::Json => println!("{}", serde_json::to_string_pretty(doc.as_value())?),
    }
    Ok(())
}

async fn apply_and_report(api: &InProcApi, doc: &ManifestDocument, output: Output) -> Result<()> {
    let outcome = api.apply(doc).await?;
    match output {
        Output::Human => match &outcome {
            manifesto_core::ApplyOutcome::Created { name, resource_version } => {
                println!("created {} (rv {})", name, resource_version.as_deref().unwrap_or("?"));
            }
            manifesto_core::ApplyOutcome::Conflict { existing, resource_version } => {
                println!(
                    "updated existing {} (rv {})",
                    existing,
                    resource_version.as_deref().unwrap_or("?")
                );
            }
            manifesto_core::ApplyOutcome::RejectedByCluster { status, message } => {
                eprintln!("rejected ({status}): {message}");
            }
            manifesto_core::ApplyOutcome::TransportFailure { reason } => {
                eprintln!("transport failure: {reason}");
            }
        },
        Output::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let mut cfg = Config::from_env();
    if let Some(ns) = &cli.namespace {
        cfg.namespace = ns.clone();
    }
    let api = InProcApi::new(cfg)?;

    match cli.command {
        Commands::Translate { instruction, apply, unique } => {
            let text = instruction.join(" ");
            if text.trim().is_empty() {
                return Err(anyhow!("empty instruction"));
            }
            info!(instruction = %text, "translate invoked");
            let mut doc = api.translate(&text).await?;
            if unique {
                doc = doc.with_unique_suffix();
            }
            print_doc(&doc, cli.output)?;
            if apply {
                apply_and_report(&api, &doc, cli.output).await?;
            }
        }
        Commands::Apply { file, unique } => {
            let mut doc = read_manifest(&file)?;
            if unique {
                doc = doc.with_unique_suffix();
            }
            apply_and_report(&api, &doc, cli.output).await?;
        }
        Commands::Ls { kind } => {
            let kind = WorkloadKind::parse(&kind)
                .ok_or_else(|| anyhow!("unknown kind: {kind} (expected job|deployment|cronjob)"))?;
            let docs = api.list(kind, None).await?;
            match cli.output {
                Output::Human => {
                    println!("{:<12} {:<40}", "NAMESPACE", "NAME");
                    for d in &docs {
                        println!(
                            "{:<12} {:<40}",
                            d.namespace().unwrap_or("-"),
                            d.name().unwrap_or("-")
                        );
                    }
                }
                Output::Json => {
                    let values: Vec<_> = docs.iter().map(|d| d.as_value()).collect();
                    println!("{}", serde_json::to_string_pretty(&values)?);
                }
            }
        }
        Commands::Logs { pod, tail } => {
            let text = api.logs(&pod, None, Some(tail)).await?;
            print!("{text}");
        }
        Commands::Snapshot => {
            let snap = api.snapshot(None).await?;
            match cli.output {
                Output::Human => {
                    println!("namespace: {}", snap.namespace);
                    println!("jobs:");
                    for j in &snap.jobs {
                        println!(
                            "  {} (active {}, succeeded {}, failed {})",
                            j.name, j.active, j.succeeded, j.failed
                        );
                    }
                    println!("deployments:");
                    for d in &snap.deployments {
                        println!("  {} ({}/{} ready)", d.name, d.ready, d.replicas);
                    }
                    println!("cronjobs:");
                    for c in &snap.cronjobs {
                        println!(
                            "  {} (active {}, last {})",
                            c.name,
                            c.active,
                            c.last_schedule.as_deref().unwrap_or("-")
                        );
                    }
                    println!("pods:");
                    for p in &snap.pods {
                        println!("  {} [{}] {}", p.name, p.phase, p.node.as_deref().unwrap_or("-"));
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&snap)?),
            }
        }
    }

    Ok(())
}
