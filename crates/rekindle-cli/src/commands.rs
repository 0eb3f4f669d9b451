use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rekindle_cluster::{LocalCluster, LogNotifier, NotificationSink, WebhookNotifier};
use rekindle_domain::{ResourceDoc, ResourceId};
use rekindle_graph::{ingest_docs, DependencyGraph, Relation, RelationType};
use rekindle_orchestrator::{build_plan, RecoveryController};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::{GraphOutput, OutputFormat};
use crate::output;

/// Run the controller against the in-process simulated cluster.
///
/// Wiring a real cluster client happens where this binary is embedded; on
/// its own the controller runs in simulation mode, mirroring how the rest of
/// the commands fall back to a sample topology.
pub async fn run(catalog_path: PathBuf, webhook: Option<String>, auto_recover: bool) -> Result<()> {
    let mut catalog = rekindle_config::load_catalog_or_default(&catalog_path);
    if auto_recover {
        catalog.settings.auto_recovery_enabled = true;
    }

    let sink: Arc<dyn NotificationSink> = match webhook {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(LogNotifier),
    };
    let cluster = Arc::new(LocalCluster::new());
    warn!("no cluster client wired, running in simulation mode");

    let controller = Arc::new(RecoveryController::new(cluster, sink, catalog));

    let runner = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run().await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    controller.shutdown();
    runner.await.context("controller task failed")?;
    Ok(())
}

pub async fn plan(
    resources: Vec<String>,
    manifests: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let mut graph = build_graph(manifests.as_deref())?;
    let failed = parse_resources(&resources);
    if failed.is_empty() {
        anyhow::bail!("no valid failed resources given");
    }

    let plan = build_plan(&mut graph, &failed)?;
    match format {
        OutputFormat::Text => print!("{}", output::render_plan(&plan)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
    }
    Ok(())
}

pub async fn impact(resource: String, manifests: Option<PathBuf>) -> Result<()> {
    let graph = build_graph(manifests.as_deref())?;
    let id = ResourceId::from_str(&resource)?;
    let impact = graph.analyze_impact(&id)?;
    println!("{}", serde_json::to_string_pretty(&impact)?);
    Ok(())
}

pub async fn graph(manifests: Option<PathBuf>, format: GraphOutput) -> Result<()> {
    let graph = build_graph(manifests.as_deref())?;
    match format {
        GraphOutput::Text => print!("{}", output::render_graph_text(&graph)),
        GraphOutput::Dot => println!("{}", output::render_dot(&graph)),
        GraphOutput::Json => {
            let relations = graph.relations();
            println!("{}", serde_json::to_string_pretty(relations)?);
        }
    }
    Ok(())
}

fn parse_resources(resources: &[String]) -> BTreeSet<ResourceId> {
    let mut out = BTreeSet::new();
    for raw in resources {
        match ResourceId::from_str(raw) {
            Ok(id) => {
                out.insert(id);
            }
            Err(e) => warn!(resource = %raw, error = %e, "skipping invalid resource"),
        }
    }
    out
}

fn build_graph(manifests: Option<&Path>) -> Result<DependencyGraph> {
    let mut graph = DependencyGraph::new();
    match manifests {
        Some(dir) => {
            let docs = load_manifests(dir)?;
            let ingested = ingest_docs(&mut graph, &docs);
            info!(
                documents = ingested,
                resources = graph.len(),
                "built dependency graph from manifests"
            );
        }
        None => {
            info!("no manifest directory given, using sample topology");
            sample_topology(&mut graph);
        }
    }
    Ok(graph)
}

/// Recursively load every YAML/JSON manifest under `dir`. Documents that
/// fail to parse are skipped with a warning.
fn load_manifests(dir: &Path) -> Result<Vec<ResourceDoc>> {
    let mut docs = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading manifest directory {}", dir.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            docs.extend(load_manifests(&path)?);
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !matches!(ext, "yaml" | "yml" | "json") {
            continue;
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        for document in serde_yaml::Deserializer::from_str(&content) {
            match ResourceDoc::deserialize(document) {
                Ok(doc) if doc.is_object() => docs.push(doc),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unparsable document")
                }
            }
        }
    }
    Ok(docs)
}

/// The built-in demo topology: an app chain, the manager's own resources and
/// a monitoring release.
fn sample_topology(graph: &mut DependencyGraph) {
    let cm = ResourceId::namespaced("ConfigMap", "app-config", "default");
    let secret = ResourceId::namespaced("Secret", "app-secrets", "default");
    let service = ResourceId::namespaced("Service", "app-service", "default");
    let deployment = ResourceId::namespaced("Deployment", "app-deployment", "default");
    let ingress = ResourceId::namespaced("Ingress", "app-ingress", "default");

    let git_repo = ResourceId::namespaced("GitRepository", "flux-system", "flux-system");
    let infra = ResourceId::namespaced("Kustomization", "infrastructure", "flux-system");
    let apps = ResourceId::namespaced("Kustomization", "apps", "flux-system");
    let helm_repo = ResourceId::namespaced("HelmRepository", "longhorn", "longhorn-system");
    let helm_release = ResourceId::namespaced("HelmRelease", "longhorn", "longhorn-system");

    graph.add_relations([
        Relation::new(deployment.clone(), cm, RelationType::References)
            .reason("Deployment uses ConfigMap"),
        Relation::new(deployment.clone(), secret, RelationType::References)
            .reason("Deployment uses Secret"),
        Relation::new(service.clone(), deployment, RelationType::References)
            .reason("Service targets Deployment"),
        Relation::new(ingress, service, RelationType::RoutesTo)
            .reason("Ingress routes to Service"),
        Relation::new(infra.clone(), git_repo.clone(), RelationType::SourcesFrom)
            .reason("Kustomization uses GitRepository"),
        Relation::new(apps.clone(), git_repo, RelationType::SourcesFrom)
            .reason("Apps Kustomization uses GitRepository"),
        Relation::new(apps, infra, RelationType::DependsOn)
            .reason("Apps depends on Infrastructure"),
        Relation::new(helm_release, helm_repo, RelationType::ChartFrom)
            .reason("HelmRelease uses HelmRepository"),
    ]);
}
