use rekindle_domain::{ResourceDoc, ResourceId, ResourceState, Severity};
use serde_json::Value;
use tracing::{debug, warn};

use crate::graph::{DependencyGraph, Relation, RelationType};

/// Ingest parsed resource documents and derive dependency relations from
/// owner references, well-known spec fields, the declarative manager's
/// source/dependency fields, and annotation-encoded dependency lists.
///
/// Malformed documents are logged and skipped; one bad manifest never aborts
/// discovery. Cycle detection runs once after the batch. Returns the number
/// of documents successfully ingested.
pub fn ingest_docs(graph: &mut DependencyGraph, docs: &[ResourceDoc]) -> usize {
    let mut ingested = 0;
    let mut relations = Vec::new();

    for doc in docs {
        let Some(id) = doc_id(doc) else {
            warn!("skipping resource document without kind/name");
            continue;
        };
        graph.add_resource(id.clone(), ResourceState::Healthy);
        relations.extend(derive_relations(&id, doc));
        ingested += 1;
    }

    debug!(
        docs = ingested,
        relations = relations.len(),
        "discovery pass complete"
    );
    graph.add_relations(relations);
    ingested
}

fn doc_id(doc: &ResourceDoc) -> Option<ResourceId> {
    let kind = doc.get("kind")?.as_str()?;
    let metadata = doc.get("metadata")?;
    let name = metadata.get("name")?.as_str()?;
    let namespace = metadata.get("namespace").and_then(Value::as_str);
    let api_version = doc
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or("v1");
    Some(ResourceId::new(kind, name, namespace).with_api_version(api_version))
}

fn derive_relations(id: &ResourceId, doc: &ResourceDoc) -> Vec<Relation> {
    let mut out = Vec::new();
    let ns = id.namespace.as_deref();

    owner_references(id, doc, &mut out);

    if let Some(spec) = doc.get("spec") {
        spec_references(id, ns, spec, "spec", &mut out);
        manager_references(id, ns, spec, &mut out);

        match id.kind.as_str() {
            "Ingress" => ingress_references(id, ns, spec, &mut out),
            "PersistentVolumeClaim" => {
                if let Some(sc) = spec.get("storageClassName").and_then(Value::as_str) {
                    out.push(
                        Relation::new(
                            id.clone(),
                            ResourceId::new("StorageClass", sc, None)
                                .with_api_version("storage.k8s.io/v1"),
                            RelationType::UsesStorageClass,
                        )
                        .strength(0.8)
                        .risk(Severity::High)
                        .field_path("spec.storageClassName"),
                    );
                }
            }
            _ => {}
        }
    }

    annotation_references(id, doc, &mut out);
    out
}

fn owner_references(id: &ResourceId, doc: &ResourceDoc, out: &mut Vec<Relation>) {
    let Some(owners) = doc
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
    else {
        return;
    };
    for owner in owners {
        let (Some(kind), Some(name)) = (
            owner.get("kind").and_then(Value::as_str),
            owner.get("name").and_then(Value::as_str),
        ) else {
            continue;
        };
        let api_version = owner
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or("v1");
        out.push(
            Relation::new(
                id.clone(),
                ResourceId::new(kind, name, id.namespace.as_deref())
                    .with_api_version(api_version),
                RelationType::Owns,
            )
            .strength(1.0)
            .risk(Severity::High)
            .field_path("metadata.ownerReferences"),
        );
    }
}

/// Walk a (pod-ish) spec for reference fields, recursing into pod templates.
fn spec_references(
    id: &ResourceId,
    ns: Option<&str>,
    spec: &Value,
    path: &str,
    out: &mut Vec<Relation>,
) {
    let Some(spec) = spec.as_object() else { return };

    if let Some(service) = spec.get("serviceName").and_then(Value::as_str) {
        out.push(
            Relation::new(
                id.clone(),
                ResourceId::new("Service", service, ns),
                RelationType::References,
            )
            .strength(0.8)
            .risk(Severity::Medium)
            .field_path(format!("{path}.serviceName")),
        );
    }

    for (field, kind) in [("configMapRef", "ConfigMap"), ("secretRef", "Secret")] {
        if let Some(name) = spec
            .get(field)
            .and_then(|r| r.get("name"))
            .and_then(Value::as_str)
        {
            let risk = if kind == "Secret" {
                Severity::High
            } else {
                Severity::Medium
            };
            out.push(
                Relation::new(
                    id.clone(),
                    ResourceId::new(kind, name, ns),
                    RelationType::References,
                )
                .strength(0.8)
                .risk(risk)
                .field_path(format!("{path}.{field}")),
            );
        }
    }

    if let Some(volumes) = spec.get("volumes").and_then(Value::as_array) {
        for (i, volume) in volumes.iter().enumerate() {
            for (field, kind) in [
                ("configMap", "ConfigMap"),
                ("secret", "Secret"),
                ("persistentVolumeClaim", "PersistentVolumeClaim"),
            ] {
                let name_field = if field == "persistentVolumeClaim" {
                    "claimName"
                } else {
                    "name"
                };
                // Secret volumes name the secret under `secretName`.
                let name = volume
                    .get(field)
                    .and_then(|v| v.get(name_field).or_else(|| v.get("secretName")))
                    .and_then(Value::as_str);
                if let Some(name) = name {
                    let strength = if field == "persistentVolumeClaim" { 0.9 } else { 0.7 };
                    out.push(
                        Relation::new(
                            id.clone(),
                            ResourceId::new(kind, name, ns),
                            RelationType::MountsVolume,
                        )
                        .strength(strength)
                        .risk(Severity::Medium)
                        .field_path(format!("{path}.volumes[{i}].{field}")),
                    );
                }
            }
        }
    }

    if let Some(template_spec) = spec.get("template").and_then(|t| t.get("spec")) {
        spec_references(id, ns, template_spec, &format!("{path}.template.spec"), out);
    }
}

/// Declarative-manager reference fields: source refs, chart sources,
/// dependsOn lists, valuesFrom.
fn manager_references(id: &ResourceId, ns: Option<&str>, spec: &Value, out: &mut Vec<Relation>) {
    if let Some(source_ref) = spec.get("sourceRef") {
        if let Some(target) = ref_target(source_ref, ns) {
            out.push(
                Relation::new(id.clone(), target, RelationType::SourcesFrom)
                    .strength(1.0)
                    .risk(Severity::High)
                    .field_path("spec.sourceRef"),
            );
        }
    }

    if let Some(chart_ref) = spec.pointer("/chart/spec/sourceRef") {
        if let Some(target) = ref_target(chart_ref, ns) {
            out.push(
                Relation::new(id.clone(), target, RelationType::ChartFrom)
                    .strength(1.0)
                    .risk(Severity::High)
                    .field_path("spec.chart.spec.sourceRef"),
            );
        }
    }

    if let Some(depends_on) = spec.get("dependsOn").and_then(Value::as_array) {
        for dep in depends_on {
            let Some(name) = dep.get("name").and_then(Value::as_str) else {
                continue;
            };
            let dep_ns = dep.get("namespace").and_then(Value::as_str).or(ns);
            out.push(
                Relation::new(
                    id.clone(),
                    // dependsOn targets a sibling of the same kind
                    ResourceId::new(&id.kind, name, dep_ns)
                        .with_api_version(&id.api_version),
                    RelationType::DependsOn,
                )
                .strength(0.9)
                .risk(Severity::High)
                .field_path("spec.dependsOn"),
            );
        }
    }

    if let Some(values_from) = spec.get("valuesFrom").and_then(Value::as_array) {
        for values in values_from {
            let (Some(kind), Some(name)) = (
                values.get("kind").and_then(Value::as_str),
                values.get("name").and_then(Value::as_str),
            ) else {
                continue;
            };
            out.push(
                Relation::new(
                    id.clone(),
                    ResourceId::new(kind, name, ns),
                    RelationType::ValuesFrom,
                )
                .strength(0.7)
                .risk(Severity::Medium)
                .field_path("spec.valuesFrom"),
            );
        }
    }
}

fn ref_target(reference: &Value, default_ns: Option<&str>) -> Option<ResourceId> {
    let kind = reference.get("kind")?.as_str()?;
    let name = reference.get("name")?.as_str()?;
    let ns = reference
        .get("namespace")
        .and_then(Value::as_str)
        .or(default_ns);
    Some(ResourceId::new(kind, name, ns))
}

fn ingress_references(id: &ResourceId, ns: Option<&str>, spec: &Value, out: &mut Vec<Relation>) {
    if let Some(tls_entries) = spec.get("tls").and_then(Value::as_array) {
        for tls in tls_entries {
            if let Some(secret) = tls.get("secretName").and_then(Value::as_str) {
                out.push(
                    Relation::new(
                        id.clone(),
                        ResourceId::new("Secret", secret, ns),
                        RelationType::UsesTlsSecret,
                    )
                    .strength(0.9)
                    .risk(Severity::High)
                    .field_path("spec.tls"),
                );
            }
        }
    }

    let Some(rules) = spec.get("rules").and_then(Value::as_array) else {
        return;
    };
    for rule in rules {
        let Some(paths) = rule.pointer("/http/paths").and_then(Value::as_array) else {
            continue;
        };
        for path in paths {
            if let Some(service) = path
                .pointer("/backend/service/name")
                .and_then(Value::as_str)
            {
                out.push(
                    Relation::new(
                        id.clone(),
                        ResourceId::new("Service", service, ns),
                        RelationType::RoutesTo,
                    )
                    .strength(0.9)
                    .risk(Severity::High)
                    .field_path("spec.rules"),
                );
            }
        }
    }
}

/// Annotation-encoded dependency lists: the manager's own
/// `kustomize.toolkit.fluxcd.io/depends-on` (`namespace/name` pairs) and the
/// freeform `gitops.flux.io/depends-on` (`kind/name[/namespace]`).
fn annotation_references(id: &ResourceId, doc: &ResourceDoc, out: &mut Vec<Relation>) {
    let Some(annotations) = doc
        .pointer("/metadata/annotations")
        .and_then(Value::as_object)
    else {
        return;
    };

    if let Some(list) = annotations
        .get("kustomize.toolkit.fluxcd.io/depends-on")
        .and_then(Value::as_str)
    {
        for entry in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((ns, name)) = entry.split_once('/') else {
                warn!(resource = %id, entry, "unparseable depends-on annotation entry");
                continue;
            };
            out.push(
                Relation::new(
                    id.clone(),
                    ResourceId::new("Kustomization", name, Some(ns))
                        .with_api_version("kustomize.toolkit.fluxcd.io/v1"),
                    RelationType::DependsOn,
                )
                .strength(0.9)
                .risk(Severity::High)
                .field_path("metadata.annotations"),
            );
        }
    }

    if let Some(list) = annotations
        .get("gitops.flux.io/depends-on")
        .and_then(Value::as_str)
    {
        for entry in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let parts: Vec<&str> = entry.split('/').collect();
            let target = match parts.as_slice() {
                [kind, name] => ResourceId::new(*kind, *name, id.namespace.as_deref()),
                [kind, name, ns] => ResourceId::new(*kind, *name, Some(ns)),
                _ => {
                    warn!(resource = %id, entry, "unparseable depends-on annotation entry");
                    continue;
                }
            };
            out.push(
                Relation::new(id.clone(), target, RelationType::DependsOn)
                    .strength(0.9)
                    .risk(Severity::Medium)
                    .field_path("metadata.annotations"),
            );
        }
    }
}
