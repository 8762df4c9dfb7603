//! Startup-time policy graph.
//!
//! Resolves [`PolicySpec`]s into a read-only graph of
//! [`ResourceCachePolicy`] values. Every configuration problem (unknown
//! dependent, missing path parameter, cycle) surfaces here, before any
//! request is served.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;

use super::policy::{PolicyError, PolicySpec, ResourceCachePolicy};
use super::template::RouteTemplate;

/// Immutable registry of resolved policies, keyed by resource name.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    policies: BTreeMap<&'static str, Arc<ResourceCachePolicy>>,
}

impl PolicyRegistry {
    pub fn build(specs: Vec<PolicySpec>) -> Result<Self, PolicyError> {
        let mut by_name: HashMap<&'static str, &PolicySpec> = HashMap::new();
        for spec in &specs {
            if by_name.insert(spec.name, spec).is_some() {
                return Err(PolicyError::Duplicate {
                    resource: spec.name,
                });
            }
        }

        for spec in &specs {
            validate_parameters(spec, &by_name)?;
        }

        let mut resolved: HashMap<&'static str, Arc<ResourceCachePolicy>> = HashMap::new();
        for spec in &specs {
            let mut path = Vec::new();
            resolve(spec.name, &by_name, &mut resolved, &mut path)?;
        }

        Ok(Self {
            policies: resolved.into_iter().collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceCachePolicy>> {
        self.policies.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceCachePolicy>> {
        self.policies.values()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Human-readable dump of the graph, one resource per line.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for policy in self.policies.values() {
            let mut flags = Vec::new();
            if policy.cacheable() {
                flags.push("cacheable");
            }
            if policy.per_identity() {
                flags.push("per-identity");
            }
            if policy.includes_query() {
                flags.push("query");
            }
            let dependents = policy
                .dependents()
                .iter()
                .map(|d| d.name())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                out,
                "{:<16} {:<28} [{}] -> [{}]",
                policy.name(),
                policy.template().as_str(),
                flags.join(","),
                dependents
            );
        }
        out
    }
}

fn validate_parameters(
    spec: &PolicySpec,
    by_name: &HashMap<&'static str, &PolicySpec>,
) -> Result<(), PolicyError> {
    let own = parse(spec)?;
    for &dependent_name in &spec.dependents {
        if dependent_name == spec.name {
            return Err(PolicyError::SelfDependency {
                resource: spec.name,
            });
        }
        let dependent = by_name
            .get(dependent_name)
            .copied()
            .ok_or(PolicyError::UnknownDependent {
                resource: spec.name,
                dependent: dependent_name,
            })?;
        let dependent_template = parse(dependent)?;
        if let Some(parameter) = dependent_template
            .placeholders()
            .find(|needed| !own.placeholders().any(|have| have == *needed))
        {
            return Err(PolicyError::MissingParameter {
                resource: spec.name,
                dependent: dependent_name,
                parameter: parameter.to_string(),
            });
        }
    }
    Ok(())
}

fn parse(spec: &PolicySpec) -> Result<RouteTemplate, PolicyError> {
    RouteTemplate::parse(spec.template).map_err(|source| PolicyError::Template {
        resource: spec.name,
        source,
    })
}

fn resolve(
    name: &'static str,
    by_name: &HashMap<&'static str, &PolicySpec>,
    resolved: &mut HashMap<&'static str, Arc<ResourceCachePolicy>>,
    path: &mut Vec<&'static str>,
) -> Result<Arc<ResourceCachePolicy>, PolicyError> {
    if let Some(done) = resolved.get(name) {
        return Ok(done.clone());
    }
    if path.contains(&name) {
        let mut cycle = path.clone();
        cycle.push(name);
        return Err(PolicyError::Cycle { path: cycle });
    }

    // Names were validated before resolution starts.
    let Some(spec) = by_name.get(name) else {
        return Err(PolicyError::UnknownDependent {
            resource: path.last().copied().unwrap_or(name),
            dependent: name,
        });
    };

    path.push(name);
    let mut dependents = Vec::with_capacity(spec.dependents.len());
    for &dependent in &spec.dependents {
        dependents.push(resolve(dependent, by_name, resolved, path)?);
    }
    path.pop();

    let policy = Arc::new(ResourceCachePolicy::resolve(spec, dependents)?);
    resolved.insert(name, policy.clone());
    Ok(policy)
}
