//! Per-resource cache policies.
//!
//! A [`PolicySpec`] is the declarative form written at startup; the
//! [`PolicyRegistry`](super::PolicyRegistry) resolves specs into immutable
//! [`ResourceCachePolicy`] values whose dependents are shared `Arc`s.

use std::sync::Arc;

use thiserror::Error;

use super::template::{RouteTemplate, TemplateError};

/// Declarative description of one resource's cache behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySpec {
    pub name: &'static str,
    pub template: &'static str,
    pub cacheable: bool,
    pub per_identity: bool,
    pub includes_query: bool,
    pub dependents: Vec<&'static str>,
}

impl PolicySpec {
    pub fn cached(name: &'static str, template: &'static str) -> Self {
        Self {
            name,
            template,
            cacheable: true,
            per_identity: false,
            includes_query: false,
            dependents: Vec::new(),
        }
    }

    pub fn uncached(name: &'static str, template: &'static str) -> Self {
        Self {
            cacheable: false,
            ..Self::cached(name, template)
        }
    }

    pub fn per_identity(mut self) -> Self {
        self.per_identity = true;
        self
    }

    pub fn with_query(mut self) -> Self {
        self.includes_query = true;
        self
    }

    /// Resources whose cache must be purged when this one mutates.
    pub fn invalidates(mut self, dependents: &[&'static str]) -> Self {
        self.dependents.extend_from_slice(dependents);
        self
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid template for resource `{resource}`: {source}")]
    Template {
        resource: &'static str,
        #[source]
        source: TemplateError,
    },
    #[error("resource `{resource}` is declared twice")]
    Duplicate { resource: &'static str },
    #[error("resource `{resource}` lists unknown dependent `{dependent}`")]
    UnknownDependent {
        resource: &'static str,
        dependent: &'static str,
    },
    #[error(
        "dependent `{dependent}` of `{resource}` requires path parameter `{parameter}` which `{resource}` does not supply"
    )]
    MissingParameter {
        resource: &'static str,
        dependent: &'static str,
        parameter: String,
    },
    #[error("resource `{resource}` lists itself as a dependent")]
    SelfDependency { resource: &'static str },
    #[error("dependency cycle through `{}`", path.join(" -> "))]
    Cycle { path: Vec<&'static str> },
    #[error("route `{resource}` has no registered cache policy")]
    Unregistered { resource: &'static str },
}

/// Immutable, resolved cache policy.
#[derive(Debug)]
pub struct ResourceCachePolicy {
    name: &'static str,
    template: RouteTemplate,
    cacheable: bool,
    per_identity: bool,
    includes_query: bool,
    dependents: Vec<Arc<ResourceCachePolicy>>,
}

impl ResourceCachePolicy {
    pub(super) fn resolve(
        spec: &PolicySpec,
        dependents: Vec<Arc<ResourceCachePolicy>>,
    ) -> Result<Self, PolicyError> {
        let template =
            RouteTemplate::parse(spec.template).map_err(|source| PolicyError::Template {
                resource: spec.name,
                source,
            })?;
        Ok(Self {
            name: spec.name,
            template,
            cacheable: spec.cacheable,
            per_identity: spec.per_identity,
            includes_query: spec.includes_query,
            dependents,
        })
    }

    /// Resolve a spec that has no dependents, outside any registry.
    pub fn standalone(spec: PolicySpec) -> Result<Self, PolicyError> {
        if let Some(&dependent) = spec.dependents.first() {
            return Err(PolicyError::UnknownDependent {
                resource: spec.name,
                dependent,
            });
        }
        Self::resolve(&spec, Vec::new())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn template(&self) -> &RouteTemplate {
        &self.template
    }

    pub fn cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn per_identity(&self) -> bool {
        self.per_identity
    }

    pub fn includes_query(&self) -> bool {
        self.includes_query
    }

    pub fn dependents(&self) -> &[Arc<ResourceCachePolicy>] {
        &self.dependents
    }

    /// Whether a single exact key cannot address all of this resource's entries.
    pub fn needs_keyspace_scan(&self) -> bool {
        self.includes_query || self.per_identity
    }
}
