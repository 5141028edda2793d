// Common test utilities for integration tests
//
// Deployment fixtures plus in-memory stand-ins for the orchestrator and the
// registry, so reconciliation can be exercised without a cluster

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kubert::registry::{RegistryClient, RegistryError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Creates a sample Deployment for testing
pub fn create_test_deployment(name: &str, namespace: &str, images: &[&str]) -> Deployment {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), name.to_string());

    let containers = images
        .iter()
        .enumerate()
        .map(|(i, image)| Container {
            name: format!("container-{}", i),
            image: Some(image.to_string()),
            ..Default::default()
        })
        .collect();

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some("42".to_string()),
            ..Default::default()
        },
        spec: Some(k8s_openapi::api::apps::v1::DeploymentSpec {
            replicas: Some(2),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers,
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Image of the first container, as stored in a Deployment
pub fn first_image(deployment: &Deployment) -> Option<String> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()?
        .image
        .clone()
}

/// A replace call seen by `FakeWorkloads`
#[derive(Debug, Clone)]
pub struct ReplaceCall {
    pub name: String,
    pub namespace: String,
    pub definition: Deployment,
}

/// In-memory orchestrator keyed by `namespace/name`
#[derive(Default)]
pub struct FakeWorkloads {
    deployments: Mutex<HashMap<String, Deployment>>,
    reads: Mutex<Vec<String>>,
    replaces: Mutex<Vec<ReplaceCall>>,
    fail_writes: Mutex<bool>,
}

impl FakeWorkloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deployment(self, deployment: Deployment) -> Self {
        let key = format!(
            "{}/{}",
            deployment.metadata.namespace.clone().unwrap_or_default(),
            deployment.metadata.name.clone().unwrap_or_default()
        );
        self.deployments.lock().unwrap().insert(key, deployment);
        self
    }

    pub fn failing_writes(self) -> Self {
        *self.fail_writes.lock().unwrap() = true;
        self
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }

    pub fn replaces(&self) -> Vec<ReplaceCall> {
        self.replaces.lock().unwrap().clone()
    }

    pub fn stored(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.deployments
            .lock()
            .unwrap()
            .get(&format!("{}/{}", namespace, name))
            .cloned()
    }
}

#[async_trait]
impl kubert::WorkloadApi for FakeWorkloads {
    async fn read_workload(&self, name: &str, namespace: &str) -> Result<Deployment> {
        let key = format!("{}/{}", namespace, name);
        self.reads.lock().unwrap().push(key.clone());

        self.deployments
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow!("deployments.apps \"{}\" not found", name))
    }

    async fn replace_workload(
        &self,
        name: &str,
        namespace: &str,
        definition: &Deployment,
    ) -> Result<Deployment> {
        self.replaces.lock().unwrap().push(ReplaceCall {
            name: name.to_string(),
            namespace: namespace.to_string(),
            definition: definition.clone(),
        });

        if *self.fail_writes.lock().unwrap() {
            return Err(anyhow!("admission webhook denied the request"));
        }

        self.deployments
            .lock()
            .unwrap()
            .insert(format!("{}/{}", namespace, name), definition.clone());
        Ok(definition.clone())
    }
}

/// Registry with a fixed tag list per repository. Unknown repositories get a 404.
#[derive(Default)]
pub struct StaticRegistry {
    tags: HashMap<String, Vec<String>>,
    queried: Mutex<Vec<String>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(mut self, repository: &str, tags: &[&str]) -> Self {
        self.tags.insert(
            repository.to_string(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryClient for StaticRegistry {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
        self.queried.lock().unwrap().push(repository.to_string());
        self.tags
            .get(repository)
            .cloned()
            .ok_or(RegistryError::RegistryUnavailable { status: 404 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_deployment() {
        let deploy = create_test_deployment("web", "default", &["nginx:1.19", "envoy:1.0"]);

        assert_eq!(deploy.metadata.name, Some("web".to_string()));
        assert_eq!(deploy.metadata.namespace, Some("default".to_string()));
        assert_eq!(first_image(&deploy), Some("nginx:1.19".to_string()));
    }
}
