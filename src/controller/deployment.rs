use super::ReconcileError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Container;
use kube::{
    api::{Api, PostParams},
    client::Client,
};
use tracing::debug;

/// Read and full-replace access to workload definitions.
#[async_trait]
pub trait WorkloadApi: Send + Sync {
    async fn read_workload(&self, name: &str, namespace: &str) -> Result<Deployment>;

    /// Full replace, not a patch. The stored object becomes `definition`.
    async fn replace_workload(
        &self,
        name: &str,
        namespace: &str,
        definition: &Deployment,
    ) -> Result<Deployment>;
}

/// `WorkloadApi` backed by the Kubernetes Deployments API
pub struct KubeDeployments {
    client: Client,
}

impl KubeDeployments {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl WorkloadApi for KubeDeployments {
    async fn read_workload(&self, name: &str, namespace: &str) -> Result<Deployment> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        debug!("Reading deployment {}/{}", namespace, name);

        deployments
            .get(name)
            .await
            .with_context(|| format!("Failed to read deployment {}/{}", namespace, name))
    }

    async fn replace_workload(
        &self,
        name: &str,
        namespace: &str,
        definition: &Deployment,
    ) -> Result<Deployment> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        debug!("Replacing deployment {}/{}", namespace, name);

        deployments
            .replace(name, &PostParams::default(), definition)
            .await
            .with_context(|| format!("Failed to replace deployment {}/{}", namespace, name))
    }
}

fn first_container(deployment: &Deployment) -> Option<&Container> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()
}

fn first_container_mut(deployment: &mut Deployment) -> Option<&mut Container> {
    deployment
        .spec
        .as_mut()?
        .template
        .spec
        .as_mut()?
        .containers
        .first_mut()
}

/// Image of the first declared container. Only single-container workloads
/// are managed; further containers are left alone.
pub fn first_container_image(deployment: &Deployment) -> Result<&str, ReconcileError> {
    let container = first_container(deployment)
        .ok_or_else(|| ReconcileError::MissingContainer("workload has no containers".into()))?;

    container.image.as_deref().ok_or_else(|| {
        ReconcileError::MissingContainer(format!("container {} has no image", container.name))
    })
}

pub fn set_first_container_image(
    deployment: &mut Deployment,
    image: &str,
) -> Result<(), ReconcileError> {
    let container = first_container_mut(deployment)
        .ok_or_else(|| ReconcileError::MissingContainer("workload has no containers".into()))?;

    container.image = Some(image.to_string());
    Ok(())
}
