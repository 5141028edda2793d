// Library exports for integration testing
//
// The binary entrypoint in main.rs wires these modules together

pub mod config;
pub mod controller;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod resolver;
pub mod scheduler;

// Re-export commonly used types for testing
pub use config::KubertConfig;
pub use controller::{ReconciliationController, WorkloadApi};
pub use models::{ImageReference, ReconciliationOutcome, ReconciliationTarget, VersionTag};
pub use registry::{DockerHubClient, RegistryClient, RegistryError, TagResolver};
pub use resolver::ImageResolver;
pub use scheduler::Scheduler;
