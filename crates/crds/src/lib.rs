//! Endpoint exposure CRD definitions
//!
//! Kubernetes Custom Resource Definitions for the exposure controller.

pub mod service_exposure;

pub use service_exposure::*;
