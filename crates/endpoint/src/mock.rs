//! Mock ExposureClient for unit testing
//!
//! Stores applied Services and Routes in memory. Hostnames, pending state and
//! failures are scripted per resource name, and every call is recorded so tests
//! can assert which endpoints were touched.

use crate::error::ClientError;
use crate::exposure_trait::{ExposureClientTrait, Readiness, RouteRequest, RouteState, ServiceRequest};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A call made against the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `ensure_service` for the named Service
    Service(String),
    /// `ensure_route` for the named Route
    Route(String),
}

/// Mock ExposureClient for testing
///
/// A write is counted only when the requested object differs from the stored
/// one, mirroring a server-side apply that leaves converged objects untouched.
/// Routes have no hostname until [`set_hostname`](Self::set_hostname) is called.
#[derive(Debug, Clone, Default)]
pub struct MockExposureClient {
    services: Arc<Mutex<HashMap<String, ServiceRequest>>>,
    routes: Arc<Mutex<HashMap<String, RouteRequest>>>,
    hostnames: Arc<Mutex<HashMap<String, String>>>,
    pending_services: Arc<Mutex<HashSet<String>>>,
    pending_routes: Arc<Mutex<HashSet<String>>>,
    failing_services: Arc<Mutex<HashMap<String, String>>>,
    failing_routes: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    writes: Arc<Mutex<usize>>,
}

impl MockExposureClient {
    /// Create an empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a hostname to the named route (for test setup)
    pub fn set_hostname(&self, route: &str, hostname: &str) {
        self.hostnames.lock().unwrap().insert(route.to_string(), hostname.to_string());
    }

    /// Report the named Service as not converged
    pub fn set_service_pending(&self, service: &str, pending: bool) {
        let mut set = self.pending_services.lock().unwrap();
        if pending {
            set.insert(service.to_string());
        } else {
            set.remove(service);
        }
    }

    /// Report the named Route as not converged
    pub fn set_route_pending(&self, route: &str, pending: bool) {
        let mut set = self.pending_routes.lock().unwrap();
        if pending {
            set.insert(route.to_string());
        } else {
            set.remove(route);
        }
    }

    /// Make `ensure_service` fail for the named Service
    pub fn fail_service(&self, service: &str, message: &str) {
        self.failing_services.lock().unwrap().insert(service.to_string(), message.to_string());
    }

    /// Make `ensure_route` fail for the named Route
    pub fn fail_route(&self, route: &str, message: &str) {
        self.failing_routes.lock().unwrap().insert(route.to_string(), message.to_string());
    }

    /// Remove all scripted failures
    pub fn clear_failures(&self) {
        self.failing_services.lock().unwrap().clear();
        self.failing_routes.lock().unwrap().clear();
    }

    /// Stored Service, if it was ever ensured
    pub fn service(&self, name: &str) -> Option<ServiceRequest> {
        self.services.lock().unwrap().get(name).cloned()
    }

    /// Stored Route, if it was ever ensured
    pub fn route(&self, name: &str) -> Option<RouteRequest> {
        self.routes.lock().unwrap().get(name).cloned()
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether any call touched the named resource
    pub fn was_touched(&self, name: &str) -> bool {
        self.calls().iter().any(|call| match call {
            MockCall::Service(n) | MockCall::Route(n) => n == name,
        })
    }

    /// Number of mutating writes so far
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    /// Forget recorded calls and the write counter, keep stored objects
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
        *self.writes.lock().unwrap() = 0;
    }

    fn upsert<T: Clone + PartialEq>(&self, store: &Mutex<HashMap<String, T>>, name: &str, desired: &T) {
        let mut store = store.lock().unwrap();
        if store.get(name) != Some(desired) {
            store.insert(name.to_string(), desired.clone());
            *self.writes.lock().unwrap() += 1;
        }
    }
}

#[async_trait::async_trait]
impl ExposureClientTrait for MockExposureClient {
    async fn ensure_service(&self, request: &ServiceRequest) -> Result<Readiness, ClientError> {
        self.calls.lock().unwrap().push(MockCall::Service(request.name.clone()));

        if let Some(message) = self.failing_services.lock().unwrap().get(&request.name) {
            return Err(ClientError::Conflict(message.clone()));
        }

        self.upsert(&self.services, &request.name, request);

        if self.pending_services.lock().unwrap().contains(&request.name) {
            Ok(Readiness::Pending)
        } else {
            Ok(Readiness::Ready)
        }
    }

    async fn ensure_route(&self, request: &RouteRequest) -> Result<RouteState, ClientError> {
        self.calls.lock().unwrap().push(MockCall::Route(request.name.clone()));

        if let Some(message) = self.failing_routes.lock().unwrap().get(&request.name) {
            return Err(ClientError::Conflict(message.clone()));
        }

        self.upsert(&self.routes, &request.name, request);

        let readiness = if self.pending_routes.lock().unwrap().contains(&request.name) {
            Readiness::Pending
        } else {
            Readiness::Ready
        };
        Ok(RouteState {
            readiness,
            hostname: self.hostnames.lock().unwrap().get(&request.name).cloned(),
        })
    }
}
