//! Exposure pass tests against the in-memory client

use endpoint::mock::MockCall;
use endpoint::{
    expose_endpoints, Convergence, Endpoint, EndpointData, EndpointError, ExposeContext, MockExposureClient,
    OwnerTag,
};
use std::collections::BTreeMap;

fn selector() -> BTreeMap<String, String> {
    BTreeMap::from([("service".to_string(), "keystone".to_string())])
}

fn all_endpoints() -> BTreeMap<Endpoint, EndpointData> {
    BTreeMap::from([
        (Endpoint::Admin, EndpointData::new(35357, "")),
        (Endpoint::Internal, EndpointData::new(5000, "/v3")),
        (Endpoint::Public, EndpointData::new(5000, "/v3/%(project_id)s")),
    ])
}

fn converged_client() -> MockExposureClient {
    let client = MockExposureClient::new();
    client.set_hostname("keystone-admin", "keystone-admin.apps.example.com");
    client.set_hostname("keystone-internal", "keystone-internal.apps.example.com");
    client.set_hostname("keystone-public", "https://keystone.example.com");
    client
}

#[tokio::test]
async fn test_expose_all_endpoints() {
    let client = converged_client();
    let ctx = ExposeContext::new("openstack");

    let outcome = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;

    assert!(matches!(outcome.result, Ok(Convergence::Complete)));
    assert_eq!(
        outcome.endpoints,
        BTreeMap::from([
            ("admin".to_string(), "http://keystone-admin.apps.example.com".to_string()),
            ("internal".to_string(), "http://keystone-internal.apps.example.com/v3".to_string()),
            ("public".to_string(), "https://keystone.example.com/v3/%(project_id)s".to_string()),
        ])
    );
}

#[tokio::test]
async fn test_service_and_route_shape() {
    let client = converged_client();
    let tag = OwnerTag {
        api_version: "endpoints.microscaler.io/v1alpha1".to_string(),
        kind: "ServiceExposure".to_string(),
        name: "keystone".to_string(),
        uid: "uid-1".to_string(),
    };
    let ctx = ExposeContext::new("openstack").with_owner(tag.clone());

    let outcome = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;
    assert!(outcome.is_complete());

    let svc = client.service("keystone-internal").expect("service stored");
    assert_eq!(svc.namespace, "openstack");
    assert_eq!(svc.port_name, "keystone-internal");
    assert_eq!(svc.port, 5000);
    assert_eq!(svc.protocol, "TCP");
    assert_eq!(svc.selector, selector());
    assert_eq!(svc.labels.get("internal").map(String::as_str), Some("true"));
    assert_eq!(svc.labels.get("service").map(String::as_str), Some("keystone"));
    assert_eq!(svc.owner, Some(tag));

    let route = client.route("keystone-internal").expect("route stored");
    assert_eq!(route.service_name, "keystone-internal");
    assert_eq!(route.target_port_name, "keystone-internal");
    assert_eq!(route.labels, svc.labels);
}

#[tokio::test]
async fn test_skip_owner() {
    let client = converged_client();
    let ctx = ExposeContext::new("openstack");

    expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;

    assert_eq!(client.service("keystone-admin").and_then(|s| s.owner), None);
    assert_eq!(client.route("keystone-admin").and_then(|r| r.owner), None);
}

#[tokio::test]
async fn test_idempotent_second_pass() {
    let client = converged_client();
    let ctx = ExposeContext::new("openstack");

    let first = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;
    assert!(first.is_complete());
    assert_eq!(client.write_count(), 6);

    client.reset_calls();
    let second = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;

    assert!(second.is_complete());
    assert_eq!(second.endpoints, first.endpoints);
    assert_eq!(client.write_count(), 0);
}

#[tokio::test]
async fn test_partial_result_on_service_error() {
    let client = converged_client();
    client.fail_service("keystone-public", "permission denied");
    let ctx = ExposeContext::new("openstack");

    let outcome = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;

    assert!(matches!(
        &outcome.result,
        Err(EndpointError::Service { name, .. }) if name == "keystone-public"
    ));
    let keys: Vec<&str> = outcome.endpoints.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["admin", "internal"]);
    assert!(client.route("keystone-public").is_none());
}

#[tokio::test]
async fn test_route_error_is_fatal() {
    let client = converged_client();
    client.fail_route("keystone-admin", "host already claimed");
    let ctx = ExposeContext::new("openstack");

    let outcome = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;

    assert!(matches!(&outcome.result, Err(EndpointError::Route { .. })));
    assert!(outcome.endpoints.is_empty());
    assert!(!client.was_touched("keystone-internal"));
}

#[tokio::test]
async fn test_pending_service_short_circuits() {
    let client = converged_client();
    client.set_service_pending("keystone-internal", true);
    let ctx = ExposeContext::new("openstack");

    let outcome = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;

    assert!(outcome.needs_requeue());
    assert_eq!(outcome.endpoints.len(), 1);
    assert!(outcome.endpoints.contains_key("admin"));
    // Route is only ensured after the Service converged
    assert!(client.route("keystone-internal").is_none());
    // Nothing attempted for endpoints after the pending one
    assert!(!client.was_touched("keystone-public"));
}

#[tokio::test]
async fn test_pending_route_short_circuits() {
    let client = converged_client();
    client.set_route_pending("keystone-internal", true);
    let ctx = ExposeContext::new("openstack");

    let outcome = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;

    assert!(matches!(outcome.result, Ok(Convergence::Requeue(_))));
    assert_eq!(outcome.endpoints.keys().collect::<Vec<_>>(), vec!["admin"]);
    assert!(!client.was_touched("keystone-public"));
}

#[tokio::test]
async fn test_unassigned_hostname_requeues() {
    let client = MockExposureClient::new();
    client.set_hostname("keystone-admin", "keystone-admin.apps.example.com");
    client.set_hostname("keystone-internal", "");
    let ctx = ExposeContext::new("openstack");

    let outcome = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;

    assert!(outcome.needs_requeue());
    assert_eq!(outcome.endpoints.len(), 1);
    assert!(outcome.endpoints.values().all(|url| !url.is_empty()));
    assert!(!client.was_touched("keystone-public"));
}

#[tokio::test]
async fn test_converges_over_several_passes() {
    let client = MockExposureClient::new();
    let ctx = ExposeContext::new("openstack");

    let first = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;
    assert!(first.needs_requeue());
    assert!(first.endpoints.is_empty());

    client.set_hostname("keystone-admin", "admin.example.com");
    client.set_hostname("keystone-internal", "internal.example.com");
    let second = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;
    assert!(second.needs_requeue());
    assert_eq!(second.endpoints.len(), 2);

    client.set_hostname("keystone-public", "public.example.com");
    let third = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;
    assert!(third.is_complete());
    assert_eq!(third.endpoints.len(), 3);
}

#[tokio::test]
async fn test_invalid_hostname_excluded() {
    let client = converged_client();
    client.set_hostname("keystone-internal", "http://[invalid");
    let ctx = ExposeContext::new("openstack");

    let outcome = expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;

    assert!(matches!(
        &outcome.result,
        Err(EndpointError::Url { endpoint, source: url::ParseError::InvalidIpv6Address, .. }) if endpoint == "internal"
    ));
    assert!(!outcome.endpoints.contains_key("internal"));
    assert!(outcome.endpoints.contains_key("admin"));
}

#[tokio::test]
async fn test_processed_in_name_order() {
    let client = converged_client();
    let ctx = ExposeContext::new("openstack");

    expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;

    assert_eq!(
        client.calls(),
        vec![
            MockCall::Service("keystone-admin".to_string()),
            MockCall::Route("keystone-admin".to_string()),
            MockCall::Service("keystone-internal".to_string()),
            MockCall::Route("keystone-internal".to_string()),
            MockCall::Service("keystone-public".to_string()),
            MockCall::Route("keystone-public".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_invalid_port_rejected_before_writes() {
    let client = converged_client();
    let ctx = ExposeContext::new("openstack");
    let mut endpoints = all_endpoints();
    endpoints.insert(Endpoint::Public, EndpointData::new(0, ""));

    let outcome = expose_endpoints(&client, &ctx, "keystone", &selector(), &endpoints).await;

    assert!(matches!(outcome.result, Err(EndpointError::InvalidPort { port: 0, .. })));
    assert!(outcome.endpoints.is_empty());
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_no_endpoints_is_complete() {
    let client = MockExposureClient::new();
    let ctx = ExposeContext::new("openstack");

    let outcome = expose_endpoints(&client, &ctx, "keystone", &selector(), &BTreeMap::new()).await;

    assert!(outcome.is_complete());
    assert!(outcome.endpoints.is_empty());
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_spec_drift_is_patched() {
    let client = converged_client();
    let ctx = ExposeContext::new("openstack");
    expose_endpoints(&client, &ctx, "keystone", &selector(), &all_endpoints()).await;
    client.reset_calls();

    let mut endpoints = all_endpoints();
    endpoints.insert(Endpoint::Admin, EndpointData::new(35358, ""));
    let outcome = expose_endpoints(&client, &ctx, "keystone", &selector(), &endpoints).await;

    assert!(outcome.is_complete());
    assert_eq!(client.write_count(), 1);
    assert_eq!(client.service("keystone-admin").map(|s| s.port), Some(35358));
}
