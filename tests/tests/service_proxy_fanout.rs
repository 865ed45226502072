//! End-to-end coverage of spec.md §8's seed scenario: a ClusterIP Service
//! with a 3-Pod selector gets its clusterIP assigned and fans a CREATE with
//! 3 endpoints out to every node; failing one Pod fans an UPDATE with 2
//! endpoints out on the next reconcile pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use flotilla_api_client::FlotillaClient;
use flotilla_model::{
    Node, NodeStatus, ObjectMeta, Pod, PodPhase, PodSpec, PodStatus, Protocol, Service,
    ServicePort, ServiceSpec, ServiceStatus, ServiceType,
};
use flotilla_service_controller::{reconcile::reconcile, NodePortManager, ProxyAction, ProxyMessage};
use flotilla_store::{InMemoryMessageBus, MessageBus, TypedBus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn running_pod(name: &str, ip: &str) -> Pod {
    Pod {
        meta: ObjectMeta::new(name, Some("default".to_string())).with_labels(labels(&[("app", "web")])),
        spec: PodSpec::default(),
        status: PodStatus {
            phase: Some(PodPhase::Running),
            subnet_ip: Some(ip.to_string()),
            ..Default::default()
        },
    }
}

fn failed_pod(name: &str, ip: &str) -> Pod {
    Pod {
        status: PodStatus {
            phase: Some(PodPhase::Failed),
            subnet_ip: Some(ip.to_string()),
            ..Default::default()
        },
        ..running_pod(name, ip)
    }
}

fn service(cluster_ip: Option<&str>) -> Service {
    Service {
        meta: ObjectMeta::new("svc1", Some("default".to_string())),
        spec: ServiceSpec {
            type_: ServiceType::ClusterIp,
            selector: labels(&[("app", "web")]),
            port: ServicePort { port: 80, target_port: 8080, protocol: Protocol::Tcp, node_port: None },
        },
        status: ServiceStatus { cluster_ip: cluster_ip.map(str::to_string) },
    }
}

fn node(name: &str) -> Node {
    Node::new(name, "10.0.0.1:9000", BTreeMap::new())
}

#[tokio::test]
async fn clusterip_assignment_and_endpoint_delta_fan_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/namespaces/default/services/svc1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(service(None)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/namespaces/default/services/svc1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(service(Some("10.96.0.1"))))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Service>::new()))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/namespaces/default/services/svc1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(service(Some("10.96.0.1"))))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/namespaces/default/pods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            running_pod("p1", "10.1.0.1"),
            running_pod("p2", "10.1.0.2"),
            running_pod("p3", "10.1.0.3"),
        ]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/namespaces/default/pods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            running_pod("p1", "10.1.0.1"),
            running_pod("p2", "10.1.0.2"),
            failed_pod("p3", "10.1.0.3"),
        ]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![node("n1")]))
        .mount(&server)
        .await;

    let client = FlotillaClient::new(server.uri()).unwrap();
    let bus: Arc<dyn MessageBus> = Arc::new(InMemoryMessageBus::new());
    let nodeports = NodePortManager::new(bus.clone(), "test-nodeports");
    let key = flotilla_model::ObjectKey::namespaced(flotilla_model::Kind::Service, "default".to_string(), "svc1".to_string());

    reconcile(&client, &bus, &nodeports, &key).await.unwrap();

    let typed_bus = TypedBus::new(bus.as_ref());
    let deliveries: Vec<(String, ProxyMessage)> = typed_bus.poll("node.n1.services", "test", 10).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    let (id, message) = &deliveries[0];
    assert_eq!(message.action, ProxyAction::Create);
    assert_eq!(message.cluster_ip, "10.96.0.1");
    assert_eq!(message.endpoints.len(), 3);
    typed_bus.ack("node.n1.services", "test", id).await.unwrap();

    reconcile(&client, &bus, &nodeports, &key).await.unwrap();

    let deliveries: Vec<(String, ProxyMessage)> = typed_bus.poll("node.n1.services", "test", 10).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    let (_, message) = &deliveries[0];
    assert_eq!(message.action, ProxyAction::Update);
    assert_eq!(message.endpoints.len(), 2);
}
