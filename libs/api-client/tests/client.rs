use flotilla_api_client::{ClientError, FlotillaClient};
use flotilla_model::{Kind, Node, NodeStatus, ObjectMeta};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_node() -> Node {
    Node {
        meta: ObjectMeta::new("n1", None),
        advertised_address: "10.0.0.1:9000".to_string(),
        status: NodeStatus::Online,
        last_heartbeat: chrono::Utc::now(),
        pod_topic: "node.n1.pods".to_string(),
        service_topic: "node.n1.services".to_string(),
    }
}

#[tokio::test]
async fn list_nodes_decodes_json_array() {
    let server = MockServer::start().await;
    let node = sample_node();
    Mock::given(method("GET"))
        .and(path("/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![&node]))
        .mount(&server)
        .await;

    let client = FlotillaClient::new(server.uri()).unwrap();
    let nodes = client.list_nodes().await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].meta.name, "n1");
}

#[tokio::test]
async fn not_found_maps_to_client_error_variant() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/namespaces/default/pods/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = FlotillaClient::new(server.uri()).unwrap();
    let pod = client.get_pod("default", "ghost").await.unwrap();
    assert!(pod.is_none());
}

#[tokio::test]
async fn conflict_status_surfaces_as_conflict_error() {
    let server = MockServer::start().await;
    let node = sample_node();
    Mock::given(method("PUT"))
        .and(path("/nodes/n1"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let client = FlotillaClient::new(server.uri()).unwrap();
    let err = client
        .register_or_heartbeat_node(&node)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Conflict(_)));
}

#[tokio::test]
async fn invoke_function_returns_raw_response_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/namespaces/default/functions/resize"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"result-bytes".to_vec()))
        .mount(&server)
        .await;

    let client = FlotillaClient::new(server.uri()).unwrap();
    let out = client
        .invoke_function("default", "resize", b"input")
        .await
        .unwrap();
    assert_eq!(out, b"result-bytes".to_vec());
}
