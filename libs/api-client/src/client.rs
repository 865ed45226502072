use std::time::Duration;

use flotilla_model::{
    Dns, Function, HorizontalPodAutoscaler, Node, PersistentVolume, PersistentVolumeClaim, Pod,
    PodStatus, ReplicaSet, Service, Workflow,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ClientError, Result};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The scheduler topic/group coordinates the API server hands back from
/// `POST /scheduler`, telling the scheduler where to read the Pod record from
/// (spec.md §6).
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct SchedulerHandoff {
    pub topic: String,
    pub group: String,
}

/// Thin typed wrapper over the API server's HTTP surface (spec.md §6), used by
/// the scheduler, controllers, node agent, and proxy in place of the teacher's
/// `kube::Client`/`kube::Api<K>`.
#[derive(Clone)]
pub struct FlotillaClient {
    http: reqwest::Client,
    base_url: String,
}

impl FlotillaClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Http("failed to build HTTP client".to_string(), e))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("request to {url} failed"), e))?;
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(&self, path: &str, response: reqwest::Response) -> Result<T> {
        match response.status() {
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ClientError::Http(format!("reading body from {path}"), e))?;
                serde_json::from_slice(&bytes)
                    .map_err(|e| ClientError::Serialization(path.to_string(), e))
            }
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(path.to_string())),
            StatusCode::CONFLICT => Err(ClientError::Conflict(path.to_string())),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Validation(body))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Unexpected {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn expect_status(&self, path: &str, response: reqwest::Response) -> Result<()> {
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(path.to_string())),
            StatusCode::CONFLICT => Err(ClientError::Conflict(path.to_string())),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Validation(body))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Unexpected {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send::<()>(Method::GET, path, None).await?;
        self.decode(path, response).await
    }

    async fn get_json_opt<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get_json(path).await {
            Ok(value) => Ok(Some(value)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    async fn put_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.send(Method::PUT, path, Some(body)).await?;
        self.decode(path, response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        self.decode(path, response).await
    }

    async fn patch<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let response = self.send(Method::PATCH, path, Some(body)).await?;
        self.expect_status(path, response).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self.send::<()>(Method::DELETE, path, None).await?;
        self.expect_status(path, response).await
    }

    // --- Nodes ---

    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.get_json("/nodes").await
    }

    /// Registers a node on first contact, or refreshes its heartbeat on
    /// subsequent calls — same route serves both per spec.md §6.
    pub async fn register_or_heartbeat_node(&self, node: &Node) -> Result<Node> {
        self.put_json(&format!("/nodes/{}", node.meta.name), node).await
    }

    pub async fn node_pods(&self, node_name: &str) -> Result<Vec<Pod>> {
        self.get_json(&format!("/nodes/{node_name}/pods")).await
    }

    // --- Pods ---

    pub async fn list_pods(&self) -> Result<Vec<Pod>> {
        self.get_json("/pods").await
    }

    pub async fn list_namespace_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        self.get_json(&format!("/namespaces/{namespace}/pods")).await
    }

    pub async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        self.get_json_opt(&format!("/namespaces/{namespace}/pods/{name}")).await
    }

    pub async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod> {
        self.post_json(&format!("/namespaces/{namespace}/pods"), pod).await
    }

    pub async fn update_pod(&self, namespace: &str, name: &str, pod: &Pod) -> Result<Pod> {
        self.put_json(&format!("/namespaces/{namespace}/pods/{name}"), pod).await
    }

    pub async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.delete(&format!("/namespaces/{namespace}/pods/{name}")).await
    }

    pub async fn update_pod_status(
        &self,
        namespace: &str,
        name: &str,
        status: &PodStatus,
    ) -> Result<PodStatus> {
        self.put_json(
            &format!("/namespaces/{namespace}/pods/{name}/status"),
            status,
        )
        .await
    }

    pub async fn update_pod_ip(&self, namespace: &str, name: &str, ip: &str) -> Result<()> {
        self.patch(
            &format!("/namespaces/{namespace}/pods/{name}/ip"),
            &serde_json::json!({ "ip": ip }),
        )
        .await
    }

    // --- Scheduler ---

    pub async fn submit_to_scheduler(&self, pod: &Pod) -> Result<SchedulerHandoff> {
        self.post_json("/scheduler", pod).await
    }

    pub async fn bind_pod_to_node(
        &self,
        namespace: &str,
        name: &str,
        node: &str,
    ) -> Result<Pod> {
        self.put_json::<(), Pod>(
            &format!("/scheduler/namespaces/{namespace}/pods/{name}/nodes/{node}"),
            &(),
        )
        .await
    }

    /// Cluster-wide listing across all namespaces, mirroring the `GET /pods`
    /// route's namespace-less counterpart for the other namespaced kinds.
    pub async fn list_all<T: DeserializeOwned>(&self, plural: &str) -> Result<Vec<T>> {
        self.get_json(&format!("/{plural}")).await
    }

    // --- Generic CRUD helpers, used where a kind needs the full route set ---

    pub async fn get_namespaced<T: DeserializeOwned>(
        &self,
        plural: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<T>> {
        self.get_json_opt(&format!("/namespaces/{namespace}/{plural}/{name}")).await
    }

    pub async fn delete_namespaced(&self, plural: &str, namespace: &str, name: &str) -> Result<()> {
        self.delete(&format!("/namespaces/{namespace}/{plural}/{name}")).await
    }

    pub async fn create_namespaced<B: Serialize, T: DeserializeOwned>(
        &self,
        plural: &str,
        namespace: &str,
        body: &B,
    ) -> Result<T> {
        self.post_json(&format!("/namespaces/{namespace}/{plural}"), body).await
    }

    // --- Generic CRUD for the remaining namespaced kinds ---

    pub async fn list_replicasets(&self, namespace: &str) -> Result<Vec<ReplicaSet>> {
        self.get_json(&format!("/namespaces/{namespace}/replicasets")).await
    }

    pub async fn get_replicaset(&self, namespace: &str, name: &str) -> Result<Option<ReplicaSet>> {
        self.get_namespaced("replicasets", namespace, name).await
    }

    pub async fn update_replicaset(
        &self,
        namespace: &str,
        name: &str,
        rs: &ReplicaSet,
    ) -> Result<ReplicaSet> {
        self.put_json(&format!("/namespaces/{namespace}/replicasets/{name}"), rs)
            .await
    }

    pub async fn list_hpas(&self, namespace: &str) -> Result<Vec<HorizontalPodAutoscaler>> {
        self.get_json(&format!("/namespaces/{namespace}/hpas")).await
    }

    pub async fn get_hpa(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<HorizontalPodAutoscaler>> {
        self.get_namespaced("hpas", namespace, name).await
    }

    pub async fn update_hpa(
        &self,
        namespace: &str,
        name: &str,
        hpa: &HorizontalPodAutoscaler,
    ) -> Result<HorizontalPodAutoscaler> {
        self.put_json(&format!("/namespaces/{namespace}/hpas/{name}"), hpa).await
    }

    pub async fn list_services(&self, namespace: &str) -> Result<Vec<Service>> {
        self.get_json(&format!("/namespaces/{namespace}/services")).await
    }

    pub async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        self.get_namespaced("services", namespace, name).await
    }

    pub async fn update_service(
        &self,
        namespace: &str,
        name: &str,
        service: &Service,
    ) -> Result<Service> {
        self.put_json(&format!("/namespaces/{namespace}/services/{name}"), service)
            .await
    }

    pub async fn list_dns(&self, namespace: &str) -> Result<Vec<Dns>> {
        self.get_json(&format!("/namespaces/{namespace}/dns")).await
    }

    pub async fn get_dns(&self, namespace: &str, name: &str) -> Result<Option<Dns>> {
        self.get_namespaced("dns", namespace, name).await
    }

    pub async fn update_dns(&self, namespace: &str, name: &str, dns: &Dns) -> Result<Dns> {
        self.put_json(&format!("/namespaces/{namespace}/dns/{name}"), dns).await
    }

    pub async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>> {
        self.get_json("/persistentvolumes").await
    }

    pub async fn get_persistent_volume(&self, name: &str) -> Result<Option<PersistentVolume>> {
        self.get_json_opt(&format!("/persistentvolumes/{name}")).await
    }

    pub async fn create_persistent_volume(&self, pv: &PersistentVolume) -> Result<PersistentVolume> {
        self.post_json("/persistentvolumes", pv).await
    }

    pub async fn update_persistent_volume(
        &self,
        name: &str,
        pv: &PersistentVolume,
    ) -> Result<PersistentVolume> {
        self.put_json(&format!("/persistentvolumes/{name}"), pv).await
    }

    pub async fn list_persistent_volume_claims(
        &self,
        namespace: &str,
    ) -> Result<Vec<PersistentVolumeClaim>> {
        self.get_json(&format!("/namespaces/{namespace}/persistentvolumeclaims"))
            .await
    }

    pub async fn get_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>> {
        self.get_namespaced("persistentvolumeclaims", namespace, name).await
    }

    pub async fn update_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
        pvc: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim> {
        self.put_json(
            &format!("/namespaces/{namespace}/persistentvolumeclaims/{name}"),
            pvc,
        )
        .await
    }

    pub async fn list_functions(&self, namespace: &str) -> Result<Vec<Function>> {
        self.get_json(&format!("/namespaces/{namespace}/functions")).await
    }

    pub async fn get_function(&self, namespace: &str, name: &str) -> Result<Option<Function>> {
        self.get_namespaced("functions", namespace, name).await
    }

    pub async fn update_function(
        &self,
        namespace: &str,
        name: &str,
        function: &Function,
    ) -> Result<Function> {
        self.put_json(&format!("/namespaces/{namespace}/functions/{name}"), function)
            .await
    }

    /// `PATCH .../functions/{name}` invokes the function synchronously, per
    /// spec.md §6; the response body is the invocation's raw output.
    pub async fn invoke_function(
        &self,
        namespace: &str,
        name: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        let url = self.url(&format!("/namespaces/{namespace}/functions/{name}"));
        let response = self
            .http
            .patch(&url)
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("invoking function at {url}"), e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Http("reading function invoke response".to_string(), e))?;
        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(ClientError::Unexpected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).to_string(),
            })
        }
    }

    /// Multipart upload of a Function's source archive on create, per spec.md
    /// §6 ("multipart upload on POST").
    pub async fn create_function(
        &self,
        namespace: &str,
        name: &str,
        trigger: &str,
        archive_bytes: Vec<u8>,
    ) -> Result<Function> {
        let form = reqwest::multipart::Form::new()
            .text("name", name.to_string())
            .text("trigger", trigger.to_string())
            .part(
                "archive",
                reqwest::multipart::Part::bytes(archive_bytes).file_name("source.tar.gz"),
            );
        let url = self.url(&format!("/namespaces/{namespace}/functions"));
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("uploading function archive to {url}"), e))?;
        self.decode(&url, response).await
    }

    pub async fn list_workflows(&self, namespace: &str) -> Result<Vec<Workflow>> {
        self.get_json(&format!("/namespaces/{namespace}/workflows")).await
    }

    pub async fn invoke_workflow(
        &self,
        namespace: &str,
        name: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        let url = self.url(&format!("/namespaces/{namespace}/workflows/{name}"));
        let response = self
            .http
            .patch(&url)
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("invoking workflow at {url}"), e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Http("reading workflow invoke response".to_string(), e))?;
        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(ClientError::Unexpected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).to_string(),
            })
        }
    }
}
