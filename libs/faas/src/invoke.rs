use flotilla_model::{ContainerPort, ContainerSpec, Function, ObjectMeta, Pod, PodPhase, PodSpec};
use rand::seq::SliceRandom;

/// Fixed port every Function's backing container listens on. Functions carry
/// no user-specified port in spec.md §3's data model (only `trigger` and
/// `source_archive_ref`), so a single well-known port is the simplest
/// resolution of that silence (recorded in DESIGN.md).
pub const FUNCTION_PORT: u16 = 8080;

/// Builds the Pod spec for a Function's backing Pod from its built image
/// (spec.md §4.1's "starts the first Pod" / housekeeping's scale-up POST).
pub fn build_pod_for_function(function: &Function, namespace: &str, pod_name: &str) -> Result<Pod, String> {
    let image = function
        .status
        .image
        .clone()
        .ok_or("function has no built image yet")?;
    let meta = ObjectMeta::new(pod_name, Some(namespace.to_string()))
        .with_labels([("flotilla.io/function".to_string(), function.meta.name.clone())].into());
    let spec = PodSpec {
        containers: vec![ContainerSpec {
            name: function.meta.name.clone(),
            image,
            command: Vec::new(),
            args: Vec::new(),
            ports: vec![ContainerPort {
                container_port: FUNCTION_PORT,
                protocol: Default::default(),
            }],
            resources: Default::default(),
            volume_mounts: Vec::new(),
            security_context: None,
        }],
        volumes: Vec::new(),
        node_selector: Default::default(),
        security_context: None,
    };
    Ok(Pod::new(meta, spec))
}

/// Uniform-random choice among Running Pods with an assigned overlay IP
/// (spec.md §4.1 "picks one backing Pod (uniform random)").
pub fn pick_pod(pods: &[Pod]) -> Option<&Pod> {
    let candidates: Vec<&Pod> = pods
        .iter()
        .filter(|p| matches!(p.status.phase, Some(PodPhase::Running)) && p.status.subnet_ip.is_some())
        .collect();
    candidates.choose(&mut rand::thread_rng()).copied()
}

/// Forwards the raw invocation body to a Pod's overlay address on
/// [`FUNCTION_PORT`] at the function's trigger path.
pub async fn forward_request(
    http: &reqwest::Client,
    pod: &Pod,
    trigger: &str,
    body: Vec<u8>,
) -> Result<Vec<u8>, String> {
    let ip = pod
        .status
        .subnet_ip
        .as_deref()
        .ok_or("picked pod has no overlay IP assigned")?;
    let url = format!("http://{ip}:{FUNCTION_PORT}{trigger}");
    let response = http
        .post(&url)
        .body(body)
        .send()
        .await
        .map_err(|e| format!("invocation request to {url} failed: {e}"))?;
    if !response.status().is_success() {
        return Err(format!("invocation to {url} returned status {}", response.status()));
    }
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| format!("failed to read invocation response body: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_model::PodStatus;

    fn pod(name: &str, phase: PodPhase, ip: Option<&str>) -> Pod {
        Pod {
            meta: ObjectMeta::new(name, Some("default".into())),
            spec: PodSpec::default(),
            status: PodStatus {
                phase: Some(phase),
                subnet_ip: ip.map(String::from),
                ..Default::default()
            },
        }
    }

    #[test]
    fn only_picks_running_pods_with_an_ip() {
        let pods = vec![
            pod("p1", PodPhase::Creating, Some("10.1.0.1")),
            pod("p2", PodPhase::Running, None),
            pod("p3", PodPhase::Running, Some("10.1.0.3")),
        ];
        let picked = pick_pod(&pods).unwrap();
        assert_eq!(picked.meta.name, "p3");
    }

    #[test]
    fn no_eligible_pods_returns_none() {
        let pods = vec![pod("p1", PodPhase::Failed, Some("10.1.0.1"))];
        assert!(pick_pod(&pods).is_none());
    }

    #[test]
    fn pod_template_uses_the_functions_built_image() {
        let mut function = Function::new(
            ObjectMeta::new("resize-image", Some("default".into())),
            flotilla_model::FunctionSpec {
                trigger: "/fn/resize-image".into(),
                source_archive_ref: "pv://archives/resize-image.tar.gz".into(),
            },
        );
        function.status.image = Some("registry.flotilla.internal/resize-image:abc123".into());
        let pod = build_pod_for_function(&function, "default", "resize-image-0").unwrap();
        assert_eq!(pod.spec.containers[0].image, "registry.flotilla.internal/resize-image:abc123");
        assert_eq!(pod.spec.containers[0].ports[0].container_port, FUNCTION_PORT);
    }

    #[test]
    fn pod_template_requires_a_built_image() {
        let function = Function::new(
            ObjectMeta::new("resize-image", Some("default".into())),
            flotilla_model::FunctionSpec {
                trigger: "/fn/resize-image".into(),
                source_archive_ref: "pv://archives/resize-image.tar.gz".into(),
            },
        );
        assert!(build_pod_for_function(&function, "default", "resize-image-0").is_err());
    }
}
