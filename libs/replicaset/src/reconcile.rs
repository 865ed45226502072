use flotilla_api_client::FlotillaClient;
use flotilla_model::{Kind, ObjectKey, ObjectMeta, Pod, PodPhase};

/// Lists every ReplicaSet across all namespaces as the poll loop's work items.
pub async fn list_targets(client: &FlotillaClient) -> Result<Vec<ObjectKey>, String> {
    let all: Vec<flotilla_model::ReplicaSet> = client
        .list_all("replicasets")
        .await
        .map_err(|e| e.to_string())?;
    Ok(all
        .into_iter()
        .map(|rs| {
            ObjectKey::namespaced(
                Kind::ReplicaSet,
                rs.meta.namespace.unwrap_or_default(),
                rs.meta.name,
            )
        })
        .collect())
}

fn is_live(pod: &Pod) -> bool {
    !matches!(pod.status.phase, Some(PodPhase::Terminated))
}

/// Counts live Pods owned by a ReplicaSet and creates/deletes Pods to converge
/// `observed_replicas` on `spec.replicas`, per spec.md §4.5's ReplicaSetController.
pub async fn reconcile(client: &FlotillaClient, key: &ObjectKey) -> Result<(), String> {
    let namespace = key.namespace.clone().ok_or("ReplicaSet must be namespaced")?;
    let name = &key.name;

    let mut rs = match client
        .get_replicaset(&namespace, name)
        .await
        .map_err(|e| e.to_string())?
    {
        Some(rs) => rs,
        None => return Ok(()),
    };

    let pods = client
        .list_namespace_pods(&namespace)
        .await
        .map_err(|e| e.to_string())?;

    let mut owned: Vec<Pod> = pods
        .into_iter()
        .filter(|p| p.meta.labels_match(&rs.spec.selector) && is_live(p))
        .collect();
    owned.sort_by(|a, b| a.meta.creation_timestamp.cmp(&b.meta.creation_timestamp));

    let desired = rs.spec.replicas as usize;
    let observed = owned.len();
    let mut owned_names: Vec<String> = owned.iter().map(|p| p.meta.name.clone()).collect();

    if observed < desired {
        for i in 0..(desired - observed) {
            let pod_name = format!("{name}-{}", uuid::Uuid::new_v4());
            let mut meta = ObjectMeta::new(pod_name.clone(), Some(namespace.clone()))
                .with_labels(rs.spec.template.labels.clone());
            meta.labels.extend(rs.spec.selector.clone());
            let pod = Pod::new(meta, rs.spec.template.spec.clone());
            client
                .create_pod(&namespace, &pod)
                .await
                .map_err(|e| e.to_string())?;
            owned_names.push(pod_name);
            tracing::debug!(replicaset = %name, index = i, "created pod to satisfy replica count");
        }
    } else if observed > desired {
        // LIFO: the most recently created owned Pods are removed first.
        let excess = observed - desired;
        for pod in owned.iter().rev().take(excess) {
            client
                .delete_pod(&namespace, &pod.meta.name)
                .await
                .map_err(|e| e.to_string())?;
            tracing::debug!(replicaset = %name, pod = %pod.meta.name, "deleted excess pod");
        }
        owned_names.truncate(desired);
    }

    rs.status.observed_replicas = owned_names.len() as u32;
    rs.status.owned_pods = owned_names;

    client
        .update_replicaset(&namespace, name, &rs)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_model::{PodSpec, PodStatus};
    use std::collections::BTreeMap;

    fn pod_with_labels(name: &str, labels: &[(&str, &str)], phase: PodPhase) -> Pod {
        let meta = ObjectMeta::new(name, Some("default".into())).with_labels(
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        Pod {
            meta,
            spec: PodSpec::default(),
            status: PodStatus {
                phase: Some(phase),
                ..Default::default()
            },
        }
    }

    #[test]
    fn is_live_excludes_terminated() {
        let running = pod_with_labels("a", &[], PodPhase::Running);
        let terminated = pod_with_labels("b", &[], PodPhase::Terminated);
        assert!(is_live(&running));
        assert!(!is_live(&terminated));
    }

    #[test]
    fn selector_matching_filters_owned_pods() {
        let mut selector = BTreeMap::new();
        selector.insert("app".to_string(), "web".to_string());

        let owned = pod_with_labels("a", &[("app", "web"), ("tier", "frontend")], PodPhase::Running);
        let unrelated = pod_with_labels("b", &[("app", "db")], PodPhase::Running);

        assert!(owned.meta.labels_match(&selector));
        assert!(!unrelated.meta.labels_match(&selector));
    }
}
