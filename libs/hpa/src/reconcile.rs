use chrono::{Duration as ChronoDuration, Utc};
use flotilla_api_client::FlotillaClient;
use flotilla_model::{Kind, ObjectKey, Pod, PodPhase};

/// Minimum time between two scaling decisions on the same HPA, per spec.md
/// §4.5's "Respects a cooldown between actions."
const SCALE_COOLDOWN: ChronoDuration = ChronoDuration::seconds(30);

pub async fn list_targets(client: &FlotillaClient) -> Result<Vec<ObjectKey>, String> {
    let all: Vec<flotilla_model::HorizontalPodAutoscaler> = client
        .list_all("hpas")
        .await
        .map_err(|e| e.to_string())?;
    Ok(all
        .into_iter()
        .map(|hpa| {
            ObjectKey::namespaced(
                Kind::HorizontalPodAutoscaler,
                hpa.meta.namespace.unwrap_or_default(),
                hpa.meta.name,
            )
        })
        .collect())
}

fn average_load(pods: &[Pod]) -> Option<f64> {
    let samples: Vec<f64> = pods
        .iter()
        .filter(|p| matches!(p.status.phase, Some(PodPhase::Running)))
        .filter_map(|p| p.status.load)
        .collect();
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

pub async fn reconcile(client: &FlotillaClient, key: &ObjectKey) -> Result<(), String> {
    let namespace = key.namespace.clone().ok_or("HPA must be namespaced")?;
    let name = &key.name;

    let mut hpa = match client.get_hpa(&namespace, name).await.map_err(|e| e.to_string())? {
        Some(hpa) => hpa,
        None => return Ok(()),
    };

    if hpa.spec.target.kind != "ReplicaSet" {
        return Err(format!(
            "unsupported HPA target kind '{}', only ReplicaSet is supported",
            hpa.spec.target.kind
        ));
    }

    if let Some(last) = hpa.status.last_scale_time {
        if Utc::now().signed_duration_since(last) < SCALE_COOLDOWN {
            return Ok(());
        }
    }

    let mut rs = match client
        .get_replicaset(&namespace, &hpa.spec.target.name)
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
    let owned: Vec<Pod> = pods
        .into_iter()
        .filter(|p| p.meta.labels_match(&rs.spec.selector))
        .collect();

    let load = match average_load(&owned) {
        Some(load) => load,
        None => return Ok(()),
    };

    let current = rs.spec.replicas;
    let desired = if load > hpa.spec.metric.high {
        current.saturating_add(1).min(hpa.spec.max_replicas)
    } else if load < hpa.spec.metric.low {
        current.saturating_sub(1).max(hpa.spec.min_replicas)
    } else {
        current
    };

    if desired != current {
        rs.spec.replicas = desired;
        rs.status.hpa_controlled = true;
        client
            .update_replicaset(&namespace, &hpa.spec.target.name, &rs)
            .await
            .map_err(|e| e.to_string())?;

        hpa.status.current_replicas = desired;
        hpa.status.last_scale_time = Some(Utc::now());
        client
            .update_hpa(&namespace, name, &hpa)
            .await
            .map_err(|e| e.to_string())?;
        tracing::info!(hpa = %name, %load, from = current, to = desired, "scaled replicaset");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_model::{ObjectMeta, PodSpec, PodStatus};

    fn pod_with_load(load: f64) -> Pod {
        Pod {
            meta: ObjectMeta::new("p", Some("default".into())),
            spec: PodSpec::default(),
            status: PodStatus {
                phase: Some(PodPhase::Running),
                load: Some(load),
                ..Default::default()
            },
        }
    }

    #[test]
    fn averages_only_running_pods_with_a_load_sample() {
        let mut pods = vec![pod_with_load(0.2), pod_with_load(0.8)];
        pods.push(Pod {
            meta: ObjectMeta::new("failed", Some("default".into())),
            spec: PodSpec::default(),
            status: PodStatus {
                phase: Some(PodPhase::Failed),
                load: Some(1.0),
                ..Default::default()
            },
        });
        assert_eq!(average_load(&pods), Some(0.5));
    }

    #[test]
    fn no_samples_yields_none() {
        assert_eq!(average_load(&[]), None);
    }
}
