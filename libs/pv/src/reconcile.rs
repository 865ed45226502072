use flotilla_api_client::FlotillaClient;
use flotilla_model::{
    Kind, ObjectKey, ObjectMeta, PersistentVolume, PersistentVolumeClaim, PersistentVolumeSpec,
    PvBacking, PvPhase, PvcPhase, StorageClass,
};

use crate::backend::StorageBackend;
use crate::config::PvProvisionerConfig;

/// Pass 1's targets: every currently-`Pending` PVC, across all namespaces.
pub async fn list_pending_claims(client: &FlotillaClient) -> Result<Vec<ObjectKey>, String> {
    let all: Vec<PersistentVolumeClaim> = client
        .list_all("persistentvolumeclaims")
        .await
        .map_err(|e| e.to_string())?;
    Ok(all
        .into_iter()
        .filter(|pvc| pvc.status.phase == PvcPhase::Pending)
        .map(|pvc| {
            ObjectKey::namespaced(
                Kind::PersistentVolumeClaim,
                pvc.meta.namespace.unwrap_or_default(),
                pvc.meta.name,
            )
        })
        .collect())
}

fn generate_pv_spec(pvc: &PersistentVolumeClaim, config: &PvProvisionerConfig) -> PersistentVolumeSpec {
    let namespace = pvc.meta.namespace.as_deref().unwrap_or("default");
    let backing = match pvc.spec.storage_class {
        StorageClass::HostPath => PvBacking::HostPath {
            path: format!("{}/{}/{}", config.hostpath_root, namespace, pvc.spec.volume_name),
        },
        StorageClass::Nfs => PvBacking::Nfs {
            server: config.nfs_server.clone(),
            path: format!("{}/{}/{}", config.nfs_export_root, namespace, pvc.spec.volume_name),
        },
    };
    PersistentVolumeSpec {
        capacity_bytes: pvc.spec.capacity_bytes,
        backing,
    }
}

async fn fail_claim(
    client: &FlotillaClient,
    namespace: &str,
    mut pvc: PersistentVolumeClaim,
) -> Result<(), String> {
    pvc.status.phase = PvcPhase::Failed;
    client
        .update_persistent_volume_claim(namespace, &pvc.meta.name.clone(), &pvc)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

async fn bind(
    client: &FlotillaClient,
    namespace: &str,
    mut pvc: PersistentVolumeClaim,
    mut pv: PersistentVolume,
    key: &ObjectKey,
) -> Result<(), String> {
    pv.status.phase = PvPhase::Bound;
    pv.status.claim_ref = Some(key.clone());
    client
        .update_persistent_volume(&pv.meta.name.clone(), &pv)
        .await
        .map_err(|e| e.to_string())?;

    pvc.status.phase = PvcPhase::Bound;
    client
        .update_persistent_volume_claim(namespace, &pvc.meta.name.clone(), &pvc)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Pass 1 (spec.md §4.5 PVController, first bullet list): binds or
/// dynamically provisions the PV a `Pending` PVC names.
pub async fn reconcile_claim(
    client: &FlotillaClient,
    backend: &dyn StorageBackend,
    config: &PvProvisionerConfig,
    key: &ObjectKey,
) -> Result<(), String> {
    let namespace = key.namespace.clone().ok_or("PVC must be namespaced")?;

    let pvc = match client
        .get_persistent_volume_claim(&namespace, &key.name)
        .await
        .map_err(|e| e.to_string())?
    {
        Some(pvc) if pvc.status.phase == PvcPhase::Pending => pvc,
        _ => return Ok(()),
    };

    let pv_name = pvc.spec.volume_name.clone();
    match client.get_persistent_volume(&pv_name).await.map_err(|e| e.to_string())? {
        Some(pv) => {
            let class_matches = pv.spec.backing.storage_class() == pvc.spec.storage_class;
            let capacity_matches = pv.spec.capacity_bytes == pvc.spec.capacity_bytes;
            if !class_matches || !capacity_matches {
                return fail_claim(client, &namespace, pvc).await;
            }
            match pv.status.phase {
                PvPhase::Available => bind(client, &namespace, pvc, pv, key).await,
                _ => fail_claim(client, &namespace, pvc).await,
            }
        }
        None => {
            let spec = generate_pv_spec(&pvc, config);
            backend.provision(&spec.backing).await?;
            let mut pv = PersistentVolume::new(ObjectMeta::new(pv_name, None), spec);
            pv.status.phase = PvPhase::Available;
            let pv = client
                .create_persistent_volume(&pv)
                .await
                .map_err(|e| e.to_string())?;
            bind(client, &namespace, pvc, pv, key).await
        }
    }
}

/// Pass 2 (spec.md §4.5 PVController, "second pass"): materializes the
/// backing path for every pre-declared `static` PV and flips it to `Available`.
pub async fn materialize_static_volumes(
    client: &FlotillaClient,
    backend: &dyn StorageBackend,
) -> Result<(), String> {
    let volumes: Vec<PersistentVolume> = client
        .list_persistent_volumes()
        .await
        .map_err(|e| e.to_string())?;
    for mut pv in volumes.into_iter().filter(|pv| pv.status.phase == PvPhase::Static) {
        if let Err(err) = backend.provision(&pv.spec.backing).await {
            tracing::warn!(pv = %pv.meta.name, %err, "failed to materialize static volume");
            continue;
        }
        pv.status.phase = PvPhase::Available;
        if let Err(err) = client.update_persistent_volume(&pv.meta.name.clone(), &pv).await {
            tracing::warn!(pv = %pv.meta.name, %err, "failed to persist materialized volume");
        }
    }
    Ok(())
}

/// Pass 3 (spec.md §4.5 PVController, "third pass"): any `Bound` PV whose
/// `claimRef` no longer resolves to an existing PVC is released back to
/// `Available` (the mutual-binding invariant from spec.md §8).
pub async fn unbind_orphans(client: &FlotillaClient) -> Result<(), String> {
    let volumes: Vec<PersistentVolume> = client
        .list_persistent_volumes()
        .await
        .map_err(|e| e.to_string())?;
    for mut pv in volumes.into_iter().filter(|pv| pv.status.phase == PvPhase::Bound) {
        let Some(claim_ref) = pv.status.claim_ref.clone() else {
            continue;
        };
        let Some(namespace) = claim_ref.namespace.clone() else {
            continue;
        };
        let exists = client
            .get_persistent_volume_claim(&namespace, &claim_ref.name)
            .await
            .map_err(|e| e.to_string())?
            .is_some();
        if !exists {
            pv.status.phase = PvPhase::Available;
            pv.status.claim_ref = None;
            if let Err(err) = client.update_persistent_volume(&pv.meta.name.clone(), &pv).await {
                tracing::warn!(pv = %pv.meta.name, %err, "failed to release orphaned volume");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_model::PersistentVolumeClaimSpec;

    fn pvc(storage_class: StorageClass, capacity_bytes: u64, volume_name: &str) -> PersistentVolumeClaim {
        PersistentVolumeClaim::new(
            ObjectMeta::new("pvc1", Some("default".into())),
            PersistentVolumeClaimSpec {
                capacity_bytes,
                storage_class,
                volume_name: volume_name.to_string(),
            },
        )
    }

    #[test]
    fn generates_hostpath_backing_under_namespaced_root() {
        let config = PvProvisionerConfig::default();
        let claim = pvc(StorageClass::HostPath, 1 << 30, "pv1");
        let spec = generate_pv_spec(&claim, &config);
        match spec.backing {
            PvBacking::HostPath { path } => assert_eq!(path, "/var/lib/flotilla/volumes/default/pv1"),
            other => panic!("expected hostPath backing, got {other:?}"),
        }
        assert_eq!(spec.capacity_bytes, 1 << 30);
    }

    #[test]
    fn generates_nfs_backing_under_export_root() {
        let config = PvProvisionerConfig::default();
        let claim = pvc(StorageClass::Nfs, 1 << 30, "pv2");
        let spec = generate_pv_spec(&claim, &config);
        match spec.backing {
            PvBacking::Nfs { server, path } => {
                assert_eq!(server, "nfs.flotilla.internal");
                assert_eq!(path, "/export/flotilla/default/pv2");
            }
            other => panic!("expected nfs backing, got {other:?}"),
        }
    }
}
