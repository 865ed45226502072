use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use flotilla_api_client::FlotillaClient;
use flotilla_model::{PodSpec, PvBacking};

/// Host-side mount driver, the same "narrow interface + simulation fallback"
/// shape as `ContainerEngine`. `MountBackend::mount` is expected to be
/// idempotent from the caller's perspective — `VolumeResolver` memoizes so it
/// is only ever called once per mount point, mirroring the original
/// `VolumeResolver`'s `self.mounted_nfs_volumes` dict
/// (`original_source/pkg/kubelet/volumeResolver.py`).
#[async_trait]
pub trait MountBackend: Send + Sync {
    async fn mount_nfs(&self, server: &str, export_path: &str, mount_point: &str) -> Result<(), String>;
    async fn unmount(&self, mount_point: &str) -> Result<(), String>;
}

/// Shells out to `mount`/`umount`, the Linux branch of the original
/// `_mount_nfs_volume`/`cleanup_volumes`. Falls back to a metadata-only marker
/// directory when the host has no NFS client (SPEC_FULL.md §4.6) — the
/// original's non-Linux/Darwin branch "still returns the mount point... but
/// doesn't actually mount".
pub struct NfsMount {
    pub mounts_root: PathBuf,
}

#[async_trait]
impl MountBackend for NfsMount {
    async fn mount_nfs(&self, server: &str, export_path: &str, mount_point: &str) -> Result<(), String> {
        tokio::fs::create_dir_all(mount_point)
            .await
            .map_err(|e| format!("failed to create NFS mount point {mount_point}: {e}"))?;

        let output = tokio::process::Command::new("mount")
            .args(["-t", "nfs", &format!("{server}:{export_path}"), mount_point])
            .output()
            .await;

        match output {
            Ok(result) if result.status.success() => Ok(()),
            Ok(result) => {
                let stderr = String::from_utf8_lossy(&result.stderr);
                tracing::warn!(
                    %mount_point, %stderr,
                    "native NFS mount failed, falling back to metadata-only marker"
                );
                self.write_fallback_marker(mount_point, server, export_path).await
            }
            Err(e) => {
                tracing::warn!(
                    %mount_point, error = %e,
                    "no mount(8) available, falling back to metadata-only marker"
                );
                self.write_fallback_marker(mount_point, server, export_path).await
            }
        }
    }

    async fn unmount(&self, mount_point: &str) -> Result<(), String> {
        let output = tokio::process::Command::new("umount").arg(mount_point).output().await;
        match output {
            Ok(result) if result.status.success() => Ok(()),
            _ => {
                tracing::debug!(%mount_point, "umount failed or not mounted natively, ignoring");
                Ok(())
            }
        }
    }
}

impl NfsMount {
    async fn write_fallback_marker(&self, mount_point: &str, server: &str, export_path: &str) -> Result<(), String> {
        let marker = PathBuf::from(mount_point).join(".flotilla-nfs-marker");
        let contents = format!("server={server}\npath={export_path}\n");
        tokio::fs::write(&marker, contents)
            .await
            .map_err(|e| format!("failed to write NFS fallback marker at {mount_point}: {e}"))
    }
}

/// Resolves a Pod's declared volumes to host paths, grounded on
/// `original_source/pkg/kubelet/volumeResolver.py`: only PVC-backed volumes
/// are supported; hostPath PVs resolve directly to their `path`; nfs PVs
/// mount `server:path` under `mounts_root/<pv_name>`, once per node.
pub struct VolumeResolver {
    client: FlotillaClient,
    backend: Box<dyn MountBackend>,
    mounts_root: PathBuf,
    /// Mirrors the original's `self.mounted_nfs_volumes`: mount point ->
    /// refcount of Pods currently using it, so a shared PV is unmounted only
    /// once its last user is gone.
    mounted: Mutex<HashMap<String, usize>>,
}

impl VolumeResolver {
    pub fn new(client: FlotillaClient, backend: Box<dyn MountBackend>, mounts_root: PathBuf) -> Self {
        Self { client, backend, mounts_root, mounted: Mutex::new(HashMap::new()) }
    }

    /// Resolves every PVC volume referenced by `spec.volumes` to a host path,
    /// keyed by volume name so `ContainerSpec::volume_mounts` can look them
    /// up. Unsupported or unresolvable volumes are skipped with a warning
    /// (matching the original's `print` + continue behavior), not a hard
    /// error — a Pod with one bad volume mount still gets the others.
    pub async fn resolve_volumes(&self, spec: &PodSpec, namespace: &str) -> HashMap<String, String> {
        let mut resolved = HashMap::new();
        for volume in &spec.volumes {
            match self.resolve_pvc(&volume.claim_name, namespace).await {
                Ok(Some(path)) => {
                    tracing::info!(pvc = %volume.claim_name, %path, "resolved PVC");
                    resolved.insert(volume.name.clone(), path);
                }
                Ok(None) => {
                    tracing::error!(pvc = %volume.claim_name, %namespace, "failed to resolve PVC");
                }
                Err(e) => {
                    tracing::error!(pvc = %volume.claim_name, %namespace, error = %e, "failed to resolve PVC");
                }
            }
        }
        resolved
    }

    async fn resolve_pvc(&self, pvc_name: &str, namespace: &str) -> Result<Option<String>, String> {
        let pvc = match self
            .client
            .get_persistent_volume_claim(namespace, pvc_name)
            .await
            .map_err(|e| e.to_string())?
        {
            Some(pvc) => pvc,
            None => return Ok(None),
        };

        if pvc.status.phase != flotilla_model::PvcPhase::Bound {
            tracing::error!(%pvc_name, "PVC is not bound to any PV");
            return Ok(None);
        }

        let pv_name = &pvc.spec.volume_name;
        let pv = match self.client.get_persistent_volume(pv_name).await.map_err(|e| e.to_string())? {
            Some(pv) => pv,
            None => {
                tracing::error!(%pv_name, "PV not found");
                return Ok(None);
            }
        };

        match &pv.spec.backing {
            PvBacking::HostPath { path } => Ok(Some(path.clone())),
            PvBacking::Nfs { server, path } => self.mount_nfs(server, path, pv_name).await.map(Some),
        }
    }

    async fn mount_nfs(&self, server: &str, export_path: &str, pv_name: &str) -> Result<String, String> {
        let mount_point = self.mounts_root.join(pv_name).to_string_lossy().into_owned();

        let already_mounted = {
            let mut mounted = self.mounted.lock().expect("volume resolver lock poisoned");
            let count = mounted.entry(mount_point.clone()).or_insert(0);
            let already = *count > 0;
            *count += 1;
            already
        };
        if already_mounted {
            return Ok(mount_point);
        }

        self.backend.mount_nfs(server, export_path, &mount_point).await?;
        Ok(mount_point)
    }

    /// Releases this Pod's references to any NFS mounts, unmounting once the
    /// last reference is dropped.
    pub async fn release_volumes(&self, mount_points: &[String]) {
        for mount_point in mount_points {
            let should_unmount = {
                let mut mounted = self.mounted.lock().expect("volume resolver lock poisoned");
                match mounted.get_mut(mount_point) {
                    Some(count) if *count > 1 => {
                        *count -= 1;
                        false
                    }
                    Some(_) => {
                        mounted.remove(mount_point);
                        true
                    }
                    None => false,
                }
            };
            if should_unmount {
                if let Err(e) = self.backend.unmount(mount_point).await {
                    tracing::warn!(%mount_point, error = %e, "failed to unmount volume");
                }
            }
        }
    }
}
