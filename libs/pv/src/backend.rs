use async_trait::async_trait;
use flotilla_model::PvBacking;

/// Creates the backing storage for a dynamically-provisioned PV: "local mkdir
/// or remote mkdir via an administrative channel to the nfs host" (spec.md
/// §4.5 PVController). Kept behind a narrow trait the way `cmd/proxy`'s
/// `NatBackend` and the node agent's `MountBackend` are (SPEC_FULL.md §4.6,
/// §9: "keep subprocess invocation behind a narrow interface").
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn provision(&self, backing: &PvBacking) -> Result<(), String>;
}

/// Creates `hostPath` directories on the local filesystem; for `nfs` backing,
/// there is no real administrative channel to an NFS host in this
/// environment, so it logs the mkdir it would issue, matching the volume
/// resolver's no-op simulation fallback (SPEC_FULL.md §4.6).
pub struct LocalStorageBackend;

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn provision(&self, backing: &PvBacking) -> Result<(), String> {
        match backing {
            PvBacking::HostPath { path } => tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| format!("failed to create hostPath directory {path}: {e}")),
            PvBacking::Nfs { server, path } => {
                tracing::info!(%server, %path, "simulated administrative mkdir on nfs host");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn host_path_backing_creates_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pvc-data").to_string_lossy().to_string();
        let backend = LocalStorageBackend;
        backend
            .provision(&PvBacking::HostPath { path: path.clone() })
            .await
            .unwrap();
        assert!(tokio::fs::metadata(&path).await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn nfs_backing_is_simulated_without_error() {
        let backend = LocalStorageBackend;
        backend
            .provision(&PvBacking::Nfs {
                server: "10.0.0.5".into(),
                path: "/export/pvc-data".into(),
            })
            .await
            .unwrap();
    }
}
