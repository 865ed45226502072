/// Cluster-wide roots a dynamically-provisioned PV's backing path is derived
/// from (spec.md §4.5: "hostPath path rooted at a namespaced convention, or
/// nfs path under the configured export root"). Set from `cmd/apiserver` CLI
/// flags.
#[derive(Debug, Clone)]
pub struct PvProvisionerConfig {
    pub hostpath_root: String,
    pub nfs_server: String,
    pub nfs_export_root: String,
}

impl Default for PvProvisionerConfig {
    fn default() -> Self {
        Self {
            hostpath_root: "/var/lib/flotilla/volumes".to_string(),
            nfs_server: "nfs.flotilla.internal".to_string(),
            nfs_export_root: "/export/flotilla".to_string(),
        }
    }
}
