use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

/// Publishes a DNS record's resolved `host -> ip` mappings to the
/// cluster-local resolver, "treated as an external sink" (spec.md §2, §4.5
/// DNSController). Kept behind a narrow trait like the other backend seams
/// in this workspace (`NatBackend`, `StorageBackend`, `MountBackend`).
#[async_trait]
pub trait ResolverSink: Send + Sync {
    async fn publish(&self, record: &str, resolved: &BTreeMap<String, String>) -> Result<(), String>;
}

/// Logs the resolver update it would issue; the default when no real local
/// resolver is configured.
pub struct SimulatedResolverSink;

#[async_trait]
impl ResolverSink for SimulatedResolverSink {
    async fn publish(&self, record: &str, resolved: &BTreeMap<String, String>) -> Result<(), String> {
        tracing::info!(%record, ?resolved, "simulated resolver publish");
        Ok(())
    }
}

/// Writes each record's mappings into its own hosts-file-style fragment under
/// a directory a local resolver (e.g. dnsmasq's `--hostsdir`) watches.
pub struct HostsFileResolverSink {
    directory: PathBuf,
}

impl HostsFileResolverSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    fn path_for(&self, record: &str) -> PathBuf {
        self.directory.join(format!("{record}.hosts"))
    }
}

#[async_trait]
impl ResolverSink for HostsFileResolverSink {
    async fn publish(&self, record: &str, resolved: &BTreeMap<String, String>) -> Result<(), String> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| format!("failed to create resolver hostsdir: {e}"))?;
        let mut contents = String::new();
        for (host, ip) in resolved {
            contents.push_str(ip);
            contents.push(' ');
            contents.push_str(host);
            contents.push('\n');
        }
        tokio::fs::write(self.path_for(record), contents)
            .await
            .map_err(|e| format!("failed to write hosts fragment for {record}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_one_line_per_host_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let sink = HostsFileResolverSink::new(dir.path());
        let mut resolved = BTreeMap::new();
        resolved.insert("api.svc.cluster.local".to_string(), "10.96.0.1".to_string());
        sink.publish("dns1", &resolved).await.unwrap();
        let contents = tokio::fs::read_to_string(dir.path().join("dns1.hosts")).await.unwrap();
        assert_eq!(contents, "10.96.0.1 api.svc.cluster.local\n");
    }
}
