use std::collections::BTreeMap;

use flotilla_api_client::FlotillaClient;
use flotilla_model::{Dns, Kind, ObjectKey};

use crate::sink::ResolverSink;

pub async fn list_targets(client: &FlotillaClient) -> Result<Vec<ObjectKey>, String> {
    let all: Vec<Dns> = client.list_all("dns").await.map_err(|e| e.to_string())?;
    Ok(all
        .into_iter()
        .map(|dns| ObjectKey::namespaced(Kind::Dns, dns.meta.namespace.unwrap_or_default(), dns.meta.name))
        .collect())
}

/// `"namespace/name"` -> `(namespace, name)`, the path format spec.md §3's DNS
/// row documents for `host_mappings` values.
fn split_service_path(path: &str) -> Option<(&str, &str)> {
    path.split_once('/')
}

pub async fn reconcile(client: &FlotillaClient, sink: &dyn ResolverSink, key: &ObjectKey) -> Result<(), String> {
    let namespace = key.namespace.clone().ok_or("DNS record must be namespaced")?;

    let mut dns = match client.get_dns(&namespace, &key.name).await.map_err(|e| e.to_string())? {
        Some(dns) => dns,
        None => return Ok(()),
    };

    let mut resolved = BTreeMap::new();
    for (host, service_path) in &dns.spec.host_mappings {
        let Some((svc_ns, svc_name)) = split_service_path(service_path) else {
            tracing::warn!(%host, %service_path, "malformed service path, expected namespace/name");
            continue;
        };
        match client.get_service(svc_ns, svc_name).await.map_err(|e| e.to_string())? {
            Some(service) => {
                if let Some(cluster_ip) = service.status.cluster_ip {
                    resolved.insert(host.clone(), cluster_ip);
                }
            }
            None => tracing::warn!(%host, %service_path, "referenced service does not exist"),
        }
    }

    sink.publish(&key.name, &resolved).await?;

    dns.status.resolved = resolved;
    client
        .update_dns(&namespace, &key.name, &dns)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_namespace_and_name() {
        assert_eq!(split_service_path("default/svc1"), Some(("default", "svc1")));
        assert_eq!(split_service_path("no-slash"), None);
    }
}
