use std::collections::BTreeSet;

use flotilla_service_controller::ProxyEndpoint;

/// Stable chain name for one Service, grounded on
/// `original_source/pkg/network/serviceProxy.py`'s
/// `KUBE-SVC-{SERVICE_NAME}` naming (uppercased, dashes to underscores).
pub fn service_chain_name(service_name: &str) -> String {
    format!("FLOTILLA-SVC-{}", sanitize(service_name))
}

/// Unlike the original's randomly-hashed `KUBE-SEP-<10 random chars>` names,
/// this chain name is a pure function of the endpoint's address — so the
/// delta algorithm below can recompute "does this endpoint already have a
/// chain" without keeping a side table of hash assignments, and chain names
/// survive an agent restart.
pub fn endpoint_chain_name(endpoint: &ProxyEndpoint) -> String {
    format!("FLOTILLA-SEP-{}-{}", sanitize(&endpoint.ip), endpoint.port)
}

fn sanitize(value: &str) -> String {
    value.to_uppercase().replace(['-', '.', ':'], "_")
}

/// `added = new - old`, `removed = old - new` (spec.md §4.4 "endpoint-delta
/// algorithm").
pub fn diff_endpoints(old: &[ProxyEndpoint], new: &[ProxyEndpoint]) -> (Vec<ProxyEndpoint>, Vec<ProxyEndpoint>) {
    let old_set: BTreeSet<(String, u16)> = old.iter().map(|e| (e.ip.clone(), e.port)).collect();
    let new_set: BTreeSet<(String, u16)> = new.iter().map(|e| (e.ip.clone(), e.port)).collect();

    let added = new.iter().filter(|e| !old_set.contains(&(e.ip.clone(), e.port))).cloned().collect();
    let removed = old.iter().filter(|e| !new_set.contains(&(e.ip.clone(), e.port))).cloned().collect();
    (added, removed)
}

/// True when the change touches more than half the old endpoint set, per
/// spec.md §4.4: "If the change touches more than half the endpoints, rebuild
/// from scratch". An empty old set always counts as "rebuild" (there is
/// nothing incremental to do).
pub fn should_rebuild(old_len: usize, added: usize, removed: usize) -> bool {
    if old_len == 0 {
        return true;
    }
    (added + removed) as f64 > old_len as f64 / 2.0
}

/// Per-rule jump probabilities for N endpoint chains walked in reverse: the
/// last chain is unconditional, each earlier chain `i` (0-indexed) jumps with
/// probability `1/(N-i)` (spec.md §4.4). Returned in the same front-to-back
/// order as the input chains; the caller programs them in reverse so the
/// unconditional jump is installed last (first to match in iptables'
/// top-to-bottom evaluation once chain order is reversed for matching... the
/// NAT backend is responsible for the actual insertion order).
pub fn load_balancing_probabilities(endpoint_count: usize) -> Vec<Option<f64>> {
    (0..endpoint_count)
        .map(|i| if i == endpoint_count - 1 { None } else { Some(1.0 / (endpoint_count - i) as f64) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(ip: &str, port: u16) -> ProxyEndpoint {
        ProxyEndpoint { ip: ip.to_string(), port }
    }

    #[test]
    fn diff_computes_added_and_removed() {
        let old = vec![ep("10.1.0.1", 80), ep("10.1.0.2", 80)];
        let new = vec![ep("10.1.0.2", 80), ep("10.1.0.3", 80)];
        let (added, removed) = diff_endpoints(&old, &new);
        assert_eq!(added, vec![ep("10.1.0.3", 80)]);
        assert_eq!(removed, vec![ep("10.1.0.1", 80)]);
    }

    #[test]
    fn small_change_is_incremental() {
        assert!(!should_rebuild(10, 1, 0));
    }

    #[test]
    fn large_change_triggers_rebuild() {
        assert!(should_rebuild(4, 2, 1));
    }

    #[test]
    fn empty_old_set_always_rebuilds() {
        assert!(should_rebuild(0, 3, 0));
    }

    #[test]
    fn probabilities_yield_uniform_distribution() {
        let probs = load_balancing_probabilities(3);
        assert_eq!(probs, vec![Some(1.0 / 3.0), Some(1.0 / 2.0), None]);
    }

    #[test]
    fn chain_names_are_stable_and_distinct() {
        assert_eq!(service_chain_name("web"), service_chain_name("web"));
        assert_ne!(endpoint_chain_name(&ep("10.1.0.1", 80)), endpoint_chain_name(&ep("10.1.0.2", 80)));
    }
}
