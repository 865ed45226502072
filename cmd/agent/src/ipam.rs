use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Mutex;

/// Base of this node's overlay subnet. Unlike `flotilla_service::ipam`'s
/// cluster-wide ClusterIP range, this allocator is deliberately per-node and
/// uncoordinated (spec.md §5: "Overlay IP allocator: per node; not shared
/// cross-node") — each node agent only ever sees its own Pods, so collisions
/// across nodes are accepted as out of scope for this system.
const OVERLAY_BASE: u32 = 0x0AF4_0000; // 10.244.0.0
const OVERLAY_RANGE_SIZE: u32 = 1 << 16;

fn allocate_in_range(used: &BTreeSet<Ipv4Addr>, base: u32, size: u32) -> Option<Ipv4Addr> {
    (1..size)
        .map(|offset| Ipv4Addr::from(base + offset))
        .find(|candidate| !used.contains(candidate))
}

/// Tracks overlay IPs handed out to Pods scheduled on this node.
#[derive(Default)]
pub struct OverlayIpAllocator {
    used: Mutex<BTreeSet<Ipv4Addr>>,
}

impl OverlayIpAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> Option<Ipv4Addr> {
        let mut used = self.used.lock().expect("ipam lock poisoned");
        let ip = allocate_in_range(&used, OVERLAY_BASE, OVERLAY_RANGE_SIZE)?;
        used.insert(ip);
        Some(ip)
    }

    pub fn release(&self, ip: Ipv4Addr) {
        self.used.lock().expect("ipam lock poisoned").remove(&ip);
    }

    /// Reclaims the address on startup if it already appeared in the API's
    /// Pod table for this node (e.g. agent restart), so it isn't handed out
    /// to a second Pod.
    pub fn reserve(&self, ip: Ipv4Addr) {
        self.used.lock().expect("ipam lock poisoned").insert(ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_free_address() {
        let allocator = OverlayIpAllocator::new();
        assert_eq!(allocator.allocate(), Some(Ipv4Addr::new(10, 244, 0, 1)));
        assert_eq!(allocator.allocate(), Some(Ipv4Addr::new(10, 244, 0, 2)));
    }

    #[test]
    fn released_addresses_are_reused() {
        let allocator = OverlayIpAllocator::new();
        let first = allocator.allocate().unwrap();
        allocator.release(first);
        assert_eq!(allocator.allocate(), Some(first));
    }

    #[test]
    fn reserved_addresses_are_not_handed_out() {
        let allocator = OverlayIpAllocator::new();
        allocator.reserve(Ipv4Addr::new(10, 244, 0, 1));
        assert_eq!(allocator.allocate(), Some(Ipv4Addr::new(10, 244, 0, 2)));
    }
}
