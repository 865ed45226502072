use async_trait::async_trait;
use flotilla_model::Protocol;

/// Where a Service's dispatch rule lives in the services chain: matched on
/// ClusterIP+port, or (for `type=NodePort`) on `dport` alone with no address
/// constraint (spec.md §4.4).
#[derive(Debug, Clone)]
pub enum DispatchMatch {
    ClusterIp { ip: String, port: u16, protocol: Protocol },
    NodePort { port: u16, protocol: Protocol },
}

/// The node agent's NAT-programming collaborator — narrow trait + simulation
/// fallback, same shape as `ContainerEngine`/`StorageBackend`/`ResolverSink`
/// elsewhere in this workspace (spec.md §9: "keep these behind a narrow
/// interface with a simulation implementation for hosts lacking the kernel
/// features").
#[async_trait]
pub trait NatBackend: Send + Sync {
    /// Idempotently ensures the mark/postrouting/services root chains exist
    /// and are linked from the kernel's NAT hooks (spec.md §4.4).
    async fn ensure_base_chains(&self) -> Result<(), String>;

    async fn create_chain(&self, chain: &str) -> Result<(), String>;

    /// Flushes and deletes a chain (safe to call on a chain with no rules).
    async fn delete_chain(&self, chain: &str) -> Result<(), String>;

    /// DNATs to `endpoint_ip:endpoint_port` and marks the source for
    /// hairpin SNAT, inside `chain` (spec.md §4.4, per-endpoint chain).
    async fn program_endpoint(
        &self,
        chain: &str,
        endpoint_ip: &str,
        endpoint_port: u16,
        protocol: Protocol,
    ) -> Result<(), String>;

    /// Flushes `service_chain` and rewrites the probabilistic dispatch rules
    /// over `endpoint_chains`, in the order given (spec.md §4.4: "walk
    /// endpoint chains in reverse; the last is an unconditional jump; each
    /// earlier rule jumps with probability `1/(N-i)`").
    async fn program_load_balancing(&self, service_chain: &str, endpoint_chains: &[String]) -> Result<(), String>;

    /// Inserts the mark+jump pair in the services chain for one dispatch
    /// match, pointing at `service_chain`.
    async fn insert_dispatch_rule(&self, service_name: &str, service_chain: &str, rule: &DispatchMatch) -> Result<(), String>;

    /// Removes a dispatch match's mark+jump pair, draining duplicates
    /// (spec.md §4.4: "removes the jump and mark rules... draining any
    /// duplicates").
    async fn remove_dispatch_rule(&self, service_name: &str, service_chain: &str, rule: &DispatchMatch) -> Result<(), String>;
}

/// Logs every intended command instead of driving the kernel's NAT tables —
/// the default, and the only backend on hosts lacking the kernel facility
/// (spec.md §4.4: "Platforms lacking the kernel facility run in a no-op
/// simulation mode that logs each intended command").
pub struct SimulatedNat;

#[async_trait]
impl NatBackend for SimulatedNat {
    async fn ensure_base_chains(&self) -> Result<(), String> {
        tracing::info!("simulated: ensure base NAT chains (mark/postrouting/services)");
        Ok(())
    }

    async fn create_chain(&self, chain: &str) -> Result<(), String> {
        tracing::info!(%chain, "simulated: create chain");
        Ok(())
    }

    async fn delete_chain(&self, chain: &str) -> Result<(), String> {
        tracing::info!(%chain, "simulated: flush and delete chain");
        Ok(())
    }

    async fn program_endpoint(&self, chain: &str, endpoint_ip: &str, endpoint_port: u16, protocol: Protocol) -> Result<(), String> {
        tracing::info!(%chain, %endpoint_ip, endpoint_port, ?protocol, "simulated: program endpoint DNAT+mark rules");
        Ok(())
    }

    async fn program_load_balancing(&self, service_chain: &str, endpoint_chains: &[String]) -> Result<(), String> {
        tracing::info!(%service_chain, endpoints = endpoint_chains.len(), "simulated: program load-balancing rules");
        Ok(())
    }

    async fn insert_dispatch_rule(&self, service_name: &str, service_chain: &str, rule: &DispatchMatch) -> Result<(), String> {
        tracing::info!(%service_name, %service_chain, ?rule, "simulated: insert dispatch rule");
        Ok(())
    }

    async fn remove_dispatch_rule(&self, service_name: &str, service_chain: &str, rule: &DispatchMatch) -> Result<(), String> {
        tracing::info!(%service_name, %service_chain, ?rule, "simulated: remove dispatch rule");
        Ok(())
    }
}

/// Drives real Linux `iptables`, grounded line-for-line on
/// `original_source/pkg/network/serviceProxy.py`'s chain/rule shapes (base
/// chain names, `DNAT`/`MARK 0x4000/0x4000`/`MASQUERADE`, comment tags per
/// rule for safe deletion).
pub struct IptablesNat {
    pub mark_chain: String,
    pub postrouting_chain: String,
    pub services_chain: String,
}

impl Default for IptablesNat {
    fn default() -> Self {
        Self {
            mark_chain: "FLOTILLA-MARK-MASQ".to_string(),
            postrouting_chain: "FLOTILLA-POSTROUTING".to_string(),
            services_chain: "FLOTILLA-SERVICES".to_string(),
        }
    }
}

impl IptablesNat {
    async fn run(&self, args: &[&str]) -> Result<(), String> {
        let output = tokio::process::Command::new("iptables")
            .args(args)
            .output()
            .await
            .map_err(|e| format!("failed to invoke iptables: {e}"))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).into_owned())
        }
    }

    async fn run_ignoring_errors(&self, args: &[&str]) {
        let _ = self.run(args).await;
    }

    fn protocol_str(protocol: Protocol) -> &'static str {
        match protocol {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

#[async_trait]
impl NatBackend for IptablesNat {
    async fn ensure_base_chains(&self) -> Result<(), String> {
        self.run_ignoring_errors(&["-t", "nat", "-N", &self.mark_chain]).await;
        self.run_ignoring_errors(&["-t", "nat", "-N", &self.postrouting_chain]).await;
        self.run_ignoring_errors(&["-t", "nat", "-N", &self.services_chain]).await;

        self.run_ignoring_errors(&["-t", "nat", "-A", &self.mark_chain, "-j", "MARK", "--set-xmark", "0x4000/0x4000"]).await;
        self.run_ignoring_errors(&[
            "-t", "nat", "-A", &self.postrouting_chain, "-m", "mark", "--mark", "0x4000/0x4000", "-j", "MASQUERADE",
        ])
        .await;

        self.run_ignoring_errors(&["-t", "nat", "-C", "PREROUTING", "-j", &self.services_chain]).await;
        self.run_ignoring_errors(&["-t", "nat", "-I", "PREROUTING", "1", "-j", &self.services_chain]).await;
        self.run_ignoring_errors(&["-t", "nat", "-C", "OUTPUT", "-j", &self.services_chain]).await;
        self.run_ignoring_errors(&["-t", "nat", "-I", "OUTPUT", "1", "-j", &self.services_chain]).await;
        self.run_ignoring_errors(&["-t", "nat", "-C", "POSTROUTING", "-j", &self.postrouting_chain]).await;
        self.run_ignoring_errors(&["-t", "nat", "-I", "POSTROUTING", "1", "-j", &self.postrouting_chain]).await;
        Ok(())
    }

    async fn create_chain(&self, chain: &str) -> Result<(), String> {
        self.run_ignoring_errors(&["-t", "nat", "-N", chain]).await;
        Ok(())
    }

    async fn delete_chain(&self, chain: &str) -> Result<(), String> {
        self.run_ignoring_errors(&["-t", "nat", "-F", chain]).await;
        self.run_ignoring_errors(&["-t", "nat", "-X", chain]).await;
        Ok(())
    }

    async fn program_endpoint(&self, chain: &str, endpoint_ip: &str, endpoint_port: u16, protocol: Protocol) -> Result<(), String> {
        let proto = Self::protocol_str(protocol);
        let destination = format!("{endpoint_ip}:{endpoint_port}");
        self.run(&["-t", "nat", "-A", chain, "-p", proto, "-j", "DNAT", "--to-destination", &destination]).await?;
        let source = format!("{endpoint_ip}/32");
        self.run(&["-t", "nat", "-A", chain, "-s", &source, "-j", &self.mark_chain]).await
    }

    async fn program_load_balancing(&self, service_chain: &str, endpoint_chains: &[String]) -> Result<(), String> {
        self.run_ignoring_errors(&["-t", "nat", "-F", service_chain]).await;

        let count = endpoint_chains.len();
        for (i, chain) in endpoint_chains.iter().enumerate() {
            if i == count - 1 {
                self.run(&["-t", "nat", "-A", service_chain, "-j", chain]).await?;
            } else {
                let probability = format!("{:.6}", 1.0 / (count - i) as f64);
                self.run(&[
                    "-t", "nat", "-A", service_chain, "-m", "statistic", "--mode", "random", "--probability", &probability,
                    "-j", chain,
                ])
                .await?;
            }
        }
        Ok(())
    }

    async fn insert_dispatch_rule(&self, service_name: &str, service_chain: &str, rule: &DispatchMatch) -> Result<(), String> {
        let comment = format!("{service_name} dispatch");
        match rule {
            DispatchMatch::ClusterIp { ip, port, protocol } => {
                let proto = Self::protocol_str(*protocol);
                let dest = format!("{ip}/32");
                let port_str = port.to_string();
                self.run(&[
                    "-t", "nat", "-I", &self.services_chain, "1", "-d", &dest, "-p", proto, "--dport", &port_str, "-j",
                    &self.mark_chain, "-m", "comment", "--comment", &comment,
                ])
                .await?;
                self.run(&[
                    "-t", "nat", "-I", &self.services_chain, "2", "-d", &dest, "-p", proto, "--dport", &port_str, "-j",
                    service_chain, "-m", "comment", "--comment", &comment,
                ])
                .await
            }
            DispatchMatch::NodePort { port, protocol } => {
                let proto = Self::protocol_str(*protocol);
                let port_str = port.to_string();
                self.run(&[
                    "-t", "nat", "-I", &self.services_chain, "1", "-p", proto, "--dport", &port_str, "-j", &self.mark_chain,
                    "-m", "comment", "--comment", &comment,
                ])
                .await?;
                self.run(&[
                    "-t", "nat", "-I", &self.services_chain, "2", "-p", proto, "--dport", &port_str, "-j", service_chain,
                    "-m", "comment", "--comment", &comment,
                ])
                .await
            }
        }
    }

    async fn remove_dispatch_rule(&self, service_name: &str, service_chain: &str, rule: &DispatchMatch) -> Result<(), String> {
        let comment = format!("{service_name} dispatch");
        let (mark_args, jump_args): (Vec<String>, Vec<String>) = match rule {
            DispatchMatch::ClusterIp { ip, port, protocol } => {
                let proto = Self::protocol_str(*protocol).to_string();
                let dest = format!("{ip}/32");
                let port_str = port.to_string();
                (
                    vec!["-d".into(), dest.clone(), "-p".into(), proto.clone(), "--dport".into(), port_str.clone(), "-j".into(), self.mark_chain.clone()],
                    vec!["-d".into(), dest, "-p".into(), proto, "--dport".into(), port_str, "-j".into(), service_chain.to_string()],
                )
            }
            DispatchMatch::NodePort { port, protocol } => {
                let proto = Self::protocol_str(*protocol).to_string();
                let port_str = port.to_string();
                (
                    vec!["-p".into(), proto.clone(), "--dport".into(), port_str.clone(), "-j".into(), self.mark_chain.clone()],
                    vec!["-p".into(), proto, "--dport".into(), port_str, "-j".into(), service_chain.to_string()],
                )
            }
        };

        for args in [mark_args, jump_args] {
            loop {
                let mut full = vec!["-t".to_string(), "nat".to_string(), "-D".to_string(), self.services_chain.clone()];
                full.extend(args.clone());
                full.extend(["-m".to_string(), "comment".to_string(), "--comment".to_string(), comment.clone()]);
                let refs: Vec<&str> = full.iter().map(String::as_str).collect();
                if self.run(&refs).await.is_err() {
                    break;
                }
            }
        }
        Ok(())
    }
}
