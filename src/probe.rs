//! Reachability probes.
//!
//! Every probe answers a yes/no question about one address within a deadline.
//! Failures of any kind (timeout, unreachable, missing tool, bad address) are
//! reported as `false`, never as errors.
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpStream, UdpSocket};
use tokio::process::Command;
use tokio::time;
use tracing::debug;

/// Time given to the kernel to resolve a neighbor after the trigger datagram.
const ARP_SETTLE: Duration = Duration::from_millis(200);

#[async_trait]
pub trait Probe: Send + Sync {
    /// Label used in results, e.g. `PING` or `TCP:443`.
    fn method(&self) -> String;

    /// Resolve to `true` if `address` answered before `deadline` elapsed.
    async fn probe(&self, address: &str, deadline: Duration) -> bool;
}

/// ARP, PING, then one TCP probe per port.
pub fn standard_probes(ports: &[u16]) -> Vec<Arc<dyn Probe>> {
    let mut probes: Vec<Arc<dyn Probe>> = vec![Arc::new(ArpProbe), Arc::new(PingProbe)];
    probes.extend(
        ports
            .iter()
            .map(|&port| Arc::new(TcpProbe::new(port)) as Arc<dyn Probe>),
    );
    probes
}

/// Link-layer neighbor resolution via the system neighbor table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArpProbe;

#[async_trait]
impl Probe for ArpProbe {
    fn method(&self) -> String {
        "ARP".to_string()
    }

    async fn probe(&self, address: &str, deadline: Duration) -> bool {
        let Ok(ip) = address.parse::<IpAddr>() else {
            return false;
        };
        time::timeout(deadline, async {
            trigger_resolution(ip).await;
            time::sleep(ARP_SETTLE).await;
            query_neighbor_table(ip).await
        })
        .await
        .unwrap_or(false)
    }
}

/// Send one empty datagram so the kernel has to resolve the neighbor.
async fn trigger_resolution(ip: IpAddr) {
    let bind = if ip.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    if let Ok(sock) = UdpSocket::bind(bind).await {
        let _ = sock.send_to(&[], SocketAddr::new(ip, 1)).await;
    }
}

async fn query_neighbor_table(ip: IpAddr) -> bool {
    let flag = if cfg!(target_os = "windows") { "-a" } else { "-n" };
    let output = Command::new("arp")
        .arg(flag)
        .arg(ip.to_string())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;
    match output {
        Ok(out) if out.status.success() => has_neighbor_entry(&String::from_utf8_lossy(&out.stdout)),
        Ok(_) => false,
        Err(e) => {
            debug!(%ip, error = %e, "arp query failed");
            false
        }
    }
}

/// True when `arp` output holds a resolved entry (a MAC-looking token).
pub fn has_neighbor_entry(output: &str) -> bool {
    const MISSING: &[&str] = &["no entry", "incomplete", "no match"];
    if MISSING.iter().any(|m| output.contains(m)) {
        return false;
    }
    output.contains(':') || output.contains('-')
}

/// One ICMP echo request through the system `ping` utility.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingProbe;

#[async_trait]
impl Probe for PingProbe {
    fn method(&self) -> String {
        "PING".to_string()
    }

    async fn probe(&self, address: &str, deadline: Duration) -> bool {
        let status = Command::new("ping")
            .args(ping_args(address, deadline))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        match time::timeout(deadline, status).await {
            Ok(Ok(st)) => st.success(),
            Ok(Err(e)) => {
                debug!(address, error = %e, "ping could not be spawned");
                false
            }
            Err(_) => false,
        }
    }
}

/// Arguments for a single echo request with the platform's wait flag.
pub fn ping_args(address: &str, deadline: Duration) -> Vec<String> {
    let millis = deadline.as_millis().max(1).to_string();
    if cfg!(target_os = "windows") {
        vec!["-n".into(), "1".into(), "-w".into(), millis, address.into()]
    } else if cfg!(target_os = "macos") {
        vec!["-c".into(), "1".into(), "-W".into(), millis, address.into()]
    } else {
        // Linux takes whole seconds.
        let secs = deadline.as_millis().div_ceil(1000).max(1).to_string();
        vec!["-c".into(), "1".into(), "-W".into(), secs, address.into()]
    }
}

/// TCP connect on one port. A refused connection still proves the host is there.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    port: u16,
}

impl TcpProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn method(&self) -> String {
        format!("TCP:{}", self.port)
    }

    async fn probe(&self, address: &str, deadline: Duration) -> bool {
        let Ok(ip) = address.parse::<IpAddr>() else {
            return false;
        };
        let addr = SocketAddr::new(ip, self.port);
        match time::timeout(deadline, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => {
                debug!(%addr, "connection accepted");
                true
            }
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                debug!(%addr, "connection refused");
                true
            }
            Ok(Err(_)) | Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn standard_set_labels() {
        let labels: Vec<String> = standard_probes(&[80, 443]).iter().map(|p| p.method()).collect();
        assert_eq!(labels, vec!["ARP", "PING", "TCP:80", "TCP:443"]);
    }

    #[test]
    fn neighbor_entry_detection() {
        let linux = "Address HWtype HWaddress Flags Mask Iface\n\
                     192.168.1.1 ether aa:bb:cc:dd:ee:ff C eth0\n";
        assert!(has_neighbor_entry(linux));
        assert!(has_neighbor_entry("  192.168.1.1   aa-bb-cc-dd-ee-ff   dynamic"));
        assert!(!has_neighbor_entry("192.168.1.9 (192.168.1.9) -- no entry"));
        assert!(!has_neighbor_entry("? (192.168.1.9) at (incomplete) on en0"));
        assert!(!has_neighbor_entry("No ARP Entries Found."));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_ping_waits_whole_seconds() {
        assert_eq!(
            ping_args("10.0.0.1", Duration::from_millis(1500)),
            vec!["-c", "1", "-W", "2", "10.0.0.1"]
        );
        assert_eq!(ping_args("10.0.0.1", Duration::from_millis(200))[3], "1");
    }

    #[tokio::test]
    async fn tcp_accepted_is_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = TcpProbe::new(port);
        assert!(probe.probe("127.0.0.1", Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn tcp_refused_is_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let probe = TcpProbe::new(port);
        assert!(probe.probe("127.0.0.1", Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn tcp_silence_is_failure() {
        // TEST-NET-1 is never routed, so the connect either times out or is unreachable.
        let probe = TcpProbe::new(80);
        assert!(!probe.probe("192.0.2.1", Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn malformed_address_is_failure() {
        assert!(!TcpProbe::new(80).probe("not-an-ip", Duration::from_millis(100)).await);
        assert!(!ArpProbe.probe("not-an-ip", Duration::from_millis(100)).await);
    }
}
