use anyhow::{bail, Context, Result};
use ipnet::{IpNet, Ipv4Net};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

/// Expand a CIDR into the addresses worth probing.
///
/// For IPv4 blocks larger than two addresses the network and broadcast
/// addresses are dropped; /31 and /32 keep everything.
/// IPv6 blocks are not expanded and yield an empty list.
pub fn expand_cidr(cidr: IpNet) -> Vec<IpAddr> {
    match cidr {
        IpNet::V4(n4) => expand_ipv4net_hosts(n4)
            .into_iter()
            .map(IpAddr::V4)
            .collect(),
        IpNet::V6(_) => Vec::new(),
    }
}

fn expand_ipv4net_hosts(net: Ipv4Net) -> Vec<Ipv4Addr> {
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    if end - start < 2 {
        return (start..=end).map(Ipv4Addr::from).collect();
    }
    (start + 1..end).map(Ipv4Addr::from).collect()
}

/// Parse one target: a plain IP address or a CIDR block.
pub fn parse_target(s: &str) -> Result<Vec<String>> {
    let s = s.trim();
    if s.contains('/') {
        let net: IpNet = s.parse().with_context(|| format!("invalid CIDR: {s}"))?;
        let ips = expand_cidr(net);
        if ips.is_empty() {
            bail!("CIDR {s} has no scannable IPv4 hosts");
        }
        return Ok(ips.into_iter().map(|ip| ip.to_string()).collect());
    }
    let ip: IpAddr = s.parse().with_context(|| format!("invalid IP address: {s}"))?;
    Ok(vec![ip.to_string()])
}

/// Parse a target list: one IP or CIDR per line, `#` lines and blanks ignored.
///
/// Input order is preserved, duplicates are kept.
pub fn parse_targets_str(s: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for (idx, raw_line) in s.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let ips = parse_target(line).with_context(|| format!("line {}", idx + 1))?;
        out.extend(ips);
    }
    Ok(out)
}

pub fn load_targets_from_path(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read targets file: {}", path.as_ref().display()))?;
    parse_targets_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_small_cidr_excludes_network_and_broadcast() {
        let net = Ipv4Net::new(Ipv4Addr::new(192, 168, 1, 0), 30).unwrap();
        let hosts = expand_cidr(IpNet::V4(net));
        assert_eq!(
            hosts,
            vec![
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)),
            ]
        );
    }

    #[test]
    fn point_to_point_and_single_host_keep_all() {
        let p2p = Ipv4Net::new(Ipv4Addr::new(10, 0, 0, 0), 31).unwrap();
        assert_eq!(expand_cidr(IpNet::V4(p2p)).len(), 2);
        let one = Ipv4Net::new(Ipv4Addr::new(10, 0, 0, 7), 32).unwrap();
        assert_eq!(
            expand_cidr(IpNet::V4(one)),
            vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7))]
        );
    }

    #[test]
    fn slash_24_has_254_hosts() {
        let ips = parse_target("172.16.5.0/24").unwrap();
        assert_eq!(ips.len(), 254);
        assert_eq!(ips.first().map(String::as_str), Some("172.16.5.1"));
        assert_eq!(ips.last().map(String::as_str), Some("172.16.5.254"));
    }

    #[test]
    fn ipv6_cidr_is_rejected_but_single_v6_is_fine() {
        assert!(parse_target("fd00::/64").is_err());
        assert_eq!(parse_target("fd00::1").unwrap(), vec!["fd00::1"]);
    }

    #[test]
    fn bad_entry_reports_line() {
        let err = parse_targets_str("10.0.0.1\nnot-an-ip\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}
