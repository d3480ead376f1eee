use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Parse a port list into a deduplicated list of TCP ports (1..=65535).
///
/// Entries are separated by commas or newlines:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` on a line is ignored
/// - whitespace and blank entries are ignored
///
/// Order of first appearance is kept, it decides the order of the TCP probes.
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("");

        for entry in line.split(',').map(str::trim) {
            if entry.is_empty() {
                continue;
            }

            if let Some((a, b)) = entry.split_once('-') {
                let start = parse_port_str(a.trim())
                    .with_context(|| format!("line {line_no}: invalid start in range: {a}"))?;
                let end = parse_port_str(b.trim())
                    .with_context(|| format!("line {line_no}: invalid end in range: {b}"))?;
                if start > end {
                    bail!("line {line_no}: invalid range {start}-{end} (start > end)");
                }
                for p in start..=end {
                    if seen.insert(p) {
                        out.push(p);
                    }
                }
                continue;
            }

            let p = parse_port_str(entry)
                .with_context(|| format!("line {line_no}: invalid port value: {entry}"))?;
            if seen.insert(p) {
                out.push(p);
            }
        }
    }

    Ok(out)
}

/// Read a ports file (same syntax as [`parse_ports_str`]).
pub fn load_ports_file(path: &Path) -> Result<Vec<u16>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    parse_ports_str(&content).with_context(|| format!("in ports file {}", path.display()))
}

/// Ports most likely to get an answer (open or refused) from a live host.
pub fn default_ports() -> Vec<u16> {
    const DEFAULT: &[u16] = &[
        80, 443, 22, 445, 3389, 21, 25, 8080, 135, 139, 53, 5985, 1433, 3306, 5432, 6379, 88, 389,
    ];
    DEFAULT.to_vec()
}

fn parse_port_str(s: &str) -> Result<u16> {
    match s.parse::<u32>() {
        Ok(p @ 1..=65535) => Ok(p as u16),
        Ok(p) => bail!("port {p} is outside 1-65535"),
        Err(e) => Err(e).with_context(|| format!("{s:?} is not a number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_comma_list() {
        let ports = parse_ports_str("80, 22,443").unwrap();
        assert_eq!(ports, vec![80, 22, 443]);
    }

    #[test]
    fn parse_ranges_and_dedup() {
        let input = "8000-8002,80\n8001\n";
        let ports = parse_ports_str(input).unwrap();
        assert_eq!(ports, vec![8000, 8001, 8002, 80]);
    }

    #[test]
    fn parse_with_comments_and_whitespace() {
        let input = r#"
            # common web ports
            80  # http
            443 # https
            8000-8002   # dev servers
        "#;
        let ports = parse_ports_str(input).unwrap();
        assert_eq!(ports, vec![80, 443, 8000, 8001, 8002]);
    }

    #[test]
    fn invalid_values_error() {
        assert!(parse_ports_str("70000").is_err());
        assert!(parse_ports_str("90-80").is_err());
        assert!(parse_ports_str("http").is_err());
    }

    #[test]
    fn file_errors_name_the_file() {
        let path = std::env::temp_dir().join(format!("lan-probe-ports-{}.txt", std::process::id()));
        fs::write(&path, "22\n99999\n").unwrap();
        let err = load_ports_file(&path).unwrap_err();
        let _ = fs::remove_file(&path);
        let msg = format!("{err:#}");
        assert!(msg.contains("line 2"));
        assert!(msg.contains("outside 1-65535"));
        assert!(load_ports_file(Path::new("/no/such/ports.txt")).is_err());
    }

    #[test]
    fn default_list_is_eighteen_unique_ports() {
        let d = default_ports();
        assert_eq!(d.len(), 18);
        assert_eq!(&d[..2], &[80, 443]);
        let mut sorted = d.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), d.len());
    }
}
