//! Reachability diagnostics.
//!
//! Run only after a connection failure, never for post-connection errors.
//! Each probe always produces a [`ReachabilityResult`], even when the probe
//! tooling itself is missing; a probe that could not run is recorded as a
//! failed probe with the reason in its detail map.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use netsift_common::{ProbeKind, ReachabilityResult};

use crate::inventory::DeviceRecord;

const PING_COUNT: &str = "2";
const PING_TIMEOUT: &str = "2";
const DNS_TIMEOUT: Duration = Duration::from_secs(3);

pub fn looks_like_address(name: &str) -> bool {
    name.parse::<IpAddr>().is_ok()
}

/// Diagnose why a device could not be reached: always a ping against its
/// best-known address, plus a DNS probe against its logical name unless the
/// name is itself an IP address.
pub async fn run_connection_diagnostics(record: &DeviceRecord) -> Vec<ReachabilityResult> {
    debug!(device = %record.name, "running reachability diagnostics");
    let mut results = vec![ping_probe(&record.address).await];
    if !looks_like_address(&record.name) {
        results.push(resolve_probe(&record.name).await);
    }
    results
}

async fn ping_probe(target: &str) -> ReachabilityResult {
    let mut details = BTreeMap::new();
    let outcome = Command::new("ping")
        .arg("-c")
        .arg(PING_COUNT)
        .arg("-W")
        .arg(PING_TIMEOUT)
        .arg(target)
        .output()
        .await;

    let success = match outcome {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(line) = stdout.lines().find(|l| l.contains("packets transmitted")) {
                details.insert("summary".to_string(), line.trim().to_string());
            }
            output.status.success()
        }
        Err(e) => {
            details.insert("error".to_string(), format!("could not run ping: {e}"));
            false
        }
    };

    ReachabilityResult {
        probe: ProbeKind::Ping,
        target: target.to_string(),
        success,
        details,
    }
}

async fn resolve_probe(name: &str) -> ReachabilityResult {
    let mut details = BTreeMap::new();
    // Port is irrelevant; lookup_host wants a socket address form.
    let success = match tokio::time::timeout(DNS_TIMEOUT, tokio::net::lookup_host((name, 22))).await
    {
        Ok(Ok(addrs)) => {
            let resolved: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
            let ok = !resolved.is_empty();
            if ok {
                details.insert("addresses".to_string(), resolved.join(", "));
            }
            ok
        }
        Ok(Err(e)) => {
            details.insert("error".to_string(), e.to_string());
            false
        }
        Err(_) => {
            details.insert("error".to_string(), "lookup timed out".to_string());
            false
        }
    };

    ReachabilityResult {
        probe: ProbeKind::DnsResolution,
        target: name.to_string(),
        success,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_detection() {
        assert!(looks_like_address("10.0.0.1"));
        assert!(looks_like_address("2001:db8::1"));
        assert!(!looks_like_address("edge-router-2"));
        assert!(!looks_like_address("edge-router-2.lab.example.net"));
    }

    #[tokio::test]
    async fn diagnostics_skip_dns_for_numeric_names() {
        let record = DeviceRecord {
            name: "192.0.2.1".to_string(),
            address: "192.0.2.1".to_string(),
            platform: "iosxe".to_string(),
            username: None,
            port: 22,
        };
        let results = run_connection_diagnostics(&record).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].probe, ProbeKind::Ping);
    }

    #[tokio::test]
    async fn diagnostics_include_dns_for_logical_names() {
        let record = DeviceRecord {
            name: "no-such-host.invalid".to_string(),
            address: "192.0.2.1".to_string(),
            platform: "iosxe".to_string(),
            username: None,
            port: 22,
        };
        let results = run_connection_diagnostics(&record).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].probe, ProbeKind::Ping);
        assert_eq!(results[1].probe, ProbeKind::DnsResolution);
        // .invalid never resolves (RFC 6761)
        assert!(!results[1].success);
    }
}
