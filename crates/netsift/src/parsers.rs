//! Structured output parsers.
//!
//! Best-effort regex parsers for the command/platform pairs we understand.
//! A parse failure is never fatal: the executor keeps the raw output and
//! records the failure, so the oracle still sees the evidence.

use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("output was empty or matched no known schema")]
    Empty,

    #[error("no parser for this command on platform '{platform}'")]
    Unsupported { platform: String },

    #[error("output did not match the expected schema: {0}")]
    Malformed(String),
}

/// Parse `raw` as the output of `command` on `platform`.
pub fn parse(platform: &str, command: &str, raw: &str) -> Result<Value, ParseFailure> {
    if raw.trim().is_empty() {
        return Err(ParseFailure::Empty);
    }
    match (platform, command) {
        ("iosxe", "show version") => parse_show_version(raw),
        ("iosxe", "show ip interface brief") => parse_ip_interface_brief(raw),
        _ => Err(ParseFailure::Unsupported {
            platform: platform.to_string(),
        }),
    }
}

fn parse_show_version(raw: &str) -> Result<Value, ParseFailure> {
    // "Cisco IOS XE Software, Version 17.09.04a"
    let version_re = Regex::new(r"Version\s+([\w.()]+)")
        .map_err(|e| ParseFailure::Malformed(e.to_string()))?;
    let uptime_re = Regex::new(r"(?m)uptime is\s+(.+)$")
        .map_err(|e| ParseFailure::Malformed(e.to_string()))?;
    let hostname_re = Regex::new(r"(?m)^(\S+)\s+uptime is")
        .map_err(|e| ParseFailure::Malformed(e.to_string()))?;

    let version = version_re
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(ParseFailure::Empty)?;

    let mut parsed = json!({ "version": version });
    if let Some(c) = uptime_re.captures(raw) {
        parsed["uptime"] = json!(c[1].trim());
    }
    if let Some(c) = hostname_re.captures(raw) {
        parsed["hostname"] = json!(&c[1]);
    }
    Ok(parsed)
}

fn parse_ip_interface_brief(raw: &str) -> Result<Value, ParseFailure> {
    // "GigabitEthernet0/1   10.0.0.1   YES NVRAM  up   up"
    let row_re = Regex::new(
        r"(?m)^(\S+)\s+(\S+)\s+\w+\s+\S+\s+(up|down|administratively down)\s+(up|down)\s*$",
    )
    .map_err(|e| ParseFailure::Malformed(e.to_string()))?;

    let mut interfaces = serde_json::Map::new();
    for caps in row_re.captures_iter(raw) {
        let name = caps[1].to_string();
        if name.eq_ignore_ascii_case("interface") {
            continue;
        }
        interfaces.insert(
            name,
            json!({
                "ip_address": &caps[2],
                "status": &caps[3],
                "protocol": &caps[4],
            }),
        );
    }
    if interfaces.is_empty() {
        return Err(ParseFailure::Empty);
    }
    Ok(json!({ "interfaces": interfaces }))
}

#[cfg(test)]
pub(crate) const SAMPLE_SHOW_VERSION: &str = "\
Cisco IOS XE Software, Version 17.09.04a
Cisco IOS Software [Cupertino], Catalyst L3 Switch Software
R1 uptime is 2 weeks, 3 days, 4 hours, 12 minutes
";

#[cfg(test)]
pub(crate) const SAMPLE_IP_INT_BRIEF: &str = "\
Interface              IP-Address      OK? Method Status                Protocol
GigabitEthernet0/0     10.0.0.1        YES NVRAM  up                    up
GigabitEthernet0/1     unassigned      YES NVRAM  administratively down down
Loopback0              192.168.1.1     YES NVRAM  up                    up
";
