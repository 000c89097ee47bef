//! Command allow-list.
//!
//! The allow-list is the hard authorization boundary of the whole service:
//! a command that does not match it exactly (after whitespace
//! normalization) must never reach a device, no matter what the oracle
//! proposed. Membership is exact string match, never prefix or pattern.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Collapse internal whitespace runs to single spaces and trim the ends.
///
/// Both the allow-list entries and every candidate command go through this
/// before comparison, so `"show   version "` and `"show version"` agree.
pub fn normalize_command(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The set of commands this service will execute on devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandAllowlist {
    commands: BTreeSet<String>,
}

impl CommandAllowlist {
    pub fn from_commands<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let commands = commands
            .into_iter()
            .map(|c| normalize_command(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();
        Self { commands }
    }

    /// Exact-match check against the normalized form of `command`.
    pub fn is_allowed(&self, command: &str) -> bool {
        self.commands.contains(&normalize_command(command))
    }

    /// The allowed commands, sorted (BTreeSet order).
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_whitespace() {
        assert_eq!(normalize_command("  show   ip\tinterface  brief "), "show ip interface brief");
        assert_eq!(normalize_command(""), "");
        assert_eq!(normalize_command("   "), "");
    }

    #[test]
    fn membership_is_exact_after_normalization() {
        let list = CommandAllowlist::from_commands(["show version", "show ip route"]);
        assert!(list.is_allowed("show version"));
        assert!(list.is_allowed("  show    version "));
        assert!(!list.is_allowed("show version | include uptime"));
        assert!(!list.is_allowed("show"));
        assert!(!list.is_allowed("reload"));
    }

    #[test]
    fn blank_entries_are_dropped() {
        let list = CommandAllowlist::from_commands(["show version", "  ", ""]);
        assert_eq!(list.len(), 1);
        assert!(!list.is_allowed(""));
    }

    #[test]
    fn commands_iterate_sorted() {
        let list = CommandAllowlist::from_commands(["show version", "show arp", "show ip route"]);
        let cmds: Vec<&str> = list.commands().collect();
        assert_eq!(cmds, vec!["show arp", "show ip route", "show version"]);
    }
}
