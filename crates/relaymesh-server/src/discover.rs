//! Interface discovery (spec §4.2): matches OS network interfaces against
//! configured [`InterfaceRule`]s by a simple `*`-glob on the interface name.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::config::InterfaceRule;

/// One interface the OS reports, paired with the rule that matched it.
#[derive(Debug, Clone)]
pub struct DiscoveredInterface {
    /// OS-reported interface name (`eth0`, `wlan0`, ...).
    pub name: String,
    /// IPv4 address to bind to.
    pub addr: Ipv4Addr,
    /// Matching configuration rule.
    pub rule: InterfaceRule,
}

impl DiscoveredInterface {
    /// Socket address to bind at `port`.
    #[must_use]
    pub fn bind_addr(&self, port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(self.addr, port)
    }
}

/// Enumerate IPv4 interfaces via the OS and pair each with the first
/// matching rule, in rule order.
pub fn discover(rules: &[InterfaceRule]) -> std::io::Result<Vec<DiscoveredInterface>> {
    let ifaces = get_if_addrs::get_if_addrs()?;
    let mut out = Vec::new();
    for iface in ifaces {
        let std::net::IpAddr::V4(addr) = iface.ip() else { continue };
        if let Some(rule) = rules.iter().find(|r| glob_match(&r.name_glob, &iface.name)) {
            out.push(DiscoveredInterface { name: iface.name, addr, rule: rule.clone() });
        }
    }
    Ok(out)
}

/// Minimal shell-style glob: supports `*` as a wildcard, no other
/// metacharacters. Sufficient for interface-name rules like `eth*`.
fn glob_match(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == name,
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_prefix_wildcard() {
        assert!(glob_match("eth*", "eth0"));
        assert!(glob_match("eth*", "eth"));
        assert!(!glob_match("eth*", "wlan0"));
    }

    #[test]
    fn glob_matches_exact_literal() {
        assert!(glob_match("wlan0", "wlan0"));
        assert!(!glob_match("wlan0", "wlan1"));
    }

    #[test]
    fn glob_matches_middle_wildcard() {
        assert!(glob_match("eth*0", "eth00"));
        assert!(!glob_match("eth*0", "eth01"));
    }
}
