// src/core/address.rs
// Classification of host address strings and socket formatting

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv6Addr;

static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$")
        .expect("static IPv4 pattern")
});

static FQDN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]([A-Za-z0-9_-]{0,61}[A-Za-z0-9_])?(\.[A-Za-z0-9_]([A-Za-z0-9_-]{0,61}[A-Za-z0-9_])?)*\.?$")
        .expect("static FQDN pattern")
});

const MAX_FQDN_LEN: usize = 253;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    IPv4,
    IPv6,
    Fqdn,
    Unrecognized,
}

fn strip_brackets(candidate: &str) -> &str {
    candidate
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(candidate)
}

pub fn classify(candidate: &str) -> AddressKind {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return AddressKind::Unrecognized;
    }

    if IPV4_RE.is_match(candidate) {
        return AddressKind::IPv4;
    }

    let unbracketed = strip_brackets(candidate);
    if unbracketed.contains(':') {
        return match unbracketed.parse::<Ipv6Addr>() {
            Ok(_) => AddressKind::IPv6,
            Err(_) => AddressKind::Unrecognized,
        };
    }

    if candidate.len() > MAX_FQDN_LEN || !FQDN_RE.is_match(candidate) {
        return AddressKind::Unrecognized;
    }

    // A numeric last label means a broken dotted quad, not a hostname.
    let last_label = candidate
        .trim_end_matches('.')
        .rsplit('.')
        .next()
        .unwrap_or_default();
    if !last_label.is_empty() && last_label.bytes().all(|b| b.is_ascii_digit()) {
        return AddressKind::Unrecognized;
    }

    AddressKind::Fqdn
}

/// Format `address:port`, bracketing IPv6 literals. Returns `None` for
/// unrecognized addresses.
pub fn build_socket(address: &str, port: u16) -> Option<String> {
    let address = address.trim();
    match classify(address) {
        AddressKind::IPv4 | AddressKind::Fqdn => Some(format!("{}:{}", address, port)),
        AddressKind::IPv6 => Some(format!("[{}]:{}", strip_brackets(address), port)),
        AddressKind::Unrecognized => None,
    }
}

/// Addresses split by kind, first-seen order within each list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedAddresses {
    pub ips: Vec<String>,
    pub fqdns: Vec<String>,
    pub unrecognized: Vec<String>,
}

impl ClassifiedAddresses {
    pub fn from_addresses<'a>(addresses: impl IntoIterator<Item = &'a String>) -> Self {
        let mut classified = Self::default();
        for address in addresses {
            let bucket = match classify(address) {
                AddressKind::IPv4 | AddressKind::IPv6 => &mut classified.ips,
                AddressKind::Fqdn => &mut classified.fqdns,
                AddressKind::Unrecognized => &mut classified.unrecognized,
            };
            if !bucket.contains(address) {
                bucket.push(address.clone());
            }
        }
        classified
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty() && self.fqdns.is_empty()
    }
}
