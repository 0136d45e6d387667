//! Address redaction for display.

use super::metric::MetricError;

/// Prefix of an IPv4-mapped IPv6 address.
const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// Hide the middle two octets of a node address.
///
/// Accepts a dotted IPv4 address, optionally in IPv4-mapped IPv6 form
/// (`::ffff:a.b.c.d`), and returns `"a.X.X.d"`. Anything that does not split
/// into exactly four non-empty octets is rejected.
pub fn redact_address(address: &str) -> Result<String, MetricError> {
    let ipv4 = address.strip_prefix(IPV4_MAPPED_PREFIX).unwrap_or(address);
    let octets: Vec<&str> = ipv4.split('.').collect();

    match octets.as_slice() {
        [first, _, _, last] if octets.iter().all(|o| !o.is_empty()) => {
            Ok(format!("{}.X.X.{}", first, last))
        }
        _ => Err(MetricError::MalformedAddress(address.to_string())),
    }
}
