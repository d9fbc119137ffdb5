//! Parsers for the text output of hotspot queries.
//!
//! Command output is treated as a thin line protocol. Scalar queries return
//! a single value on the first line; the client listing returns one record
//! per line as `MAC|Name|IPs`. The producing commands are opaque, so every
//! parser has a best-effort salvage path and never fails: unparseable input
//! maps to "not matched", [`COUNT_UNAVAILABLE`] or a dropped line.

use std::sync::LazyLock;

use regex::Regex;

use crate::{ConnectedClient, COUNT_UNAVAILABLE};

/// Field delimiter of the client listing. Reserved: never appears inside a field.
pub const FIELD_DELIMITER: char = '|';

static INTEGER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d+").expect("integer token pattern is valid"));

/// Returns `true` if the first output line matches `expected`, ignoring case
/// and surrounding whitespace.
///
/// Empty output never matches.
pub fn parse_status(lines: &[String], expected: &str) -> bool {
    lines
        .first()
        .is_some_and(|line| line.trim().eq_ignore_ascii_case(expected.trim()))
}

/// Parses a client count.
///
/// The first line is tried as a plain integer. If that fails, the whole
/// output is scanned for the first integer-like token (optionally signed).
/// Returns [`COUNT_UNAVAILABLE`] when no integer can be found.
pub fn parse_count(lines: &[String]) -> i32 {
    if let Some(n) = lines.first().and_then(|l| l.trim().parse::<i32>().ok()) {
        return n;
    }
    let text = lines.join("\n");
    INTEGER_TOKEN
        .find_iter(&text)
        .find_map(|m| m.as_str().parse::<i32>().ok())
        .unwrap_or(COUNT_UNAVAILABLE)
}

/// Parses the client listing, one `MAC|Name|IPs` record per line.
///
/// Lines without any usable field are dropped. Missing name or IP fields
/// become empty strings. Order is preserved and duplicates are kept.
pub fn parse_clients(lines: &[String]) -> Vec<ConnectedClient> {
    lines.iter().filter_map(|line| parse_client_line(line)).collect()
}

fn parse_client_line(line: &str) -> Option<ConnectedClient> {
    let mut fields = line.splitn(3, FIELD_DELIMITER).map(str::trim);
    let mac = fields.next().unwrap_or_default();
    let name = fields.next().unwrap_or_default();
    let ips = fields.next().unwrap_or_default();

    if mac.is_empty() && name.is_empty() && ips.is_empty() {
        return None;
    }

    Some(ConnectedClient {
        mac_address: mac.to_uppercase(),
        device_name: name.to_string(),
        ip_addresses: ips.to_string(),
    })
}
