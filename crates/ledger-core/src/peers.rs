//! Known peers, stored as normalized `host:port` addresses.

use crate::error::{LedgerError, Result};
use std::collections::BTreeSet;

/// Extracts the network location from `address`.
///
/// `http://10.0.0.5:5000/` and `10.0.0.5:5000` both normalize to
/// `10.0.0.5:5000`. An address with a scheme but no host falls back to its
/// path.
pub fn parse_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    let rest = match trimmed.find("://") {
        Some(pos) if is_scheme(&trimmed[..pos]) => Some(&trimmed[pos + 3..]),
        _ => trimmed.strip_prefix("//"),
    };

    let parsed = match rest {
        Some(rest) => {
            let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
            let (netloc, path) = rest.split_at(end);
            if netloc.is_empty() {
                strip_path(path)
            } else {
                netloc
            }
        }
        None => strip_path(trimmed),
    };

    if parsed.is_empty() || parsed.chars().any(char::is_whitespace) {
        return Err(LedgerError::InvalidAddress(address.to_string()));
    }
    Ok(parsed.to_string())
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn strip_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    path[..end].trim_end_matches('/')
}

#[derive(Clone, Debug, Default)]
pub struct PeerRegistry {
    peers: BTreeSet<String>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer. Returns `false` if it was already known.
    pub fn register(&mut self, address: &str) -> Result<bool> {
        let peer = parse_address(address)?;
        Ok(self.peers.insert(peer))
    }

    /// Registers every address, or none of them if any fails to parse.
    pub fn register_all<S: AsRef<str>>(&mut self, addresses: &[S]) -> Result<usize> {
        let parsed = addresses
            .iter()
            .map(|a| parse_address(a.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(parsed.into_iter().filter(|p| self.peers.insert(p.clone())).count())
    }

    pub fn list(&self) -> Vec<String> {
        self.peers.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
