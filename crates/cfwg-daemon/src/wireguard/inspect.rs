//! Structural checks on an existing tunnel file.

use std::path::Path;

use super::error::WireGuardError;
use super::merge::section_header;
use super::render::{PLACEHOLDER_PEER_KEY, PLACEHOLDER_PRIVATE_KEY};

/// What the startup check found in the tunnel file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TunnelInspection {
    pub has_interface: bool,
    pub has_peer: bool,
    /// The import file's placeholder keys are still present.
    pub has_placeholder_keys: bool,
}

impl TunnelInspection {
    /// Both sections the merge relies on are present.
    pub const fn is_mergeable(&self) -> bool {
        self.has_interface && self.has_peer
    }
}

pub fn inspect(text: &str) -> TunnelInspection {
    let mut report = TunnelInspection::default();
    for line in text.lines() {
        match section_header(line.trim()) {
            Some(name) if name.eq_ignore_ascii_case("Interface") => report.has_interface = true,
            Some(name) if name.eq_ignore_ascii_case("Peer") => report.has_peer = true,
            _ => {}
        }
    }
    report.has_placeholder_keys =
        text.contains(PLACEHOLDER_PRIVATE_KEY) || text.contains(PLACEHOLDER_PEER_KEY);
    report
}

/// Inspect the file at `path`; `None` if it does not exist.
pub fn inspect_file(path: &Path) -> Result<Option<TunnelInspection>, WireGuardError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(inspect(&text))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(WireGuardError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::wireguard::render::placeholder_config;

    #[test]
    fn placeholder_import_is_detected() {
        let report = inspect(&placeholder_config());
        assert!(report.is_mergeable());
        assert!(report.has_placeholder_keys);
    }

    #[test]
    fn headers_with_comments_are_detected() {
        let report = inspect("[Interface] # from UI\nPrivateKey = a\n[Peer] ; cf\nPublicKey = b\n");
        assert!(report.is_mergeable());
    }

    #[test]
    fn missing_peer_is_not_mergeable() {
        let report = inspect("[Interface]\nPrivateKey = a\n");
        assert!(report.has_interface);
        assert!(!report.has_peer);
        assert!(!report.is_mergeable());
        assert!(!report.has_placeholder_keys);
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(inspect_file(&dir.path().join("wg0.conf")).unwrap(), None);
    }
}
