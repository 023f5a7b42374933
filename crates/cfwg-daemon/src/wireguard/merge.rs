//! Line-preserving merge of rotated credentials into an existing tunnel file.
//!
//! The management UI owns everything in the file except the key material and
//! the peer endpoint. The merge walks the text line by line, tracking the
//! current section, and rewrites only those directives. Every other line is
//! copied through byte for byte, line ending included.

use std::fmt::Write;

use crate::identity::RotatedCredentials;

use super::error::WireGuardError;
use super::render::PERSISTENT_KEEPALIVE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    /// Before the first header.
    None,
    Interface,
    Peer,
    /// Any section this daemon does not manage.
    Other,
}

impl Section {
    fn from_header(name: &str) -> Self {
        if name.eq_ignore_ascii_case("Interface") {
            Self::Interface
        } else if name.eq_ignore_ascii_case("Peer") {
            Self::Peer
        } else {
            Self::Other
        }
    }
}

/// Section name if `trimmed` is a `[Header]` line, with or without a
/// trailing `#` or `;` comment.
pub(crate) fn section_header(trimmed: &str) -> Option<&str> {
    trimmed
        .find(['#', ';'])
        .map_or(trimmed, |at| &trimmed[..at])
        .trim_end()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}

/// Directive key (text left of `=`) if `trimmed` is a `Key = Value` line.
pub(crate) fn directive_key(trimmed: &str) -> Option<&str> {
    if trimmed.starts_with('#') || trimmed.starts_with(';') {
        return None;
    }
    trimmed.split_once('=').map(|(key, _)| key.trim())
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Replacement text for a system-owned directive, or `None` to keep the line.
fn replacement(section: Section, key: &str, creds: &RotatedCredentials) -> Option<String> {
    match section {
        Section::Interface if key.eq_ignore_ascii_case("PrivateKey") => {
            Some(format!("PrivateKey = {}", creds.private_key))
        }
        Section::Peer if key.eq_ignore_ascii_case("PublicKey") => {
            Some(format!("PublicKey = {}", creds.peer_public_key))
        }
        Section::Peer if key.eq_ignore_ascii_case("PresharedKey") => creds
            .peer_preshared_key
            .as_ref()
            .map(|psk| format!("PresharedKey = {psk}")),
        Section::Peer if key.eq_ignore_ascii_case("Endpoint") => {
            Some(format!("Endpoint = {}", creds.endpoint_addr()))
        }
        _ => None,
    }
}

/// Rewrite the system-owned directives of `existing` with `creds`.
///
/// Only the first `[Peer]` section is managed; any further peers the operator
/// added are copied through untouched. A missing `PersistentKeepalive` is
/// inserted after the last directive of that section.
///
/// Fails with [`WireGuardError::MissingSection`] if either `[Interface]` or
/// `[Peer]` is absent. Merging the same credentials twice yields the same text.
pub fn merge(existing: &str, creds: &RotatedCredentials) -> Result<String, WireGuardError> {
    let mut section = Section::None;
    let mut seen_interface = false;
    let mut peers = 0usize;
    let mut has_keepalive = false;
    // Byte offset in `out` just past the managed peer's last non-blank line,
    // plus that line's ending.
    let mut peer_tail: Option<(usize, &str)> = None;
    let mut replaced = 0usize;
    let mut out = String::with_capacity(existing.len() + 32);

    for line in existing.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        let trimmed = body.trim();

        if let Some(name) = section_header(trimmed) {
            section = match Section::from_header(name) {
                Section::Peer => {
                    peers += 1;
                    if peers == 1 { Section::Peer } else { Section::Other }
                }
                other => other,
            };
            seen_interface |= section == Section::Interface;
            out.push_str(line);
            if section == Section::Peer {
                peer_tail = Some((out.len(), ending));
            }
            continue;
        }

        match directive_key(trimmed) {
            Some(key) => {
                if section == Section::Peer && key.eq_ignore_ascii_case("PersistentKeepalive") {
                    has_keepalive = true;
                }
                if let Some(new_line) = replacement(section, key, creds) {
                    out.push_str(&new_line);
                    out.push_str(ending);
                    replaced += 1;
                } else {
                    out.push_str(line);
                }
            }
            None => out.push_str(line),
        }

        if section == Section::Peer && !trimmed.is_empty() {
            peer_tail = Some((out.len(), ending));
        }
    }

    if !seen_interface {
        return Err(WireGuardError::MissingSection("[Interface]"));
    }
    let Some((at, ending)) = peer_tail else {
        return Err(WireGuardError::MissingSection("[Peer]"));
    };

    if peers > 1 {
        tracing::warn!(
            extra_peers = peers - 1,
            "Tunnel configuration has more than one [Peer]; only the first is updated"
        );
    }

    if !has_keepalive {
        let mut directive = String::new();
        if ending.is_empty() {
            directive.push('\n');
        }
        let _ = write!(directive, "PersistentKeepalive = {PERSISTENT_KEEPALIVE}");
        directive.push_str(if ending.is_empty() { "\n" } else { ending });
        out.insert_str(at, &directive);
    }

    tracing::debug!(replaced, appended_keepalive = !has_keepalive, "Merged tunnel configuration");
    Ok(out)
}
