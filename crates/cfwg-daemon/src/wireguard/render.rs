//! Full tunnel configuration rendering.
//!
//! Used when no usable configuration exists yet (fresh install, empty file,
//! or a file without the expected sections).

use std::fmt::Write;

use crate::identity::RotatedCredentials;

use super::error::WireGuardError;

/// Interface address written into freshly rendered configurations.
pub const INTERFACE_ADDRESS: &str = "100.64.0.1/32";

pub const INTERFACE_MTU: u16 = 1280;

/// Keepalive interval in seconds, also appended by merge when absent.
pub const PERSISTENT_KEEPALIVE: u16 = 25;

/// Private key shipped in the import file for the management UI.
pub const PLACEHOLDER_PRIVATE_KEY: &str = "mLmL+DB1n8MfA+7Dc+vnEdZD+VffR3Li3QcJhdTLuEU=";

/// Peer public key shipped in the import file for the management UI.
pub const PLACEHOLDER_PEER_KEY: &str = "YOw/RK8gT3PR4ImRfpnfvJ8UTY3GfJlO6PcPbl40Tkw=";

const PLACEHOLDER_ENDPOINT: &str = "engage.cloudflareclient.com";
const PLACEHOLDER_PORT: u16 = 2408;

/// Names of required fields that are empty in `creds`.
pub fn missing_key_material(creds: &RotatedCredentials) -> Vec<&'static str> {
    [
        ("private_key", creds.private_key.is_empty()),
        ("public_key", creds.public_key.is_empty()),
        ("peer_public_key", creds.peer_public_key.is_empty()),
        ("endpoint", creds.endpoint.is_empty()),
        ("endpoint_port", creds.endpoint_port == 0),
    ]
    .into_iter()
    .filter_map(|(name, empty)| empty.then_some(name))
    .collect()
}

/// Render a complete configuration from `creds`.
///
/// Returns [`WireGuardError::MissingKeyMaterial`] instead of any text when a
/// required field is empty.
pub fn render(creds: &RotatedCredentials) -> Result<String, WireGuardError> {
    let missing = missing_key_material(creds);
    if !missing.is_empty() {
        tracing::error!(missing = ?missing, "Refusing to render tunnel configuration");
        return Err(WireGuardError::MissingKeyMaterial(missing));
    }

    let mut out = String::with_capacity(512);
    let _ = writeln!(out, "[Interface]");
    let _ = writeln!(out, "PrivateKey = {}", creds.private_key);
    let _ = writeln!(out, "Address = {INTERFACE_ADDRESS}");
    if !creds.dns.is_empty() {
        let _ = writeln!(out, "DNS = {}", creds.dns.join(", "));
    }
    let _ = writeln!(out, "MTU = {INTERFACE_MTU}");
    out.push('\n');
    let _ = writeln!(out, "[Peer]");
    let _ = writeln!(out, "PublicKey = {}", creds.peer_public_key);
    if let Some(psk) = &creds.peer_preshared_key {
        let _ = writeln!(out, "PresharedKey = {psk}");
    }
    let _ = writeln!(out, "AllowedIPs = {}", creds.allowed_ips.join(", "));
    let _ = writeln!(out, "Endpoint = {}", creds.endpoint_addr());
    let _ = writeln!(out, "PersistentKeepalive = {PERSISTENT_KEEPALIVE}");
    Ok(out)
}

/// Import file for the management UI, carrying placeholder keys that the
/// daemon replaces on its first cycle.
pub fn placeholder_config() -> String {
    let creds = RotatedCredentials {
        private_key: PLACEHOLDER_PRIVATE_KEY.into(),
        public_key: PLACEHOLDER_PEER_KEY.into(),
        peer_public_key: PLACEHOLDER_PEER_KEY.into(),
        peer_preshared_key: None,
        endpoint: PLACEHOLDER_ENDPOINT.into(),
        endpoint_port: PLACEHOLDER_PORT,
        allowed_ips: vec!["0.0.0.0/0".into(), "::/0".into()],
        dns: vec!["1.1.1.1".into(), "1.0.0.1".into()],
    };
    // Placeholder material is non-empty, so rendering cannot fail.
    render(&creds).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn creds() -> RotatedCredentials {
        RotatedCredentials {
            private_key: "PRIV=".into(),
            public_key: "PUB=".into(),
            peer_public_key: "PEER=".into(),
            peer_preshared_key: None,
            endpoint: "engage.example.com".into(),
            endpoint_port: 2408,
            allowed_ips: vec!["0.0.0.0/0".into(), "::/0".into()],
            dns: vec!["1.1.1.1".into(), "1.0.0.1".into()],
        }
    }

    #[test]
    fn renders_full_template() {
        let text = render(&creds()).unwrap();
        assert_eq!(
            text,
            "[Interface]\n\
             PrivateKey = PRIV=\n\
             Address = 100.64.0.1/32\n\
             DNS = 1.1.1.1, 1.0.0.1\n\
             MTU = 1280\n\
             \n\
             [Peer]\n\
             PublicKey = PEER=\n\
             AllowedIPs = 0.0.0.0/0, ::/0\n\
             Endpoint = engage.example.com:2408\n\
             PersistentKeepalive = 25\n"
        );
    }

    #[test]
    fn optional_lines_follow_credentials() {
        let mut c = creds();
        c.dns.clear();
        c.peer_preshared_key = Some("PSK=".into());
        let text = render(&c).unwrap();
        assert!(!text.contains("DNS"));
        assert!(text.contains("PublicKey = PEER=\nPresharedKey = PSK=\nAllowedIPs"));
    }

    #[test]
    fn empty_required_field_yields_no_text() {
        for field in [
            "private_key",
            "public_key",
            "peer_public_key",
            "endpoint",
            "endpoint_port",
        ] {
            let mut c = creds();
            match field {
                "private_key" => c.private_key.clear(),
                "public_key" => c.public_key.clear(),
                "peer_public_key" => c.peer_public_key.clear(),
                "endpoint" => c.endpoint.clear(),
                _ => c.endpoint_port = 0,
            }
            match render(&c) {
                Err(WireGuardError::MissingKeyMaterial(missing)) => {
                    assert_eq!(missing, vec![field]);
                }
                other => panic!("{field}: expected MissingKeyMaterial, got {other:?}"),
            }
        }
    }

    #[test]
    fn reports_every_missing_field() {
        let missing = missing_key_material(&RotatedCredentials::default());
        assert_eq!(
            missing,
            vec![
                "private_key",
                "public_key",
                "peer_public_key",
                "endpoint",
                "endpoint_port"
            ]
        );
    }

    #[test]
    fn zero_port_is_missing_key_material() {
        let mut c = creds();
        c.endpoint_port = 0;
        let err = render(&c).unwrap_err();
        assert!(err.to_string().contains("endpoint_port"), "got {err}");
    }

    #[test]
    fn placeholder_config_carries_placeholder_keys() {
        let text = placeholder_config();
        assert!(text.contains(PLACEHOLDER_PRIVATE_KEY));
        assert!(text.contains(PLACEHOLDER_PEER_KEY));
        assert!(text.starts_with("[Interface]\n"));
    }
}
