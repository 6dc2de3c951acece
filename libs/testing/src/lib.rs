//! Shared fixtures for fleetinit tests.
//!
//! Kept free of other workspace crates so every crate can use it as a
//! dev-dependency.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Base64-encode text with the standard alphabet.
pub fn encode_base64(text: &str) -> String {
    STANDARD.encode(text)
}

/// Decode standard base64 into UTF-8 text.
///
/// Panics on invalid input; only meant for assertions.
pub fn decode_base64(raw: &str) -> String {
    let bytes = STANDARD.decode(raw).expect("test input should be valid base64");
    String::from_utf8(bytes).expect("test input should be UTF-8")
}

/// Replica names `{prefix}-0` .. `{prefix}-{count - 1}`.
pub fn replica_names(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}-{i}")).collect()
}

/// Cloud-config documents used across tests.
pub mod fixtures {
    /// Minimal document with a single key.
    pub const FQDN_CLOUD_CONFIG: &str = "#cloud-config\nfqdn: myhostname.example.com\n";

    /// Header followed by YAML that does not parse.
    pub const MALFORMED_CLOUD_CONFIG: &str = "#cloud-config\n{}\t-\n-gg\n";

    /// Document exercising nested mappings, sequences and scalars.
    pub const FULL_CLOUD_CONFIG: &str = r#"#cloud-config
hostname: web
manage_etc_hosts: true
package_upgrade: false
packages:
  - nginx
  - curl
environment:
  LOG_LEVEL: info
  WORKERS: 4
write_files:
  - path: /etc/motd
    content: hello
    permissions: "0644"
runcmd:
  - [systemctl, enable, nginx]
"#;

    /// Template with address placeholders for both families.
    pub const NETWORK_TEMPLATE: &str = r#"#cloud-config
hostname: $hostname
write_files:
  - path: /etc/netplan/60-static.yaml
    content: |
      network:
        version: 2
        ethernets:
          eth1:
            addresses: [$ipv4Address/24, "$ipv6Address/64"]
environment:
  NODE_IP: $ipv4Address
  NODE_IP6: "$ipv6Address"
"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_roundtrip() {
        let encoded = encode_base64(fixtures::FQDN_CLOUD_CONFIG);
        assert_eq!(decode_base64(&encoded), fixtures::FQDN_CLOUD_CONFIG);
    }

    #[test]
    fn test_replica_names() {
        assert_eq!(replica_names("web", 2), vec!["web-0", "web-1"]);
        assert!(replica_names("web", 0).is_empty());
    }
}
