// src/utils/slug.rs
// Filesystem-safe identifiers derived from human-readable names

use once_cell::sync::Lazy;
use regex::Regex;

static SEPARATOR_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\s|\W)+").expect("static separator pattern"));

/// Collapse whitespace/non-word runs to `_`, lowercase, trim `_`.
pub fn slugify(name: &str) -> String {
    SEPARATOR_RUN_RE
        .replace_all(name, "_")
        .to_lowercase()
        .trim_matches('_')
        .to_string()
}

/// Directory name for a plugin. Names with no word characters fall back to
/// the plugin id.
pub fn plugin_slug(plugin_name: &str, plugin_id: &str) -> String {
    let slug = slugify(plugin_name);
    if !slug.is_empty() {
        return slug;
    }
    let id = slugify(plugin_id);
    if id.is_empty() {
        "plugin".to_string()
    } else {
        format!("plugin_{}", id)
    }
}

/// Protocol component of list file names.
pub fn protocol_slug(protocol: &str) -> String {
    let slug = slugify(protocol);
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_runs() {
        assert_eq!(slugify("SSH Weak Cipher"), "ssh_weak_cipher");
        assert_eq!(slugify("  MS17-010: EternalBlue (SMBv1)  "), "ms17_010_eternalblue_smbv1");
        assert_eq!(slugify("a -- b"), "a_b");
    }

    #[test]
    fn test_colliding_names_share_slug() {
        assert_eq!(slugify("Weak Cipher!"), "weak_cipher");
        assert_eq!(slugify("weak_cipher"), "weak_cipher");
    }

    #[test]
    fn test_plugin_slug_fallback() {
        assert_eq!(plugin_slug("???", "10863"), "plugin_10863");
        assert_eq!(plugin_slug("TLS", "1"), "tls");
        assert_eq!(protocol_slug("TCP"), "tcp");
        assert_eq!(protocol_slug("/"), "unknown");
    }
}
