//! Container image reference decomposition.
//!
//! Image refs have the shape `[registry-and-ns/]repository[:tag][@digest]`.
//! Parsing is pure string work scanning from the right; no registry is
//! contacted and malformed input still yields a best-effort result.

use std::fmt;

/// Registry used when the reference carries none.
pub const DEFAULT_REGISTRY: &str = "localhost";

/// A decomposed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// First path segment of `registry_and_namespace`
    pub registry: String,
    /// Remaining segments of `registry_and_namespace`, empty when absent
    pub namespace: String,
    /// Rightmost path segment with tag and digest stripped
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
    /// Everything left of the repository, `localhost` when absent
    pub registry_and_namespace: String,
    /// Rightmost path segment of the original ref, tag and digest included
    pub repository_and_suffix: String,
}

impl ImageRef {
    /// Decompose an image reference.
    ///
    /// A separator found at position 0 is treated as absent.
    pub fn parse(image_ref: &str) -> Self {
        let mut remaining = image_ref;

        let digest = match remaining.rfind('@') {
            Some(pos) if pos > 0 => {
                let digest = remaining[pos + 1..].to_string();
                remaining = &remaining[..pos];
                Some(digest)
            }
            _ => None,
        };

        // A colon followed by a path separator belongs to a registry port.
        let tag = match remaining.rfind(':') {
            Some(pos) if pos > 0 && !remaining[pos + 1..].contains('/') => {
                let tag = remaining[pos + 1..].to_string();
                remaining = &remaining[..pos];
                Some(tag)
            }
            _ => None,
        };

        let (registry_and_namespace, repository) = match remaining.rfind('/') {
            Some(pos) if pos > 0 => (&remaining[..pos], &remaining[pos + 1..]),
            _ => (DEFAULT_REGISTRY, remaining),
        };

        let (registry, namespace) = match registry_and_namespace.find('/') {
            Some(pos) if pos > 0 => (
                &registry_and_namespace[..pos],
                &registry_and_namespace[pos + 1..],
            ),
            _ => (registry_and_namespace, ""),
        };

        let repository_and_suffix = match image_ref.rfind('/') {
            Some(pos) if pos > 0 => &image_ref[pos + 1..],
            _ => image_ref,
        };

        Self {
            registry: registry.to_string(),
            namespace: namespace.to_string(),
            repository: repository.to_string(),
            tag,
            digest,
            registry_and_namespace: registry_and_namespace.to_string(),
            repository_and_suffix: repository_and_suffix.to_string(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry_and_namespace, self.repository)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_full_reference() {
        let r = ImageRef::parse("quay.io/stolostron/cluster-proxy-addon:2.5.0@sha256:abc123");
        assert_eq!(r.registry, "quay.io");
        assert_eq!(r.namespace, "stolostron");
        assert_eq!(r.repository, "cluster-proxy-addon");
        assert_eq!(r.tag.as_deref(), Some("2.5.0"));
        assert_eq!(r.digest.as_deref(), Some("sha256:abc123"));
        assert_eq!(r.registry_and_namespace, "quay.io/stolostron");
        assert_eq!(r.repository_and_suffix, "cluster-proxy-addon:2.5.0@sha256:abc123");
    }

    #[test]
    fn test_parse_bare_repository_defaults_registry() {
        let r = ImageRef::parse("nginx");
        assert_eq!(r.registry, "localhost");
        assert_eq!(r.namespace, "");
        assert_eq!(r.repository, "nginx");
        assert_eq!(r.tag, None);
        assert_eq!(r.digest, None);
        assert_eq!(r.repository_and_suffix, "nginx");
    }

    #[test]
    fn test_parse_registry_port_is_not_a_tag() {
        let r = ImageRef::parse("registry.local:5000/team/app");
        assert_eq!(r.registry, "registry.local:5000");
        assert_eq!(r.namespace, "team");
        assert_eq!(r.repository, "app");
        assert_eq!(r.tag, None);

        let r = ImageRef::parse("registry.local:5000/app:v3");
        assert_eq!(r.registry, "registry.local:5000");
        assert_eq!(r.repository, "app");
        assert_eq!(r.tag.as_deref(), Some("v3"));
    }

    #[test]
    fn test_parse_digest_only() {
        let r = ImageRef::parse("quay.io/acme/agent@sha256:deadbeef");
        assert_eq!(r.repository, "agent");
        assert_eq!(r.tag, None);
        assert_eq!(r.digest.as_deref(), Some("sha256:deadbeef"));
    }

    #[test]
    fn test_parse_nested_namespace() {
        let r = ImageRef::parse("registry.example.com/org/team/controller:v1");
        assert_eq!(r.registry, "registry.example.com");
        assert_eq!(r.namespace, "org/team");
        assert_eq!(r.repository, "controller");
    }

    #[test]
    fn test_leading_separators_are_ignored() {
        let r = ImageRef::parse("@sha256:abc");
        assert_eq!(r.digest, None);
        assert_eq!(r.tag.as_deref(), Some("abc"));
        assert_eq!(r.repository, "@sha256");

        let r = ImageRef::parse(":latest");
        assert_eq!(r.tag, None);
        assert_eq!(r.repository, ":latest");
        assert_eq!(r.registry, "localhost");
    }

    #[test]
    fn test_display_reconstructs_reference() {
        let r = ImageRef::parse("quay.io/acme/controller:v1");
        assert_eq!(r.to_string(), "quay.io/acme/controller:v1");
        assert_eq!(ImageRef::parse("nginx").to_string(), "localhost/nginx");
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,8}"
    }

    proptest! {
        #[test]
        fn prop_reconstruction_round_trips(
            registry in proptest::option::of((segment(), proptest::option::of(1000u16..65535))),
            namespace in proptest::option::of(segment()),
            repository in segment(),
            tag in proptest::option::of("[a-zA-Z0-9][a-zA-Z0-9._-]{0,8}"),
            digest in proptest::option::of("sha256:[a-f0-9]{8,16}"),
        ) {
            let mut image = String::new();
            if let Some((host, port)) = &registry {
                image.push_str(host);
                image.push_str(".io");
                if let Some(port) = port {
                    image.push_str(&format!(":{}", port));
                }
                image.push('/');
            }
            if let Some(ns) = &namespace {
                image.push_str(ns);
                image.push('/');
            }
            image.push_str(&repository);
            if let Some(tag) = &tag {
                image.push_str(&format!(":{}", tag));
            }
            if let Some(digest) = &digest {
                image.push_str(&format!("@{}", digest));
            }

            let parsed = ImageRef::parse(&image);
            prop_assert_eq!(&parsed.repository, &repository);
            prop_assert_eq!(&parsed.tag, &tag);
            prop_assert_eq!(&parsed.digest, &digest);

            let reparsed = ImageRef::parse(&parsed.to_string());
            prop_assert_eq!(reparsed.registry_and_namespace, parsed.registry_and_namespace);
            prop_assert_eq!(reparsed.repository, parsed.repository);
            prop_assert_eq!(reparsed.tag, parsed.tag);
            prop_assert_eq!(reparsed.digest, parsed.digest);
        }
    }
}
