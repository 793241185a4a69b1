//! URL parsing, resolution and proxy encoding.
//!
//! # Responsibilities
//! - Split any URL-ish string into its components (total, never fails)
//! - Resolve a reference against the current resource URL
//! - Serialize the absolute result and hand it to the [`UrlGenerator`]
//!
//! # Design Decisions
//! - Components are kept verbatim (no percent-decoding, no case folding)
//!   so a resolved URL reaches the origin exactly as the page wrote it
//! - `http`/`https` references are absolute and ignore the base entirely
//! - The base travels inside [`CurrentContext`], one per proxied request

use std::borrow::Cow;
use std::fmt;

use crate::rewrite::path::normalize;

/// Schemes whose references carry their payload inline instead of pointing
/// at another resource.
const OPAQUE_SCHEMES: &[&str] = &["data", "javascript", "mailto", "tel", "blob", "about"];

/// Components of a URL or URL reference. Any subset may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl UrlParts {
    /// Split `input` into components.
    ///
    /// Follows the generic `scheme:[//authority]path[?query][#fragment]`
    /// layout. Anything that does not fit degrades into the path.
    pub fn parse(input: &str) -> Self {
        let mut parts = UrlParts::default();
        let input = input.trim();

        let rest = match input.split_once('#') {
            Some((rest, fragment)) => {
                parts.fragment = Some(fragment.to_string());
                rest
            }
            None => input,
        };
        let rest = match rest.split_once('?') {
            Some((rest, query)) => {
                parts.query = Some(query.to_string());
                rest
            }
            None => rest,
        };

        let rest = match split_scheme(rest) {
            Some((scheme, rest)) => {
                parts.scheme = Some(scheme.to_string());
                rest
            }
            None => rest,
        };

        let path = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                parts.set_authority(&after[..end]);
                &after[end..]
            }
            None => rest,
        };
        if !path.is_empty() {
            parts.path = Some(path.to_string());
        }

        parts
    }

    fn set_authority(&mut self, authority: &str) {
        let host_port = match authority.rsplit_once('@') {
            Some((userinfo, host_port)) => {
                match userinfo.split_once(':') {
                    Some((user, pass)) => {
                        self.user = Some(user.to_string());
                        self.pass = Some(pass.to_string());
                    }
                    None => self.user = Some(userinfo.to_string()),
                }
                host_port
            }
            None => authority,
        };

        // Bracketed IPv6 literals contain colons of their own.
        let port_sep = match host_port.rfind(']') {
            Some(close) => host_port[close..].find(':').map(|i| close + i),
            None => host_port.rfind(':'),
        };
        let (host, port) = match port_sep {
            Some(i) => (&host_port[..i], &host_port[i + 1..]),
            None => (host_port, ""),
        };
        // An unparsable port is dropped rather than failing the whole URL.
        self.port = port.parse().ok();
        if !host.is_empty() {
            self.host = Some(host.to_string());
        }
    }

    /// True for `http` and `https` URLs.
    pub fn is_web(&self) -> bool {
        self.scheme
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("http") || s.eq_ignore_ascii_case("https"))
            .unwrap_or(false)
    }

    fn is_opaque(&self) -> bool {
        self.host.is_none()
            && self
                .scheme
                .as_deref()
                .map(|s| OPAQUE_SCHEMES.iter().any(|o| s.eq_ignore_ascii_case(o)))
                .unwrap_or(false)
    }

    /// Resolve this reference against `base`, returning an absolute URL.
    pub fn resolve_against(mut self, base: &UrlParts) -> UrlParts {
        if self.is_web() {
            return self;
        }

        let inherit_host = self.host.is_none();
        if inherit_host {
            self.host = base.host.clone();
            self.port = base.port;
            self.user = base.user.clone();
            self.pass = base.pass.clone();
        }
        if self.scheme.is_none() {
            self.scheme = base.scheme.clone();
        }

        if inherit_host {
            match self.path.take() {
                Some(path) if path.starts_with('/') => self.path = Some(path),
                Some(path) => {
                    let base_path = base.path.as_deref().unwrap_or("/");
                    let dir = match base_path.rfind('/') {
                        Some(i) => &base_path[..=i],
                        None => "/",
                    };
                    self.path = Some(normalize(&format!("{}{}", dir, path)));
                }
                None => {
                    self.path = base.path.clone();
                    if self.query.is_none() {
                        self.query = base.query.clone();
                    }
                }
            }
        }

        self
    }
}

impl fmt::Display for UrlParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{}:", scheme)?;
        }
        if let Some(host) = &self.host {
            f.write_str("//")?;
            if let Some(user) = &self.user {
                f.write_str(user)?;
                if let Some(pass) = &self.pass {
                    write!(f, ":{}", pass)?;
                }
                f.write_str("@")?;
            }
            f.write_str(host)?;
            if let Some(port) = self.port {
                write!(f, ":{}", port)?;
            }
        }
        if let Some(path) = &self.path {
            f.write_str(path)?;
        }
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

/// Split a leading `scheme:` off `input`, if it has a syntactically valid one.
fn split_scheme(input: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = input.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

/// Turns an absolute target URL into the browser-visible proxy URL.
pub trait UrlGenerator: Send + Sync {
    fn generate(&self, absolute_url: &str) -> String;
}

/// The resource currently being rewritten.
///
/// Built once per proxied request and handed by reference to every rewriter.
pub struct CurrentContext<'a> {
    base: UrlParts,
    generator: &'a dyn UrlGenerator,
}

impl<'a> CurrentContext<'a> {
    pub fn new(current_url: &str, generator: &'a dyn UrlGenerator) -> Self {
        Self {
            base: UrlParts::parse(current_url),
            generator,
        }
    }

    pub fn base(&self) -> &UrlParts {
        &self.base
    }

    /// Absolute form of `reference`, before proxy encoding.
    pub fn absolutize(&self, reference: &str) -> String {
        UrlParts::parse(reference)
            .resolve_against(&self.base)
            .to_string()
    }

    /// Proxy URL for `reference`.
    pub fn resolve(&self, reference: &str) -> String {
        self.generator.generate(&self.absolutize(reference))
    }

    /// Like [`resolve`](Self::resolve), but leaves inline payloads
    /// (`data:`, `javascript:`, ...) and blank references as they are.
    pub fn rewrite<'r>(&self, reference: &'r str) -> Cow<'r, str> {
        if reference.trim().is_empty() || UrlParts::parse(reference).is_opaque() {
            Cow::Borrowed(reference)
        } else {
            Cow::Owned(self.resolve(reference))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encodes as `/<absolute>`, the layout of a proxy mounted at the root.
    pub(crate) struct SlashGenerator;

    impl UrlGenerator for SlashGenerator {
        fn generate(&self, absolute_url: &str) -> String {
            format!("/{}", absolute_url)
        }
    }

    fn absolute(base: &str, reference: &str) -> String {
        CurrentContext::new(base, &SlashGenerator).absolutize(reference)
    }

    #[test]
    fn test_parse_full_url() {
        let parts = UrlParts::parse("https://u:p@example.com:8443/a/b?x=1#frag");
        assert_eq!(parts.scheme.as_deref(), Some("https"));
        assert_eq!(parts.user.as_deref(), Some("u"));
        assert_eq!(parts.pass.as_deref(), Some("p"));
        assert_eq!(parts.host.as_deref(), Some("example.com"));
        assert_eq!(parts.port, Some(8443));
        assert_eq!(parts.path.as_deref(), Some("/a/b"));
        assert_eq!(parts.query.as_deref(), Some("x=1"));
        assert_eq!(parts.fragment.as_deref(), Some("frag"));
        assert_eq!(parts.to_string(), "https://u:p@example.com:8443/a/b?x=1#frag");
    }

    #[test]
    fn test_parse_partial_references() {
        let parts = UrlParts::parse("#x");
        assert_eq!(parts.fragment.as_deref(), Some("x"));
        assert!(parts.path.is_none() && parts.host.is_none() && parts.scheme.is_none());

        let parts = UrlParts::parse("//b.test/x");
        assert_eq!(parts.host.as_deref(), Some("b.test"));
        assert_eq!(parts.path.as_deref(), Some("/x"));
        assert!(parts.scheme.is_none());

        let parts = UrlParts::parse("../img/x.png");
        assert_eq!(parts.path.as_deref(), Some("../img/x.png"));

        let parts = UrlParts::parse("http://[::1]:8080/");
        assert_eq!(parts.host.as_deref(), Some("[::1]"));
        assert_eq!(parts.port, Some(8080));
    }

    #[test]
    fn test_absolute_reference_ignores_base() {
        assert_eq!(absolute("https://a.test/dir/page", "https://x.test/p"), "https://x.test/p");
        assert_eq!(absolute("https://a.test/", "HTTP://x.test"), "HTTP://x.test");
    }

    #[test]
    fn test_relative_reference() {
        assert_eq!(
            absolute("https://a.test/dir/page", "../img/x.png"),
            "https://a.test/img/x.png"
        );
        assert_eq!(absolute("https://a.test/dir/page", "x.png"), "https://a.test/dir/x.png");
        assert_eq!(absolute("https://a.test", "x.png"), "https://a.test/x.png");
        assert_eq!(absolute("https://a.test/dir/page", "/root.css"), "https://a.test/root.css");
    }

    #[test]
    fn test_scheme_relative_reference() {
        assert_eq!(absolute("https://a.test/", "//b.test/x"), "https://b.test/x");
        assert_eq!(absolute("http://a.test/dir/", "//b.test"), "http://b.test");
    }

    #[test]
    fn test_inherits_authority() {
        assert_eq!(
            absolute("http://u:p@a.test:8080/dir/page", "next?q=2"),
            "http://u:p@a.test:8080/dir/next?q=2"
        );
    }

    #[test]
    fn test_bare_fragment_and_query() {
        assert_eq!(absolute("https://a.test/dir/page?x=1", "#top"), "https://a.test/dir/page?x=1#top");
        assert_eq!(absolute("https://a.test/dir/page?x=1", "?y=2"), "https://a.test/dir/page?y=2");
        assert_eq!(absolute("https://a.test/dir/page", ""), "https://a.test/dir/page");
    }

    #[test]
    fn test_base_without_scheme_stays_scheme_less() {
        assert_eq!(absolute("//a.test/", "//b.test/x"), "//b.test/x");
    }

    #[test]
    fn test_resolve_goes_through_generator() {
        let ctx = CurrentContext::new("https://google.com/", &SlashGenerator);
        assert_eq!(ctx.resolve("/"), "/https://google.com/");
        assert_eq!(ctx.resolve("//youtube.com/"), "/https://youtube.com/");
    }

    #[test]
    fn test_rewrite_skips_inline_payloads() {
        let ctx = CurrentContext::new("https://a.test/", &SlashGenerator);
        assert_eq!(ctx.rewrite("data:image/png;base64,AAAA"), "data:image/png;base64,AAAA");
        assert_eq!(ctx.rewrite("javascript:void(0)"), "javascript:void(0)");
        assert_eq!(ctx.rewrite("mailto:a@b.test"), "mailto:a@b.test");
        assert_eq!(ctx.rewrite("  "), "  ");
        assert_eq!(ctx.rewrite("img.png"), "/https://a.test/img.png");
    }
}
