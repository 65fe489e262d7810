use crate::{Error, Result};
use regex::Regex;
use url::Url;

/// Path globs excluded from the crawl.
#[derive(Debug, Clone, Default)]
pub struct RouteFilter {
    patterns: Vec<Regex>,
}

impl RouteFilter {
    pub fn new(globs: &[String]) -> Result<Self> {
        let patterns = globs
            .iter()
            .map(|g| glob_regex(g))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether `path` fully matches any glob.
    pub fn excludes(&self, path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(path))
    }
}

/// `*` becomes `.*`; every other character is literal. Anchored at both ends.
fn glob_regex(glob: &str) -> Result<Regex> {
    let body = regex::escape(glob).replace(r"\*", ".*");
    Regex::new(&format!("^{}$", body))
        .map_err(|e| Error::Config(format!("invalid exclude route '{}': {}", glob, e)))
}

/// Visited-set key: the URL without its fragment.
pub(crate) fn visit_key(url: &Url) -> String {
    let mut u = url.clone();
    u.set_fragment(None);
    u.to_string()
}

/// Resolve an href against `base`, keeping it only when it stays on `origin`.
pub(crate) fn follow(base: &Url, origin: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["mailto:", "javascript:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }
    let url = base.join(href).ok()?;
    (url.origin() == origin.origin()).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globs_are_anchored_and_literal() {
        let filter = RouteFilter::new(&["/admin/*".into(), "/logout".into(), "/a.b".into()]).unwrap();
        assert!(filter.excludes("/admin/users"));
        assert!(filter.excludes("/admin/"));
        assert!(filter.excludes("/logout"));
        assert!(!filter.excludes("/logout/now"));
        assert!(!filter.excludes("/x/admin/users"));
        assert!(filter.excludes("/a.b"));
        assert!(!filter.excludes("/aXb"));
    }

    #[test]
    fn visit_key_drops_fragment() {
        let a = Url::parse("http://app.test/docs#intro").unwrap();
        let b = Url::parse("http://app.test/docs#usage").unwrap();
        assert_eq!(visit_key(&a), visit_key(&b));
        let c = Url::parse("http://app.test/docs?page=2").unwrap();
        assert_ne!(visit_key(&a), visit_key(&c));
    }

    #[test]
    fn follow_stays_on_origin() {
        let base = Url::parse("http://app.test/blog/").unwrap();
        assert_eq!(
            follow(&base, &base, "post-1").unwrap().as_str(),
            "http://app.test/blog/post-1"
        );
        assert_eq!(
            follow(&base, &base, "/about").unwrap().as_str(),
            "http://app.test/about"
        );
        assert!(follow(&base, &base, "https://other.test/").is_none());
        assert!(follow(&base, &base, "mailto:a@b.c").is_none());
        assert!(follow(&base, &base, "javascript:void(0)").is_none());
        assert!(follow(&base, &base, "#top").is_none());
    }
}
