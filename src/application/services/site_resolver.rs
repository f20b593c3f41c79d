//! Site Resolver
//!
//! Maps an inbound `Host` header to the tenant whose tree should be served.

use crate::domain::value_objects::{SiteSlug, SlugError};

/// Host header could not be mapped to a site.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("missing host header")]
    Missing,

    #[error("invalid host: {0}")]
    Invalid(String),

    #[error("invalid site label in host {host}: {source}")]
    BadSlug {
        host: String,
        #[source]
        source: SlugError,
    },
}

/// Site selected for a request, plus the normalized host it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSite {
    pub slug: SiteSlug,
    pub host: String,
    /// True when the bare local host fell back to the default site
    pub is_default: bool,
}

/// Stateless host-to-site mapping.
#[derive(Debug, Clone)]
pub struct SiteResolver {
    local_host: String,
    default_site: SiteSlug,
}

impl SiteResolver {
    pub fn new(local_host: impl Into<String>, default_site: SiteSlug) -> Self {
        Self {
            local_host: normalize(&local_host.into()),
            default_site,
        }
    }

    pub fn local_host(&self) -> &str {
        &self.local_host
    }

    /// Resolve a raw `Host` header value.
    ///
    /// Accepted forms are `<local>`, `<local>:<port>`, `<slug>.<local>` and
    /// `<slug>.<local>:<port>`. Everything else, including IPv6 literals
    /// and nested subdomains, is rejected.
    pub fn resolve(&self, raw_host: &str) -> Result<ResolvedSite, HostError> {
        let raw = raw_host.trim();
        if raw.is_empty() {
            return Err(HostError::Missing);
        }
        if raw.starts_with('[') {
            return Err(HostError::Invalid(raw.to_string()));
        }

        let host = match raw.rsplit_once(':') {
            Some((name, port)) => {
                if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(HostError::Invalid(raw.to_string()));
                }
                name
            }
            None => raw,
        };
        let host = normalize(host);
        if host.is_empty() || host.contains(':') {
            return Err(HostError::Invalid(raw.to_string()));
        }

        if host == self.local_host {
            return Ok(ResolvedSite {
                slug: self.default_site.clone(),
                host,
                is_default: true,
            });
        }

        let label = host
            .strip_suffix(self.local_host.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .ok_or_else(|| HostError::Invalid(raw.to_string()))?;
        if label.is_empty() || label.contains('.') {
            return Err(HostError::Invalid(raw.to_string()));
        }

        let slug = SiteSlug::parse(label).map_err(|source| HostError::BadSlug {
            host: host.clone(),
            source,
        })?;
        Ok(ResolvedSite {
            slug,
            host,
            is_default: false,
        })
    }
}

fn normalize(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}
