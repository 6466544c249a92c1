//! Identity normalization: raw identity strings → canonical store keys.
//!
//! URIs follow WHATWG URL parsing (via the `url` crate): scheme and host are
//! lower-cased, default ports are dropped, an empty path becomes `/` and the
//! fragment never takes part in identity. Names are compared case- and
//! whitespace-insensitively.
//!
//! Every normalizer is idempotent for fixed options:
//! `normalize(normalize(s)) == normalize(s)`.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::NormalizeError;

/// Derives the canonical key for a raw identity.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> Result<String, NormalizeError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Drop the scheme component, so `http://x/` and `https://x/` share a key.
    pub ignore_scheme: bool,
    /// Collapse to the root form of the URI by discarding path and query.
    pub toplevel: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UriNormalizer {
    options: NormalizeOptions,
}

impl UriNormalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> NormalizeOptions {
        self.options
    }
}

/// Scheme assumed for identities written without one (`example.com/path`).
const DEFAULT_SCHEME: &str = "http";

impl Normalizer for UriNormalizer {
    fn normalize(&self, raw: &str) -> Result<String, NormalizeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(NormalizeError::invalid(raw, "empty identity"));
        }

        let mut url = if has_scheme(trimmed) {
            Url::parse(trimmed)
        } else {
            Url::parse(&format!("{DEFAULT_SCHEME}://{trimmed}"))
        }
        .map_err(|e| NormalizeError::invalid(raw, e.to_string()))?;

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(NormalizeError::invalid(raw, "missing hostname")),
        };

        // Opaque hosts of non-special schemes keep their case after parsing.
        let lowered = host.to_ascii_lowercase();
        if lowered != host {
            url.set_host(Some(&lowered))
                .map_err(|e| NormalizeError::invalid(raw, e.to_string()))?;
        }

        url.set_fragment(None);

        if self.options.toplevel {
            url.set_path("/");
            url.set_query(None);
        }

        if !self.options.ignore_scheme {
            return Ok(url.to_string());
        }

        // Render as the default scheme so a scheme-less key parses back to
        // itself. Ports that are the default for that scheme are dropped here.
        if url.scheme() != DEFAULT_SCHEME
            && url.set_scheme(DEFAULT_SCHEME).is_ok()
            && url.port() == Some(80)
        {
            let _ = url.set_port(None);
        }
        let scheme_prefix = format!("{}://", url.scheme());
        let serialized = url.to_string();
        Ok(serialized
            .strip_prefix(&scheme_prefix)
            .unwrap_or(&serialized)
            .to_string())
    }
}

/// Whether `s` starts with `scheme://`. A `://` further in (a URL inside the
/// query, say) does not count.
fn has_scheme(s: &str) -> bool {
    let Some(end) = s.find("://") else {
        return false;
    };
    let scheme = &s[..end];
    scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Normalizer for identities that are plain names.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameNormalizer;

impl Normalizer for NameNormalizer {
    fn normalize(&self, raw: &str) -> Result<String, NormalizeError> {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return Err(NormalizeError::invalid(raw, "empty name"));
        }
        Ok(collapsed.to_lowercase())
    }
}
