//! Categories of remote objects. Every kind gets its own isolated store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownKind;
use crate::normalize::{NameNormalizer, NormalizeOptions, Normalizer, UriNormalizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Kind {
    /// Seeds are identified by their URI.
    Seed,
    /// Crawl entities are identified by their display name.
    CrawlEntity,
}

impl Kind {
    pub const ALL: [Kind; 2] = [Kind::Seed, Kind::CrawlEntity];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Seed => "seed",
            Kind::CrawlEntity => "crawlEntity",
        }
    }

    /// The normalizer that derives canonical keys for this kind.
    ///
    /// `options` only affect URI-identified kinds.
    pub fn default_normalizer(&self, options: NormalizeOptions) -> Box<dyn Normalizer> {
        match self {
            Kind::Seed => Box::new(UriNormalizer::new(options)),
            Kind::CrawlEntity => Box::new(NameNormalizer),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "seed" => Ok(Kind::Seed),
            "crawlentity" => Ok(Kind::CrawlEntity),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}
