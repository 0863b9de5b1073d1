// src/services/extractor.rs

//! Field extractor for embedded links and their coupon codes.

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};
use url::Url;

use crate::error::Result;
use crate::models::ExtractConfig;
use crate::utils::url::query_values;

/// Links and codes pulled out of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub urls: BTreeSet<String>,
    pub codes: BTreeSet<String>,
}

/// Stateless extractor for links of a single target domain.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    link_re: Regex,
    code_params: Vec<String>,
}

impl FieldExtractor {
    /// Build the link expression for the configured domain.
    pub fn new(config: &ExtractConfig) -> Result<Self> {
        let domain = regex::escape(config.domain.trim());
        let link_re = RegexBuilder::new(&format!(r"https?://(?:www\.)?{domain}/[^\s)>\]]+"))
            .case_insensitive(true)
            .build()?;
        let code_params = config
            .code_params
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        Ok(Self {
            link_re,
            code_params,
        })
    }

    /// Extract links and codes from `text`.
    ///
    /// Candidates that do not parse as URLs are skipped.
    pub fn extract(&self, text: &str) -> Extraction {
        let mut out = Extraction::default();

        for candidate in self.link_re.find_iter(text) {
            let raw = candidate.as_str();
            let parsed = match Url::parse(raw) {
                Ok(url) => url,
                Err(e) => {
                    log::debug!("Skipping malformed link {:?}: {}", raw, e);
                    continue;
                }
            };

            out.codes.extend(query_values(&parsed, &self.code_params));
            out.urls.insert(raw.to_string());
        }

        out
    }
}
