//! Accept/reject decisions for discovered releases.

use std::collections::HashMap;

use crate::release::{Category, Release};

use super::config::{CategoryFilterConfig, FiltersConfig};
use super::types::Decision;

/// Decides whether a discovered release enters the pipeline.
pub trait AcceptPolicy: Send + Sync {
    fn decide(&self, release: &Release) -> Decision;
}

/// Accepts everything.
pub struct AcceptAll;

impl AcceptPolicy for AcceptAll {
    fn decide(&self, _release: &Release) -> Decision {
        Decision::Accept
    }
}

/// Per-category include/exclude terms and size limits.
///
/// Rules are checked in order: a disabled category rejects, an oversized
/// release rejects, an include term accepts, an exclude term rejects.
/// Categories without rules accept.
pub struct CategoryFilter {
    rules: HashMap<Category, CategoryFilterConfig>,
}

impl CategoryFilter {
    pub fn new(config: &FiltersConfig) -> Self {
        let rules = config
            .categories
            .iter()
            .filter_map(|(name, rule)| {
                let category = name.parse::<Category>().ok()?;
                let normalized = CategoryFilterConfig {
                    enabled: rule.enabled,
                    includes: rule.includes.iter().map(|t| t.to_lowercase()).collect(),
                    excludes: rule.excludes.iter().map(|t| t.to_lowercase()).collect(),
                    max_size: rule.max_size,
                };
                Some((category, normalized))
            })
            .collect();
        Self { rules }
    }
}

impl AcceptPolicy for CategoryFilter {
    fn decide(&self, release: &Release) -> Decision {
        let Some(rule) = self.rules.get(&release.category) else {
            return Decision::Accept;
        };

        if !rule.enabled {
            return Decision::Reject(format!("category {} is disabled", release.category));
        }

        if rule.max_size > 0 && release.size > rule.max_size {
            return Decision::Reject(format!(
                "size {} exceeds {} for category {}",
                release.size, rule.max_size, release.category
            ));
        }

        let name = release.name.to_lowercase();
        if rule.includes.iter().any(|term| name.contains(term.as_str())) {
            return Decision::Accept;
        }
        if let Some(term) = rule.excludes.iter().find(|term| name.contains(term.as_str())) {
            return Decision::Reject(format!("name contains excluded term {:?}", term));
        }

        Decision::Accept
    }
}
