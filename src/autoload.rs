//! Global snippets: every note flagged with the autoload key contributes its
//! CSS blocks to one stylesheet shared by all views.

use std::cell::RefCell;
use std::collections::BTreeSet;

use crate::cache::MarkerCache;
use crate::error::{ChiselError, Result};
use crate::host::Vault;
use crate::metadata::Frontmatter;
use crate::snippet;

pub fn is_eligible(frontmatter: Option<&Frontmatter>, key: &str) -> bool {
    frontmatter
        .and_then(|fm| fm.get(key))
        .is_some_and(|value| value.is_truthy())
}

/// Takes `&self` so a refresh can await note reads without holding a borrow
/// of the aggregator across the suspension.
#[derive(Debug, Default)]
pub struct AutoloadAggregator {
    cache: RefCell<MarkerCache<String>>,
    tracked: RefCell<BTreeSet<String>>,
    last: RefCell<Option<String>>,
}

impl AutoloadAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` was eligible in the last completed pass.
    pub fn tracks(&self, path: &str) -> bool {
        self.tracked.borrow().contains(path)
    }

    pub fn invalidate(&self, path: &str) {
        self.cache.borrow_mut().invalidate(path);
    }

    /// Forgets everything, e.g. after the autoload key itself changed.
    pub fn reset(&self) {
        self.cache.borrow_mut().clear();
        self.tracked.borrow_mut().clear();
        self.last.replace(None);
    }

    /// The aggregate most recently handed out.
    #[cfg(test)]
    pub fn current(&self) -> Option<String> {
        self.last.borrow().clone()
    }

    /// Rebuilds the aggregate. Returns `Ok(Some(css))` when it differs from
    /// the previous one and `Ok(None)` when nothing needs to be written.
    pub async fn refresh<V: Vault>(&self, vault: &V, key: &str) -> Result<Option<String>> {
        let documents = vault.documents().ok_or(ChiselError::VaultUnavailable)?;
        let mut eligible: Vec<_> = documents
            .into_iter()
            .filter(|doc| is_eligible(vault.frontmatter(&doc.path).as_ref(), key))
            .collect();
        eligible.sort_by(|a, b| a.path.cmp(&b.path));

        let mut aggregate = String::new();
        for doc in &eligible {
            let cached = self.cache.borrow_mut().get(&doc.path, doc.modified);
            let css = match cached {
                Some(css) => css,
                None => {
                    let text = match vault.read(&doc.path).await {
                        Ok(text) => text,
                        Err(err) => {
                            tracing::warn!(path = %doc.path, "skipping autoload note: {err}");
                            continue;
                        }
                    };
                    let css = snippet::extract(&text);
                    self.cache
                        .borrow_mut()
                        .insert(doc.path.clone(), doc.modified, css.clone());
                    css
                }
            };
            if !css.is_empty() {
                aggregate.push_str(&css);
                aggregate.push('\n');
            }
        }

        let live: BTreeSet<String> = eligible.into_iter().map(|doc| doc.path).collect();
        self.cache.borrow_mut().retain(|path| live.contains(path));
        self.tracked.replace(live);

        if self.last.borrow().as_deref() == Some(aggregate.as_str()) {
            return Ok(None);
        }
        tracing::debug!(bytes = aggregate.len(), "autoload stylesheet changed");
        self.last.replace(Some(aggregate.clone()));
        Ok(Some(aggregate))
    }
}
