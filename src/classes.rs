//! Body class reconciliation.
//!
//! The reconciler owns the set of classes it has put on the body and hands
//! back only the delta needed to reach the next target set. Switching to a
//! different note resets the baseline so no class leaks from one note into an
//! unrelated one.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::metadata::Frontmatter;
use crate::settings::{Settings, StartupSnapshot};

pub const CLASS_PREFIX: &str = "cssclass-";

/// What the applied class set currently describes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Subject {
    /// No note open.
    #[default]
    Idle,
    /// Classes replayed from the startup snapshot.
    Snapshot,
    /// An open note, identified by its vault path.
    Document(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassDiff {
    pub add: BTreeSet<String>,
    pub remove: BTreeSet<String>,
    /// Raw values that could not be turned into a class name.
    pub rejected: Vec<String>,
}

impl ClassDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ClassReconciler {
    applied: BTreeSet<String>,
    subject: Subject,
}

impl ClassReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> &BTreeSet<String> {
        &self.applied
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Computes the delta for `subject` described by `frontmatter`.
    pub fn reconcile(
        &mut self,
        settings: &Settings,
        subject: Subject,
        frontmatter: Option<&Frontmatter>,
    ) -> ClassDiff {
        let raw: Vec<String> = frontmatter
            .map(|fm| {
                settings
                    .class_keys()
                    .into_iter()
                    .flat_map(|key| fm.names(key))
                    .collect()
            })
            .unwrap_or_default();
        self.advance(settings, subject, raw)
    }

    /// Computes the delta that puts the snapshot's classes on screen.
    pub fn reconcile_snapshot(
        &mut self,
        settings: &Settings,
        snapshot: &StartupSnapshot,
    ) -> ClassDiff {
        self.advance(settings, Subject::Snapshot, snapshot.class_list.clone())
    }

    /// Drops a class the view refused to take.
    pub fn forget(&mut self, class: &str) {
        self.applied.remove(class);
    }

    /// Empties the applied set, returning what was applied.
    pub fn clear(&mut self) -> BTreeSet<String> {
        self.subject = Subject::Idle;
        std::mem::take(&mut self.applied)
    }

    /// Local classes currently applied, without their prefix.
    pub fn local_names(&self) -> Vec<String> {
        self.applied
            .iter()
            .filter_map(|class| class.strip_prefix(CLASS_PREFIX))
            .map(str::to_string)
            .collect()
    }

    fn advance(&mut self, settings: &Settings, subject: Subject, raw: Vec<String>) -> ClassDiff {
        let mut target: BTreeSet<String> =
            settings.toggle_classes().map(str::to_string).collect();
        let mut rejected = Vec::new();
        for value in raw {
            match class_name(&value) {
                Some(class) => {
                    target.insert(class);
                }
                None => rejected.push(value),
            }
        }

        let switched = subject != self.subject;
        let (add, remove) = if switched {
            (target.clone(), self.applied.clone())
        } else {
            (
                target.difference(&self.applied).cloned().collect(),
                self.applied.difference(&target).cloned().collect(),
            )
        };
        if switched {
            tracing::debug!(?subject, "class baseline reset");
        }

        self.applied = target;
        self.subject = subject;
        ClassDiff {
            add,
            remove,
            rejected,
        }
    }
}

/// Turns a frontmatter value into a prefixed class name. Inner whitespace
/// becomes a dash; anything else that is not an identifier character is
/// rejected.
pub fn class_name(raw: &str) -> Option<String> {
    static RE_SPACE: OnceLock<Regex> = OnceLock::new();
    static RE_IDENT: OnceLock<Regex> = OnceLock::new();
    let re_space = RE_SPACE.get_or_init(|| Regex::new(r"\s+").unwrap());
    let re_ident = RE_IDENT.get_or_init(|| Regex::new(r"^[\w-]+$").unwrap());

    let trimmed = raw.trim();
    let dashed = re_space.replace_all(trimmed, "-");
    re_ident
        .is_match(&dashed)
        .then(|| format!("{CLASS_PREFIX}{dashed}"))
}
