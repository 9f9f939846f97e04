//! The two seams between the controller and the editor it runs in.
//!
//! [`Vault`] is the metadata source: the open note, the corpus listing,
//! parsed frontmatter, note contents and the settings blob. [`Surface`] is
//! the presentation layer: body/view classes, named style elements, notices
//! and timers. Both are single-threaded and take `&self`; implementations use
//! interior mutability where they need it.

use serde_json::Value;

use crate::error::Result;
use crate::metadata::{DocumentRef, Frontmatter};
use crate::mode::Leaf;

#[allow(async_fn_in_trait)]
pub trait Vault {
    fn active_document(&self) -> Option<DocumentRef>;

    /// Every markdown note, or `None` while the corpus cannot be enumerated yet.
    fn documents(&self) -> Option<Vec<DocumentRef>>;

    fn frontmatter(&self, path: &str) -> Option<Frontmatter>;

    async fn read(&self, path: &str) -> Result<String>;

    async fn load_data(&self) -> Result<Option<Value>>;

    async fn save_data(&self, data: &Value) -> Result<()>;
}

#[allow(async_fn_in_trait)]
pub trait Surface {
    /// Fails when the view rejects the class token.
    fn add_class(&self, target: ClassTarget, class: &str) -> Result<()>;

    fn remove_class(&self, target: ClassTarget, class: &str);

    /// Creates the slot on first use, then updates it in place.
    fn set_style(&self, slot: StyleSlot, css: &str);

    fn remove_style(&self, slot: StyleSlot);

    fn active_leaf(&self) -> Option<Leaf>;

    /// Shows a short, non-blocking message to the user.
    fn notify(&self, message: &str);

    async fn sleep(&self, millis: u32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClassTarget {
    Body,
    /// Content container of the active view.
    ViewContent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StyleSlot {
    /// Snippets of every autoload note.
    Autoload,
    /// Snippets named by the active note.
    NoteSnippet,
    /// Custom properties compiled from the active note.
    CustomProperties,
}

impl StyleSlot {
    pub const ALL: [StyleSlot; 3] = [Self::Autoload, Self::NoteSnippet, Self::CustomProperties];

    pub fn element_id(self) -> &'static str {
        match self {
            Self::Autoload => "chisel-autoload-styles",
            Self::NoteSnippet => "chisel-note-style",
            Self::CustomProperties => "chisel-custom-props",
        }
    }
}
