//! View mode classes (`chisel-reading`, `chisel-canvas`, ...).

use serde::{Deserialize, Serialize};

/// What the host reports about the active view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    /// `data-type` of the view content, e.g. `markdown` or `canvas`.
    pub view_type: String,
    /// `data-mode` of markdown views: `preview` or `source`.
    pub mode: Option<String>,
}

impl Leaf {
    pub fn new(view_type: impl Into<String>, mode: Option<&str>) -> Self {
        Self {
            view_type: view_type.into(),
            mode: mode.map(str::to_string),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewMode {
    NoteReading,
    NoteEditing,
    Canvas,
    Empty,
    WebViewer,
    Base,
}

impl ViewMode {
    pub const ALL: [ViewMode; 6] = [
        Self::NoteReading,
        Self::NoteEditing,
        Self::Canvas,
        Self::Empty,
        Self::WebViewer,
        Self::Base,
    ];

    pub fn classify(leaf: &Leaf) -> Option<Self> {
        match leaf.view_type.as_str() {
            "markdown" => match leaf.mode.as_deref() {
                Some("preview") => Some(Self::NoteReading),
                Some("source") => Some(Self::NoteEditing),
                _ => None,
            },
            "canvas" => Some(Self::Canvas),
            "empty" => Some(Self::Empty),
            "webviewer" => Some(Self::WebViewer),
            "bases" => Some(Self::Base),
            _ => None,
        }
    }

    pub fn classes(self) -> &'static [&'static str] {
        match self {
            Self::NoteReading => &["chisel-note", "chisel-reading"],
            Self::NoteEditing => &["chisel-note", "chisel-editing"],
            Self::Canvas => &["chisel-canvas"],
            Self::Empty => &["chisel-empty"],
            Self::WebViewer => &["chisel-webviewer"],
            Self::Base => &["chisel-base"],
        }
    }
}

/// Classes to drop and to put on when moving between modes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModeChange {
    /// Classes of the old mode that the new one does not carry.
    pub exit: Vec<&'static str>,
    pub enter: Vec<&'static str>,
    /// Every class of the old mode. The active view may be a different leaf
    /// than before, so the old leaf loses all of them.
    pub previous: Vec<&'static str>,
}

#[derive(Debug, Default)]
pub struct ModeClassifier {
    current: Option<ViewMode>,
}

impl ModeClassifier {
    pub fn current(&self) -> Option<ViewMode> {
        self.current
    }

    /// Moves to the mode of `leaf`. Classes shared by both modes stay put.
    pub fn transition(&mut self, leaf: Option<&Leaf>) -> ModeChange {
        let next = leaf.and_then(ViewMode::classify);
        let old = self.current.map(ViewMode::classes).unwrap_or_default();
        let new = next.map(ViewMode::classes).unwrap_or_default();
        self.current = next;
        ModeChange {
            exit: old.iter().filter(|c| !new.contains(*c)).copied().collect(),
            enter: new.to_vec(),
            previous: old.to_vec(),
        }
    }

    /// Leaves whatever mode is active.
    pub fn reset(&mut self) -> ModeChange {
        self.transition(None)
    }
}
