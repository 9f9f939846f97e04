//! The plugin context object.
//!
//! [`Chisel`] owns every piece of presentation state (applied classes, the
//! current mode, the last text written to each style slot, the settings) and
//! is the only thing that writes to the [`Surface`]. It is a cheap handle:
//! clones share state, so host callbacks can each hold one and spawn passes
//! on the local executor. State is only borrowed between suspension points,
//! never across a note read or a timer.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use serde_json::Value;

use crate::autoload::{self, AutoloadAggregator};
use crate::classes::{ClassDiff, ClassReconciler, Subject};
use crate::error::{ChiselError, Result};
use crate::host::{ClassTarget, StyleSlot, Surface, Vault};
use crate::metadata::Frontmatter;
use crate::mode::{ModeClassifier, ViewMode};
use crate::props;
use crate::schedule::{Backoff, Debouncer};
use crate::settings::{Settings, StartupSnapshot};
use crate::snippet;

pub const RECONCILE_DEBOUNCE_MS: u32 = 40;
pub const MODE_SETTLE_MS: u32 = 100;
/// Marker class present on the body for as long as the plugin is loaded.
pub const BODY_MARKER: &str = "chisel";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    /// A note was already open or the snapshot ran before.
    Skipped,
    Applied,
    /// The vault never became available; nothing was shown.
    Abandoned,
}

#[derive(Debug, Default)]
struct State {
    settings: Settings,
    classes: ClassReconciler,
    modes: ModeClassifier,
    styles: HashMap<StyleSlot, String>,
    snippet_names: Vec<String>,
    snapshot_applied: bool,
}

pub struct Chisel<V, S> {
    vault: Rc<V>,
    surface: Rc<S>,
    state: Rc<RefCell<State>>,
    autoload: Rc<AutoloadAggregator>,
    document_timer: Debouncer,
    /// Ticket of the newest document or snapshot pass.
    document_pass: Debouncer,
    autoload_timer: Debouncer,
    mode_timer: Debouncer,
    backoff: Backoff,
}

impl<V, S> Clone for Chisel<V, S> {
    fn clone(&self) -> Self {
        Self {
            vault: Rc::clone(&self.vault),
            surface: Rc::clone(&self.surface),
            state: Rc::clone(&self.state),
            autoload: Rc::clone(&self.autoload),
            document_timer: self.document_timer.clone(),
            document_pass: self.document_pass.clone(),
            autoload_timer: self.autoload_timer.clone(),
            mode_timer: self.mode_timer.clone(),
            backoff: self.backoff,
        }
    }
}

impl<V: Vault, S: Surface> Chisel<V, S> {
    /// Loads settings from the vault and marks the body.
    pub async fn load(vault: Rc<V>, surface: Rc<S>) -> Self {
        let stored = match vault.load_data().await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!("could not load settings, using defaults: {err}");
                None
            }
        };
        let state = State {
            settings: Settings::from_stored(stored),
            ..State::default()
        };
        if let Err(err) = surface.add_class(ClassTarget::Body, BODY_MARKER) {
            tracing::warn!("could not mark body: {err}");
        }
        Self {
            vault,
            surface,
            state: Rc::new(RefCell::new(state)),
            autoload: Rc::new(AutoloadAggregator::new()),
            document_timer: Debouncer::new(),
            document_pass: Debouncer::new(),
            autoload_timer: Debouncer::new(),
            mode_timer: Debouncer::new(),
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn settings(&self) -> Settings {
        self.state.borrow().settings.clone()
    }

    /// Body classes currently owned by the reconciler.
    pub fn applied_classes(&self) -> BTreeSet<String> {
        self.state.borrow().classes.applied().clone()
    }

    pub fn mode(&self) -> Option<ViewMode> {
        self.state.borrow().modes.current()
    }

    /// Snippet names requested by the last reconciled note.
    pub fn snippet_names(&self) -> Vec<String> {
        self.state.borrow().snippet_names.clone()
    }

    /// First passes after [`Chisel::load`]: modes, the open note or the
    /// startup snapshot, and the global stylesheet.
    pub async fn start(&self) {
        self.update_modes();
        if self.vault.active_document().is_some() {
            self.update_document().await;
        } else if self.apply_startup_snapshot().await == StartupOutcome::Applied {
            return;
        }
        self.refresh_autoload().await;
    }

    pub async fn active_leaf_changed(&self) {
        self.document_changed().await;
        self.layout_changed().await;
    }

    /// Debounced [`Chisel::update_document`]. Returns whether this call ran
    /// the pass or was superseded by a later one.
    pub async fn document_changed(&self) -> bool {
        let run = self
            .document_timer
            .settle(&*self.surface, RECONCILE_DEBOUNCE_MS)
            .await;
        if run {
            self.update_document().await;
        }
        run
    }

    /// Debounced [`Chisel::refresh_autoload`].
    pub async fn autoload_changed(&self) -> bool {
        let run = self
            .autoload_timer
            .settle(&*self.surface, RECONCILE_DEBOUNCE_MS)
            .await;
        if run {
            self.refresh_autoload().await;
        }
        run
    }

    pub async fn layout_changed(&self) -> bool {
        let run = self.mode_timer.settle(&*self.surface, MODE_SETTLE_MS).await;
        if run {
            self.update_modes();
        }
        run
    }

    /// A note's content or frontmatter changed.
    pub async fn metadata_changed(&self, path: &str) {
        let is_active = self
            .vault
            .active_document()
            .is_some_and(|doc| doc.path == path);
        let key = self.state.borrow().settings.autoload_key.clone();
        let touches_autoload = self.autoload.tracks(path)
            || autoload::is_eligible(self.vault.frontmatter(path).as_ref(), &key);

        if touches_autoload {
            self.autoload.invalidate(path);
        }
        if is_active {
            self.document_changed().await;
        }
        if touches_autoload {
            self.autoload_changed().await;
        }
    }

    /// The host finished indexing a note. Also the signal that the corpus
    /// may have become enumerable.
    pub async fn metadata_resolved(&self, path: &str) {
        let is_active = self
            .vault
            .active_document()
            .is_some_and(|doc| doc.path == path);
        if is_active {
            self.document_changed().await;
        }
        self.autoload_changed().await;
    }

    /// Reconciles classes, custom properties and note snippets against the
    /// open note. Everything is computed before the first write; a pass
    /// overtaken by a newer one while reading snippets writes nothing.
    pub async fn update_document(&self) {
        let ticket = self.document_pass.arm();
        let Some(doc) = self.vault.active_document() else {
            self.update_idle();
            return;
        };
        let frontmatter = self.vault.frontmatter(&doc.path).unwrap_or_default();

        let (properties, names) = {
            let state = self.state.borrow();
            let settings = &state.settings;
            let reserved = [settings.autoload_key.as_str(), settings.snippet_key.as_str()];
            (
                props::compile(&frontmatter, &reserved),
                frontmatter.names(&settings.snippet_key),
            )
        };
        let css = self.load_snippets(&names).await;
        if !self.document_pass.is_current(ticket) {
            tracing::debug!(path = %doc.path, "document pass superseded");
            return;
        }

        self.apply_classes(Subject::Document(doc.path.clone()), &frontmatter);
        self.write_style(StyleSlot::CustomProperties, properties);
        self.write_style(StyleSlot::NoteSnippet, css);
        self.capture_snapshot(names).await;
    }

    /// Applies the mode of the active view to the body and the view content.
    pub fn update_modes(&self) {
        let leaf = self.surface.active_leaf();
        let change = self.state.borrow_mut().modes.transition(leaf.as_ref());
        for class in &change.exit {
            self.surface.remove_class(ClassTarget::Body, class);
        }
        for class in &change.previous {
            self.surface.remove_class(ClassTarget::ViewContent, class);
        }
        for class in &change.enter {
            for target in [ClassTarget::Body, ClassTarget::ViewContent] {
                if let Err(err) = self.surface.add_class(target, class) {
                    tracing::warn!(?target, "mode class not applied: {err}");
                }
            }
        }
    }

    /// Rebuilds the global autoload stylesheet. Returns whether it was rewritten.
    pub async fn refresh_autoload(&self) -> bool {
        let key = self.state.borrow().settings.autoload_key.clone();
        match self.autoload.refresh(&*self.vault, &key).await {
            Ok(Some(css)) => {
                self.write_style(StyleSlot::Autoload, css);
                true
            }
            Ok(None) => false,
            Err(ChiselError::VaultUnavailable) => {
                tracing::debug!("vault not ready, autoload refresh postponed");
                false
            }
            Err(err) => {
                tracing::warn!("autoload refresh failed: {err}");
                false
            }
        }
    }

    /// Replays the saved snapshot when nothing is open yet, waiting with
    /// backoff for the vault to become enumerable. Runs at most once.
    pub async fn apply_startup_snapshot(&self) -> StartupOutcome {
        if self.state.borrow().snapshot_applied || self.vault.active_document().is_some() {
            return StartupOutcome::Skipped;
        }
        self.state.borrow_mut().snapshot_applied = true;

        let mut delays = self.backoff.delays();
        while self.vault.documents().is_none() {
            let Some(delay) = delays.next() else {
                tracing::debug!("vault never became available, startup snapshot abandoned");
                return StartupOutcome::Abandoned;
            };
            self.surface.sleep(delay).await;
        }
        if self.vault.active_document().is_some() {
            return StartupOutcome::Skipped;
        }

        let ticket = self.document_pass.arm();
        let snapshot = self.state.borrow().settings.startup_snapshot.clone();
        let css = self.load_snippets(&snapshot.snippet_name_list).await;
        if !self.document_pass.is_current(ticket) {
            return StartupOutcome::Skipped;
        }

        let diff = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            state.classes.reconcile_snapshot(&state.settings, &snapshot)
        };
        self.apply_diff(diff);
        self.write_style(StyleSlot::NoteSnippet, css);
        self.state.borrow_mut().snippet_names = snapshot.snippet_name_list;

        self.refresh_autoload().await;
        tracing::debug!("startup snapshot applied");
        StartupOutcome::Applied
    }

    /// Mutates the settings, persists them and reconciles right away.
    pub async fn update_settings(&self, update: impl FnOnce(&mut Settings)) {
        let (value, autoload_key_changed) = {
            let mut state = self.state.borrow_mut();
            let before = state.settings.autoload_key.clone();
            update(&mut state.settings);
            (state.settings.to_value(), before != state.settings.autoload_key)
        };
        self.persist(value).await;
        if autoload_key_changed {
            self.autoload.reset();
            self.refresh_autoload().await;
        }
        self.update_document().await;
    }

    /// Removes everything the plugin put on the surface.
    pub fn unload(&self) {
        self.document_timer.cancel();
        self.document_pass.cancel();
        self.autoload_timer.cancel();
        self.mode_timer.cancel();

        let (classes, modes) = {
            let mut state = self.state.borrow_mut();
            state.styles.clear();
            state.snippet_names.clear();
            (state.classes.clear(), state.modes.reset())
        };
        for class in &classes {
            self.surface.remove_class(ClassTarget::Body, class);
        }
        for class in &modes.exit {
            self.surface.remove_class(ClassTarget::Body, class);
            self.surface.remove_class(ClassTarget::ViewContent, class);
        }
        for slot in StyleSlot::ALL {
            self.surface.remove_style(slot);
        }
        self.autoload.reset();
        self.surface.remove_class(ClassTarget::Body, BODY_MARKER);
    }

    /// No note open: snapshot classes stay until a note opens, anything
    /// belonging to a previous note goes.
    fn update_idle(&self) {
        let showing_snapshot = *self.state.borrow().classes.subject() == Subject::Snapshot;
        if showing_snapshot {
            let diff = {
                let mut guard = self.state.borrow_mut();
                let state = &mut *guard;
                let snapshot = state.settings.startup_snapshot.clone();
                state.classes.reconcile_snapshot(&state.settings, &snapshot)
            };
            self.apply_diff(diff);
            return;
        }
        self.apply_classes(Subject::Idle, &Frontmatter::default());
        self.write_style(StyleSlot::CustomProperties, String::new());
        self.write_style(StyleSlot::NoteSnippet, String::new());
        self.state.borrow_mut().snippet_names.clear();
    }

    fn apply_classes(&self, subject: Subject, frontmatter: &Frontmatter) {
        let diff = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            state
                .classes
                .reconcile(&state.settings, subject, Some(frontmatter))
        };
        self.apply_diff(diff);
    }

    fn apply_diff(&self, diff: ClassDiff) {
        for class in &diff.remove {
            self.surface.remove_class(ClassTarget::Body, class);
        }
        for class in &diff.add {
            if let Err(err) = self.surface.add_class(ClassTarget::Body, class) {
                tracing::warn!("{err}");
                self.state.borrow_mut().classes.forget(class);
                self.surface
                    .notify(&format!("Chisel: could not apply class \"{class}\""));
            }
        }
        for raw in &diff.rejected {
            tracing::warn!("{}", ChiselError::InvalidClass(raw.clone()));
            self.surface
                .notify(&format!("Chisel: \"{raw}\" is not a valid class name"));
        }
    }

    /// Writes `css` into `slot` unless it is already there. Empty text
    /// removes the slot.
    fn write_style(&self, slot: StyleSlot, css: String) {
        let mut state = self.state.borrow_mut();
        if css.is_empty() {
            if state.styles.remove(&slot).is_some() {
                self.surface.remove_style(slot);
            }
            return;
        }
        if state.styles.get(&slot) == Some(&css) {
            return;
        }
        self.surface.set_style(slot, &css);
        state.styles.insert(slot, css);
    }

    /// Resolves snippet notes by name and concatenates their CSS blocks.
    async fn load_snippets(&self, names: &[String]) -> String {
        if names.is_empty() {
            return String::new();
        }
        let documents = self.vault.documents().unwrap_or_default();
        let mut parts = Vec::new();
        for name in names {
            let Some(doc) = documents.iter().find(|doc| doc.matches_name(name)) else {
                tracing::warn!("{}", ChiselError::NoteNotFound(name.clone()));
                continue;
            };
            match self.vault.read(&doc.path).await {
                Ok(text) => {
                    let css = snippet::extract(&text);
                    if !css.is_empty() {
                        parts.push(css);
                    }
                }
                Err(err) => tracing::warn!(path = %doc.path, "snippet note unreadable: {err}"),
            }
        }
        parts.join("\n")
    }

    async fn capture_snapshot(&self, snippet_names: Vec<String>) {
        let value = {
            let mut state = self.state.borrow_mut();
            let snapshot = StartupSnapshot {
                class_list: state.classes.local_names(),
                snippet_name_list: snippet_names.clone(),
            };
            state.snippet_names = snippet_names;
            if state.settings.startup_snapshot == snapshot {
                return;
            }
            state.settings.startup_snapshot = snapshot;
            state.settings.to_value()
        };
        self.persist(value).await;
    }

    /// Persistence failures are logged; the in-memory settings stay
    /// authoritative until the next successful write.
    async fn persist(&self, value: Result<Value>) {
        let result = match value {
            Ok(value) => self.vault.save_data(&value).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            tracing::warn!("settings not saved: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Leaf;
    use crate::testing::{MemoryVault, RecordingSurface};
    use serde_json::json;

    type Fixture = (Rc<MemoryVault>, Rc<RecordingSurface>, Chisel<MemoryVault, RecordingSurface>);

    async fn fixture(setup: impl FnOnce(&MemoryVault)) -> Fixture {
        let vault = Rc::new(MemoryVault::new());
        setup(&vault);
        let surface = Rc::new(RecordingSurface::new());
        let chisel = Chisel::load(Rc::clone(&vault), Rc::clone(&surface)).await;
        (vault, surface, chisel)
    }

    fn body(surface: &RecordingSurface) -> BTreeSet<String> {
        surface.classes(ClassTarget::Body)
    }

    #[tokio::test]
    async fn load_marks_the_body_and_reads_settings() {
        let (_, surface, chisel) = fixture(|vault| {
            vault.set_stored(json!({ "enableColor": true }));
        })
        .await;
        assert!(surface.has_class(ClassTarget::Body, BODY_MARKER));
        assert!(chisel.settings().enable_color);
    }

    #[tokio::test]
    async fn applies_local_classes_of_the_open_note() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("a.md", "---\ncssclasses: [a, \"b \"]\n---\n");
            vault.set_active(Some("a.md"));
        })
        .await;
        chisel.update_document().await;
        assert!(surface.has_class(ClassTarget::Body, "cssclass-a"));
        assert!(surface.has_class(ClassTarget::Body, "cssclass-b"));
        assert_eq!(vault.reads(), 0);
    }

    #[tokio::test]
    async fn repeated_passes_do_not_touch_the_view() {
        let (_, surface, chisel) = fixture(|vault| {
            vault.put("a.md", "---\ncssclasses: wide\nchisel-gap: 4px\n---\n");
            vault.set_active(Some("a.md"));
        })
        .await;
        chisel.update_document().await;
        let (ops, writes) = (surface.class_ops(), surface.style_writes());
        chisel.update_document().await;
        assert_eq!(surface.class_ops(), ops);
        assert_eq!(surface.style_writes(), writes);
        assert_eq!(
            surface.style(StyleSlot::CustomProperties).as_deref(),
            Some("html body {\n  --gap: 4px !important;\n}")
        );
    }

    #[tokio::test]
    async fn closing_the_note_removes_its_classes_and_styles() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("x.md", "---\ncssclasses: [x]\nchisel-gap: 1px\n---\n");
            vault.set_active(Some("x.md"));
        })
        .await;
        chisel.update_document().await;
        vault.set_active(None);
        chisel.update_document().await;
        assert!(!surface.has_class(ClassTarget::Body, "cssclass-x"));
        assert_eq!(surface.style(StyleSlot::CustomProperties), None);
        assert!(chisel.applied_classes().is_empty());
    }

    #[tokio::test]
    async fn switching_notes_does_not_leak_classes() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("one.md", "---\ncssclasses: [x]\n---\n");
            vault.put("two.md", "# no frontmatter\n");
            vault.set_active(Some("one.md"));
        })
        .await;
        chisel.update_document().await;
        vault.set_active(Some("two.md"));
        chisel.update_document().await;
        assert!(body(&surface).iter().all(|c| !c.starts_with("cssclass-")));
    }

    #[tokio::test]
    async fn loads_named_snippet_notes_and_skips_missing_ones() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("themes/theme1.md", "```css\n.one {}\n```\n");
            vault.put("theme2.md", "```css\n.two {}\n```\n");
            vault.put("a.md", "---\nchisel: [theme1, missing, theme2]\n---\n");
            vault.set_active(Some("a.md"));
        })
        .await;
        chisel.update_document().await;
        assert_eq!(
            surface.style(StyleSlot::NoteSnippet).as_deref(),
            Some(".one {}\n.two {}")
        );
        assert_eq!(vault.reads(), 2);

        vault.put("a.md", "---\nchisel: true\n---\n");
        chisel.update_document().await;
        assert_eq!(surface.style(StyleSlot::NoteSnippet), None);
    }

    #[tokio::test]
    async fn captures_and_persists_the_startup_snapshot() {
        let (vault, _, chisel) = fixture(|vault| {
            vault.put("theme1.md", "```css\n.t {}\n```\n");
            vault.put("a.md", "---\ncssclasses: [x]\nchisel: theme1\n---\n");
            vault.set_active(Some("a.md"));
        })
        .await;
        chisel.update_document().await;
        let stored = vault.stored().unwrap();
        assert_eq!(stored["startupSnapshot"]["classList"], json!(["x"]));
        assert_eq!(stored["startupSnapshot"]["snippetNameList"], json!(["theme1"]));

        let saves = vault.saves();
        chisel.update_document().await;
        assert_eq!(vault.saves(), saves);
    }

    #[tokio::test]
    async fn save_failures_do_not_stop_reconciliation() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("a.md", "---\ncssclasses: [x]\n---\n");
            vault.set_active(Some("a.md"));
            vault.fail_saves(true);
        })
        .await;
        chisel.update_document().await;
        assert!(surface.has_class(ClassTarget::Body, "cssclass-x"));
        assert_eq!(chisel.settings().startup_snapshot.class_list, vec!["x"]);
        assert_eq!(vault.stored(), None);
    }

    #[tokio::test]
    async fn invalid_class_names_are_reported_and_skipped() {
        let (_, surface, chisel) = fixture(|vault| {
            vault.put("a.md", "---\ncssclasses: [good, \"bad.name\"]\n---\n");
            vault.set_active(Some("a.md"));
        })
        .await;
        chisel.update_document().await;
        assert!(surface.has_class(ClassTarget::Body, "cssclass-good"));
        assert_eq!(surface.notices().len(), 1);
        assert!(surface.notices()[0].contains("bad.name"));
    }

    #[tokio::test]
    async fn classes_refused_by_the_view_are_forgotten() {
        let (_, surface, chisel) = fixture(|vault| {
            vault.put("a.md", "---\ncssclasses: [ok, refused]\n---\n");
            vault.set_active(Some("a.md"));
        })
        .await;
        surface.refuse("cssclass-refused");
        chisel.update_document().await;
        assert!(!chisel.applied_classes().contains("cssclass-refused"));
        assert!(chisel.applied_classes().contains("cssclass-ok"));
        assert_eq!(surface.notices().len(), 1);
    }

    #[tokio::test]
    async fn replays_the_snapshot_once_the_vault_is_ready() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("theme1.md", "```css\n.theme1 {}\n```\n");
            vault.set_stored(json!({
                "startupSnapshot": { "classList": ["x"], "snippetNameList": ["theme1"] }
            }));
            vault.set_ready_after(3);
        })
        .await;
        chisel.start().await;
        assert!(surface.has_class(ClassTarget::Body, "cssclass-x"));
        assert_eq!(
            surface.style(StyleSlot::NoteSnippet).as_deref(),
            Some(".theme1 {}")
        );
        assert_eq!(surface.sleeps(), vec![100, 200, 400]);
        assert_eq!(chisel.apply_startup_snapshot().await, StartupOutcome::Skipped);
    }

    #[tokio::test]
    async fn snapshot_classes_stay_while_no_note_is_open() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("n.md", "# plain\n");
            vault.set_stored(json!({ "startupSnapshot": { "classList": ["x"] } }));
        })
        .await;
        assert_eq!(chisel.apply_startup_snapshot().await, StartupOutcome::Applied);
        chisel.update_document().await;
        assert!(surface.has_class(ClassTarget::Body, "cssclass-x"));

        vault.set_active(Some("n.md"));
        chisel.update_document().await;
        assert!(!surface.has_class(ClassTarget::Body, "cssclass-x"));
    }

    #[tokio::test]
    async fn gives_up_on_the_snapshot_after_the_retry_budget() {
        let (_, surface, chisel) = fixture(|vault| {
            vault.set_stored(json!({ "startupSnapshot": { "classList": ["x"] } }));
            vault.set_ready_after(u32::MAX);
        })
        .await;
        let chisel = chisel.with_backoff(Backoff {
            attempts: 3,
            initial_ms: 10,
            factor: 3,
        });
        assert_eq!(chisel.apply_startup_snapshot().await, StartupOutcome::Abandoned);
        assert_eq!(surface.sleeps(), vec![10, 30]);
        assert!(!surface.has_class(ClassTarget::Body, "cssclass-x"));
        assert_eq!(chisel.apply_startup_snapshot().await, StartupOutcome::Skipped);
    }

    #[tokio::test]
    async fn open_note_skips_the_snapshot() {
        let (_, surface, chisel) = fixture(|vault| {
            vault.put("a.md", "---\ncssclasses: [live]\n---\n");
            vault.set_active(Some("a.md"));
            vault.set_stored(json!({ "startupSnapshot": { "classList": ["old"] } }));
        })
        .await;
        chisel.start().await;
        assert!(surface.has_class(ClassTarget::Body, "cssclass-live"));
        assert!(!surface.has_class(ClassTarget::Body, "cssclass-old"));
        assert_eq!(chisel.apply_startup_snapshot().await, StartupOutcome::Skipped);
    }

    #[tokio::test]
    async fn autoload_stylesheet_is_written_once_per_change() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("doc1.md", "---\nchisel-autoload: true\n---\n```css\na{color:red}\n```\n");
            vault.put("doc2.md", "---\nchisel-autoload: true\n---\n```css\nb{color:blue}\n```\n");
        })
        .await;
        assert!(chisel.refresh_autoload().await);
        assert_eq!(
            surface.style(StyleSlot::Autoload).as_deref(),
            Some("a{color:red}\nb{color:blue}\n")
        );
        let writes = surface.style_writes();
        assert!(!chisel.refresh_autoload().await);
        assert_eq!(surface.style_writes(), writes);

        vault.put("doc2.md", "---\nchisel-autoload: true\n---\n```css\nb{color:green}\n```\n");
        chisel.metadata_changed("doc2.md").await;
        assert_eq!(
            surface.style(StyleSlot::Autoload).as_deref(),
            Some("a{color:red}\nb{color:green}\n")
        );
    }

    #[tokio::test]
    async fn unflagging_the_last_autoload_note_removes_the_stylesheet() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("doc1.md", "---\nchisel-autoload: true\n---\n```css\na{}\n```\n");
        })
        .await;
        chisel.refresh_autoload().await;
        vault.put("doc1.md", "---\nchisel-autoload: false\n---\n```css\na{}\n```\n");
        chisel.metadata_changed("doc1.md").await;
        assert_eq!(surface.style(StyleSlot::Autoload), None);
    }

    #[tokio::test]
    async fn bursts_of_changes_collapse_into_one_pass() {
        let (_, surface, chisel) = fixture(|vault| {
            vault.put("a.md", "---\ncssclasses: [x]\n---\n");
            vault.set_active(Some("a.md"));
        })
        .await;
        let (first, second) = tokio::join!(chisel.document_changed(), chisel.document_changed());
        assert!(!first);
        assert!(second);
        assert!(surface.has_class(ClassTarget::Body, "cssclass-x"));
    }

    #[tokio::test]
    async fn mode_classes_follow_the_active_view() {
        let (_, surface, chisel) = fixture(|_| {}).await;
        assert_eq!(chisel.mode(), None);

        surface.set_leaf(Some(Leaf::new("markdown", Some("preview"))));
        assert!(chisel.layout_changed().await);
        assert_eq!(chisel.mode(), Some(ViewMode::NoteReading));
        for target in [ClassTarget::Body, ClassTarget::ViewContent] {
            assert!(surface.has_class(target, "chisel-note"));
            assert!(surface.has_class(target, "chisel-reading"));
        }

        surface.set_leaf(Some(Leaf::new("canvas", None)));
        chisel.update_modes();
        assert!(surface.has_class(ClassTarget::Body, "chisel-canvas"));
        assert!(!surface.has_class(ClassTarget::Body, "chisel-note"));
        assert!(!surface.has_class(ClassTarget::ViewContent, "chisel-reading"));
    }

    #[tokio::test]
    async fn settings_changes_apply_and_persist() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("a.md", "# a\n");
            vault.set_active(Some("a.md"));
        })
        .await;
        chisel.update_document().await;
        chisel
            .update_settings(|settings| settings.enable_typography = true)
            .await;
        assert!(surface.has_class(ClassTarget::Body, "chisel-typography"));
        assert_eq!(vault.stored().unwrap()["enableTypography"], json!(true));

        chisel
            .update_settings(|settings| settings.enable_typography = false)
            .await;
        assert!(!surface.has_class(ClassTarget::Body, "chisel-typography"));
    }

    #[tokio::test]
    async fn changing_the_autoload_key_rebuilds_the_stylesheet() {
        let (_, surface, chisel) = fixture(|vault| {
            vault.put("g.md", "---\nglobal: true\n---\n```css\ng{}\n```\n");
        })
        .await;
        chisel.refresh_autoload().await;
        assert_eq!(surface.style(StyleSlot::Autoload), None);

        chisel
            .update_settings(|settings| settings.autoload_key = "global".into())
            .await;
        assert_eq!(surface.style(StyleSlot::Autoload).as_deref(), Some("g{}\n"));
    }

    #[tokio::test]
    async fn a_slow_pass_does_not_overwrite_a_newer_note() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("slow.md", "```css\n.slow {}\n```\n");
            vault.put("fast.md", "```css\n.fast {}\n```\n");
            vault.put("a.md", "---\ncssclasses: [a]\nchisel: slow\n---\n");
            vault.put("b.md", "---\ncssclasses: [b]\nchisel: fast\n---\n");
            vault.set_read_delay("slow.md", 5);
            vault.set_active(Some("a.md"));
        })
        .await;

        tokio::join!(chisel.update_document(), async {
            vault.set_active(Some("b.md"));
            chisel.update_document().await;
        });

        assert!(surface.has_class(ClassTarget::Body, "cssclass-b"));
        assert!(!surface.has_class(ClassTarget::Body, "cssclass-a"));
        assert_eq!(
            surface.style(StyleSlot::NoteSnippet).as_deref(),
            Some(".fast {}")
        );
        let snapshot = chisel.settings().startup_snapshot;
        assert_eq!(snapshot.class_list, vec!["b"]);
        assert_eq!(snapshot.snippet_name_list, vec!["fast"]);
        assert_eq!(vault.stored().unwrap()["startupSnapshot"]["snippetNameList"], json!(["fast"]));
    }

    #[tokio::test]
    async fn a_note_opened_during_snapshot_replay_wins() {
        let (vault, surface, chisel) = fixture(|vault| {
            vault.put("slow.md", "```css\n.slow {}\n```\n");
            vault.put("b.md", "---\ncssclasses: [b]\n---\n");
            vault.set_read_delay("slow.md", 5);
            vault.set_stored(json!({
                "startupSnapshot": { "classList": ["old"], "snippetNameList": ["slow"] }
            }));
        })
        .await;

        let (outcome, ()) = tokio::join!(chisel.apply_startup_snapshot(), async {
            tokio::task::yield_now().await;
            vault.set_active(Some("b.md"));
            chisel.update_document().await;
        });

        assert_eq!(outcome, StartupOutcome::Skipped);
        assert!(surface.has_class(ClassTarget::Body, "cssclass-b"));
        assert!(!surface.has_class(ClassTarget::Body, "cssclass-old"));
        assert_eq!(surface.style(StyleSlot::NoteSnippet), None);
    }

    #[tokio::test]
    async fn switching_leaves_clears_mode_classes_from_the_old_view() {
        let (_, surface, chisel) = fixture(|_| {}).await;
        surface.set_leaf(Some(Leaf::new("markdown", Some("preview"))));
        chisel.update_modes();
        chisel.update_modes();

        let removed = surface.removals(ClassTarget::ViewContent);
        assert!(removed.contains(&"chisel-note".to_string()));
        assert!(removed.contains(&"chisel-reading".to_string()));
        assert!(surface.removals(ClassTarget::Body).is_empty());
        assert!(surface.has_class(ClassTarget::ViewContent, "chisel-reading"));
        assert!(surface.has_class(ClassTarget::Body, "chisel-reading"));
    }

    #[tokio::test]
    async fn unload_leaves_no_trace() {
        let (_, surface, chisel) = fixture(|vault| {
            vault.put("theme.md", "---\nchisel-autoload: true\n---\n```css\n.g {}\n```\n");
            vault.put("a.md", "---\ncssclasses: [x]\nchisel-gap: 2px\nchisel: theme\n---\n");
            vault.set_active(Some("a.md"));
        })
        .await;
        surface.set_leaf(Some(Leaf::new("empty", None)));
        chisel.start().await;
        assert!(surface.style(StyleSlot::Autoload).is_some());

        chisel.unload();
        assert!(body(&surface).is_empty());
        assert!(surface.classes(ClassTarget::ViewContent).is_empty());
        for slot in StyleSlot::ALL {
            assert_eq!(surface.style(slot), None);
        }
    }
}
