//! In-memory [`Vault`] and [`Surface`] used by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::error::{ChiselError, Result};
use crate::host::{ClassTarget, StyleSlot, Surface, Vault};
use crate::metadata::{DocumentRef, Frontmatter};
use crate::mode::Leaf;

#[derive(Default)]
pub struct MemoryVault {
    notes: RefCell<BTreeMap<String, (String, u64)>>,
    clock: Cell<u64>,
    active: RefCell<Option<String>>,
    unready_probes: Cell<u32>,
    reads: Cell<usize>,
    read_delays: RefCell<BTreeMap<String, u32>>,
    data: RefCell<Option<Value>>,
    fail_saves: Cell<bool>,
    saves: Cell<usize>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or rewrites a note, bumping its change marker.
    pub fn put(&self, path: &str, text: &str) {
        self.clock.set(self.clock.get() + 1);
        self.notes
            .borrow_mut()
            .insert(path.to_string(), (text.to_string(), self.clock.get()));
    }

    pub fn set_active(&self, path: Option<&str>) {
        self.active.replace(path.map(str::to_string));
    }

    /// The next `probes` corpus listings report the vault as unavailable.
    pub fn set_ready_after(&self, probes: u32) {
        self.unready_probes.set(probes);
    }

    /// Reads of `path` yield to the executor `turns` times before returning.
    pub fn set_read_delay(&self, path: &str, turns: u32) {
        self.read_delays
            .borrow_mut()
            .insert(path.to_string(), turns);
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    pub fn set_stored(&self, value: Value) {
        self.data.replace(Some(value));
    }

    pub fn stored(&self) -> Option<Value> {
        self.data.borrow().clone()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }

    pub fn saves(&self) -> usize {
        self.saves.get()
    }

    fn doc(&self, path: &str) -> Option<DocumentRef> {
        self.notes
            .borrow()
            .get(path)
            .map(|(_, modified)| DocumentRef::new(path, *modified))
    }
}

impl Vault for MemoryVault {
    fn active_document(&self) -> Option<DocumentRef> {
        let active = self.active.borrow().clone()?;
        self.doc(&active)
    }

    fn documents(&self) -> Option<Vec<DocumentRef>> {
        let unready = self.unready_probes.get();
        if unready > 0 {
            self.unready_probes.set(unready - 1);
            return None;
        }
        Some(
            self.notes
                .borrow()
                .iter()
                .map(|(path, (_, modified))| DocumentRef::new(path.as_str(), *modified))
                .collect(),
        )
    }

    fn frontmatter(&self, path: &str) -> Option<Frontmatter> {
        let notes = self.notes.borrow();
        let (text, _) = notes.get(path)?;
        Frontmatter::parse(text).ok().flatten()
    }

    async fn read(&self, path: &str) -> Result<String> {
        self.reads.set(self.reads.get() + 1);
        let turns = self.read_delays.borrow().get(path).copied().unwrap_or(0);
        for _ in 0..turns {
            tokio::task::yield_now().await;
        }
        self.notes
            .borrow()
            .get(path)
            .map(|(text, _)| text.clone())
            .ok_or_else(|| ChiselError::NoteNotFound(path.to_string()))
    }

    async fn load_data(&self) -> Result<Option<Value>> {
        Ok(self.stored())
    }

    async fn save_data(&self, data: &Value) -> Result<()> {
        if self.fail_saves.get() {
            return Err(ChiselError::Host("disk full".to_string()));
        }
        self.saves.set(self.saves.get() + 1);
        self.data.replace(Some(data.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    classes: RefCell<BTreeMap<ClassTarget, BTreeSet<String>>>,
    class_ops: Cell<usize>,
    removals: RefCell<Vec<(ClassTarget, String)>>,
    styles: RefCell<BTreeMap<StyleSlot, String>>,
    style_writes: Cell<usize>,
    notices: RefCell<Vec<String>>,
    leaf: RefCell<Option<Leaf>>,
    sleeps: RefCell<Vec<u32>>,
    refused: RefCell<BTreeSet<String>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classes(&self, target: ClassTarget) -> BTreeSet<String> {
        self.classes
            .borrow()
            .get(&target)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_class(&self, target: ClassTarget, class: &str) -> bool {
        self.classes(target).contains(class)
    }

    pub fn class_ops(&self) -> usize {
        self.class_ops.get()
    }

    /// Every class removed from `target`, in call order.
    pub fn removals(&self, target: ClassTarget) -> Vec<String> {
        self.removals
            .borrow()
            .iter()
            .filter(|(t, _)| *t == target)
            .map(|(_, class)| class.clone())
            .collect()
    }

    pub fn style(&self, slot: StyleSlot) -> Option<String> {
        self.styles.borrow().get(&slot).cloned()
    }

    pub fn style_writes(&self) -> usize {
        self.style_writes.get()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.borrow().clone()
    }

    pub fn set_leaf(&self, leaf: Option<Leaf>) {
        self.leaf.replace(leaf);
    }

    pub fn sleeps(&self) -> Vec<u32> {
        self.sleeps.borrow().clone()
    }

    /// Makes the view reject `class` the way a DOM token list would.
    pub fn refuse(&self, class: &str) {
        self.refused.borrow_mut().insert(class.to_string());
    }
}

impl Surface for RecordingSurface {
    fn add_class(&self, target: ClassTarget, class: &str) -> Result<()> {
        if self.refused.borrow().contains(class) {
            return Err(ChiselError::InvalidClass(class.to_string()));
        }
        self.class_ops.set(self.class_ops.get() + 1);
        self.classes
            .borrow_mut()
            .entry(target)
            .or_default()
            .insert(class.to_string());
        Ok(())
    }

    fn remove_class(&self, target: ClassTarget, class: &str) {
        self.class_ops.set(self.class_ops.get() + 1);
        self.removals
            .borrow_mut()
            .push((target, class.to_string()));
        if let Some(set) = self.classes.borrow_mut().get_mut(&target) {
            set.remove(class);
        }
    }

    fn set_style(&self, slot: StyleSlot, css: &str) {
        self.style_writes.set(self.style_writes.get() + 1);
        self.styles.borrow_mut().insert(slot, css.to_string());
    }

    fn remove_style(&self, slot: StyleSlot) {
        self.style_writes.set(self.style_writes.get() + 1);
        self.styles.borrow_mut().remove(&slot);
    }

    fn active_leaf(&self) -> Option<Leaf> {
        self.leaf.borrow().clone()
    }

    fn notify(&self, message: &str) {
        self.notices.borrow_mut().push(message.to_string());
    }

    async fn sleep(&self, millis: u32) {
        self.sleeps.borrow_mut().push(millis);
        tokio::task::yield_now().await;
    }
}
