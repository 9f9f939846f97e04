//! A [`Vault`] over a plain directory of markdown notes.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde_json::Value;

use crate::error::{ChiselError, Result};
use crate::host::Vault;
use crate::metadata::{DocumentRef, Frontmatter};

const CONFIG_DIR: &str = ".chisel";
const SETTINGS_FILE: &str = "settings.json";

pub struct FsVault {
    root: PathBuf,
    active: RefCell<Option<String>>,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            active: RefCell::new(None),
        }
    }

    /// Marks a vault-relative note as the one open in the editor.
    pub fn set_active(&self, path: Option<&str>) {
        self.active.replace(path.map(normalize_rel_path));
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join(CONFIG_DIR).join(SETTINGS_FILE)
    }

    fn document(&self, rel: &str) -> Option<DocumentRef> {
        let meta = fs::metadata(self.root.join(rel)).ok()?;
        meta.is_file().then(|| DocumentRef::new(rel, modified_marker(&meta)))
    }
}

impl Vault for FsVault {
    fn active_document(&self) -> Option<DocumentRef> {
        let active = self.active.borrow().clone()?;
        self.document(&active)
    }

    fn documents(&self) -> Option<Vec<DocumentRef>> {
        if !self.root.is_dir() {
            return None;
        }
        let mut paths = Vec::new();
        if let Err(err) = collect_markdown_files(&self.root, &self.root, &mut paths) {
            tracing::warn!(root = %self.root.display(), "could not list notes: {err}");
            return None;
        }
        paths.sort();
        Some(paths.iter().filter_map(|rel| self.document(rel)).collect())
    }

    fn frontmatter(&self, path: &str) -> Option<Frontmatter> {
        let content = fs::read_to_string(self.root.join(normalize_rel_path(path))).ok()?;
        match Frontmatter::parse(&content) {
            Ok(frontmatter) => frontmatter,
            Err(err) => {
                tracing::warn!(path, "{err}");
                None
            }
        }
    }

    async fn read(&self, path: &str) -> Result<String> {
        let rel = normalize_rel_path(path);
        let abs = self.root.join(&rel);
        if !abs.is_file() {
            return Err(ChiselError::NoteNotFound(rel));
        }
        Ok(fs::read_to_string(abs)?)
    }

    async fn load_data(&self) -> Result<Option<Value>> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn save_data(&self, data: &Value) -> Result<()> {
        let path = self.settings_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(data)?)?;
        Ok(())
    }
}

fn normalize_rel_path(path: &str) -> String {
    path.trim().replace('\\', "/").trim_matches('/').to_string()
}

/// Nanoseconds since the epoch of the last modification; 0 when unknown.
fn modified_marker(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

fn collect_markdown_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_markdown_files(root, &path, out)?;
            continue;
        }
        if !path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .map_err(|err| ChiselError::Host(err.to_string()))?
            .to_string_lossy()
            .replace('\\', "/");
        out.push(rel);
    }
    Ok(())
}
