//! Glue between the JS host and the controller.
//!
//! The host installs `window.__CHISEL_HOST__` with the metadata callbacks
//! below, then calls the exported `chisel_*` functions from its lifecycle and
//! workspace events.

use std::cell::RefCell;
use std::rc::Rc;

use leptos::task::spawn_local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::app;
use crate::controller::Chisel;
use crate::dom::DomSurface;
use crate::error::{ChiselError, Result};
use crate::host::Vault;
use crate::metadata::{DocumentRef, Frontmatter};
use crate::settings::Settings;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["window", "__CHISEL_HOST__"], js_name = activeFile)]
    fn host_active_file() -> JsValue;

    #[wasm_bindgen(js_namespace = ["window", "__CHISEL_HOST__"], js_name = markdownFiles)]
    fn host_markdown_files() -> JsValue;

    #[wasm_bindgen(js_namespace = ["window", "__CHISEL_HOST__"], js_name = frontmatter)]
    fn host_frontmatter(path: &str) -> JsValue;

    #[wasm_bindgen(js_namespace = ["window", "__CHISEL_HOST__"], js_name = cachedRead, catch)]
    async fn host_cached_read(path: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["window", "__CHISEL_HOST__"], js_name = loadData, catch)]
    async fn host_load_data() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["window", "__CHISEL_HOST__"], js_name = saveData, catch)]
    async fn host_save_data(data: JsValue) -> Result<JsValue, JsValue>;
}

/// File record as handed over by the host.
#[derive(Deserialize)]
struct HostFile {
    path: String,
    #[serde(default)]
    mtime: u64,
}

impl From<HostFile> for DocumentRef {
    fn from(file: HostFile) -> Self {
        DocumentRef::new(file.path, file.mtime)
    }
}

fn host_error(err: JsValue) -> ChiselError {
    ChiselError::Host(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

fn decode<T: for<'de> Deserialize<'de>>(value: JsValue) -> Result<T> {
    serde_wasm_bindgen::from_value(value).map_err(|err| ChiselError::Host(err.to_string()))
}

pub struct HostVault;

impl Vault for HostVault {
    fn active_document(&self) -> Option<DocumentRef> {
        decode::<Option<HostFile>>(host_active_file())
            .ok()
            .flatten()
            .map(Into::into)
    }

    fn documents(&self) -> Option<Vec<DocumentRef>> {
        match decode::<Option<Vec<HostFile>>>(host_markdown_files()) {
            Ok(files) => files.map(|files| files.into_iter().map(Into::into).collect()),
            Err(err) => {
                tracing::warn!("unreadable file listing: {err}");
                None
            }
        }
    }

    fn frontmatter(&self, path: &str) -> Option<Frontmatter> {
        decode::<Option<Value>>(host_frontmatter(path))
            .ok()
            .flatten()
            .map(Frontmatter::from_json)
    }

    async fn read(&self, path: &str) -> Result<String> {
        let text = host_cached_read(path).await.map_err(host_error)?;
        text.as_string()
            .ok_or_else(|| ChiselError::NoteNotFound(path.to_string()))
    }

    async fn load_data(&self) -> Result<Option<Value>> {
        decode(host_load_data().await.map_err(host_error)?)
    }

    async fn save_data(&self, data: &Value) -> Result<()> {
        let value = data
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|err| ChiselError::Host(err.to_string()))?;
        host_save_data(value).await.map_err(host_error)?;
        Ok(())
    }
}

type Plugin = Chisel<HostVault, DomSurface>;

thread_local! {
    static PLUGIN: RefCell<Option<Plugin>> = const { RefCell::new(None) };
}

/// Runs `f` on a handle to the loaded plugin, if any.
pub fn with_plugin<R>(f: impl FnOnce(Plugin) -> R) -> Option<R> {
    let plugin = PLUGIN.with(|slot| slot.borrow().clone())?;
    Some(f(plugin))
}

/// Spawns a pass on the loaded plugin.
fn spawn_pass<F, Fut>(pass: F)
where
    F: FnOnce(Plugin) -> Fut,
    Fut: std::future::Future<Output = ()> + 'static,
{
    if let Some(future) = with_plugin(pass) {
        spawn_local(future);
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Command {
    pub id: &'static str,
    pub name: &'static str,
}

pub const COMMANDS: &[Command] = &[Command {
    id: "open-chisel-cheatsheet-modal",
    name: "Open Frontmatter Cheatsheet",
}];

#[wasm_bindgen]
pub fn chisel_load() {
    console_error_panic_hook::set_once();
    let _ = tracing_wasm::try_set_as_global_default();

    let surface = match DomSurface::new() {
        Ok(surface) => Rc::new(surface),
        Err(err) => {
            tracing::error!("chisel not loaded: {err}");
            return;
        }
    };
    spawn_local(async move {
        let plugin = Chisel::load(Rc::new(HostVault), surface).await;
        PLUGIN.with(|slot| slot.replace(Some(plugin.clone())));
        plugin.start().await;
        tracing::info!("chisel loaded");
    });
}

#[wasm_bindgen]
pub fn chisel_unload() {
    if let Some(plugin) = PLUGIN.with(|slot| slot.borrow_mut().take()) {
        plugin.unload();
    }
    app::close_cheatsheet();
}

#[wasm_bindgen]
pub fn chisel_active_leaf_change() {
    spawn_pass(|plugin| async move { plugin.active_leaf_changed().await });
}

#[wasm_bindgen]
pub fn chisel_layout_change() {
    spawn_pass(|plugin| async move {
        plugin.layout_changed().await;
    });
}

#[wasm_bindgen]
pub fn chisel_metadata_changed(path: String) {
    spawn_pass(|plugin| async move { plugin.metadata_changed(&path).await });
}

#[wasm_bindgen]
pub fn chisel_metadata_resolved(path: String) {
    spawn_pass(|plugin| async move { plugin.metadata_resolved(&path).await });
}

/// Command descriptors the host registers in its palette.
#[wasm_bindgen]
pub fn chisel_commands() -> JsValue {
    serde_wasm_bindgen::to_value(COMMANDS).unwrap_or(JsValue::NULL)
}

/// Runs a command from [`COMMANDS`]. Returns false for unknown ids.
#[wasm_bindgen]
pub fn chisel_run_command(id: &str) -> bool {
    match id {
        "open-chisel-cheatsheet-modal" => {
            app::open_cheatsheet();
            true
        }
        _ => false,
    }
}

/// Mounts the settings panel into the host's settings tab.
#[wasm_bindgen]
pub fn chisel_open_settings(container: web_sys::HtmlElement) {
    let Some(settings) = with_plugin(|plugin| plugin.settings()) else {
        return;
    };
    container.set_inner_html("");
    app::mount_settings(container, settings);
}

/// Applies a settings edit made in the panel.
pub fn apply_settings(update: impl FnOnce(&mut Settings) + 'static) {
    spawn_pass(|plugin| async move { plugin.update_settings(update).await });
}
