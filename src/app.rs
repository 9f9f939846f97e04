use leptos::prelude::*;
use wasm_bindgen::JsCast;

use crate::bridge::apply_settings;
use crate::mode::ViewMode;
use crate::settings::{Settings, COLOR_CLASS, RHYTHM_CLASS, TYPOGRAPHY_CLASS};

const CHEATSHEET_ID: &str = "chisel-cheatsheet";

/// Frontmatter keys documented in the cheat-sheet: key, example, what it does.
const CHEATSHEET: &[(&str, &str, &str)] = &[
    (
        "cssclasses",
        "cssclasses: [wide, serif]",
        "Adds cssclass-wide and cssclass-serif to the body while the note is open.",
    ),
    (
        "chisel",
        "chisel: [dark-theme]",
        "Loads the css code blocks of the named notes while this note is open.",
    ),
    (
        "chisel-autoload",
        "chisel-autoload: true",
        "Adds this note's css code blocks to a stylesheet active in every note.",
    ),
    (
        "chisel-<name>",
        "chisel-accent: \"#ff5500\"",
        "Sets the custom property --accent on the body.",
    ),
    (
        "chisel-font-text",
        "chisel-font-text: Inter",
        "Imports the font from Google Fonts and sets --font-text.",
    ),
];

const FONT_KEYS: &[&str] = &[
    "chisel-font-text",
    "chisel-font-header",
    "chisel-font-monospace",
    "chisel-font-interface",
];

fn setting_style() -> &'static str {
    "display: flex; align-items: center; justify-content: space-between; gap: 1rem; padding: 0.75rem 0; border-top: 1px solid var(--background-modifier-border);"
}

fn toggle_row(
    label: &'static str,
    help: &'static str,
    field: fn(&mut Settings) -> &mut bool,
    settings: ReadSignal<Settings>,
    set_settings: WriteSignal<Settings>,
) -> impl IntoView {
    view! {
        <div class="setting-item" style=setting_style()>
            <div class="setting-item-info">
                <div class="setting-item-name" style="font-weight: 600;">{label}</div>
                <div class="setting-item-description" style="font-size: 0.85em; color: var(--text-muted);">{help}</div>
            </div>
            <input
                type="checkbox"
                prop:checked=move || *field(&mut settings.get())
                on:change=move |ev| {
                    let checked = event_target_checked(&ev);
                    set_settings.update(|s| *field(s) = checked);
                    apply_settings(move |s| *field(s) = checked);
                }
            />
        </div>
    }
}

fn key_row(
    label: &'static str,
    help: &'static str,
    field: fn(&mut Settings) -> &mut String,
    settings: ReadSignal<Settings>,
    set_settings: WriteSignal<Settings>,
) -> impl IntoView {
    view! {
        <div class="setting-item" style=setting_style()>
            <div class="setting-item-info">
                <div class="setting-item-name" style="font-weight: 600;">{label}</div>
                <div class="setting-item-description" style="font-size: 0.85em; color: var(--text-muted);">{help}</div>
            </div>
            <input
                type="text"
                spellcheck="false"
                prop:value=move || field(&mut settings.get()).clone()
                on:change=move |ev| {
                    let value = event_target_value(&ev).trim().to_string();
                    if value.is_empty() {
                        return;
                    }
                    set_settings.update(|s| *field(s) = value.clone());
                    apply_settings(move |s| *field(s) = value);
                }
            />
        </div>
    }
}

#[component]
pub fn SettingsPanel(initial: Settings) -> impl IntoView {
    let (settings, set_settings) = signal(initial);

    let body_classes = [TYPOGRAPHY_CLASS, COLOR_CLASS, RHYTHM_CLASS]
        .into_iter()
        .chain(ViewMode::ALL.into_iter().flat_map(|mode| mode.classes().iter().copied()))
        .fold(Vec::new(), |mut seen, class| {
            if !seen.contains(&class) {
                seen.push(class);
            }
            seen
        });

    view! {
        <div class="chisel-settings">
            <h3 style="margin-top: 0;">"Features"</h3>
            {toggle_row("Typography", "Adds chisel-typography to the body.", |s| &mut s.enable_typography, settings, set_settings)}
            {toggle_row("Color", "Adds chisel-color to the body.", |s| &mut s.enable_color, settings, set_settings)}
            {toggle_row("Vertical rhythm", "Adds chisel-rhythm to the body.", |s| &mut s.enable_rhythm, settings, set_settings)}

            <h3 style="margin-top: 2rem;">"Frontmatter keys"</h3>
            {key_row("Class key", "Lists classes to put on the body, prefixed with cssclass-.", |s| &mut s.class_key, settings, set_settings)}
            {key_row("Snippet key", "Names notes whose css blocks apply while the note is open.", |s| &mut s.snippet_key, settings, set_settings)}
            {key_row("Autoload key", "Marks notes whose css blocks apply everywhere.", |s| &mut s.autoload_key, settings, set_settings)}

            <h3 style="margin-top: 2rem;">"Body classes"</h3>
            <ul class="chisel-class-list" style="font-family: var(--font-monospace); font-size: 0.85em;">
                {body_classes.into_iter().map(|class| view! { <li>{class}</li> }).collect::<Vec<_>>()}
            </ul>
        </div>
    }
}

#[component]
pub fn Cheatsheet() -> impl IntoView {
    view! {
        <div class="modal chisel-cheatsheet-modal" style="max-width: 640px; padding: 1.5rem;">
            <div style="display: flex; align-items: center; justify-content: space-between;">
                <h2 style="margin: 0;">"Frontmatter Cheatsheet"</h2>
                <button class="modal-close-button" title="Close" on:click=move |_| close_cheatsheet()>"×"</button>
            </div>
            <table style="width: 100%; margin-top: 1rem; border-collapse: collapse;">
                <tbody>
                    {CHEATSHEET
                        .iter()
                        .map(|(key, example, help)| view! {
                            <tr style="border-top: 1px solid var(--background-modifier-border);">
                                <td style="padding: 0.5rem; font-weight: 600; white-space: nowrap;">{*key}</td>
                                <td style="padding: 0.5rem;">
                                    <code>{*example}</code>
                                    <div style="font-size: 0.85em; color: var(--text-muted);">{*help}</div>
                                </td>
                            </tr>
                        })
                        .collect::<Vec<_>>()}
                </tbody>
            </table>
            <p style="font-size: 0.85em; color: var(--text-muted);">
                "Font keys: " {FONT_KEYS.join(", ")} ". Generic families such as serif are not imported."
            </p>
        </div>
    }
}

/// Mounts [`SettingsPanel`] into a container owned by the host.
pub fn mount_settings(container: web_sys::HtmlElement, settings: Settings) {
    leptos::mount::mount_to(container, move || view! { <SettingsPanel initial=settings.clone() /> })
        .forget();
}

/// Shows the cheat-sheet in an overlay, replacing an open one.
pub fn open_cheatsheet() {
    close_cheatsheet();
    let doc = document();
    let Ok(overlay) = doc.create_element("div") else {
        return;
    };
    overlay.set_id(CHEATSHEET_ID);
    overlay.set_class_name("modal-container mod-dim");
    let Ok(overlay) = overlay.dyn_into::<web_sys::HtmlElement>() else {
        return;
    };
    let Some(body) = doc.body() else {
        return;
    };
    if body.append_child(&overlay).is_err() {
        return;
    }
    leptos::mount::mount_to(overlay, Cheatsheet).forget();
}

pub fn close_cheatsheet() {
    if let Some(overlay) = document().get_element_by_id(CHEATSHEET_ID) {
        overlay.remove();
    }
}
