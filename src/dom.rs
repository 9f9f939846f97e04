//! [`Surface`] over the live editor document.

use js_sys::Promise;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Element, Window};

use crate::error::{ChiselError, Result};
use crate::host::{ClassTarget, StyleSlot, Surface};
use crate::mode::Leaf;

const ACTIVE_CONTENT: &str = ".mod-root .workspace-leaf.mod-active .workspace-leaf-content";
const ANY_CONTENT: &str = ".workspace-leaf-content";
const NOTICE_MS: i32 = 4000;

pub struct DomSurface {
    window: Window,
    document: Document,
}

impl DomSurface {
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| ChiselError::Host("no window".into()))?;
        let document = window
            .document()
            .ok_or_else(|| ChiselError::Host("no document".into()))?;
        Ok(Self { window, document })
    }

    fn active_content(&self) -> Option<Element> {
        self.document.query_selector(ACTIVE_CONTENT).ok().flatten()
    }

    fn all_content(&self) -> Vec<Element> {
        let Ok(list) = self.document.query_selector_all(ANY_CONTENT) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }
}

impl Surface for DomSurface {
    fn add_class(&self, target: ClassTarget, class: &str) -> Result<()> {
        let element: Option<Element> = match target {
            ClassTarget::Body => self.document.body().map(Into::into),
            ClassTarget::ViewContent => self.active_content(),
        };
        let Some(element) = element else {
            return Ok(());
        };
        element
            .class_list()
            .add_1(class)
            .map_err(|_| ChiselError::InvalidClass(class.to_string()))
    }

    fn remove_class(&self, target: ClassTarget, class: &str) {
        let elements: Vec<Element> = match target {
            ClassTarget::Body => self.document.body().map(Into::into).into_iter().collect(),
            // The view may have changed since the class went on.
            ClassTarget::ViewContent => self.all_content(),
        };
        for element in elements {
            let _ = element.class_list().remove_1(class);
        }
    }

    fn set_style(&self, slot: StyleSlot, css: &str) {
        let id = slot.element_id();
        let element = match self.document.get_element_by_id(id) {
            Some(element) => element,
            None => {
                let created = match self.document.create_element("style") {
                    Ok(created) => created,
                    Err(err) => {
                        tracing::warn!("could not create <style id={id}>: {err:?}");
                        return;
                    }
                };
                created.set_id(id);
                let appended = self
                    .document
                    .head()
                    .map(|head| head.append_child(&created));
                if !matches!(appended, Some(Ok(_))) {
                    tracing::warn!("could not attach <style id={id}>");
                    return;
                }
                created
            }
        };
        element.set_text_content(Some(css));
    }

    fn remove_style(&self, slot: StyleSlot) {
        if let Some(element) = self.document.get_element_by_id(slot.element_id()) {
            element.remove();
        }
    }

    fn active_leaf(&self) -> Option<Leaf> {
        let content = self.active_content()?;
        let view_type = content.get_attribute("data-type")?;
        Some(Leaf {
            view_type,
            mode: content.get_attribute("data-mode"),
        })
    }

    fn notify(&self, message: &str) {
        let Ok(notice) = self.document.create_element("div") else {
            return;
        };
        notice.set_class_name("notice chisel-notice");
        notice.set_text_content(Some(message));
        let Some(body) = self.document.body() else {
            return;
        };
        if body.append_child(&notice).is_err() {
            return;
        }
        let dismiss = Closure::once_into_js(move || notice.remove());
        let _ = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(dismiss.unchecked_ref(), NOTICE_MS);
    }

    async fn sleep(&self, millis: u32) {
        let window = self.window.clone();
        let promise = Promise::new(&mut |resolve, _reject| {
            let timeout = millis.min(i32::MAX as u32) as i32;
            if window
                .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, timeout)
                .is_err()
            {
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}
