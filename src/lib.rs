//! Chisel: frontmatter-driven presentation for markdown notes.
//!
//! Notes declare body classes, custom properties and CSS snippets in their
//! frontmatter; [`controller::Chisel`] keeps the live view in step with the
//! open note through the [`host::Vault`] and [`host::Surface`] seams.

pub mod app;
pub mod autoload;
pub mod bridge;
pub mod cache;
pub mod classes;
pub mod controller;
pub mod dom;
pub mod error;
pub mod host;
pub mod metadata;
pub mod mode;
pub mod props;
pub mod schedule;
pub mod settings;
pub mod snippet;
pub mod vault;

#[cfg(test)]
mod testing;

pub use controller::Chisel;
pub use error::{ChiselError, Result};
pub use settings::Settings;
