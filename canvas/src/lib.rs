//! Whiteboard core: pan/zoom/draw canvas with sticky notes and cross-client
//! sync.
//!
//! Everything here is plain Rust and runs headless, which is how the tests
//! and the CLI drive it. The `web` feature adds the browser bindings: a 2D
//! canvas render target, a `localStorage` sync channel and the
//! `wasm_bindgen` entry point.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | The owned [`session::Whiteboard`]: lifecycle, intents, sync, frames |
//! | [`camera`] | Pan/zoom camera and coordinate conversions |
//! | [`input`] | Gesture state machine turning pointer/touch/wheel events into intents |
//! | [`doc`] | Drawing store: committed strokes plus the in-progress stroke |
//! | [`notes`] | Content records, the fallback note, sticky-note model |
//! | [`layout`] | Note sizing and collision-avoiding placement |
//! | [`font`] | Built-in 5x7 bitmap font |
//! | [`texture`] | Note texture baking |
//! | [`render`] | Retained scene and the render target trait |
//! | [`sync`] | Sync channel trait and the in-process bus |
//! | [`config`] | Tunables with serde defaults |
//! | [`consts`] | Shared numeric constants (zoom limits, layout, depths, timing) |

pub mod camera;
pub mod config;
pub mod consts;
pub mod doc;
pub mod font;
pub mod input;
pub mod layout;
pub mod notes;
pub mod render;
pub mod session;
pub mod sync;
pub mod texture;

#[cfg(feature = "web")]
pub mod web;
