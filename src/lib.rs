pub mod catalog;
pub mod config;
pub mod explorer;
pub mod progress;
pub mod svg;
pub mod viewport;

#[cfg(not(target_arch = "wasm32"))]
pub mod backend;

#[cfg(target_arch = "wasm32")]
pub mod frontend;
