//! Interactive GPU simulations for a portfolio site: a background gradient,
//! a damped wave field, heat diffusion and a physarum agent model.
//!
//! On the web the entry point is [`Portfolio`], which owns the single running
//! [`sim::Simulation`] and swaps it out on navigation. Native builds reuse the
//! same programs from `main.rs`.

pub mod error;
pub mod gpu;
pub mod input;
pub mod rendering;
pub mod resources;
pub mod shaders;
pub mod sim;
pub mod util;

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::Portfolio;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn initialize() {
    console_error_panic_hook::set_once();
    let _ = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .level_for("wgpu_core", log::LevelFilter::Warn)
        .level_for("wgpu_hal", log::LevelFilter::Warn)
        .chain(fern::Output::call(console_log::log))
        .apply();
}
