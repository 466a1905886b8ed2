//! Flattens procedural shading graphs into baked PBR textures and a compact
//! glTF binary asset.
//!
//! Stages, in pipeline order:
//! - [`classify`]: which materials need baking, which transmit light
//! - [`uv`]: bake-target UV layer preparation and cleanup
//! - [`bake`]: transactional graph rewiring and the six bake passes
//! - [`rebuild`]: minimal principled graphs wired to the baked textures
//! - [`export`]: document export, extension patching and packing
//!
//! [`pipeline::convert`] runs them end to end against host-supplied
//! collaborators.

pub mod bake;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod pipeline;
pub mod rebuild;
pub mod scene;
pub mod uv;

pub use error::{ConvertError, ConvertResult};
pub use pipeline::{ConversionReport, ConvertOptions, Host, convert};
pub use scene::Scene;
