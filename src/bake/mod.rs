//! Multi-pass baking of principled channels into textures.
//!
//! - `types`: channels, bake modes, requests and baked texture handles
//! - `backend`: the injected renderer capability
//! - `image_io`: the shared scratch buffer and PNG persistence
//! - `rewrite`: transactional graph rewiring for one pass
//! - `passes`: the fixed six-pass sequence

mod backend;
mod image_io;
mod passes;
mod rewrite;
mod types;

pub use backend::BakeBackend;
pub use image_io::{BakeImage, persist_and_reload, texture_path};
pub use passes::bake_all;
pub use rewrite::{
    GraphEditor, PassContext, RewriteSession, any_socket_linked, bake_direct,
    bake_socket_redirect,
};
pub use types::{
    BakeDevice, BakeMode, BakeRequest, BakeSettings, BakeStrategy, BakeTarget, BakedChannels,
    BakedTexture, Channel,
};
