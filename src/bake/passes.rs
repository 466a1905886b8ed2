use crate::{classify::BakePlan, error::ConvertResult, scene::Scene};

use super::{
    image_io::BakeImage,
    rewrite::{PassContext, bake_direct, bake_socket_redirect},
    types::{BakeStrategy, BakedChannels, Channel},
};

/// Run the six passes in order over every material in `plan.to_bake`.
///
/// Passes never overlap: each one restores its graph edits before the next
/// starts, and all of them share `image`. With nothing to bake no pass runs
/// and the result is empty.
pub fn bake_all(
    scene: &mut Scene,
    plan: &BakePlan,
    image: &mut BakeImage,
    ctx: &mut PassContext<'_>,
) -> ConvertResult<BakedChannels> {
    let mut baked = BakedChannels::default();
    if plan.to_bake.is_empty() {
        log::info!("[bake] no materials need baking; skipping all passes");
        return Ok(baked);
    }

    for channel in Channel::ALL {
        let texture = match channel.strategy() {
            BakeStrategy::SocketRedirect => {
                bake_socket_redirect(scene, &plan.to_bake, channel, image, ctx)?
            }
            BakeStrategy::Direct => Some(bake_direct(scene, &plan.to_bake, channel, image, ctx)?),
        };
        baked.push(channel, texture);
    }
    Ok(baked)
}
