use anyhow::Result;

use crate::scene::Scene;

use super::{image_io::BakeImage, types::BakeRequest};

/// External path-traced renderer.
///
/// A call blocks until the bake finishes, which can take from under a second
/// to tens of seconds. There is no timeout here; wrap the process if one is
/// needed. Implementations write into `image` for every node listed in
/// `request.targets` and must not keep selection state between calls.
/// Returning `Ok` with the buffer still blank counts as a failed bake.
pub trait BakeBackend {
    fn bake(
        &mut self,
        scene: &Scene,
        request: &BakeRequest<'_>,
        image: &mut BakeImage,
    ) -> Result<()>;
}

impl<B: BakeBackend + ?Sized> BakeBackend for &mut B {
    fn bake(
        &mut self,
        scene: &Scene,
        request: &BakeRequest<'_>,
        image: &mut BakeImage,
    ) -> Result<()> {
        (**self).bake(scene, request, image)
    }
}
