use rayon::prelude::*;

use super::{Arc, ImageBuffer, ImageFrame, RenderImage, Rgba};
use crate::render::raster::Surface;

pub(super) fn surface_to_image(surface: &Surface) -> Option<Arc<RenderImage>> {
    let mut pixels = surface.rgba().to_vec();

    // GPUI expects BGRA; convert in place to avoid the async asset pipeline and flicker.
    pixels.par_chunks_exact_mut(4).for_each(|px| px.swap(0, 2));

    let buffer =
        ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(surface.width(), surface.height(), pixels)?;
    let frame = ImageFrame::new(buffer);

    Some(Arc::new(RenderImage::new(vec![frame])))
}
