use std::convert::TryFrom;

use anyhow::{Result, anyhow};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use super::demux::FramePayload;
use crate::types::{CameraId, Frame};

pub fn decode_payload(camera_id: CameraId, payload: &FramePayload) -> Result<Frame> {
    let (rgba, width, height) = jpeg_to_rgba(&payload.body)?;
    Ok(Frame {
        camera_id,
        frame_id: payload.frame_id,
        rgba,
        width,
        height,
    })
}

fn jpeg_to_rgba(data: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    if data.is_empty() {
        return Err(anyhow!("empty JPEG body"));
    }

    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("JPEG decode failed: {err:?}"))?;

    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("JPEG decoder reported no image info"))?;
    let width = info.width as u32;
    let height = info.height as u32;
    let expected_len = usize::try_from(width)
        .and_then(|w| usize::try_from(height).map(|h| w * h * 4))
        .map_err(|_| anyhow!("JPEG dimensions do not fit usize"))?;
    if width == 0 || height == 0 || rgba.len() < expected_len {
        return Err(anyhow!(
            "JPEG decode produced too few bytes: got {}, expected {}",
            rgba.len(),
            expected_len
        ));
    }

    Ok((rgba, width, height))
}

#[cfg(test)]
pub(crate) fn encode_test_jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    use image::{ImageBuffer, Rgb, codecs::jpeg::JpegEncoder};

    let img = ImageBuffer::from_pixel(width, height, Rgb(rgb));
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .encode_image(&img)
        .expect("encode jpeg");
    out
}
