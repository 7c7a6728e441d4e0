use image::RgbImage;

use crate::foundation::error::{LedError, LedResult};
use crate::foundation::math::{GammaLut, brightness_to_u8, mul_div255_u16};
use crate::render::state::DisplayState;

/// Decode one ingest payload into 8-bit RGB. Alpha is dropped.
pub fn decode_frame(bytes: &[u8]) -> LedResult<RgbImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| LedError::decode(format!("frame of {} bytes: {e}", bytes.len())))?;
    Ok(img.to_rgb8())
}

/// Apply gamma, then scale every channel by brightness.
pub fn apply_display_state(img: &mut RgbImage, state: &DisplayState) {
    let lut = (state.gamma != 1.0).then(|| GammaLut::new(state.gamma as f32));
    let scale = u16::from(brightness_to_u8(state.brightness as f32));
    if lut.is_none() && scale == 255 {
        return;
    }

    for c in img.iter_mut() {
        let v = lut.as_ref().map_or(*c, |lut| lut.apply(*c));
        *c = mul_div255_u16(u16::from(v), scale) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/adjust.rs"]
mod tests;
