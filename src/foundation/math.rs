pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Scale an 8-bit channel by a factor in `[0, 1]`, rounding to nearest.
pub(crate) fn scale_channel(c: u8, factor: f32) -> u8 {
    (f32::from(c) * factor.clamp(0.0, 1.0)).round().clamp(0.0, 255.0) as u8
}

/// Brightness expressed as an 8-bit multiplier, so per-pixel work stays integer.
pub(crate) fn brightness_to_u8(brightness: f32) -> u8 {
    scale_channel(255, brightness)
}

/// 256-entry lookup table for `255 * (c / 255) ^ gamma`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct GammaLut([u8; 256]);

impl GammaLut {
    pub(crate) fn new(gamma: f32) -> Self {
        let mut table = [0u8; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            let normalized = i as f32 / 255.0;
            *slot = (normalized.powf(gamma) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        Self(table)
    }

    pub(crate) fn apply(&self, c: u8) -> u8 {
        self.0[usize::from(c)]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
