use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;

use crate::config::settings::{PanelConfig, PanelDriver};
use crate::foundation::core::Resolution;
use crate::foundation::error::{LedError, LedResult};

/// Handle to the physical (or virtual) display.
///
/// `draw` places the frame at the panel origin; pixels outside the panel are
/// dropped and uncovered panel pixels are black.
pub trait Panel: Send {
    fn resolution(&self) -> Resolution;
    fn draw(&mut self, frame: &RgbImage) -> LedResult<()>;
    fn clear(&mut self) -> LedResult<()>;
}

/// Construct the driver named by the panel configuration.
#[tracing::instrument(skip(cfg), fields(res = %cfg.resolution()))]
pub fn open_panel(cfg: &PanelConfig) -> LedResult<Box<dyn Panel>> {
    cfg.validate()?;
    let res = cfg.resolution();
    tracing::info!(
        rows = cfg.wiring.rows,
        cols = cfg.wiring.cols,
        chain_length = cfg.wiring.chain_length,
        parallel = cfg.wiring.parallel,
        hardware_mapping = %cfg.wiring.hardware_mapping,
        gpio_slowdown = cfg.wiring.gpio_slowdown,
        "opening panel"
    );
    Ok(match &cfg.driver {
        PanelDriver::Null => Box::new(NullPanel::new(res)),
        PanelDriver::Png { path } => Box::new(PngPanel::new(res, path.clone())),
        PanelDriver::Framebuffer {
            device,
            line_length,
        } => Box::new(FramebufferPanel::open(
            res,
            device,
            line_length.unwrap_or(res.width * 4),
        )?),
    })
}

/// Place `frame` at the origin of a black panel-sized canvas.
pub fn fit_to_panel(frame: &RgbImage, res: Resolution) -> RgbImage {
    if frame.dimensions() == (res.width, res.height) {
        return frame.clone();
    }
    let mut canvas = RgbImage::new(res.width, res.height);
    image::imageops::replace(&mut canvas, frame, 0, 0);
    canvas
}

pub struct NullPanel {
    res: Resolution,
}

impl NullPanel {
    pub fn new(res: Resolution) -> Self {
        Self { res }
    }
}

impl Panel for NullPanel {
    fn resolution(&self) -> Resolution {
        self.res
    }

    fn draw(&mut self, _frame: &RgbImage) -> LedResult<()> {
        Ok(())
    }

    fn clear(&mut self) -> LedResult<()> {
        Ok(())
    }
}

/// Virtual panel that keeps the latest frame in a PNG file.
pub struct PngPanel {
    res: Resolution,
    path: PathBuf,
}

impl PngPanel {
    pub fn new(res: Resolution, path: PathBuf) -> Self {
        Self { res, path }
    }

    fn write(&self, canvas: &RgbImage) -> LedResult<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        canvas
            .save_with_format(&tmp, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace png '{}'", self.path.display()))?;
        Ok(())
    }
}

impl Panel for PngPanel {
    fn resolution(&self) -> Resolution {
        self.res
    }

    fn draw(&mut self, frame: &RgbImage) -> LedResult<()> {
        self.write(&fit_to_panel(frame, self.res))
    }

    fn clear(&mut self) -> LedResult<()> {
        self.write(&RgbImage::new(self.res.width, self.res.height))
    }
}

/// Linux fbdev output, 32-bit BGRX.
pub struct FramebufferPanel {
    res: Resolution,
    device: File,
    line_length: usize,
    scratch: Vec<u8>,
}

impl FramebufferPanel {
    pub fn open(res: Resolution, device: &Path, line_length: u32) -> LedResult<Self> {
        if u64::from(line_length) < u64::from(res.width) * 4 {
            return Err(LedError::config(
                "framebuffer line_length shorter than one row",
            ));
        }
        let file = OpenOptions::new()
            .write(true)
            .open(device)
            .with_context(|| format!("open framebuffer '{}'", device.display()))?;
        let line_length = line_length as usize;
        Ok(Self {
            res,
            device: file,
            line_length,
            scratch: vec![0u8; line_length * res.height as usize],
        })
    }

    fn flush_scratch(&mut self) -> LedResult<()> {
        self.device.seek(SeekFrom::Start(0))?;
        self.device.write_all(&self.scratch)?;
        self.device.flush()?;
        Ok(())
    }
}

impl Panel for FramebufferPanel {
    fn resolution(&self) -> Resolution {
        self.res
    }

    fn draw(&mut self, frame: &RgbImage) -> LedResult<()> {
        let canvas = fit_to_panel(frame, self.res);
        for (y, row) in canvas.rows().enumerate() {
            let line = &mut self.scratch[y * self.line_length..];
            for (x, Rgb([r, g, b])) in row.enumerate() {
                line[x * 4..x * 4 + 4].copy_from_slice(&[*b, *g, *r, 0xff]);
            }
        }
        self.flush_scratch()
    }

    fn clear(&mut self) -> LedResult<()> {
        self.scratch.fill(0);
        self.flush_scratch()
    }
}

#[derive(Debug, Default)]
struct PanelLog {
    frames: Vec<RgbImage>,
    clears: usize,
}

/// Panel that records every call. Clones share the same record.
#[derive(Clone, Debug)]
pub struct MemoryPanel {
    res: Resolution,
    log: Arc<Mutex<PanelLog>>,
}

impl MemoryPanel {
    pub fn new(res: Resolution) -> Self {
        Self {
            res,
            log: Arc::new(Mutex::new(PanelLog::default())),
        }
    }

    pub fn draw_count(&self) -> usize {
        self.log.lock().frames.len()
    }

    pub fn clear_count(&self) -> usize {
        self.log.lock().clears
    }

    pub fn last_frame(&self) -> Option<RgbImage> {
        self.log.lock().frames.last().cloned()
    }
}

impl Panel for MemoryPanel {
    fn resolution(&self) -> Resolution {
        self.res
    }

    fn draw(&mut self, frame: &RgbImage) -> LedResult<()> {
        self.log.lock().frames.push(fit_to_panel(frame, self.res));
        Ok(())
    }

    fn clear(&mut self) -> LedResult<()> {
        self.log.lock().clears += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/panel.rs"]
mod tests;
