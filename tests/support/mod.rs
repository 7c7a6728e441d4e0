#![allow(dead_code)]

use std::io::Cursor;
use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};

pub fn scratch(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("it").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn png_frame(w: u32, h: u32, px: [u8; 3]) -> Vec<u8> {
    let mut buf = Vec::new();
    RgbImage::from_pixel(w, h, Rgb(px))
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    cond()
}

/// Install an app that ignores its parameters and streams `frames_file`
/// (already length-prefixed) every `interval` seconds.
pub fn install_streaming_app(apps: &Path, id: &str, framed: &[u8], interval: &str) {
    let dir = apps.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("manifest.json"),
        format!(r#"{{"id":"{id}","name":"{id}","version":"1.0.0","entrypoint":"run.sh"}}"#),
    )
    .unwrap();
    std::fs::write(dir.join("frame.bin"), framed).unwrap();
    let script = dir.join("run.sh");
    std::fs::write(
        &script,
        format!("#!/bin/sh\ncat > /dev/null\nwhile true; do\ncat frame.bin\nsleep {interval}\ndone\n"),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
}
