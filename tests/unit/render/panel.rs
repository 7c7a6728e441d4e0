use super::*;

fn solid(w: u32, h: u32, px: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb(px))
}

fn scratch(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("unit-panel").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn smaller_frames_are_drawn_at_origin_over_black() {
    let out = fit_to_panel(&solid(2, 1, [9, 9, 9]), Resolution::new(4, 2));
    assert_eq!(out.dimensions(), (4, 2));
    assert_eq!(out.get_pixel(0, 0), &Rgb([9, 9, 9]));
    assert_eq!(out.get_pixel(1, 0), &Rgb([9, 9, 9]));
    assert_eq!(out.get_pixel(2, 0), &Rgb([0, 0, 0]));
    assert_eq!(out.get_pixel(0, 1), &Rgb([0, 0, 0]));
}

#[test]
fn larger_frames_are_clipped() {
    let mut big = solid(8, 8, [1, 2, 3]);
    big.put_pixel(7, 7, Rgb([200, 0, 0]));
    let out = fit_to_panel(&big, Resolution::new(4, 4));
    assert_eq!(out.dimensions(), (4, 4));
    assert!(out.pixels().all(|p| *p == Rgb([1, 2, 3])));
}

#[test]
fn memory_panel_clones_share_their_record() {
    let panel = MemoryPanel::new(Resolution::new(2, 2));
    let mut handle: Box<dyn Panel> = Box::new(panel.clone());
    handle.draw(&solid(2, 2, [5, 5, 5])).unwrap();
    handle.clear().unwrap();

    assert_eq!(panel.draw_count(), 1);
    assert_eq!(panel.clear_count(), 1);
    assert_eq!(panel.last_frame().unwrap().get_pixel(1, 1), &Rgb([5, 5, 5]));
}

#[test]
fn png_panel_writes_panel_sized_file() {
    let dir = scratch("png");
    let path = dir.join("panel.png");
    let mut panel = PngPanel::new(Resolution::new(4, 2), path.clone());
    panel.draw(&solid(1, 1, [255, 0, 0])).unwrap();

    let img = image::open(&path).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (4, 2));
    assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
    assert_eq!(img.get_pixel(3, 1), &Rgb([0, 0, 0]));
}

#[test]
fn framebuffer_panel_writes_bgrx_rows_with_stride() {
    let dir = scratch("fb");
    let dev = dir.join("fb0");
    std::fs::write(&dev, b"").unwrap();

    let mut panel = FramebufferPanel::open(Resolution::new(2, 2), &dev, 12).unwrap();
    panel.draw(&solid(2, 2, [10, 20, 30])).unwrap();

    let bytes = std::fs::read(&dev).unwrap();
    assert_eq!(bytes.len(), 24);
    assert_eq!(&bytes[0..4], &[30, 20, 10, 0xff]);
    assert_eq!(&bytes[4..8], &[30, 20, 10, 0xff]);
    assert_eq!(&bytes[8..12], &[0, 0, 0, 0]);
    assert_eq!(&bytes[12..16], &[30, 20, 10, 0xff]);

    panel.clear().unwrap();
    assert!(std::fs::read(&dev).unwrap().iter().all(|&b| b == 0));
}

#[test]
fn opening_a_missing_framebuffer_fails() {
    let dir = scratch("fb_missing");
    let cfg = PanelConfig {
        driver: PanelDriver::Framebuffer {
            device: dir.join("nope").join("fb0"),
            line_length: None,
        },
        ..PanelConfig::default()
    };
    assert!(open_panel(&cfg).is_err());
}

#[test]
fn null_driver_opens_with_configured_resolution() {
    let cfg = PanelConfig {
        width: 32,
        height: 16,
        ..PanelConfig::default()
    };
    let panel = open_panel(&cfg).unwrap();
    assert_eq!(panel.resolution(), Resolution::new(32, 16));
}
