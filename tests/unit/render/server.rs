use std::io::Cursor;

use image::{Rgb, RgbImage};

use super::*;
use crate::foundation::core::Resolution;
use crate::render::panel::MemoryPanel;
use crate::render::state::DisplayState;

fn renderer(name: &str) -> (Renderer, MemoryPanel) {
    let panel = MemoryPanel::new(Resolution::new(4, 4));
    let dir = PathBuf::from("target").join("unit-server").join(name);
    let cfg = RendererConfig::new(dir.join("ingest.sock"), dir.join("control.sock"));
    let state = SharedState::in_memory(DisplayState::default());
    (Renderer::new(cfg, state, Box::new(panel.clone())), panel)
}

fn png(px: [u8; 3]) -> Vec<u8> {
    let mut buf = Vec::new();
    RgbImage::from_pixel(4, 4, Rgb(px))
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn frames_draw_with_current_brightness() {
    let (r, panel) = renderer("brightness");
    r.handle_command(ControlCommand::SetBrightness { value: 0.5 });
    assert_eq!(r.render_frame(&png([200, 200, 200])), FrameOutcome::Drawn);
    assert_eq!(
        panel.last_frame().unwrap().get_pixel(0, 0),
        &Rgb([100, 100, 100])
    );
}

#[test]
fn power_off_consumes_without_drawing() {
    let (r, panel) = renderer("power");
    let resp = r.handle_command(ControlCommand::Power {
        state: PowerState::Off,
    });
    assert!(resp.ok);
    assert_eq!(panel.clear_count(), 1);

    assert_eq!(r.render_frame(&png([1, 2, 3])), FrameOutcome::PoweredOff);
    assert_eq!(panel.draw_count(), 0);

    r.handle_command(ControlCommand::Power {
        state: PowerState::On,
    });
    assert_eq!(r.render_frame(&png([1, 2, 3])), FrameOutcome::Drawn);
    assert_eq!(panel.draw_count(), 1);
}

#[test]
fn bad_payload_is_dropped() {
    let (r, panel) = renderer("bad_payload");
    assert_eq!(r.render_frame(b"\x89PNG but not really"), FrameOutcome::Dropped);
    assert_eq!(panel.draw_count(), 0);
}

#[test]
fn status_reports_clamped_brightness() {
    let (r, _) = renderer("status");
    let resp = r.handle_command(ControlCommand::SetBrightness { value: -3.0 });
    assert_eq!(resp, ControlResponse::ok());

    let status = r.handle_command(ControlCommand::Status);
    assert!(status.ok);
    assert_eq!(status.state.unwrap().brightness, 0.0);
}

#[test]
fn reload_without_settings_file_reports_error() {
    let (r, _) = renderer("reload");
    let resp = r.handle_command(ControlCommand::Reload);
    assert!(!resp.ok);
    assert!(resp.error.is_some());
}

#[test]
fn stale_socket_file_is_replaced_on_bind() {
    let dir = PathBuf::from("target").join("unit-server").join("stale");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("i.sock"), b"stale").unwrap();

    let listener = bind_socket(&dir.join("i.sock")).unwrap();
    drop(listener);
    assert!(bind_socket(&dir.join("i.sock")).is_ok());
}

#[test]
fn bound_renderer_answers_control_requests_until_cancelled() {
    let (r, _) = renderer("bound");
    let control = r.cfg.control_socket.clone();
    let bound = r.bind().unwrap();
    let cancel = CancelToken::new();

    std::thread::scope(|scope| {
        let running = scope.spawn(|| bound.run(&cancel));
        let resp = crate::protocol::control::send_command(
            &control,
            &ControlCommand::SetBrightness { value: 0.25 },
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(resp.ok);
        let status = crate::protocol::control::send_command(
            &control,
            &ControlCommand::Status,
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(status.state.unwrap().brightness, 0.25);
        cancel.cancel();
        running.join().unwrap().unwrap();
    });
    assert!(!control.exists());
}
