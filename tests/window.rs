use lightpass::window::*;

#[test]
fn default_is_1280x720_windowed() {
    let cfg = WindowConfig::default();
    assert_eq!(cfg.width, 1280);
    assert_eq!(cfg.height, 720);
    assert_eq!(cfg.mode, WindowMode::Windowed);
    assert!(cfg.vsync);
}

#[test]
fn aspect_ratio_1280x720() {
    let ratio = WindowConfig::default().aspect_ratio();
    assert!((ratio - 16.0 / 9.0).abs() < 1e-5, "expected 16/9, got {ratio}");
}

#[test]
fn aspect_ratio_zero_height_returns_zero() {
    let cfg = WindowConfig { width: 1920, height: 0, ..WindowConfig::default() };
    assert_eq!(cfg.aspect_ratio(), 0.0);
}

#[test]
fn vsync_selects_present_mode() {
    let mut cfg = WindowConfig::default();
    assert_eq!(cfg.present_mode(), wgpu::PresentMode::AutoVsync);
    cfg.vsync = false;
    assert_eq!(cfg.present_mode(), wgpu::PresentMode::AutoNoVsync);
}

#[test]
fn mode_round_trips_through_json() {
    let cfg = WindowConfig { mode: WindowMode::Borderless, ..WindowConfig::default() };
    let text = serde_json::to_string(&cfg).unwrap();
    let back: WindowConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back.mode, WindowMode::Borderless);
}
