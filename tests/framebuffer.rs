use lightpass::RenderError;
use lightpass::renderer::framebuffer::{AttachmentInfo, FramebufferLayout};
use lightpass::renderer::target::{PixelFormat, TargetDesc};

fn gbuffer(width: u32, height: u32) -> FramebufferLayout {
    FramebufferLayout::new("gbuffer")
        .with_color(0, AttachmentInfo::new("g_position", width, height, PixelFormat::Rgba16Float))
        .with_color(1, AttachmentInfo::new("g_normal", width, height, PixelFormat::Rgba16Float))
        .with_color(2, AttachmentInfo::new("g_albedo_spec", width, height, PixelFormat::Rgba8Unorm))
}

#[test]
fn matching_attachments_are_complete() {
    let layout = gbuffer(1280, 720).with_depth(AttachmentInfo::new("g_depth", 1280, 720, PixelFormat::Depth24PlusStencil8));
    assert_eq!(layout.check_complete().unwrap(), (1280, 720));
    assert!(!layout.is_depth_only());
}

#[test]
fn mismatched_colour_sizes_are_incomplete() {
    let layout = gbuffer(1280, 720).with_color(3, AttachmentInfo::new("bright", 640, 360, PixelFormat::Rgba16Float));
    let err = layout.check_complete().unwrap_err();
    assert!(matches!(err, RenderError::FramebufferIncomplete { .. }));
    assert!(err.to_string().contains("bright"), "{err}");
}

#[test]
fn depth_store_must_match_colours() {
    let layout = gbuffer(1280, 720).with_depth(AttachmentInfo::new("g_depth", 1024, 1024, PixelFormat::Depth32Float));
    assert!(layout.check_complete().is_err());
}

#[test]
fn cube_mip_attachment_uses_mip_extent() {
    let layout = FramebufferLayout::new("prefilter")
        .with_color(0, AttachmentInfo::cube("prefilter", 128, PixelFormat::Rgba16Float, 5).at(Some(3), Some(2)))
        .with_depth(AttachmentInfo::new("capture_depth", 32, 32, PixelFormat::Depth24PlusStencil8));
    assert_eq!(layout.check_complete().unwrap(), (32, 32));
}

#[test]
fn face_out_of_range_is_rejected() {
    let layout = FramebufferLayout::new("bad_face")
        .with_color(0, AttachmentInfo::cube("env", 64, PixelFormat::Rgba16Float, 1).at(Some(6), None));
    assert!(layout.check_complete().is_err());
}

#[test]
fn depth_only_framebuffer_masks_colour_writes() {
    let layout = FramebufferLayout::new("shadow").with_depth(AttachmentInfo::new("shadow", 2048, 2048, PixelFormat::Depth32Float));
    assert_eq!(layout.check_complete().unwrap(), (2048, 2048));
    assert!(layout.is_depth_only());
    assert!(layout.color_write_mask().is_empty());
    assert!(layout.color_targets(None).is_empty());
}

#[test]
fn empty_framebuffer_is_incomplete() {
    assert!(FramebufferLayout::new("empty").check_complete().is_err());
}

#[test]
fn target_desc_rejects_zero_size() {
    assert!(TargetDesc::new("zero", 0, 720, PixelFormat::Rgba16Float).validate().is_err());
    assert!(TargetDesc::cube("env", 512, PixelFormat::Rgba16Float).with_full_mips().validate().is_ok());
}
