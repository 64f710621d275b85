use super::target::{PixelFormat, RenderTarget, mip_extent};
use super::utils::Viewport;
use crate::error::{RenderError, RenderResult};

// ── AttachmentInfo ────────────────────────────────────────────────────────────

/// What a framebuffer knows about one attached target.
#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentInfo {
    pub target: String,
    /// Base (mip 0) extent of the target.
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub layers: u32,
    pub mip_levels: u32,
    pub face: Option<u32>,
    pub mip: Option<u32>,
}

impl AttachmentInfo {
    pub fn new(target: &str, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            target: target.to_string(),
            width,
            height,
            format,
            layers: 1,
            mip_levels: 1,
            face: None,
            mip: None,
        }
    }

    /// Describe a cube target with `mip_levels` levels.
    pub fn cube(target: &str, size: u32, format: PixelFormat, mip_levels: u32) -> Self {
        Self { layers: 6, mip_levels, ..Self::new(target, size, size, format) }
    }

    /// Select a single face and/or mip of the target.
    pub fn at(mut self, face: Option<u32>, mip: Option<u32>) -> Self {
        self.face = face;
        self.mip = mip;
        self
    }

    pub fn of(target: &RenderTarget, face: Option<u32>, mip: Option<u32>) -> Self {
        let (width, height) = target.size();
        Self {
            target: target.label().to_string(),
            width,
            height,
            format: target.format(),
            layers: target.shape().layers(),
            mip_levels: target.mip_levels(),
            face,
            mip,
        }
    }

    /// Extent of the attached level.
    pub fn extent(&self) -> (u32, u32) {
        let mip = self.mip.unwrap_or(0);
        (mip_extent(self.width, mip), mip_extent(self.height, mip))
    }

    fn check_range(&self, label: &str) -> RenderResult<()> {
        if let Some(face) = self.face {
            if face >= self.layers {
                return Err(RenderError::incomplete(
                    label,
                    format!("`{}` has {} layer(s), face {} requested", self.target, self.layers, face),
                ));
            }
        }
        if let Some(mip) = self.mip {
            if mip >= self.mip_levels {
                return Err(RenderError::incomplete(
                    label,
                    format!("`{}` has {} mip(s), mip {} requested", self.target, self.mip_levels, mip),
                ));
            }
        }
        Ok(())
    }
}

// ── FramebufferLayout ─────────────────────────────────────────────────────────

/// Attachment metadata of a framebuffer, checked for completeness before use.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramebufferLayout {
    pub label: String,
    /// `(slot, attachment)`, kept sorted by slot.
    pub colors: Vec<(u32, AttachmentInfo)>,
    pub depth: Option<AttachmentInfo>,
}

impl FramebufferLayout {
    pub fn new(label: &str) -> Self {
        Self { label: label.to_string(), ..Default::default() }
    }

    pub fn with_color(mut self, slot: u32, info: AttachmentInfo) -> Self {
        self.colors.push((slot, info));
        self.colors.sort_by_key(|(s, _)| *s);
        self
    }

    pub fn with_depth(mut self, info: AttachmentInfo) -> Self {
        self.depth = Some(info);
        self
    }

    /// Validate the attachment set and return the common render extent.
    ///
    /// Fails when there is nothing attached, a slot is used twice, a face or
    /// mip is out of range, formats are in the wrong slot kind, or any two
    /// attachments (colour or depth) disagree on size.
    pub fn check_complete(&self) -> RenderResult<(u32, u32)> {
        let label = self.label.as_str();
        if self.colors.is_empty() && self.depth.is_none() {
            return Err(RenderError::incomplete(label, "no attachments"));
        }

        for pair in self.colors.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(RenderError::incomplete(
                    label,
                    format!("slot {} bound to both `{}` and `{}`", pair[0].0, pair[0].1.target, pair[1].1.target),
                ));
            }
        }

        for (slot, info) in &self.colors {
            info.check_range(label)?;
            if info.format.is_depth() {
                return Err(RenderError::incomplete(
                    label,
                    format!("depth format {:?} in colour slot {}", info.format, slot),
                ));
            }
        }

        let mut extent: Option<(u32, u32)> = None;
        for (slot, info) in &self.colors {
            let e = info.extent();
            match extent {
                None => extent = Some(e),
                Some(first) if first != e => {
                    return Err(RenderError::incomplete(
                        label,
                        format!(
                            "colour slot {} (`{}`) is {}x{}, expected {}x{}",
                            slot, info.target, e.0, e.1, first.0, first.1
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        if let Some(depth) = &self.depth {
            depth.check_range(label)?;
            if !depth.format.is_depth() {
                return Err(RenderError::incomplete(
                    label,
                    format!("colour format {:?} in depth slot", depth.format),
                ));
            }
            let e = depth.extent();
            match extent {
                None => extent = Some(e),
                Some(first) if first != e => {
                    return Err(RenderError::incomplete(
                        label,
                        format!(
                            "depth store `{}` is {}x{}, colour attachments are {}x{}",
                            depth.target, e.0, e.1, first.0, first.1
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        extent.ok_or_else(|| RenderError::incomplete(label, "no attachments"))
    }

    pub fn is_depth_only(&self) -> bool {
        self.colors.is_empty() && self.depth.is_some()
    }

    /// Colour write mask for programs drawing into this framebuffer.
    /// A depth-only framebuffer writes no colour at all.
    pub fn color_write_mask(&self) -> wgpu::ColorWrites {
        if self.is_depth_only() {
            wgpu::ColorWrites::empty()
        } else {
            wgpu::ColorWrites::ALL
        }
    }

    /// Colour target states indexed by slot; gaps are `None`.
    pub fn color_targets(&self, blend: Option<wgpu::BlendState>) -> Vec<Option<wgpu::ColorTargetState>> {
        let count = self.colors.last().map(|(s, _)| *s as usize + 1).unwrap_or(0);
        let mut targets = vec![None; count];
        for (slot, info) in &self.colors {
            targets[*slot as usize] = Some(wgpu::ColorTargetState {
                format: info.format.to_wgpu(),
                blend,
                write_mask: self.color_write_mask(),
            });
        }
        targets
    }

    pub fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        self.depth.as_ref().map(|d| d.format.to_wgpu())
    }
}

// ── Framebuffer ───────────────────────────────────────────────────────────────

/// How a bound framebuffer treats existing contents.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Load {
    /// Clear colours to the framebuffer's clear colour and depth to 1.0.
    Clear,
    /// Keep existing contents.
    Keep,
}

/// Offscreen draw destination.
///
/// Attachments are texture views over targets owned elsewhere. Re-attaching a
/// slot (e.g. to another cube face or mip) swaps the view; storage is never
/// reallocated here.
pub struct Framebuffer {
    layout: FramebufferLayout,
    color_views: Vec<(u32, wgpu::TextureView)>,
    depth_view: Option<wgpu::TextureView>,
    clear_color: wgpu::Color,
}

impl Framebuffer {
    pub fn new(label: &str) -> Self {
        Self {
            layout: FramebufferLayout::new(label),
            color_views: Vec::new(),
            depth_view: None,
            clear_color: wgpu::Color::BLACK,
        }
    }

    /// Framebuffer with `colors` in slots `0..n` and an optional depth store,
    /// checked for completeness before returning.
    pub fn with_targets(label: &str, colors: &[&RenderTarget], depth: Option<&RenderTarget>) -> RenderResult<Self> {
        let mut fb = Self::new(label);
        for (slot, target) in colors.iter().enumerate() {
            fb.attach(target, slot as u32, None, None)?;
        }
        if let Some(depth) = depth {
            fb.attach_depth(depth, None)?;
        }
        fb.check_complete()?;
        Ok(fb)
    }

    pub fn label(&self) -> &str { &self.layout.label }
    pub fn layout(&self) -> &FramebufferLayout { &self.layout }

    pub fn set_clear_color(&mut self, color: wgpu::Color) {
        self.clear_color = color;
    }

    /// Bind `target` (optionally one face / mip of it) to colour `slot`,
    /// replacing whatever was bound there.
    pub fn attach(&mut self, target: &RenderTarget, slot: u32, face: Option<u32>, mip: Option<u32>) -> RenderResult<()> {
        if target.format().is_depth() {
            return Err(RenderError::incomplete(
                self.label(),
                format!("`{}` is a depth store, use attach_depth", target.label()),
            ));
        }
        let view = target.attachment_view(face, mip)?;
        let info = AttachmentInfo::of(target, face, mip);

        match self.layout.colors.iter().position(|(s, _)| *s == slot) {
            Some(i) => {
                self.layout.colors[i].1 = info;
                self.color_views[i].1 = view;
            }
            None => {
                let i = self.layout.colors.partition_point(|(s, _)| *s < slot);
                self.layout.colors.insert(i, (slot, info));
                self.color_views.insert(i, (slot, view));
            }
        }
        Ok(())
    }

    pub fn attach_depth(&mut self, store: &RenderTarget, face: Option<u32>) -> RenderResult<()> {
        if !store.format().is_depth() {
            return Err(RenderError::incomplete(
                self.label(),
                format!("`{}` is not a depth format", store.label()),
            ));
        }
        self.depth_view = Some(store.attachment_view(face, None)?);
        self.layout.depth = Some(AttachmentInfo::of(store, face, None));
        Ok(())
    }

    pub fn detach(&mut self, slot: u32) {
        if let Some(i) = self.layout.colors.iter().position(|(s, _)| *s == slot) {
            self.layout.colors.remove(i);
            self.color_views.remove(i);
        }
    }

    pub fn detach_depth(&mut self) {
        self.layout.depth = None;
        self.depth_view = None;
    }

    pub fn check_complete(&self) -> RenderResult<(u32, u32)> {
        self.layout.check_complete()
    }

    pub fn viewport(&self) -> RenderResult<Viewport> {
        let (w, h) = self.check_complete()?;
        Ok(Viewport::full(w, h))
    }

    /// Begin a render pass drawing into this framebuffer with the viewport set
    /// to its extent. The pass is unbound by [`Framebuffer::unbind`] (or by
    /// dropping it) before the encoder can be used again.
    pub fn bind<'e>(&self, encoder: &'e mut wgpu::CommandEncoder, load: Load) -> RenderResult<wgpu::RenderPass<'e>> {
        let viewport = self.viewport()?;

        let color_load = match load {
            Load::Clear => wgpu::LoadOp::Clear(self.clear_color),
            Load::Keep => wgpu::LoadOp::Load,
        };
        let count = self.color_views.last().map(|(s, _)| *s as usize + 1).unwrap_or(0);
        let mut color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = vec![None; count];
        for (slot, view) in &self.color_views {
            color_attachments[*slot as usize] = Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations { load: color_load, store: wgpu::StoreOp::Store },
            });
        }

        let depth_stencil_attachment = match (&self.depth_view, &self.layout.depth) {
            (Some(view), Some(info)) => Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: match load {
                        Load::Clear => wgpu::LoadOp::Clear(1.0),
                        Load::Keep => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: info.format.has_stencil().then_some(wgpu::Operations {
                    load: match load {
                        Load::Clear => wgpu::LoadOp::Clear(0),
                        Load::Keep => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                }),
            }),
            _ => None,
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label()),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        viewport.apply(&mut pass);
        Ok(pass)
    }

    /// End a pass started by [`Framebuffer::bind`].
    pub fn unbind(pass: wgpu::RenderPass<'_>) {
        drop(pass);
    }
}

/// Begin a pass on the display surface (the default destination).
pub fn bind_display<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    size: (u32, u32),
) -> wgpu::RenderPass<'e> {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("display"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            depth_slice: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });
    Viewport::full(size.0, size.1).apply(&mut pass);
    pass
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba16(name: &str, w: u32, h: u32) -> AttachmentInfo {
        AttachmentInfo::new(name, w, h, PixelFormat::Rgba16Float)
    }

    #[test]
    fn empty_layout_is_incomplete() {
        let layout = FramebufferLayout::new("empty");
        assert!(matches!(layout.check_complete(), Err(RenderError::FramebufferIncomplete { .. })));
    }

    #[test]
    fn duplicate_slot_is_rejected() {
        let layout = FramebufferLayout::new("dup")
            .with_color(0, rgba16("a", 8, 8))
            .with_color(0, rgba16("b", 8, 8));
        let err = layout.check_complete().unwrap_err();
        assert!(err.to_string().contains("slot 0"), "{err}");
    }

    #[test]
    fn depth_format_in_colour_slot_is_rejected() {
        let layout = FramebufferLayout::new("bad")
            .with_color(0, AttachmentInfo::new("d", 8, 8, PixelFormat::Depth32Float));
        assert!(layout.check_complete().is_err());
    }

    #[test]
    fn cube_face_and_mip_extent() {
        let info = AttachmentInfo::cube("prefilter", 128, PixelFormat::Rgba16Float, 5).at(Some(3), Some(2));
        assert_eq!(info.extent(), (32, 32));
        let layout = FramebufferLayout::new("capture")
            .with_color(0, info)
            .with_depth(AttachmentInfo::new("scratch", 32, 32, PixelFormat::Depth24PlusStencil8));
        assert_eq!(layout.check_complete().unwrap(), (32, 32));
    }

    #[test]
    fn face_out_of_range_on_2d_target() {
        let layout = FramebufferLayout::new("capture").with_color(0, rgba16("flat", 8, 8).at(Some(1), None));
        assert!(layout.check_complete().is_err());
    }

    #[test]
    fn mip_out_of_range() {
        let info = AttachmentInfo::cube("env", 64, PixelFormat::Rgba16Float, 3).at(Some(0), Some(3));
        let layout = FramebufferLayout::new("capture").with_color(0, info);
        assert!(layout.check_complete().is_err());
    }

    #[test]
    fn depth_only_layout_masks_colour_writes() {
        let layout = FramebufferLayout::new("shadow")
            .with_depth(AttachmentInfo::new("shadow_map", 1024, 1024, PixelFormat::Depth32Float));
        assert_eq!(layout.check_complete().unwrap(), (1024, 1024));
        assert!(layout.is_depth_only());
        assert_eq!(layout.color_write_mask(), wgpu::ColorWrites::empty());
        assert!(layout.color_targets(None).is_empty());
    }

    #[test]
    fn color_targets_follow_slots() {
        let layout = FramebufferLayout::new("mrt")
            .with_color(1, AttachmentInfo::new("bright", 4, 4, PixelFormat::Rgba16Float))
            .with_color(0, AttachmentInfo::new("scene", 4, 4, PixelFormat::Rgba16Float));
        let targets = layout.color_targets(None);
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.is_some()));
        assert_eq!(layout.colors[0].1.target, "scene");
    }
}
