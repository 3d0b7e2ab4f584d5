//! Dynamic rendering scopes (Vulkan 1.3) over a single color view.
//!
//! A frame never needs more than one attachment, so a scope is a plain value:
//! the view, the render area, and whether the view is cleared or loaded when
//! the scope opens. No VkRenderPass or VkFramebuffer objects are involved.
//!
//! # Example
//!
//! ```no_run
//! use ash::vk;
//! use clearframe_rhi::command::CommandRecorder;
//! use clearframe_rhi::rendering::ColorScope;
//!
//! # fn example(view: vk::ImageView, extent: vk::Extent2D, cmd: &CommandRecorder) {
//! cmd.begin_scope(&ColorScope::clear(view, extent, [0.7, 1.0, 0.7, 1.0]));
//! cmd.end_scope();
//! # }
//! ```

use ash::vk;

/// What happens to the view's contents when a scope opens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScopeStart {
    /// Overwrite every texel with an RGBA color in `[0, 1]`.
    Clear([f32; 4]),
    /// Keep the current contents.
    Load,
}

/// A dynamic rendering scope writing one color view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScope {
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
    pub start: ScopeStart,
}

impl ColorScope {
    /// Scope that clears `view` to `color` as it opens.
    #[inline]
    pub fn clear(view: vk::ImageView, extent: vk::Extent2D, color: [f32; 4]) -> Self {
        Self {
            view,
            extent,
            start: ScopeStart::Clear(color),
        }
    }

    /// Scope that renders on top of whatever `view` already holds.
    #[inline]
    pub fn load(view: vk::ImageView, extent: vk::Extent2D) -> Self {
        Self {
            view,
            extent,
            start: ScopeStart::Load,
        }
    }

    pub fn load_op(&self) -> vk::AttachmentLoadOp {
        match self.start {
            ScopeStart::Clear(_) => vk::AttachmentLoadOp::CLEAR,
            ScopeStart::Load => vk::AttachmentLoadOp::LOAD,
        }
    }

    /// The whole view, anchored at the origin.
    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: self.extent,
        }
    }

    /// Attachment description for `vkCmdBeginRendering`.
    ///
    /// Results are always stored so the presentation engine sees them.
    pub fn attachment(&self) -> vk::RenderingAttachmentInfo<'static> {
        let color = match self.start {
            ScopeStart::Clear(color) => color,
            ScopeStart::Load => [0.0; 4],
        };

        vk::RenderingAttachmentInfo::default()
            .image_view(self.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(self.load_op())
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    #[test]
    fn test_clear_scope_attachment() {
        let scope = ColorScope::clear(vk::ImageView::null(), EXTENT, [0.7, 1.0, 0.7, 1.0]);
        let attachment = scope.attachment();

        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(
            attachment.image_layout,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        );
        let color = unsafe { attachment.clear_value.color.float32 };
        assert_eq!(color, [0.7, 1.0, 0.7, 1.0]);
    }

    #[test]
    fn test_load_scope_keeps_contents() {
        let scope = ColorScope::load(vk::ImageView::null(), EXTENT);
        assert_eq!(scope.start, ScopeStart::Load);
        assert_eq!(scope.attachment().load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(
            scope.attachment().store_op,
            vk::AttachmentStoreOp::STORE
        );
    }

    #[test]
    fn test_render_area_covers_extent() {
        let area = ColorScope::load(vk::ImageView::null(), EXTENT).render_area();
        assert_eq!(area.offset.x, 0);
        assert_eq!(area.offset.y, 0);
        assert_eq!(area.extent.width, 800);
        assert_eq!(area.extent.height, 600);
    }
}
