// SPDX-License-Identifier: CEPL-1.0
//! Render pass, graphics pipeline, framebuffers and the prerecorded
//! command buffers for the fixed triangle. Everything here lives exactly as
//! long as one swapchain.
use crate::context::DeviceContext;
use crate::error::{VkCall, VkError};
use crate::swapchain::Swapchain;
use anyhow::{Context, Result};
use ash::util::read_spv;
use ash::vk;
use std::ffi::CStr;
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;
use tracing::debug;
use vesper_render::RenderSettings;

pub const VERTEX_SHADER: &str = "triangle_vert.spv";
pub const FRAGMENT_SHADER: &str = "triangle_frag.spv";

/// The vertex shader emits the triangle from `gl_VertexIndex`.
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

const SPIRV_MAGIC: u32 = 0x0723_0203;
const ENTRY_POINT: &CStr = c"main";

/// Decoded SPIR-V words for both stages.
#[derive(Debug)]
pub struct ShaderSet {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderSet {
    pub fn load(dir: &Path) -> Result<Self, VkError> {
        Ok(Self {
            vertex: read_shader(&dir.join(VERTEX_SHADER))?,
            fragment: read_shader(&dir.join(FRAGMENT_SHADER))?,
        })
    }
}

fn read_shader(path: &Path) -> Result<Vec<u32>, VkError> {
    let bytes = fs::read(path).map_err(|source| VkError::ShaderRead {
        path: path.to_path_buf(),
        source,
    })?;
    let decode_err = |source: io::Error| VkError::ShaderDecode {
        path: path.to_path_buf(),
        source,
    };
    // read_spv fixes byte order but accepts any first word.
    let words = read_spv(&mut Cursor::new(&bytes)).map_err(decode_err)?;
    if words.first() != Some(&SPIRV_MAGIC) {
        return Err(decode_err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing SPIR-V magic number",
        )));
    }
    Ok(words)
}

/// Destroys both modules when dropped; they are only needed until the
/// pipeline exists.
struct ShaderModules<'a> {
    device: &'a ash::Device,
    vertex: vk::ShaderModule,
    fragment: vk::ShaderModule,
}

impl<'a> ShaderModules<'a> {
    unsafe fn create(device: &'a ash::Device, set: &ShaderSet) -> Result<Self, VkError> {
        let mut modules = ShaderModules {
            device,
            vertex: vk::ShaderModule::null(),
            fragment: vk::ShaderModule::null(),
        };
        modules.vertex = create_module(device, &set.vertex)?;
        modules.fragment = create_module(device, &set.fragment)?;
        Ok(modules)
    }
}

impl Drop for ShaderModules<'_> {
    fn drop(&mut self) {
        unsafe {
            for module in [self.vertex, self.fragment] {
                if module != vk::ShaderModule::null() {
                    self.device.destroy_shader_module(module, None);
                }
            }
        }
    }
}

unsafe fn create_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule, VkError> {
    let info = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        code_size: std::mem::size_of_val(code),
        p_code: code.as_ptr(),
        ..Default::default()
    };
    device
        .create_shader_module(&info, None)
        .call("vkCreateShaderModule")
}

fn color_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    }
}

/// Holds the attachment write until presentation has released the image.
fn acquire_dependency() -> vk::SubpassDependency {
    vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: vk::AccessFlags::empty(),
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
            | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        dependency_flags: vk::DependencyFlags::empty(),
    }
}

fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo<'static> {
    vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::BACK,
        front_face: vk::FrontFace::CLOCKWISE,
        line_width: 1.0,
        ..Default::default()
    }
}

fn full_viewport(extent: vk::Extent2D) -> (vk::Viewport, vk::Rect2D) {
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    (viewport, scissor)
}

/// Per-swapchain draw state. Handles are null until built and after
/// `destroy`.
#[derive(Debug, Default)]
pub struct FramePipeline {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub command_buffers: Vec<vk::CommandBuffer>,
}

impl FramePipeline {
    /// Loads the shaders, builds every object against `chain` and records
    /// one command buffer per swapchain image. A failure releases whatever
    /// was already created.
    pub unsafe fn build(
        ctx: &DeviceContext,
        chain: &Swapchain,
        settings: &RenderSettings,
    ) -> Result<Self> {
        let shaders = ShaderSet::load(&settings.shader_dir)?;

        let mut frame = FramePipeline::default();
        if let Err(e) = frame.populate(ctx, chain, &shaders, settings.clear_color) {
            frame.destroy(ctx);
            return Err(e);
        }
        debug!(
            "frame pipeline built: {} framebuffers, {} command buffers",
            frame.framebuffers.len(),
            frame.command_buffers.len()
        );
        Ok(frame)
    }

    unsafe fn populate(
        &mut self,
        ctx: &DeviceContext,
        chain: &Swapchain,
        shaders: &ShaderSet,
        clear: [f32; 4],
    ) -> Result<()> {
        let device = &ctx.device;

        self.render_pass = create_render_pass(device, chain.format.format)?;

        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            ..Default::default()
        };
        self.layout = device
            .create_pipeline_layout(&layout_info, None)
            .call("vkCreatePipelineLayout")?;

        let modules = ShaderModules::create(device, shaders).context("shader modules")?;
        self.pipeline = create_pipeline(device, &modules, self.render_pass, self.layout, chain.extent)?;
        drop(modules);

        for &view in &chain.views {
            let attachments = [view];
            let fb_info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: self.render_pass,
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: chain.extent.width,
                height: chain.extent.height,
                layers: 1,
                ..Default::default()
            };
            self.framebuffers.push(
                device
                    .create_framebuffer(&fb_info, None)
                    .call("vkCreateFramebuffer")?,
            );
        }

        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: ctx.command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: self.framebuffers.len() as u32,
            ..Default::default()
        };
        self.command_buffers = device
            .allocate_command_buffers(&alloc_info)
            .call("vkAllocateCommandBuffers")?;

        self.record(device, chain.extent, clear)?;
        Ok(())
    }

    unsafe fn record(
        &self,
        device: &ash::Device,
        extent: vk::Extent2D,
        clear: [f32; 4],
    ) -> Result<(), VkError> {
        let clear_value = vk::ClearValue {
            color: vk::ClearColorValue { float32: clear },
        };
        let begin_info = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };

        for (&cmd, &framebuffer) in self.command_buffers.iter().zip(&self.framebuffers) {
            device
                .begin_command_buffer(cmd, &begin_info)
                .call("vkBeginCommandBuffer")?;

            let pass_info = vk::RenderPassBeginInfo {
                s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
                render_pass: self.render_pass,
                framebuffer,
                render_area: vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                },
                clear_value_count: 1,
                p_clear_values: &clear_value,
                ..Default::default()
            };
            device.cmd_begin_render_pass(cmd, &pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            device.cmd_draw(cmd, TRIANGLE_VERTEX_COUNT, 1, 0, 0);
            device.cmd_end_render_pass(cmd);

            device
                .end_command_buffer(cmd)
                .call("vkEndCommandBuffer")?;
        }
        Ok(())
    }

    /// Command buffers, framebuffers, pipeline, layout, render pass.
    /// Idempotent; the caller must have idled the device.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) {
        let device = &ctx.device;
        if !self.command_buffers.is_empty() {
            device.free_command_buffers(ctx.command_pool, &self.command_buffers);
            self.command_buffers.clear();
        }
        for fb in self.framebuffers.drain(..) {
            device.destroy_framebuffer(fb, None);
        }
        if self.pipeline != vk::Pipeline::null() {
            device.destroy_pipeline(self.pipeline, None);
            self.pipeline = vk::Pipeline::null();
        }
        if self.layout != vk::PipelineLayout::null() {
            device.destroy_pipeline_layout(self.layout, None);
            self.layout = vk::PipelineLayout::null();
        }
        if self.render_pass != vk::RenderPass::null() {
            device.destroy_render_pass(self.render_pass, None);
            self.render_pass = vk::RenderPass::null();
        }
    }
}

unsafe fn create_render_pass(device: &ash::Device, format: vk::Format) -> Result<vk::RenderPass, VkError> {
    let attachment = color_attachment(format);
    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &color_ref,
        ..Default::default()
    };
    let dependency = acquire_dependency();

    let info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &attachment,
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    device
        .create_render_pass(&info, None)
        .call("vkCreateRenderPass")
}

unsafe fn create_pipeline(
    device: &ash::Device,
    modules: &ShaderModules<'_>,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    extent: vk::Extent2D,
) -> Result<vk::Pipeline, VkError> {
    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: modules.vertex,
            p_name: ENTRY_POINT.as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: modules.fragment,
            p_name: ENTRY_POINT.as_ptr(),
            ..Default::default()
        },
    ];

    // No vertex buffers: positions come from the shader.
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        ..Default::default()
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        primitive_restart_enable: vk::FALSE,
        ..Default::default()
    };

    let (viewport, scissor) = full_viewport(extent);
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: 1,
        p_viewports: &viewport,
        scissor_count: 1,
        p_scissors: &scissor,
        ..Default::default()
    };
    let raster = rasterization_state();
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: vk::SampleCountFlags::TYPE_1,
        ..Default::default()
    };
    let blend_attachment = vk::PipelineColorBlendAttachmentState {
        color_write_mask: vk::ColorComponentFlags::R
            | vk::ColorComponentFlags::G
            | vk::ColorComponentFlags::B
            | vk::ColorComponentFlags::A,
        blend_enable: vk::FALSE,
        ..Default::default()
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &blend_attachment,
        ..Default::default()
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_viewport_state: &viewport_state,
        p_rasterization_state: &raster,
        p_multisample_state: &multisample,
        p_color_blend_state: &color_blend,
        layout,
        render_pass,
        subpass: 0,
        ..Default::default()
    };

    let pipelines = device
        .create_graphics_pipelines(
            vk::PipelineCache::null(),
            std::slice::from_ref(&pipeline_info),
            None,
        )
        .map_err(|(_, result)| VkError::Call {
            op: "vkCreateGraphicsPipelines",
            result,
        })?;
    Ok(pipelines[0])
}
