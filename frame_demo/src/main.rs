//! Frame demo
//!
//! Opens a GLFW window and drives the full frame protocol against a headless
//! device: a small scene of cubes sharing two pipelines is flattened, sorted
//! for binding and recorded every frame. Per-frame statistics go to the log.
//!
//! Usage: `frame_demo [engine.toml|engine.ron]`

use std::error::Error;
use std::sync::Arc;

use ash::vk;
use nalgebra::{Perspective3, Point3};

use scene_raster::config::Config;
use scene_raster::foundation::logging;
use scene_raster::prelude::*;
use scene_raster::render::api::HostUniformBuffer;
use scene_raster::render::pipeline::{PipelineConfig, PipelineLayoutConfig};
use scene_raster::render::window::GlfwWindow;
use scene_raster::scene::Drawable;

/// Frames to run when no window is available and the config is unbounded
const OFFSCREEN_FRAMES: u64 = 120;

/// Surface that never closes, for systems without a display
struct OffscreenSurface;

impl DisplaySurface for OffscreenSurface {
    fn should_close(&self) -> bool {
        false
    }

    fn poll_events(&mut self) {}
}

struct DemoSource {
    scene: SceneGraph,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    total_draws: u64,
}

impl FrameSource<CommandLog> for DemoSource {
    fn acquire(&mut self, _token: &FrameToken) -> RenderResult<Option<RenderPassTarget>> {
        if self.extent.width == 0 || self.extent.height == 0 {
            return Ok(None);
        }
        Ok(Some(RenderPassTarget::with_color_depth_clear(
            self.render_pass,
            vk::Framebuffer::null(),
            self.extent,
            [0.02, 0.02, 0.05, 1.0],
        )))
    }

    fn globals(&mut self, token: &FrameToken) -> SceneGlobals {
        #[allow(clippy::cast_precision_loss)]
        let time = token.index as f32 / 60.0;
        let eye = Point3::new(8.0 * time.cos(), 4.0, 8.0 * time.sin());
        #[allow(clippy::cast_precision_loss)]
        let aspect = self.extent.width as f32 / self.extent.height.max(1) as f32;

        SceneGlobals {
            view: Mat4::look_at_rh(&eye, &Point3::origin(), &Vec3::y()),
            projection: Perspective3::new(aspect, std::f32::consts::FRAC_PI_4, 0.1, 100.0)
                .to_homogeneous(),
            camera_position: eye.coords,
            sun_direction: Vec3::new(-0.3, -1.0, -0.2),
            time,
            ..SceneGlobals::default()
        }
    }

    fn record(&mut self, _token: &FrameToken, rasterizer: &mut SceneRasterizer<CommandLog>) -> RenderResult<()> {
        rasterizer.commands_mut().clear();
        let mut objects = self.scene.render_objects()?;
        draw_list::sort_for_binding(&mut objects);
        rasterizer.draw_all(objects)?;
        Ok(())
    }

    fn present(&mut self, token: &FrameToken, report: &FrameReport) -> RenderResult<()> {
        self.total_draws += u64::from(report.stats.draws);
        if token.index % 60 == 0 {
            log::info!(
                "Frame {}: {} draws, {} binds, recorded in {:?} (last frame {} us)",
                report.frame,
                report.stats.draws,
                report.stats.total_binds(),
                report.stats.recording_time,
                token.last_frame_micros()
            );
        }
        Ok(())
    }
}

fn build_scene(device: &Arc<HeadlessDevice>, global_layout: vk::DescriptorSetLayout, render_pass: vk::RenderPass) -> Result<SceneGraph, Box<dyn Error>> {
    let gpu: Arc<dyn GpuDevice> = device.clone();
    let vertex_layout = VertexLayout::from_components([
        (VertexComponentKind::Position, vk::Format::R32G32B32_SFLOAT),
        (VertexComponentKind::Normal, vk::Format::R32G32B32_SFLOAT),
        (VertexComponentKind::TexCoord(0), vk::Format::R32G32_SFLOAT),
    ])?;
    let material_layout = device.mint();

    let writer = MaterialWriter::new(material_layout).with_write(DescriptorWrite::CombinedImageSampler {
        binding: 0,
        sampler: device.mint(),
        image_view: device.mint(),
        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    });
    let opaque = MaterialConfig::new(
        PipelineConfig::opaque(device.mint(), device.mint(), vertex_layout.clone()),
        PipelineLayoutConfig::scene(global_layout, material_layout),
        writer.clone(),
    )
    .create(&gpu, render_pass)?;
    let tinted = opaque.variant(writer.clone().with_write(DescriptorWrite::UniformBuffer {
        binding: 1,
        buffer: device.mint(),
        offset: 0,
        range: 16,
    }))?;
    let glass = MaterialConfig::new(
        PipelineConfig::transparent(device.mint(), device.mint(), vertex_layout.clone()),
        PipelineLayoutConfig::scene(global_layout, material_layout),
        writer,
    )
    .create(&gpu, render_pass)?;

    let cube = Model::new(device.mint(), device.mint(), vk::IndexType::UINT16, vertex_layout).with_shape(Shape::whole(36));

    let mut scene = SceneGraph::new();
    let materials = [
        scene.insert_material(opaque),
        scene.insert_material(tinted),
        scene.insert_material(glass),
    ];
    let cube = scene.insert_model(cube);

    let root = scene.add_node(None, Mat4::identity())?;
    for i in 0..9_u8 {
        let x = f32::from(i % 3) * 2.5 - 2.5;
        let z = f32::from(i / 3) * 2.5 - 2.5;
        let node = scene.add_node(Some(root), Mat4::new_translation(&Vec3::new(x, 0.0, z)))?;
        scene.add_drawable(node, Drawable::new(materials[usize::from(i) % materials.len()], cube, 0))?;
    }
    log::info!("Scene built with {} nodes", scene.node_count());
    Ok(scene)
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_from_file(&path)?,
        None => EngineConfig::default(),
    };
    config.validate()?;
    logging::init_with_filter(&config.log_level);

    let device = Arc::new(HeadlessDevice::new());
    let global_layout = device.mint();
    let render_pass = device.mint();

    let mut window = match GlfwWindow::new("Scene Raster Frame Demo", 1280, 720) {
        Ok(window) => Some(window),
        Err(e) => {
            log::warn!("No window available ({}), running offscreen", e);
            None
        }
    };
    let extent = window.as_ref().map_or(
        vk::Extent2D {
            width: 1280,
            height: 720,
        },
        GlfwWindow::extent,
    );

    let capacity = SceneRasterizer::<CommandLog>::required_uniform_capacity(&config.rasterizer);
    let mut rasterizer = SceneRasterizer::new(
        RenderContext::new(device.clone()),
        config.rasterizer.clone(),
        GlobalBinding::new(global_layout, HostUniformBuffer::new(device.mint(), usize::try_from(capacity)?)),
        CommandLog::new(),
    )?;

    let mut source = DemoSource {
        scene: build_scene(&device, global_layout, render_pass)?,
        render_pass,
        extent,
        total_draws: 0,
    };

    let summary = match window.as_mut() {
        Some(window) => RenderLoop::from_config(&config.frame_loop).run(window, &mut rasterizer, &mut source)?,
        None => {
            let mut frame_loop = config.frame_loop.clone();
            if frame_loop.duration_in_frames == 0 {
                frame_loop.duration_in_frames = OFFSCREEN_FRAMES;
            }
            RenderLoop::from_config(&frame_loop).run(&mut OffscreenSurface, &mut rasterizer, &mut source)?
        }
    };

    log::info!(
        "Finished: {} frames ({} presented, {} discarded, {} skipped), {} draws",
        summary.frames,
        summary.presented,
        summary.discarded,
        summary.skipped,
        source.total_draws
    );
    rasterizer.release();
    Ok(())
}
