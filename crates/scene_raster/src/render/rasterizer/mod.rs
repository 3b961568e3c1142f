//! Scene rasterizer
//!
//! Records draws for a linear stream of [`RenderObject`]s into a
//! [`CommandSink`], binding only what changed since the previous draw.
//!
//! # Frame protocol
//!
//! ```text
//! begin(target) -> update(globals) -> draw(ro)* -> end() -> FrameReport
//! ```
//!
//! `begin` resets the frame's descriptor allocator, allocates the global set
//! (set 0) and opens the render pass. `update` writes the scene globals into
//! the frame's slice of the uniform ring. Each `draw` then:
//!
//! 1. rebinds the pipeline and set 0 when the pipeline changes, which also
//!    forgets the material;
//! 2. writes a material instance and binds it at set 1 when the material
//!    changes;
//! 3. rebinds vertex and index buffers when they change;
//! 4. binds the per-object set at set 2, if any;
//! 5. pushes the model matrix and records one indexed draw.
//!
//! Draws are never reordered. A draw error taints the frame: later draws are
//! accepted as no-ops and `end` reports the failure so the frame is not
//! presented. Device loss releases every descriptor pool and returns the
//! rasterizer to idle.

mod bind_cache;
mod stats;

pub use stats::{FrameReport, FrameStats, Rebinds};

use ash::vk;

use self::bind_cache::BindCache;
use crate::core::config::RasterizerConfig;
use crate::foundation::math::to_columns;
use crate::foundation::time::Stopwatch;
use crate::render::api::{CommandSink, IndexedDraw, RenderPassTarget};
use crate::render::descriptors::{DescriptorAllocator, DescriptorWrite};
use crate::render::pipeline::{GLOBAL_SET, MATERIAL_SET, OBJECT_SET};
use crate::render::render_object::RenderObject;
use crate::render::{
    GlobalBinding, GlobalUniforms, RenderContext, RenderError, RenderResult, SceneGlobals,
};

/// Recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterizerState {
    /// Between frames
    Idle,
    /// Between `begin` and `end`
    Recording,
}

/// Per-frame state, rebuilt by every `begin`
struct Frame {
    global_set: vk::DescriptorSet,
    globals_written: bool,
    cache: BindCache,
    stats: FrameStats,
    failure: Option<RenderError>,
    stopwatch: Stopwatch,
}

impl Frame {
    fn new(global_set: vk::DescriptorSet) -> Self {
        Self {
            global_set,
            globals_written: false,
            cache: BindCache::default(),
            stats: FrameStats::default(),
            failure: None,
            stopwatch: Stopwatch::start_new(),
        }
    }
}

/// Bind-cached draw recorder
pub struct SceneRasterizer<C: CommandSink> {
    context: RenderContext,
    config: RasterizerConfig,
    global: GlobalBinding,
    commands: C,
    allocators: Vec<DescriptorAllocator>,
    uniform_stride: vk::DeviceSize,
    frames_recorded: u64,
    frame: Option<Frame>,
}

impl<C: CommandSink> SceneRasterizer<C> {
    /// Create a rasterizer recording into `commands`.
    ///
    /// `global.uniforms` must hold at least
    /// [`Self::required_uniform_capacity`] bytes.
    pub fn new(
        context: RenderContext,
        config: RasterizerConfig,
        global: GlobalBinding,
        commands: C,
    ) -> RenderResult<Self> {
        config
            .validate()
            .map_err(|e| RenderError::BadConfig(e.to_string()))?;
        if global.set_layout == vk::DescriptorSetLayout::null() {
            return Err(RenderError::BadConfig("global set layout is null".to_string()));
        }
        let required = Self::required_uniform_capacity(&config);
        if global.uniforms.capacity() < required {
            return Err(RenderError::BadConfig(format!(
                "global uniform ring holds {} bytes, {} frames in flight need {}",
                global.uniforms.capacity(),
                config.frames_in_flight,
                required
            )));
        }

        let allocators = (0..config.frames_in_flight)
            .map(|_| DescriptorAllocator::new(context.device.clone(), config.descriptor_pools.clone()))
            .collect();

        log::debug!(
            "Scene rasterizer created with {} frames in flight",
            config.frames_in_flight
        );
        Ok(Self {
            context,
            uniform_stride: aligned_uniform_size(config.uniform_alignment),
            config,
            global,
            commands,
            allocators,
            frames_recorded: 0,
            frame: None,
        })
    }

    /// Bytes the global uniform ring needs for `config`
    pub fn required_uniform_capacity(config: &RasterizerConfig) -> vk::DeviceSize {
        aligned_uniform_size(config.uniform_alignment) * config.frames_in_flight as vk::DeviceSize
    }

    /// Start a frame: reset the frame's allocator, allocate the global set
    /// and begin the render pass.
    pub fn begin(&mut self, target: &RenderPassTarget) -> RenderResult<()> {
        if self.frame.is_some() {
            return Err(wrong_state("begin called while recording"));
        }
        self.context.time.register_current_thread();

        let slot = self.ring_slot();
        let global_set = match self.open_frame(slot, target) {
            Ok(set) => set,
            Err(e) => return Err(self.fail(e)),
        };

        log::trace!("Frame {} begun on ring slot {}", self.frames_recorded, slot);
        self.frame = Some(Frame::new(global_set));
        Ok(())
    }

    /// Write the scene globals for this frame. The last call in a frame wins.
    pub fn update(&mut self, globals: &SceneGlobals) -> RenderResult<()> {
        let Some(frame) = self.frame.as_ref() else {
            return Err(wrong_state("update called outside begin/end"));
        };
        let global_set = frame.global_set;
        let first_write = !frame.globals_written;

        let offset = self.ring_slot() as vk::DeviceSize * self.uniform_stride;
        let uniforms = globals.to_uniforms();
        let mut result = self.global.uniforms.write(offset, uniforms.as_bytes());
        if result.is_ok() && first_write {
            let write = DescriptorWrite::UniformBuffer {
                binding: 0,
                buffer: self.global.uniforms.buffer(),
                offset,
                range: GlobalUniforms::SIZE as vk::DeviceSize,
            };
            result = self.context.device.update_descriptor_set(global_set, &[write]);
        }

        match result {
            Ok(()) => {
                if let Some(frame) = self.frame.as_mut() {
                    frame.globals_written = true;
                }
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Record one render object
    pub fn draw(&mut self, object: &RenderObject<'_>) -> RenderResult<Rebinds> {
        let Some(frame) = self.frame.as_ref() else {
            return Err(wrong_state("draw called outside begin/end"));
        };
        if frame.failure.is_some() {
            return Ok(Rebinds::empty());
        }
        if !frame.globals_written {
            return Err(wrong_state("draw called before update in this frame"));
        }

        match self.record_draw(object) {
            Ok(rebinds) => Ok(rebinds),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Record render objects in order, stopping at the first error.
    /// Returns the number of objects accepted.
    pub fn draw_all<'o, I>(&mut self, objects: I) -> RenderResult<usize>
    where
        I: IntoIterator<Item = RenderObject<'o>>,
    {
        let mut count = 0;
        for object in objects {
            self.draw(&object)?;
            count += 1;
        }
        Ok(count)
    }

    /// Finish the frame: end the render pass and report what was recorded
    pub fn end(&mut self) -> RenderResult<FrameReport> {
        let Some(mut frame) = self.frame.take() else {
            return Err(wrong_state("end called without begin"));
        };
        frame.stopwatch.stop();
        frame.stats.recording_time = frame.stopwatch.elapsed();

        let report = FrameReport {
            frame: self.frames_recorded,
            stats: frame.stats,
            failure: frame.failure,
        };
        self.frames_recorded += 1;

        if let Err(e) = self.commands.end_render_pass() {
            return Err(self.fail(e));
        }
        if let Some(failure) = &report.failure {
            log::warn!("Frame {} ended tainted: {}", report.frame, failure);
        }
        Ok(report)
    }

    /// Allocator of the current frame
    pub fn descriptor_allocator(&mut self) -> &mut DescriptorAllocator {
        let slot = self.ring_slot();
        &mut self.allocators[slot]
    }

    /// Recording state
    pub fn state(&self) -> RasterizerState {
        if self.frame.is_some() {
            RasterizerState::Recording
        } else {
            RasterizerState::Idle
        }
    }

    /// Frames ended so far
    pub fn frames_recorded(&self) -> u64 {
        self.frames_recorded
    }

    /// Global set of the frame being recorded
    pub fn global_set(&self) -> Option<vk::DescriptorSet> {
        self.frame.as_ref().map(|frame| frame.global_set)
    }

    /// Settings in effect
    pub fn config(&self) -> &RasterizerConfig {
        &self.config
    }

    /// Shared services
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Command sink
    pub fn commands(&self) -> &C {
        &self.commands
    }

    /// Command sink, e.g. to point it at the next command buffer
    pub fn commands_mut(&mut self) -> &mut C {
        &mut self.commands
    }

    /// Release all descriptor pools and drop any frame in progress
    pub fn release(&mut self) {
        self.frame = None;
        for allocator in &mut self.allocators {
            allocator.release();
        }
    }

    fn ring_slot(&self) -> usize {
        (self.frames_recorded % self.allocators.len() as u64) as usize
    }

    fn open_frame(&mut self, slot: usize, target: &RenderPassTarget) -> RenderResult<vk::DescriptorSet> {
        let allocator = &mut self.allocators[slot];
        allocator.reset()?;
        let global_set = allocator.allocate(self.global.set_layout)?;
        self.commands.begin_render_pass(target)?;
        Ok(global_set)
    }

    fn record_draw(&mut self, object: &RenderObject<'_>) -> RenderResult<Rebinds> {
        let material = object.material;
        let model = object.model;
        if !material.is_live() {
            return Err(RenderError::NotFound(format!(
                "material {:?} has no pipeline",
                material.id()
            )));
        }
        if material.global_set_layout() != self.global.set_layout {
            return Err(RenderError::BadConfig(format!(
                "material {:?} expects a different global set layout",
                material.id()
            )));
        }
        let matching = self.config.layout_matching;
        if !model.vertex_layout().contains_with(material.vertex_layout(), matching) {
            return Err(RenderError::LayoutMismatch(format!(
                "model lacks {:?} required by material {:?}",
                model.vertex_layout().missing_from(material.vertex_layout(), matching),
                material.id()
            )));
        }

        let slot = self.ring_slot();
        let Some(frame) = self.frame.as_mut() else {
            return Err(wrong_state("draw called outside begin/end"));
        };
        if object.shape.is_empty() {
            frame.stats.empty_draws += 1;
            return Ok(Rebinds::empty());
        }

        let pipeline = material.pipeline();
        let layout = material.pipeline_layout();
        let mut rebinds = Rebinds::empty();

        if frame.cache.set_pipeline(pipeline) {
            self.commands.bind_pipeline(pipeline)?;
            self.commands.bind_descriptor_set(layout, GLOBAL_SET, frame.global_set)?;
            rebinds |= Rebinds::PIPELINE | Rebinds::GLOBAL_SET;
        }
        if frame.cache.material != Some(material.id()) {
            let instance = material.instantiate(&mut self.allocators[slot])?;
            self.commands.bind_descriptor_set(layout, MATERIAL_SET, instance.set)?;
            frame.cache.set_material(material.id());
            rebinds |= Rebinds::MATERIAL_SET;
        }
        if frame.cache.set_vertex_buffer(model.vertex_buffer()) {
            self.commands.bind_vertex_buffer(0, model.vertex_buffer(), 0)?;
            rebinds |= Rebinds::VERTEX_BUFFER;
        }
        if frame.cache.set_index_buffer(model.index_buffer(), model.index_type()) {
            self.commands.bind_index_buffer(model.index_buffer(), 0, model.index_type())?;
            rebinds |= Rebinds::INDEX_BUFFER;
        }
        if let Some(set) = object.object_set {
            self.commands.bind_descriptor_set(layout, OBJECT_SET, set)?;
            rebinds |= Rebinds::OBJECT_SET;
        }

        let model_matrix = to_columns(&object.transform);
        self.commands.push_constants(
            layout,
            vk::ShaderStageFlags::VERTEX,
            0,
            bytemuck::bytes_of(&model_matrix),
        )?;
        self.commands.draw_indexed(IndexedDraw {
            index_count: object.shape.index_count,
            instance_count: 1,
            first_index: object.shape.first_index,
            vertex_offset: object.shape.vertex_offset,
            first_instance: 0,
        })?;

        frame.stats.record(rebinds);
        log::trace!(
            "Draw {} of material {:?}: {} indices, rebinds {:?}",
            frame.stats.draws,
            material.id(),
            object.shape.index_count,
            rebinds
        );
        Ok(rebinds)
    }

    /// Record a failure against the current frame. Device loss tears down
    /// the pools and abandons the frame.
    fn fail(&mut self, error: RenderError) -> RenderError {
        if error.is_fatal() {
            log::error!("Device lost while recording: {}", error);
            self.release();
            return error;
        }
        match self.frame.as_mut() {
            Some(frame) => {
                log::warn!("Frame {} tainted: {}", self.frames_recorded, error);
                if frame.failure.is_none() {
                    frame.failure = Some(error.clone());
                }
            }
            None => log::warn!("Frame {} failed: {}", self.frames_recorded, error),
        }
        error
    }
}

impl<C: CommandSink> Drop for SceneRasterizer<C> {
    fn drop(&mut self) {
        if self.frame.is_some() {
            log::warn!("Scene rasterizer dropped while recording");
        }
    }
}

fn aligned_uniform_size(alignment: vk::DeviceSize) -> vk::DeviceSize {
    let size = GlobalUniforms::SIZE as vk::DeviceSize;
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

fn wrong_state(message: &str) -> RenderError {
    log::warn!("Scene rasterizer: {}", message);
    RenderError::WrongState(message.to_string())
}
