//! Material binding model
//!
//! A [`Material`] exclusively owns a graphics pipeline, its pipeline layout
//! and a [`MaterialWriter`] template for set 1. Set 0 of every material
//! layout is the global set owned by the rasterizer; sets from 2 on carry
//! per-object data.
//!
//! Lifecycle: a [`MaterialConfig`] is created into a live material, which is
//! destroyed explicitly or on drop. Destruction is idempotent. A material is
//! move-only; it is never cloned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ash::vk;

use crate::render::api::GpuDevice;
use crate::render::descriptors::{DescriptorAllocator, DescriptorWrite};
use crate::render::pipeline::{PipelineConfig, PipelineLayoutConfig, GLOBAL_SET, MATERIAL_SET};
use crate::render::vertex_layout::VertexLayout;
use crate::render::{RenderError, RenderResult};

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a created material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

impl MaterialId {
    fn next() -> Self {
        Self(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Lifecycle state of a [`Material`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialState {
    /// Pipeline and layout are alive
    Created,
    /// Pipeline and layout were released
    Destroyed,
}

/// Template for the material descriptor set (set 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialWriter {
    set_layout: vk::DescriptorSetLayout,
    bindings: Vec<DescriptorWrite>,
}

impl MaterialWriter {
    /// Writer for sets of `set_layout` with no bindings yet
    pub fn new(set_layout: vk::DescriptorSetLayout) -> Self {
        Self {
            set_layout,
            bindings: Vec::new(),
        }
    }

    /// Add a binding, replacing any earlier write to the same binding index
    #[must_use]
    pub fn with_write(mut self, write: DescriptorWrite) -> Self {
        self.set_write(write);
        self
    }

    /// Add or replace a binding
    pub fn set_write(&mut self, write: DescriptorWrite) {
        self.bindings.retain(|existing| existing.binding() != write.binding());
        self.bindings.push(write);
    }

    /// Layout of the sets this writer fills
    pub fn set_layout(&self) -> vk::DescriptorSetLayout {
        self.set_layout
    }

    /// Bindings in insertion order
    pub fn bindings(&self) -> &[DescriptorWrite] {
        &self.bindings
    }

    /// Allocate a set from `allocator` and write every binding into it.
    ///
    /// The writer holds no per-allocator state, so it can serve any number of
    /// allocators. The instance is valid until that allocator's next reset.
    pub fn write(&self, allocator: &mut DescriptorAllocator) -> RenderResult<MaterialInstance> {
        let set = allocator.allocate_and_write(self.set_layout, &self.bindings)?;
        Ok(MaterialInstance {
            set,
            epoch: allocator.epoch(),
        })
    }
}

/// Material descriptor set allocated for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialInstance {
    /// The written set
    pub set: vk::DescriptorSet,
    /// Reset epoch of the allocator the set came from
    pub epoch: u64,
}

impl MaterialInstance {
    /// Whether the set is still valid in the allocator it came from
    pub fn is_current(&self, allocator: &DescriptorAllocator) -> bool {
        self.epoch == allocator.epoch()
    }
}

/// Everything needed to create a [`Material`]
#[derive(Debug, Clone)]
pub struct MaterialConfig {
    /// Graphics pipeline description
    pub pipeline: PipelineConfig,
    /// Pipeline layout description
    pub layout: PipelineLayoutConfig,
    /// Material set template
    pub writer: MaterialWriter,
}

impl MaterialConfig {
    /// Bundle the three parts of a material
    pub fn new(pipeline: PipelineConfig, layout: PipelineLayoutConfig, writer: MaterialWriter) -> Self {
        Self {
            pipeline,
            layout,
            writer,
        }
    }

    /// Check the slot conventions before anything is created
    pub fn validate(&self) -> RenderResult<()> {
        if self.layout.set_layouts.len() <= MATERIAL_SET as usize {
            return Err(RenderError::BadConfig(format!(
                "pipeline layout has {} set layouts, the global and material sets need 2",
                self.layout.set_layouts.len()
            )));
        }
        if self.layout.set_layouts[MATERIAL_SET as usize] != self.writer.set_layout() {
            return Err(RenderError::BadConfig(
                "material writer layout differs from set layout 1".to_string(),
            ));
        }
        if !self.layout.has_model_push_constant() {
            return Err(RenderError::BadConfig(
                "pipeline layout lacks the 64-byte vertex push constant at offset 0".to_string(),
            ));
        }
        if self.pipeline.vertex_shader == vk::ShaderModule::null() {
            return Err(RenderError::BadConfig("pipeline has no vertex shader".to_string()));
        }
        Ok(())
    }

    /// Create the pipeline layout, then the pipeline.
    ///
    /// If the pipeline cannot be created the layout is destroyed again and
    /// the error returned.
    pub fn create(&self, device: &Arc<dyn GpuDevice>, render_pass: vk::RenderPass) -> RenderResult<Material> {
        self.validate()?;

        let layout = device.create_pipeline_layout(&self.layout)?;
        let pipeline = match device.create_graphics_pipeline(&self.pipeline, layout, render_pass) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                log::debug!("Pipeline creation failed, releasing layout {:?}: {}", layout, e);
                device.destroy_pipeline_layout(layout);
                return Err(e);
            }
        };

        log::debug!("Created pipeline {:?} with layout {:?}", pipeline, layout);
        let object = Arc::new(PipelineObject {
            device: Arc::clone(device),
            pipeline,
            layout,
        });
        Ok(Material::from_parts(
            object,
            self.layout.set_layouts[GLOBAL_SET as usize],
            self.pipeline.vertex_layout.clone(),
            self.writer.clone(),
        ))
    }
}

/// Pipeline and layout, destroyed when the last material using them goes
struct PipelineObject {
    device: Arc<dyn GpuDevice>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl Drop for PipelineObject {
    fn drop(&mut self) {
        log::debug!("Destroying pipeline {:?}", self.pipeline);
        self.device.destroy_pipeline(self.pipeline);
        self.device.destroy_pipeline_layout(self.layout);
    }
}

/// Pipeline, pipeline layout and material set template.
///
/// Materials made with [`Material::variant`] share the pipeline of the
/// material they came from; the pipeline is released when the last of them
/// is destroyed.
pub struct Material {
    id: MaterialId,
    pipeline: Option<Arc<PipelineObject>>,
    global_set_layout: vk::DescriptorSetLayout,
    writer: MaterialWriter,
    vertex_layout: VertexLayout,
}

impl Material {
    fn from_parts(
        pipeline: Arc<PipelineObject>,
        global_set_layout: vk::DescriptorSetLayout,
        vertex_layout: VertexLayout,
        writer: MaterialWriter,
    ) -> Self {
        let id = MaterialId::next();
        log::debug!("Created material {:?} on pipeline {:?}", id, pipeline.pipeline);
        Self {
            id,
            pipeline: Some(pipeline),
            global_set_layout,
            writer,
            vertex_layout,
        }
    }

    /// New material on the same pipeline with different set 1 bindings
    pub fn variant(&self, writer: MaterialWriter) -> RenderResult<Self> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| RenderError::NotFound(format!("material {:?} was destroyed", self.id)))?;
        if writer.set_layout() != self.writer.set_layout() {
            return Err(RenderError::BadConfig(
                "variant writer layout differs from set layout 1".to_string(),
            ));
        }
        Ok(Self::from_parts(
            Arc::clone(pipeline),
            self.global_set_layout,
            self.vertex_layout.clone(),
            writer,
        ))
    }

    /// Unique id
    pub fn id(&self) -> MaterialId {
        self.id
    }

    /// Pipeline handle, null once destroyed
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline.as_ref().map_or_else(vk::Pipeline::null, |p| p.pipeline)
    }

    /// Pipeline layout handle, null once destroyed
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline.as_ref().map_or_else(vk::PipelineLayout::null, |p| p.layout)
    }

    /// Set layout the material expects at set 0
    pub fn global_set_layout(&self) -> vk::DescriptorSetLayout {
        self.global_set_layout
    }

    /// Material set template
    pub fn writer(&self) -> &MaterialWriter {
        &self.writer
    }

    /// Vertex attributes the pipeline consumes
    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    /// Lifecycle state
    pub fn state(&self) -> MaterialState {
        if self.pipeline.is_some() {
            MaterialState::Created
        } else {
            MaterialState::Destroyed
        }
    }

    /// Whether the pipeline can still be bound
    pub fn is_live(&self) -> bool {
        self.pipeline() != vk::Pipeline::null()
    }

    /// Allocate and write this material's set for the current frame
    pub fn instantiate(&self, allocator: &mut DescriptorAllocator) -> RenderResult<MaterialInstance> {
        if !self.is_live() {
            return Err(RenderError::NotFound(format!("material {:?} was destroyed", self.id)));
        }
        self.writer.write(allocator)
    }

    /// Release this material's hold on the pipeline. Later calls do nothing.
    pub fn destroy(&mut self) {
        if self.pipeline.take().is_some() {
            log::debug!("Destroyed material {:?}", self.id);
        }
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("id", &self.id)
            .field("pipeline", &self.pipeline())
            .field("layout", &self.pipeline_layout())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for Material {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DescriptorPoolConfig;
    use crate::render::api::HeadlessDevice;

    struct Fixture {
        headless: Arc<HeadlessDevice>,
        device: Arc<dyn GpuDevice>,
        config: MaterialConfig,
    }

    fn fixture() -> Fixture {
        let headless = Arc::new(HeadlessDevice::new());
        let device: Arc<dyn GpuDevice> = headless.clone();
        let material_layout = headless.mint();
        let writer = MaterialWriter::new(material_layout).with_write(DescriptorWrite::UniformBuffer {
            binding: 0,
            buffer: headless.mint(),
            offset: 0,
            range: 64,
        });
        let config = MaterialConfig::new(
            PipelineConfig::opaque(headless.mint(), headless.mint(), VertexLayout::new()),
            PipelineLayoutConfig::scene(headless.mint(), material_layout),
            writer,
        );
        Fixture {
            headless,
            device,
            config,
        }
    }

    #[test]
    fn test_create_and_destroy_release_objects() {
        let f = fixture();
        let mut material = f.config.create(&f.device, f.headless.mint()).unwrap();
        assert!(material.is_live());
        assert_eq!(f.headless.live_pipelines(), 1);
        assert_eq!(f.headless.live_pipeline_layouts(), 1);

        material.destroy();
        material.destroy();
        assert_eq!(material.state(), MaterialState::Destroyed);
        assert_eq!(material.pipeline(), vk::Pipeline::null());
        assert_eq!(f.headless.live_pipelines(), 0);
        assert_eq!(f.headless.live_pipeline_layouts(), 0);
    }

    #[test]
    fn test_drop_destroys() {
        let f = fixture();
        {
            let _material = f.config.create(&f.device, f.headless.mint()).unwrap();
            assert_eq!(f.headless.live_pipelines(), 1);
        }
        assert_eq!(f.headless.live_pipelines(), 0);
        assert_eq!(f.headless.live_pipeline_layouts(), 0);
    }

    #[test]
    fn test_pipeline_failure_releases_layout() {
        let f = fixture();
        f.headless.fail_next_pipeline();
        let result = f.config.create(&f.device, f.headless.mint());
        assert!(result.is_err());
        assert_eq!(f.headless.live_pipeline_layouts(), 0);
        assert_eq!(f.headless.live_pipelines(), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let f = fixture();
        let a = f.config.create(&f.device, f.headless.mint()).unwrap();
        let b = f.config.create(&f.device, f.headless.mint()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_slot_conventions_are_validated() {
        let f = fixture();

        let mut config = f.config.clone();
        config.layout.set_layouts.truncate(1);
        assert!(matches!(config.create(&f.device, f.headless.mint()), Err(RenderError::BadConfig(_))));

        let mut config = f.config.clone();
        config.layout.set_layouts[1] = f.headless.mint();
        assert!(matches!(config.validate(), Err(RenderError::BadConfig(_))));

        let mut config = f.config.clone();
        config.layout.push_constant_ranges.clear();
        assert!(matches!(config.validate(), Err(RenderError::BadConfig(_))));

        let mut config = f.config.clone();
        config.pipeline.vertex_shader = vk::ShaderModule::null();
        assert!(matches!(config.validate(), Err(RenderError::BadConfig(_))));

        assert_eq!(f.headless.live_pipeline_layouts(), 0);
    }

    #[test]
    fn test_writer_serves_several_allocators() {
        let f = fixture();
        let material = f.config.create(&f.device, f.headless.mint()).unwrap();
        let mut first = DescriptorAllocator::new(Arc::clone(&f.device), DescriptorPoolConfig::default());
        let mut second = DescriptorAllocator::new(Arc::clone(&f.device), DescriptorPoolConfig::default());

        let a = material.instantiate(&mut first).unwrap();
        let b = material.instantiate(&mut second).unwrap();
        assert_ne!(a.set, b.set);
        assert_eq!(f.headless.descriptor_writes(a.set).unwrap().len(), 1);

        first.reset().unwrap();
        assert!(!a.is_current(&first));
        assert!(b.is_current(&second));
    }

    #[test]
    fn test_destroyed_material_cannot_instantiate() {
        let f = fixture();
        let mut material = f.config.create(&f.device, f.headless.mint()).unwrap();
        let mut allocator = DescriptorAllocator::new(Arc::clone(&f.device), DescriptorPoolConfig::default());
        material.destroy();
        assert!(matches!(material.instantiate(&mut allocator), Err(RenderError::NotFound(_))));
    }

    #[test]
    fn test_variants_share_the_pipeline() {
        let f = fixture();
        let mut original = f.config.create(&f.device, f.headless.mint()).unwrap();
        let writer = MaterialWriter::new(original.writer().set_layout());
        let mut variant = original.variant(writer).unwrap();

        assert_eq!(variant.pipeline(), original.pipeline());
        assert_ne!(variant.id(), original.id());

        original.destroy();
        assert!(variant.is_live());
        assert_eq!(f.headless.live_pipelines(), 1);

        variant.destroy();
        assert_eq!(f.headless.live_pipelines(), 0);
        assert_eq!(f.headless.live_pipeline_layouts(), 0);
    }

    #[test]
    fn test_variant_needs_matching_layout() {
        let f = fixture();
        let material = f.config.create(&f.device, f.headless.mint()).unwrap();
        let result = material.variant(MaterialWriter::new(f.headless.mint()));
        assert!(matches!(result, Err(RenderError::BadConfig(_))));
    }

    #[test]
    fn test_writer_replaces_same_binding() {
        let device = HeadlessDevice::new();
        let sampler_a = DescriptorWrite::Sampler { binding: 2, sampler: device.mint() };
        let sampler_b = DescriptorWrite::Sampler { binding: 2, sampler: device.mint() };
        let writer = MaterialWriter::new(device.mint()).with_write(sampler_a).with_write(sampler_b);
        assert_eq!(writer.bindings(), &[sampler_b]);
    }
}
