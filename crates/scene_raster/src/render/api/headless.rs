//! GPU-free device
//!
//! [`HeadlessDevice`] mints synthetic handles and tracks every object it
//! creates, so resource lifetimes can be checked without a driver. Pools
//! enforce their set capacity, and failures can be injected to exercise
//! pipeline errors, pool exhaustion and device loss.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk::{self, Handle};
use parking_lot::Mutex;

use super::GpuDevice;
use crate::render::descriptors::DescriptorWrite;
use crate::render::pipeline::{PipelineConfig, PipelineLayoutConfig};
use crate::render::{RenderError, RenderResult};

#[derive(Debug)]
struct PoolState {
    capacity: u32,
    allocated: u32,
}

#[derive(Debug)]
struct SetState {
    pool: u64,
    writes: Vec<DescriptorWrite>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    pipeline_layouts: HashSet<u64>,
    pipelines: HashSet<u64>,
    pools: HashMap<u64, PoolState>,
    sets: HashMap<u64, SetState>,
    descriptor_updates: usize,
    pool_capacity_limit: Option<u32>,
    fail_next_pipeline: bool,
    device_lost: bool,
}

impl HeadlessState {
    fn check_device(&self, context: &str) -> RenderResult<()> {
        if self.device_lost {
            Err(RenderError::from_vk(vk::Result::ERROR_DEVICE_LOST, context))
        } else {
            Ok(())
        }
    }
}

/// Device that records object lifetimes instead of talking to a GPU
#[derive(Debug)]
pub struct HeadlessDevice {
    next_handle: AtomicU64,
    state: Mutex<HeadlessState>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Fresh device with no objects
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(0x1000),
            state: Mutex::new(HeadlessState::default()),
        }
    }

    /// A new unique handle of any type, for objects this device does not
    /// track (buffers, set layouts, shader modules, render passes).
    pub fn mint<T: Handle>(&self) -> T {
        T::from_raw(self.next_raw())
    }

    /// Fail the next graphics pipeline creation
    pub fn fail_next_pipeline(&self) {
        self.state.lock().fail_next_pipeline = true;
    }

    /// Cap the set capacity of pools created from now on
    pub fn limit_pool_capacity(&self, limit: Option<u32>) {
        self.state.lock().pool_capacity_limit = limit;
    }

    /// Make every later fallible call report device loss
    pub fn lose_device(&self) {
        log::debug!("Headless device marked lost");
        self.state.lock().device_lost = true;
    }

    /// Whether [`Self::lose_device`] was called
    pub fn is_device_lost(&self) -> bool {
        self.state.lock().device_lost
    }

    /// Pipelines created and not destroyed
    pub fn live_pipelines(&self) -> usize {
        self.state.lock().pipelines.len()
    }

    /// Pipeline layouts created and not destroyed
    pub fn live_pipeline_layouts(&self) -> usize {
        self.state.lock().pipeline_layouts.len()
    }

    /// Descriptor pools created and not destroyed
    pub fn live_descriptor_pools(&self) -> usize {
        self.state.lock().pools.len()
    }

    /// Sets currently allocated across all pools
    pub fn allocated_descriptor_sets(&self) -> usize {
        self.state.lock().sets.len()
    }

    /// Calls to `update_descriptor_set` so far
    pub fn descriptor_updates(&self) -> usize {
        self.state.lock().descriptor_updates
    }

    /// Bindings written into a live set, ordered by binding
    pub fn descriptor_writes(&self, set: vk::DescriptorSet) -> Option<Vec<DescriptorWrite>> {
        self.state
            .lock()
            .sets
            .get(&set.as_raw())
            .map(|state| state.writes.clone())
    }

    fn next_raw(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_pipeline_layout(&self, config: &PipelineLayoutConfig) -> RenderResult<vk::PipelineLayout> {
        let mut state = self.state.lock();
        state.check_device("create pipeline layout")?;
        if config.set_layouts.iter().any(|layout| *layout == vk::DescriptorSetLayout::null()) {
            return Err(RenderError::BadConfig(
                "pipeline layout references a null set layout".to_string(),
            ));
        }

        let raw = self.next_raw();
        state.pipeline_layouts.insert(raw);
        Ok(vk::PipelineLayout::from_raw(raw))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.state.lock().pipeline_layouts.remove(&layout.as_raw());
    }

    fn create_graphics_pipeline(
        &self,
        config: &PipelineConfig,
        layout: vk::PipelineLayout,
        _render_pass: vk::RenderPass,
    ) -> RenderResult<vk::Pipeline> {
        let mut state = self.state.lock();
        state.check_device("create graphics pipeline")?;
        if !state.pipeline_layouts.contains(&layout.as_raw()) {
            return Err(RenderError::NotFound(format!("pipeline layout {layout:?}")));
        }
        if config.vertex_shader == vk::ShaderModule::null() || config.fragment_shader == vk::ShaderModule::null() {
            return Err(RenderError::BadConfig("pipeline is missing a shader module".to_string()));
        }
        if std::mem::take(&mut state.fail_next_pipeline) {
            return Err(RenderError::from_vk(
                vk::Result::ERROR_INITIALIZATION_FAILED,
                "create graphics pipeline",
            ));
        }

        let raw = self.next_raw();
        state.pipelines.insert(raw);
        Ok(vk::Pipeline::from_raw(raw))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.state.lock().pipelines.remove(&pipeline.as_raw());
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        _sizes: &[vk::DescriptorPoolSize],
    ) -> RenderResult<vk::DescriptorPool> {
        let mut state = self.state.lock();
        state.check_device("create descriptor pool")?;

        let capacity = state.pool_capacity_limit.map_or(max_sets, |limit| limit.min(max_sets));
        let raw = self.next_raw();
        state.pools.insert(raw, PoolState { capacity, allocated: 0 });
        Ok(vk::DescriptorPool::from_raw(raw))
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> RenderResult<()> {
        let mut state = self.state.lock();
        state.check_device("reset descriptor pool")?;
        let raw = pool.as_raw();
        let pool_state = state
            .pools
            .get_mut(&raw)
            .ok_or_else(|| RenderError::NotFound(format!("descriptor pool {pool:?}")))?;
        pool_state.allocated = 0;
        state.sets.retain(|_, set| set.pool != raw);
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let mut state = self.state.lock();
        let raw = pool.as_raw();
        state.pools.remove(&raw);
        state.sets.retain(|_, set| set.pool != raw);
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
    ) -> RenderResult<vk::DescriptorSet> {
        let mut state = self.state.lock();
        state.check_device("allocate descriptor set")?;
        let raw = pool.as_raw();
        let pool_state = state
            .pools
            .get_mut(&raw)
            .ok_or_else(|| RenderError::NotFound(format!("descriptor pool {pool:?}")))?;
        if pool_state.allocated >= pool_state.capacity {
            return Err(RenderError::from_vk(
                vk::Result::ERROR_OUT_OF_POOL_MEMORY,
                "allocate descriptor set",
            ));
        }
        pool_state.allocated += 1;

        let set = self.next_raw();
        state.sets.insert(
            set,
            SetState {
                pool: raw,
                writes: Vec::new(),
            },
        );
        Ok(vk::DescriptorSet::from_raw(set))
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) -> RenderResult<()> {
        let mut state = self.state.lock();
        state.check_device("update descriptor set")?;
        let set_state = state
            .sets
            .get_mut(&set.as_raw())
            .ok_or_else(|| RenderError::NotFound(format!("descriptor set {set:?}")))?;

        for write in writes {
            set_state.writes.retain(|existing| existing.binding() != write.binding());
            set_state.writes.push(*write);
        }
        set_state.writes.sort_by_key(DescriptorWrite::binding);
        state.descriptor_updates += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vertex_layout::VertexLayout;

    fn pipeline_config(device: &HeadlessDevice) -> PipelineConfig {
        PipelineConfig::opaque(device.mint(), device.mint(), VertexLayout::new())
    }

    #[test]
    fn test_minted_handles_are_unique() {
        let device = HeadlessDevice::new();
        let a: vk::Buffer = device.mint();
        let b: vk::Buffer = device.mint();
        assert_ne!(a, b);
        assert_ne!(a, vk::Buffer::null());
    }

    #[test]
    fn test_pipeline_lifetimes_are_tracked() {
        let device = HeadlessDevice::new();
        let layout = device.create_pipeline_layout(&PipelineLayoutConfig::default()).unwrap();
        let pipeline = device
            .create_graphics_pipeline(&pipeline_config(&device), layout, device.mint())
            .unwrap();
        assert_eq!(device.live_pipelines(), 1);
        assert_eq!(device.live_pipeline_layouts(), 1);

        device.destroy_pipeline(pipeline);
        device.destroy_pipeline_layout(layout);
        assert_eq!(device.live_pipelines(), 0);
        assert_eq!(device.live_pipeline_layouts(), 0);
    }

    #[test]
    fn test_injected_pipeline_failure_fires_once() {
        let device = HeadlessDevice::new();
        let layout = device.create_pipeline_layout(&PipelineLayoutConfig::default()).unwrap();
        device.fail_next_pipeline();

        let config = pipeline_config(&device);
        assert!(device.create_graphics_pipeline(&config, layout, device.mint()).is_err());
        assert!(device.create_graphics_pipeline(&config, layout, device.mint()).is_ok());
    }

    #[test]
    fn test_pool_capacity_is_enforced() {
        let device = HeadlessDevice::new();
        let pool = device.create_descriptor_pool(2, &[]).unwrap();
        let layout = device.mint();

        device.allocate_descriptor_set(pool, layout).unwrap();
        device.allocate_descriptor_set(pool, layout).unwrap();
        let err = device.allocate_descriptor_set(pool, layout).unwrap_err();
        assert!(err.is_retryable());

        device.reset_descriptor_pool(pool).unwrap();
        assert_eq!(device.allocated_descriptor_sets(), 0);
        assert!(device.allocate_descriptor_set(pool, layout).is_ok());
    }

    #[test]
    fn test_updates_merge_by_binding() {
        let device = HeadlessDevice::new();
        let pool = device.create_descriptor_pool(1, &[]).unwrap();
        let set = device.allocate_descriptor_set(pool, device.mint()).unwrap();
        let first = DescriptorWrite::Sampler {
            binding: 1,
            sampler: device.mint(),
        };
        let second = DescriptorWrite::Sampler {
            binding: 1,
            sampler: device.mint(),
        };

        device.update_descriptor_set(set, &[first]).unwrap();
        device.update_descriptor_set(set, &[second]).unwrap();
        assert_eq!(device.descriptor_writes(set), Some(vec![second]));
        assert_eq!(device.descriptor_updates(), 2);
    }

    #[test]
    fn test_lost_device_rejects_work() {
        let device = HeadlessDevice::new();
        device.lose_device();
        let err = device.create_descriptor_pool(4, &[]).unwrap_err();
        assert!(err.is_fatal());
        assert!(device.is_device_lost());
    }
}
