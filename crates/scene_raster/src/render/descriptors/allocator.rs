//! Growable descriptor set allocator
//!
//! Sets come from the current pool until it runs dry. The exhausted pool is
//! retired (it stays alive until the next reset) and the allocation is
//! retried once in the largest idle pool, or in a new pool grown by
//! `growth_factor` up to `max_sets_per_pool` when none is idle. A second
//! failure is returned to the caller.
//!
//! `reset` recycles every pool at once and starts a new epoch. Sets handed
//! out in an earlier epoch must not be used after that. Recycled pools are
//! handed out largest first, so a steady workload settles on the pools it
//! already has.

use std::sync::Arc;

use ash::vk;

use super::DescriptorWrite;
use crate::core::config::DescriptorPoolConfig;
use crate::render::api::GpuDevice;
use crate::render::RenderResult;

/// Counters describing the allocator's pools
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Pools currently owned, in use or idle
    pub pools: usize,
    /// Sets allocated since the last reset
    pub allocated_sets: u32,
    /// Pools created because every owned pool was exhausted
    pub growths: u32,
    /// Current reset epoch
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy)]
struct Pool {
    handle: vk::DescriptorPool,
    max_sets: u32,
}

/// Per-frame descriptor set allocator over a chain of pools
pub struct DescriptorAllocator {
    device: Arc<dyn GpuDevice>,
    config: DescriptorPoolConfig,
    current: Option<Pool>,
    retired: Vec<Pool>,
    /// Reset pools, sorted by size so `pop` yields the largest
    idle: Vec<Pool>,
    next_pool_sets: u32,
    allocated_sets: u32,
    growths: u32,
    epoch: u64,
}

impl DescriptorAllocator {
    /// Create an allocator. No pool is created until the first allocation.
    pub fn new(device: Arc<dyn GpuDevice>, config: DescriptorPoolConfig) -> Self {
        let next_pool_sets = config.initial_sets.max(1);
        Self {
            device,
            config,
            current: None,
            retired: Vec::new(),
            idle: Vec::new(),
            next_pool_sets,
            allocated_sets: 0,
            growths: 0,
            epoch: 0,
        }
    }

    /// Allocate one set with `layout`, moving to another pool once if needed
    pub fn allocate(&mut self, layout: vk::DescriptorSetLayout) -> RenderResult<vk::DescriptorSet> {
        let pool = self.current_pool()?;
        let set = match self.device.allocate_descriptor_set(pool, layout) {
            Ok(set) => set,
            Err(e) if e.is_retryable() => {
                log::debug!("Descriptor pool exhausted after {} sets", self.allocated_sets);
                self.retire_current();
                let pool = self.current_pool()?;
                self.device.allocate_descriptor_set(pool, layout)?
            }
            Err(e) => return Err(e),
        };

        self.allocated_sets += 1;
        Ok(set)
    }

    /// Allocate a set and write `writes` into it
    pub fn allocate_and_write(
        &mut self,
        layout: vk::DescriptorSetLayout,
        writes: &[DescriptorWrite],
    ) -> RenderResult<vk::DescriptorSet> {
        let set = self.allocate(layout)?;
        if !writes.is_empty() {
            self.device.update_descriptor_set(set, writes)?;
        }
        Ok(set)
    }

    /// Recycle every pool and start a new epoch
    ///
    /// On failure the pools not yet reset stay retired; every pool remains
    /// owned and is destroyed by [`Self::release`].
    pub fn reset(&mut self) -> RenderResult<()> {
        let mut in_use: Vec<Pool> = self.current.take().into_iter().chain(self.retired.drain(..)).collect();

        let mut result = Ok(());
        let mut reset_count = 0;
        for pool in &in_use {
            if let Err(e) = self.device.reset_descriptor_pool(pool.handle) {
                result = Err(e);
                break;
            }
            reset_count += 1;
        }
        self.retired = in_use.split_off(reset_count);
        self.idle.append(&mut in_use);
        self.idle.sort_by_key(|pool| pool.max_sets);
        result?;

        self.allocated_sets = 0;
        self.epoch += 1;
        Ok(())
    }

    /// Destroy every pool. The allocator stays usable and starts over.
    pub fn release(&mut self) {
        let pools = self
            .current
            .take()
            .into_iter()
            .chain(self.retired.drain(..))
            .chain(self.idle.drain(..));
        let mut destroyed = 0;
        for pool in pools {
            self.device.destroy_descriptor_pool(pool.handle);
            destroyed += 1;
        }
        if destroyed > 0 {
            log::debug!("Released {} descriptor pools", destroyed);
        }
        self.allocated_sets = 0;
        self.next_pool_sets = self.config.initial_sets.max(1);
    }

    /// Current reset epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Pool counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pools: usize::from(self.current.is_some()) + self.retired.len() + self.idle.len(),
            allocated_sets: self.allocated_sets,
            growths: self.growths,
            epoch: self.epoch,
        }
    }

    fn current_pool(&mut self) -> RenderResult<vk::DescriptorPool> {
        if let Some(pool) = self.current {
            return Ok(pool.handle);
        }
        let pool = match self.idle.pop() {
            Some(pool) => pool,
            None => self.create_pool()?,
        };
        self.current = Some(pool);
        Ok(pool.handle)
    }

    fn retire_current(&mut self) {
        if let Some(pool) = self.current.take() {
            self.retired.push(pool);
        }
    }

    fn create_pool(&mut self) -> RenderResult<Pool> {
        let max_sets = self.next_pool_sets;
        let sizes = pool_sizes(&self.config, max_sets);
        let handle = self.device.create_descriptor_pool(max_sets, &sizes)?;
        log::debug!("Created descriptor pool for {} sets", max_sets);

        if !self.retired.is_empty() {
            self.growths += 1;
        }
        self.next_pool_sets = grow(max_sets, self.config.growth_factor, self.config.max_sets_per_pool);
        Ok(Pool { handle, max_sets })
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        self.release();
    }
}

fn pool_sizes(config: &DescriptorPoolConfig, max_sets: u32) -> Vec<vk::DescriptorPoolSize> {
    config
        .ratios
        .iter()
        .map(|ratio| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
            let count = (ratio.per_set * max_sets as f32).ceil().max(1.0) as u32;
            vk::DescriptorPoolSize::builder()
                .ty(ratio.kind.to_vk())
                .descriptor_count(count)
                .build()
        })
        .collect()
}

fn grow(sets: u32, factor: f32, max: u32) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let grown = (sets as f32 * factor).ceil() as u32;
    grown.max(sets).min(max.max(1))
}
