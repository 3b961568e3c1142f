//! Draw ordering for the bind cache
//!
//! The rasterizer never reorders draws. Callers that do not depend on
//! submission order can sort first with [`sort_for_binding`] so consecutive
//! draws share as much bound state as possible.

use ash::vk::{self, Handle};

use crate::render::material::MaterialId;
use crate::render::rasterizer::{FrameStats, Rebinds};
use crate::render::render_object::RenderObject;

type BindingKey = (u64, MaterialId, u64, u64, i32);

fn binding_key(object: &RenderObject<'_>) -> BindingKey {
    (
        object.material.pipeline().as_raw(),
        object.material.id(),
        object.model.vertex_buffer().as_raw(),
        object.model.index_buffer().as_raw(),
        object.model.index_type().as_raw(),
    )
}

/// Stable sort by pipeline, material, vertex buffer, then index buffer.
/// Objects with equal keys keep their relative order.
pub fn sort_for_binding(objects: &mut [RenderObject<'_>]) {
    objects.sort_by_key(binding_key);
}

/// Binds the rasterizer will record for `objects` in this order.
///
/// Mirrors the bind cache: a pipeline change also rebinds the global set and
/// the material, zero-index shapes bind nothing. `recording_time` is zero.
pub fn count_state_changes(objects: &[RenderObject<'_>]) -> FrameStats {
    let mut stats = FrameStats::default();
    let mut pipeline: Option<vk::Pipeline> = None;
    let mut material: Option<MaterialId> = None;
    let mut vertex_buffer: Option<vk::Buffer> = None;
    let mut index_buffer: Option<(vk::Buffer, vk::IndexType)> = None;

    for object in objects {
        if object.shape.is_empty() {
            stats.empty_draws += 1;
            continue;
        }

        let mut rebinds = Rebinds::empty();
        let next_pipeline = object.material.pipeline();
        if pipeline != Some(next_pipeline) {
            pipeline = Some(next_pipeline);
            material = None;
            rebinds |= Rebinds::PIPELINE | Rebinds::GLOBAL_SET;
        }
        if material != Some(object.material.id()) {
            material = Some(object.material.id());
            rebinds |= Rebinds::MATERIAL_SET;
        }
        if vertex_buffer != Some(object.model.vertex_buffer()) {
            vertex_buffer = Some(object.model.vertex_buffer());
            rebinds |= Rebinds::VERTEX_BUFFER;
        }
        let next_index = (object.model.index_buffer(), object.model.index_type());
        if index_buffer != Some(next_index) {
            index_buffer = Some(next_index);
            rebinds |= Rebinds::INDEX_BUFFER;
        }
        if object.object_set.is_some() {
            rebinds |= Rebinds::OBJECT_SET;
        }
        stats.record(rebinds);
    }
    stats
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::foundation::math::Mat4;
    use crate::render::api::{GpuDevice, HeadlessDevice};
    use crate::render::material::{Material, MaterialConfig, MaterialWriter};
    use crate::render::model::{Model, Shape};
    use crate::render::pipeline::{PipelineConfig, PipelineLayoutConfig};
    use crate::render::vertex_layout::{VertexComponentKind, VertexLayout};

    struct Assets {
        materials: Vec<Material>,
        models: Vec<Model>,
    }

    fn assets() -> Assets {
        let headless = Arc::new(HeadlessDevice::new());
        let device: Arc<dyn GpuDevice> = headless.clone();
        let layout = VertexLayout::from_components([(
            VertexComponentKind::Position,
            vk::Format::R32G32B32_SFLOAT,
        )])
        .unwrap();
        let global_layout = headless.mint();
        let material_layout = headless.mint();
        let render_pass = headless.mint();

        let material = |device: &Arc<dyn GpuDevice>| {
            MaterialConfig::new(
                PipelineConfig::opaque(headless.mint(), headless.mint(), layout.clone()),
                PipelineLayoutConfig::scene(global_layout, material_layout),
                MaterialWriter::new(material_layout),
            )
            .create(device, render_pass)
            .unwrap()
        };
        let first = material(&device);
        let shared = first.variant(MaterialWriter::new(material_layout)).unwrap();
        let second = material(&device);

        let model = || {
            Model::new(headless.mint(), headless.mint(), vk::IndexType::UINT32, layout.clone())
                .with_shape(Shape::whole(3))
                .with_shape(Shape::default())
        };
        Assets {
            materials: vec![first, shared, second],
            models: vec![model(), model()],
        }
    }

    fn object<'a>(assets: &'a Assets, material: usize, model: usize) -> RenderObject<'a> {
        RenderObject::from_shape_index(
            &assets.materials[material],
            &assets.models[model],
            0,
            Mat4::identity(),
        )
        .unwrap()
    }

    #[test]
    fn test_sort_groups_by_pipeline_then_material() {
        let assets = assets();
        let mut objects = vec![
            object(&assets, 2, 0),
            object(&assets, 0, 1),
            object(&assets, 1, 0),
            object(&assets, 0, 0),
            object(&assets, 2, 1),
        ];
        let before = count_state_changes(&objects);
        sort_for_binding(&mut objects);
        let after = count_state_changes(&objects);

        for pair in objects.windows(2) {
            assert!(binding_key(&pair[0]) <= binding_key(&pair[1]));
        }
        // Materials 0 and 1 share a pipeline and end up adjacent
        assert!(after.pipeline_binds <= 2);
        assert!(after.total_binds() < before.total_binds());
        assert_eq!(after.draws, 5);
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let assets = assets();
        let mut objects: Vec<RenderObject<'_>> = (0..4)
            .map(|i| {
                let mut object = object(&assets, 0, 0);
                object.transform = Mat4::new_scaling(i as f32 + 1.0);
                object
            })
            .collect();
        sort_for_binding(&mut objects);

        let scales: Vec<f32> = objects.iter().map(|o| o.transform[(0, 0)]).collect();
        assert_eq!(scales, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_count_matches_bind_cache_rules() {
        let assets = assets();
        let empty = RenderObject::from_shape_index(
            &assets.materials[0],
            &assets.models[0],
            1,
            Mat4::identity(),
        )
        .unwrap();
        let objects = vec![
            object(&assets, 0, 0),
            object(&assets, 0, 0),
            empty,
            object(&assets, 1, 0),
            object(&assets, 2, 1),
        ];

        let stats = count_state_changes(&objects);
        assert_eq!(stats.draws, 4);
        assert_eq!(stats.empty_draws, 1);
        assert_eq!(stats.pipeline_binds, 2);
        assert_eq!(stats.global_set_binds, 2);
        assert_eq!(stats.material_binds, 3);
        assert_eq!(stats.vertex_buffer_binds, 2);
        assert_eq!(stats.index_buffer_binds, 2);
        assert_eq!(stats.object_set_binds, 0);
    }
}
