//! Node hierarchy with owned materials and models

use ash::vk;
use slotmap::SlotMap;

use crate::foundation::math::Mat4;
use crate::render::material::Material;
use crate::render::model::Model;
use crate::render::render_object::RenderObject;
use crate::render::{RenderError, RenderResult};

slotmap::new_key_type! {
    /// Key of a material owned by a [`SceneGraph`]
    pub struct MaterialKey;
    /// Key of a model owned by a [`SceneGraph`]
    pub struct ModelKey;
    /// Key of a node in a [`SceneGraph`]
    pub struct NodeKey;
}

/// Something a node draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drawable {
    /// Material to draw with
    pub material: MaterialKey,
    /// Model to draw
    pub model: ModelKey,
    /// Index into the model's shape table
    pub shape_index: usize,
    /// Per-object descriptor set
    pub object_set: Option<vk::DescriptorSet>,
}

impl Drawable {
    /// Draw shape `shape_index` of `model` with `material`
    pub fn new(material: MaterialKey, model: ModelKey, shape_index: usize) -> Self {
        Self {
            material,
            model,
            shape_index,
            object_set: None,
        }
    }

    /// Attach a per-object descriptor set
    #[must_use]
    pub fn with_object_set(mut self, set: vk::DescriptorSet) -> Self {
        self.object_set = Some(set);
        self
    }
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    transform: Mat4,
    drawables: Vec<Drawable>,
}

/// Scene hierarchy.
///
/// Traversal is depth-first pre-order with children in insertion order, so
/// the same graph always produces the same render object stream.
#[derive(Debug, Default)]
pub struct SceneGraph {
    materials: SlotMap<MaterialKey, Material>,
    models: SlotMap<ModelKey, Model>,
    nodes: SlotMap<NodeKey, Node>,
    roots: Vec<NodeKey>,
}

impl SceneGraph {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a material
    pub fn insert_material(&mut self, material: Material) -> MaterialKey {
        self.materials.insert(material)
    }

    /// Borrow a material
    pub fn material(&self, key: MaterialKey) -> RenderResult<&Material> {
        self.materials
            .get(key)
            .ok_or_else(|| RenderError::NotFound(format!("material {key:?}")))
    }

    /// Remove a material. Drawables still naming it fail traversal.
    pub fn remove_material(&mut self, key: MaterialKey) -> Option<Material> {
        self.materials.remove(key)
    }

    /// Take ownership of a model
    pub fn insert_model(&mut self, model: Model) -> ModelKey {
        self.models.insert(model)
    }

    /// Borrow a model
    pub fn model(&self, key: ModelKey) -> RenderResult<&Model> {
        self.models
            .get(key)
            .ok_or_else(|| RenderError::NotFound(format!("model {key:?}")))
    }

    /// Remove a model
    pub fn remove_model(&mut self, key: ModelKey) -> Option<Model> {
        self.models.remove(key)
    }

    /// Add a node under `parent`, or as a new root
    pub fn add_node(&mut self, parent: Option<NodeKey>, transform: Mat4) -> RenderResult<NodeKey> {
        if let Some(parent) = parent {
            self.node(parent)?;
        }
        let key = self.nodes.insert(Node {
            parent,
            children: Vec::new(),
            transform,
            drawables: Vec::new(),
        });
        match parent {
            Some(parent) => self.node_mut(parent)?.children.push(key),
            None => self.roots.push(key),
        }
        Ok(key)
    }

    /// Attach a drawable to a node
    pub fn add_drawable(&mut self, node: NodeKey, drawable: Drawable) -> RenderResult<()> {
        self.node_mut(node)?.drawables.push(drawable);
        Ok(())
    }

    /// Replace a node's local transform
    pub fn set_transform(&mut self, node: NodeKey, transform: Mat4) -> RenderResult<()> {
        self.node_mut(node)?.transform = transform;
        Ok(())
    }

    /// A node's local transform
    pub fn transform(&self, node: NodeKey) -> RenderResult<Mat4> {
        Ok(self.node(node)?.transform)
    }

    /// Children of a node in insertion order
    pub fn children(&self, node: NodeKey) -> RenderResult<&[NodeKey]> {
        Ok(&self.node(node)?.children)
    }

    /// Root nodes in insertion order
    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    /// Number of live nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Remove a node and its whole subtree, returning how many nodes went
    pub fn remove_node(&mut self, node: NodeKey) -> RenderResult<usize> {
        let parent = self.node(node)?.parent;
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent) => parent.children.retain(|&child| child != node),
            None => self.roots.retain(|&root| root != node),
        }

        let mut removed = 0;
        let mut pending = vec![node];
        while let Some(key) = pending.pop() {
            if let Some(node) = self.nodes.remove(key) {
                pending.extend(node.children);
                removed += 1;
            }
        }
        log::debug!("Removed {} scene nodes", removed);
        Ok(removed)
    }

    /// Flatten the scene into render objects with world transforms
    pub fn render_objects(&self) -> RenderResult<Vec<RenderObject<'_>>> {
        let mut objects = Vec::new();
        let mut pending: Vec<(NodeKey, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|&root| (root, Mat4::identity()))
            .collect();

        while let Some((key, parent_world)) = pending.pop() {
            let node = self.node(key)?;
            let world = parent_world * node.transform;

            for drawable in &node.drawables {
                let material = self.material(drawable.material)?;
                let model = self.model(drawable.model)?;
                let mut object =
                    RenderObject::from_shape_index(material, model, drawable.shape_index, world)?;
                object.object_set = drawable.object_set;
                objects.push(object);
            }

            pending.extend(node.children.iter().rev().map(|&child| (child, world)));
        }
        Ok(objects)
    }

    fn node(&self, key: NodeKey) -> RenderResult<&Node> {
        self.nodes
            .get(key)
            .ok_or_else(|| RenderError::NotFound(format!("scene node {key:?}")))
    }

    fn node_mut(&mut self, key: NodeKey) -> RenderResult<&mut Node> {
        self.nodes
            .get_mut(key)
            .ok_or_else(|| RenderError::NotFound(format!("scene node {key:?}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_relative_eq;

    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::api::{GpuDevice, HeadlessDevice};
    use crate::render::material::{MaterialConfig, MaterialWriter};
    use crate::render::model::Shape;
    use crate::render::pipeline::{PipelineConfig, PipelineLayoutConfig};
    use crate::render::vertex_layout::{VertexComponentKind, VertexLayout};
    use crate::render::ErrorKind;

    fn layout() -> VertexLayout {
        VertexLayout::from_components([
            (VertexComponentKind::Position, vk::Format::R32G32B32_SFLOAT),
            (VertexComponentKind::Normal, vk::Format::R32G32B32_SFLOAT),
        ])
        .unwrap()
    }

    fn populated() -> (Arc<HeadlessDevice>, SceneGraph, MaterialKey, ModelKey) {
        let headless = Arc::new(HeadlessDevice::new());
        let device: Arc<dyn GpuDevice> = headless.clone();
        let material_layout = headless.mint();
        let material = MaterialConfig::new(
            PipelineConfig::opaque(headless.mint(), headless.mint(), layout()),
            PipelineLayoutConfig::scene(headless.mint(), material_layout),
            MaterialWriter::new(material_layout),
        )
        .create(&device, headless.mint())
        .unwrap();
        let model = Model::new(headless.mint(), headless.mint(), vk::IndexType::UINT16, layout())
            .with_shape(Shape::whole(6))
            .with_shape(Shape {
                first_index: 6,
                index_count: 3,
                vertex_offset: 4,
            });

        let mut scene = SceneGraph::new();
        let material = scene.insert_material(material);
        let model = scene.insert_model(model);
        (headless, scene, material, model)
    }

    fn translation(x: f32) -> Mat4 {
        Mat4::new_translation(&Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_pre_order_traversal_in_insertion_order() {
        let (_device, mut scene, material, model) = populated();
        let a = scene.add_node(None, Mat4::identity()).unwrap();
        let a1 = scene.add_node(Some(a), Mat4::identity()).unwrap();
        let a2 = scene.add_node(Some(a), Mat4::identity()).unwrap();
        let b = scene.add_node(None, Mat4::identity()).unwrap();

        // Shape 0 has 6 indices, shape 1 has 3
        scene.add_drawable(a, Drawable::new(material, model, 0)).unwrap();
        scene.add_drawable(a1, Drawable::new(material, model, 1)).unwrap();
        scene.add_drawable(a2, Drawable::new(material, model, 0)).unwrap();
        scene.add_drawable(b, Drawable::new(material, model, 1)).unwrap();

        let counts: Vec<u32> = scene
            .render_objects()
            .unwrap()
            .iter()
            .map(|object| object.shape.index_count)
            .collect();
        assert_eq!(counts, vec![6, 3, 6, 3]);
        assert_eq!(scene.children(a).unwrap(), &[a1, a2]);
        assert_eq!(scene.roots(), &[a, b]);
    }

    #[test]
    fn test_world_transforms_compose_down_the_tree() {
        let (_device, mut scene, material, model) = populated();
        let parent = scene.add_node(None, translation(1.0)).unwrap();
        let child = scene.add_node(Some(parent), translation(2.0)).unwrap();
        scene.add_drawable(child, Drawable::new(material, model, 0)).unwrap();

        let objects = scene.render_objects().unwrap();
        assert_eq!(objects.len(), 1);
        assert_relative_eq!(objects[0].transform, translation(3.0));

        scene.set_transform(parent, translation(-1.0)).unwrap();
        let objects = scene.render_objects().unwrap();
        assert_relative_eq!(objects[0].transform, translation(1.0));
    }

    #[test]
    fn test_object_set_is_carried() {
        let (device, mut scene, material, model) = populated();
        let node = scene.add_node(None, Mat4::identity()).unwrap();
        let set: vk::DescriptorSet = device.mint();
        scene
            .add_drawable(node, Drawable::new(material, model, 0).with_object_set(set))
            .unwrap();

        let objects = scene.render_objects().unwrap();
        assert_eq!(objects[0].object_set, Some(set));
    }

    #[test]
    fn test_stale_keys_are_not_found() {
        let (_device, mut scene, material, model) = populated();
        let node = scene.add_node(None, Mat4::identity()).unwrap();
        scene.add_drawable(node, Drawable::new(material, model, 5)).unwrap();
        assert_eq!(
            scene.render_objects().unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let (_device, mut scene, material, model) = populated();
        let node = scene.add_node(None, Mat4::identity()).unwrap();
        scene.add_drawable(node, Drawable::new(material, model, 0)).unwrap();
        assert!(scene.remove_material(material).is_some());
        assert_eq!(
            scene.render_objects().unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_remove_node_removes_subtree() {
        let (_device, mut scene, material, model) = populated();
        let root = scene.add_node(None, Mat4::identity()).unwrap();
        let branch = scene.add_node(Some(root), Mat4::identity()).unwrap();
        let leaf = scene.add_node(Some(branch), Mat4::identity()).unwrap();
        let sibling = scene.add_node(Some(root), Mat4::identity()).unwrap();
        scene.add_drawable(leaf, Drawable::new(material, model, 0)).unwrap();
        scene.add_drawable(sibling, Drawable::new(material, model, 1)).unwrap();

        assert_eq!(scene.remove_node(branch).unwrap(), 2);
        assert_eq!(scene.node_count(), 2);
        assert_eq!(scene.children(root).unwrap(), &[sibling]);
        assert_eq!(scene.transform(leaf).unwrap_err().kind(), ErrorKind::NotFound);

        let objects = scene.render_objects().unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].shape.index_count, 3);

        assert_eq!(scene.remove_node(root).unwrap(), 2);
        assert!(scene.roots().is_empty());
        assert!(scene.render_objects().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let (_device, mut scene, _material, _model) = populated();
        let node = scene.add_node(None, Mat4::identity()).unwrap();
        scene.remove_node(node).unwrap();

        let result = scene.add_node(Some(node), Mat4::identity());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(scene.node_count(), 0);
    }

    #[test]
    fn test_dropping_scene_destroys_materials() {
        let (device, scene, _material, _model) = populated();
        assert_eq!(device.live_pipelines(), 1);
        drop(scene);
        assert_eq!(device.live_pipelines(), 0);
        assert_eq!(device.live_pipeline_layouts(), 0);
    }
}
