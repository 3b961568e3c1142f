//! Scene organisation
//!
//! [`SceneGraph`] owns materials, models and a node hierarchy and flattens
//! them into the render object stream the rasterizer consumes.
//! [`draw_list`] reorders that stream for fewer rebinds.

pub mod draw_list;
mod scene_graph;

pub use scene_graph::{Drawable, MaterialKey, ModelKey, NodeKey, SceneGraph};
