use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::renderer::texture::Texture;
use crate::vulkan::{GpuBuffer, VertexInput};
use crate::{RendererError, Result};

/// Interleaved vertex layout shared by the scene and skybox pipelines.
/// The skybox stage only reads the position attribute.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    fn binding() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn scene_input() -> VertexInput {
        VertexInput {
            bindings: vec![Self::binding()],
            attributes: vec![
                vk::VertexInputAttributeDescription {
                    location: 0,
                    binding: 0,
                    format: vk::Format::R32G32B32_SFLOAT,
                    offset: 0,
                },
                vk::VertexInputAttributeDescription {
                    location: 1,
                    binding: 0,
                    format: vk::Format::R32G32B32_SFLOAT,
                    offset: 12,
                },
                vk::VertexInputAttributeDescription {
                    location: 2,
                    binding: 0,
                    format: vk::Format::R32G32_SFLOAT,
                    offset: 24,
                },
                vk::VertexInputAttributeDescription {
                    location: 3,
                    binding: 0,
                    format: vk::Format::R32G32_SFLOAT,
                    offset: 32,
                },
                vk::VertexInputAttributeDescription {
                    location: 4,
                    binding: 0,
                    format: vk::Format::R32G32B32A32_SFLOAT,
                    offset: 40,
                },
            ],
        }
    }

    pub fn skybox_input() -> VertexInput {
        VertexInput {
            bindings: vec![Self::binding()],
            attributes: vec![vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            }],
        }
    }
}

/// One indexed draw range inside the shared index buffer.
#[derive(Clone, Copy, Debug)]
pub struct Primitive {
    pub first_index: u32,
    pub index_count: u32,
    /// Material slot; `None` falls back to material 0.
    pub material_index: Option<usize>,
}

impl Primitive {
    pub fn resolved_material_index(&self) -> usize {
        self.material_index.unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
}

/// Scene-graph node stored in an arena and addressed by index. Children
/// are index lists, so malformed input can be detected instead of
/// recursed into.
#[derive(Clone, Debug, Default)]
pub struct Node {
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
}

/// The five PBR texture slots of one material.
pub struct Material {
    pub base_color: Texture,
    pub metallic_roughness: Texture,
    pub normal: Texture,
    pub occlusion: Texture,
    pub emissive: Texture,
}

impl Material {
    pub fn texture_descriptors(&self) -> [vk::DescriptorImageInfo; 5] {
        [
            self.base_color.descriptor(),
            self.metallic_roughness.descriptor(),
            self.normal.descriptor(),
            self.occlusion.descriptor(),
            self.emissive.descriptor(),
        ]
    }
}

/// Loaded scene handed over by the scene collaborator: GPU-resident
/// vertex/index buffers, the node arena, and the flat material list.
pub struct Scene {
    pub vertex_buffer: GpuBuffer,
    pub index_buffer: GpuBuffer,
    pub meshes: Vec<Mesh>,
    pub nodes: Vec<Node>,
    pub roots: Vec<usize>,
    pub materials: Vec<Material>,
}

impl Scene {
    /// Number of nodes carrying geometry, which sizes the per-mesh
    /// uniform capacity of the descriptor pool.
    pub fn mesh_node_count(&self) -> u32 {
        self.nodes.iter().filter(|node| node.mesh.is_some()).count() as u32
    }

    /// Node visit order for drawing, resolved up front so recording is a
    /// plain loop. See [`draw_order`].
    pub fn draw_order(&self) -> Result<Vec<usize>> {
        draw_order(&self.nodes, &self.roots)
    }

    /// Flatten the node arena into per-primitive draws: a node's own
    /// primitives come before its children, children in list order,
    /// material defaulting to slot 0. Out-of-range mesh or material
    /// indices are rejected.
    pub fn flatten_draws(&self) -> Result<Vec<PrimitiveDraw>> {
        let order = self.draw_order()?;
        let mut draws = Vec::new();

        for node_index in order {
            let Some(mesh_index) = self.nodes[node_index].mesh else {
                continue;
            };
            let mesh = self.meshes.get(mesh_index).ok_or_else(|| {
                RendererError::MalformedScene(format!(
                    "node {node_index} references missing mesh {mesh_index}"
                ))
            })?;

            for primitive in &mesh.primitives {
                let material_index = primitive.resolved_material_index();
                if material_index >= self.materials.len() {
                    return Err(RendererError::MalformedScene(format!(
                        "primitive references missing material {material_index}"
                    )));
                }
                draws.push(PrimitiveDraw {
                    first_index: primitive.first_index,
                    index_count: primitive.index_count,
                    material_index,
                });
            }
        }

        Ok(draws)
    }
}

/// One recorded indexed draw with its resolved material slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrimitiveDraw {
    pub first_index: u32,
    pub index_count: u32,
    pub material_index: usize,
}

/// Depth-first node visit order over the arena, by explicit stack so
/// traversal depth is bounded and cycles are caught: revisiting a node
/// index means the scene graph is malformed.
pub fn draw_order(nodes: &[Node], roots: &[usize]) -> Result<Vec<usize>> {
    let mut order = Vec::with_capacity(nodes.len());
    let mut visited = vec![false; nodes.len()];
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();

    while let Some(index) = stack.pop() {
        let node = nodes.get(index).ok_or_else(|| {
            RendererError::MalformedScene(format!("node index {index} out of range"))
        })?;
        if visited[index] {
            return Err(RendererError::MalformedScene(format!(
                "node {index} visited twice (cycle or shared child)"
            )));
        }
        visited[index] = true;
        order.push(index);

        for &child in node.children.iter().rev() {
            stack.push(child);
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(mesh: Option<usize>, children: &[usize]) -> Node {
        Node {
            mesh,
            children: children.to_vec(),
        }
    }

    #[test]
    fn traversal_visits_self_before_children_in_list_order() {
        // root -> [A, B], A -> [A1]
        let nodes = vec![
            node(None, &[1, 3]), // root
            node(None, &[2]),    // A
            node(None, &[]),     // A1
            node(None, &[]),     // B
        ];
        let order = draw_order(&nodes, &[0]).unwrap();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn traversal_handles_multiple_roots_in_order() {
        let nodes = vec![node(None, &[]), node(None, &[]), node(None, &[])];
        let order = draw_order(&nodes, &[2, 0, 1]).unwrap();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn cycle_is_a_malformed_scene() {
        let nodes = vec![node(None, &[1]), node(None, &[0])];
        let err = draw_order(&nodes, &[0]).unwrap_err();
        assert!(matches!(err, RendererError::MalformedScene(_)));
    }

    #[test]
    fn shared_child_is_a_malformed_scene() {
        let nodes = vec![node(None, &[2]), node(None, &[2]), node(None, &[])];
        let err = draw_order(&nodes, &[0, 1]).unwrap_err();
        assert!(matches!(err, RendererError::MalformedScene(_)));
    }

    #[test]
    fn out_of_range_child_is_a_malformed_scene() {
        let nodes = vec![node(None, &[7])];
        assert!(draw_order(&nodes, &[0]).is_err());
    }

    #[test]
    fn unset_material_resolves_to_slot_zero() {
        let primitive = Primitive {
            first_index: 0,
            index_count: 3,
            material_index: None,
        };
        assert_eq!(primitive.resolved_material_index(), 0);
    }

    #[test]
    fn vertex_layout_matches_shader_offsets() {
        assert_eq!(std::mem::size_of::<Vertex>(), 56);
        let input = Vertex::scene_input();
        assert_eq!(input.attributes.len(), 5);
        assert_eq!(input.attributes[4].offset, 40);
        assert_eq!(Vertex::skybox_input().attributes.len(), 1);
    }
}
