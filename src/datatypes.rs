use std::{fmt::Display, str::FromStr};

use nalgebra::DVector;

use crate::error::FeaError;

/// Degrees of freedom per node (ux, uy)
pub const DOF: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: i64,
    pub vertex: Vertex,
    /// Prescribed displacement per axis, `None` when the axis is free
    pub constraint: [Option<f64>; 2],
    pub force: [f64; 2],
}

impl Node {
    pub fn new(id: i64, x: f64, y: f64) -> Node {
        Node {
            id,
            vertex: Vertex { x, y },
            constraint: [None, None],
            force: [0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub id: i64,
    pub name: String,
    pub youngs_modulus: f64,
    pub poisson_ratio: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Section {
    pub id: i64,
    pub thickness: f64,
}

/// A quadrilateral element. `nodes` holds arena indices into `Mesh::nodes`,
/// corners first in counter-clockwise order, followed by the bottom, right,
/// top and left mid-side nodes for 8-node elements.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: i64,
    pub nodes: Vec<usize>,
    pub corner_nodes: [usize; 4],
    pub section: Section,
    pub x: DVector<f64>,
    pub y: DVector<f64>,
}

impl Element {
    /// Builds an element and gathers its nodal coordinates from the node arena
    ///
    /// # Arguments
    /// * `id` - The element id
    /// * `nodes` - Arena indices of the element nodes, in element order
    /// * `section` - The section of the element
    /// * `node_arena` - The mesh nodes that `nodes` index into
    pub fn new(
        id: i64,
        nodes: Vec<usize>,
        section: Section,
        node_arena: &[Node],
    ) -> Result<Element, FeaError> {
        if nodes.len() < 4 {
            return Err(FeaError::Input(format!(
                "Element {id} has {} nodes, at least 4 corner nodes are required",
                nodes.len()
            )));
        }

        let mut element = Element {
            id,
            corner_nodes: [nodes[0], nodes[1], nodes[2], nodes[3]],
            nodes,
            section,
            x: DVector::zeros(0),
            y: DVector::zeros(0),
        };
        element.gather_coordinates(node_arena)?;

        Ok(element)
    }

    /// Refreshes the gathered coordinates from the node arena
    pub fn gather_coordinates(&mut self, node_arena: &[Node]) -> Result<(), FeaError> {
        let mut x = DVector::zeros(self.nodes.len());
        let mut y = DVector::zeros(self.nodes.len());

        for (local, &index) in self.nodes.iter().enumerate() {
            let node = node_arena.get(index).ok_or_else(|| {
                FeaError::Input(format!(
                    "Element {} references node index {index} outside of the mesh",
                    self.id
                ))
            })?;
            x[local] = node.vertex.x;
            y[local] = node.vertex.y;
        }

        self.x = x;
        self.y = y;
        Ok(())
    }

    /// The global dof indices of the element, in element node order
    pub fn dofs(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .flat_map(|&n| [DOF * n, DOF * n + 1])
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Quad4,
    Quad8,
    Quad4Incompatible,
}

impl ElementType {
    /// The tag used for this element type in input files
    pub fn tag(&self) -> &'static str {
        match self {
            ElementType::Quad4 => "Quad_4node",
            ElementType::Quad8 => "Quad_8node",
            ElementType::Quad4Incompatible => "Quad_4node_Incomp",
        }
    }

    /// Number of nodes per element
    pub fn node_count(&self) -> usize {
        match self {
            ElementType::Quad4 | ElementType::Quad4Incompatible => 4,
            ElementType::Quad8 => 8,
        }
    }
}

impl FromStr for ElementType {
    type Err = FeaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Quad_4node" => Ok(ElementType::Quad4),
            "Quad_8node" => Ok(ElementType::Quad8),
            "Quad_4node_Incomp" => Ok(ElementType::Quad4Incompatible),
            other => Err(FeaError::UnsupportedElementType(other.to_string())),
        }
    }
}

impl Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A meshed model ready for analysis. Nodes are stored in ascending id order;
/// a node's position in `nodes` is its arena index and owns dofs `2i`, `2i+1`.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub nodes: Vec<Node>,
    pub elements: Vec<Element>,
    pub material: Material,
    pub element_type: ElementType,
}

impl Mesh {
    pub fn dof_count(&self) -> usize {
        DOF * self.nodes.len()
    }

    /// Finds the arena index of a node id
    pub fn node_index(&self, id: i64) -> Option<usize> {
        self.nodes.binary_search_by_key(&id, |n| n.id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_tags_round_trip() {
        for element_type in [
            ElementType::Quad4,
            ElementType::Quad8,
            ElementType::Quad4Incompatible,
        ] {
            assert_eq!(element_type.tag().parse::<ElementType>().unwrap(), element_type);
        }
    }

    #[test]
    fn unknown_element_type_is_a_configuration_error() {
        let err = "Tri_3node".parse::<ElementType>().unwrap_err();
        assert!(matches!(err, FeaError::UnsupportedElementType(ref t) if t == "Tri_3node"));
        assert!(err.to_string().contains("Tri_3node"));
    }

    #[test]
    fn element_gathers_coordinates_and_dofs() {
        let nodes = vec![
            Node::new(0, 0.0, 0.0),
            Node::new(1, 2.0, 0.0),
            Node::new(2, 2.0, 1.0),
            Node::new(3, 0.0, 1.0),
        ];
        let section = Section { id: 0, thickness: 1.0 };
        let element = Element::new(7, vec![0, 1, 2, 3], section, &nodes).unwrap();

        assert_eq!(element.x.as_slice(), &[0.0, 2.0, 2.0, 0.0]);
        assert_eq!(element.y.as_slice(), &[0.0, 0.0, 1.0, 1.0]);
        assert_eq!(element.dofs(), vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(element.corner_nodes, [0, 1, 2, 3]);
    }

    #[test]
    fn element_with_dangling_node_is_rejected() {
        let nodes = vec![Node::new(0, 0.0, 0.0)];
        let section = Section { id: 0, thickness: 1.0 };
        assert!(matches!(
            Element::new(0, vec![0, 1, 2, 3], section, &nodes),
            Err(FeaError::Input(_))
        ));
    }
}
