use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeaError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Configuration error: unsupported element type '{0}' (expected Quad_4node, Quad_8node or Quad_4node_Incomp)")]
    UnsupportedElementType(String),

    #[error("Geometry error: element {element} is degenerate: {reason}")]
    DegenerateElement { element: i64, reason: String },

    #[error("Solver error: stiffness matrix is singular at dof {dof} (node {node}, {axis}-axis); the model may be insufficiently constrained")]
    SingularSystem { dof: usize, node: i64, axis: char },

    #[error("Post Processor error: {0}")]
    Output(String),
}

pub type Result<T> = std::result::Result<T, FeaError>;
