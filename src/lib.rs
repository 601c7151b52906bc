//! Linear-elastic plane-stress finite element analysis with 4-node, 8-node
//! and incompatible-mode 4-node quadrilaterals.

pub mod constitutive;
pub mod datatypes;
pub mod elements;
pub mod error;
pub mod mesher;
pub mod post_processor;
pub mod quadrature;
pub mod solver;
pub mod stress;
