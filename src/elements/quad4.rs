use nalgebra::DVector;

use super::{ElementKernel, ShapeDerivatives};
use crate::datatypes::ElementType;

/// 4-node bilinear quadrilateral, corners counter-clockwise from (-1, -1)
#[derive(Debug, Clone, Copy, Default)]
pub struct Quad4;

/// Bilinear shape function derivatives, shared with the incompatible-mode
/// element
pub(crate) fn bilinear_derivatives(xi: f64, eta: f64) -> ShapeDerivatives {
    ShapeDerivatives {
        d_xi: DVector::from_vec(vec![
            (-1.0 + eta) / 4.0,
            (1.0 - eta) / 4.0,
            (1.0 + eta) / 4.0,
            (-1.0 - eta) / 4.0,
        ]),
        d_eta: DVector::from_vec(vec![
            (-1.0 + xi) / 4.0,
            (-1.0 - xi) / 4.0,
            (1.0 + xi) / 4.0,
            (1.0 - xi) / 4.0,
        ]),
    }
}

impl ElementKernel for Quad4 {
    fn element_type(&self) -> ElementType {
        ElementType::Quad4
    }

    fn shape_derivatives(&self, xi: f64, eta: f64) -> ShapeDerivatives {
        bilinear_derivatives(xi, eta)
    }
}
