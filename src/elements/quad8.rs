use nalgebra::DVector;

use super::{ElementKernel, ShapeDerivatives};
use crate::datatypes::ElementType;

/// 8-node serendipity quadrilateral. Corners counter-clockwise from (-1, -1),
/// then the mid-side nodes of the bottom, right, top and left edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quad8;

impl ElementKernel for Quad8 {
    fn element_type(&self) -> ElementType {
        ElementType::Quad8
    }

    fn shape_derivatives(&self, xi: f64, eta: f64) -> ShapeDerivatives {
        let d_xi = [
            (1.0 - eta) * (2.0 * xi + eta),
            (1.0 - eta) * (2.0 * xi - eta),
            (1.0 + eta) * (2.0 * xi + eta),
            (1.0 + eta) * (2.0 * xi - eta),
            -4.0 * xi * (1.0 - eta),
            2.0 * (1.0 - eta * eta),
            -4.0 * xi * (1.0 + eta),
            -2.0 * (1.0 - eta * eta),
        ];
        let d_eta = [
            (1.0 - xi) * (xi + 2.0 * eta),
            (1.0 + xi) * (-xi + 2.0 * eta),
            (1.0 + xi) * (xi + 2.0 * eta),
            (1.0 - xi) * (-xi + 2.0 * eta),
            -2.0 * (1.0 - xi * xi),
            -4.0 * eta * (1.0 + xi),
            2.0 * (1.0 - xi * xi),
            -4.0 * eta * (1.0 - xi),
        ];

        ShapeDerivatives {
            d_xi: DVector::from_iterator(8, d_xi.iter().map(|v| v / 4.0)),
            d_eta: DVector::from_iterator(8, d_eta.iter().map(|v| v / 4.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::test_support::*;
    use crate::elements::Quad4;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::DVector;

    const NATURAL_NODES: [(f64, f64); 8] = [
        (-1.0, -1.0),
        (1.0, -1.0),
        (1.0, 1.0),
        (-1.0, 1.0),
        (0.0, -1.0),
        (1.0, 0.0),
        (0.0, 1.0),
        (-1.0, 0.0),
    ];

    fn shape_functions(xi: f64, eta: f64) -> [f64; 8] {
        [
            -(1.0 - xi) * (1.0 - eta) * (1.0 + xi + eta) / 4.0,
            -(1.0 + xi) * (1.0 - eta) * (1.0 - xi + eta) / 4.0,
            -(1.0 + xi) * (1.0 + eta) * (1.0 - xi - eta) / 4.0,
            -(1.0 - xi) * (1.0 + eta) * (1.0 + xi - eta) / 4.0,
            (1.0 - xi * xi) * (1.0 - eta) / 2.0,
            (1.0 + xi) * (1.0 - eta * eta) / 2.0,
            (1.0 - xi * xi) * (1.0 + eta) / 2.0,
            (1.0 - xi) * (1.0 - eta * eta) / 2.0,
        ]
    }

    #[test]
    fn derivatives_match_finite_differences_of_serendipity_basis() {
        let h = 1e-6;
        for (xi, eta) in [(0.1, 0.2), (-0.6, 0.9), (0.77, -0.77)] {
            let d = Quad8.shape_derivatives(xi, eta);
            let plus_xi = shape_functions(xi + h, eta);
            let minus_xi = shape_functions(xi - h, eta);
            let plus_eta = shape_functions(xi, eta + h);
            let minus_eta = shape_functions(xi, eta - h);
            for i in 0..8 {
                assert_abs_diff_eq!(d.d_xi[i], (plus_xi[i] - minus_xi[i]) / (2.0 * h), epsilon = 1e-8);
                assert_abs_diff_eq!(d.d_eta[i], (plus_eta[i] - minus_eta[i]) / (2.0 * h), epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn basis_is_interpolatory_at_nodes() {
        for (j, &(xi, eta)) in NATURAL_NODES.iter().enumerate() {
            let n = shape_functions(xi, eta);
            for (i, value) in n.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(*value, expected, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn stiffness_is_symmetric_with_three_rigid_body_modes() {
        let element = element_from(
            &[
                (0.0, 0.0),
                (2.0, 0.0),
                (2.0, 1.0),
                (0.0, 1.0),
                (1.0, 0.0),
                (2.0, 0.5),
                (1.0, 1.0),
                (0.0, 0.5),
            ],
            1.0,
        );
        let ke = Quad8.stiffness(&element, &d_matrix()).unwrap();

        assert_eq!(ke.shape(), (16, 16));
        assert_relative_eq!(ke, ke.transpose(), epsilon = 1e-9);
        assert_eq!(symmetric_rank(&ke), 13);

        for mode in rigid_body_modes(&element) {
            let forces = &ke * DVector::from_vec(mode);
            assert_abs_diff_eq!(forces.amax(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn jacobian_agrees_with_bilinear_map_on_straight_edges() {
        let corners = [(0.0, 0.0), (3.0, 0.5), (2.5, 2.0), (0.2, 1.5)];
        let mut coords = corners.to_vec();
        for i in 0..4 {
            let (a, b) = (corners[i], corners[(i + 1) % 4]);
            coords.push(((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0));
        }
        let quadratic = element_from(&coords, 1.0);
        let bilinear = element_from(&corners, 1.0);

        for (xi, eta) in [(0.0, 0.0), (0.5, -0.3), (-0.77, 0.77)] {
            let jq = Quad8.jacobian(&quadratic, xi, eta).unwrap();
            let jl = Quad4.jacobian(&bilinear, xi, eta).unwrap();
            assert_relative_eq!(jq.matrix, jl.matrix, epsilon = 1e-12);
        }
    }
}
