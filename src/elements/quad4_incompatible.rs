use nalgebra::{DMatrix, Matrix3, Matrix3x4, Matrix3xX, Matrix4, SMatrix};

use super::{quad4::bilinear_derivatives, ElementKernel, Jacobian, ShapeDerivatives};
use crate::{
    datatypes::{Element, ElementType},
    error::FeaError,
};

type Matrix3x8 = SMatrix<f64, 3, 8>;
type Matrix8 = SMatrix<f64, 8, 8>;
type Matrix8x4 = SMatrix<f64, 8, 4>;
type Matrix4x8 = SMatrix<f64, 4, 8>;

/// 4-node quadrilateral enriched with the internal bubble modes `1 - xi^2`
/// and `1 - eta^2` in each direction. The four internal dofs are condensed
/// out, so the element exposes the same 8 dofs as [`super::Quad4`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Quad4Incompatible;

/// Element sub-matrices before condensation
struct IncompatibleBlocks {
    kcc: Matrix8,
    kci: Matrix8x4,
    kic: Matrix4x8,
    kii_inv: Matrix4<f64>,
}

impl Quad4Incompatible {
    /// Strain matrix of the internal modes. Columns are the amplitudes of
    /// (1 - xi^2) and (1 - eta^2) in u, then the same two in v.
    ///
    /// The derivatives use the Jacobian at the element centre and are scaled
    /// by `det J0 / det J`, so the modes integrate to zero strain over any
    /// quadrilateral and constant strain states are represented exactly.
    fn incompatible_strain(
        centre: &Jacobian,
        jacobian: &Jacobian,
        xi: f64,
        eta: f64,
    ) -> Matrix3x4<f64> {
        let inv = &centre.inverse;
        let scale = centre.determinant / jacobian.determinant;
        Matrix3x4::new(
            -2.0 * xi * inv[(0, 0)],
            -2.0 * eta * inv[(0, 1)],
            0.0,
            0.0,
            0.0,
            0.0,
            -2.0 * xi * inv[(1, 0)],
            -2.0 * eta * inv[(1, 1)],
            -2.0 * xi * inv[(1, 0)],
            -2.0 * eta * inv[(1, 1)],
            -2.0 * xi * inv[(0, 0)],
            -2.0 * eta * inv[(0, 1)],
        ) * scale
    }

    fn compatible_and_incompatible(
        &self,
        element: &Element,
        centre: &Jacobian,
        xi: f64,
        eta: f64,
    ) -> Result<(Matrix3x8, Matrix3x4<f64>, Jacobian), FeaError> {
        let (bc, jacobian) = self.strain_displacement(element, xi, eta)?;
        let bc = Matrix3x8::from_fn(|r, c| bc[(r, c)]);
        let bi = Self::incompatible_strain(centre, &jacobian, xi, eta);
        Ok((bc, bi, jacobian))
    }

    fn integrate_blocks(
        &self,
        element: &Element,
        stress_strain_mat: &Matrix3<f64>,
    ) -> Result<IncompatibleBlocks, FeaError> {
        let mut kcc = Matrix8::zeros();
        let mut kci = Matrix8x4::zeros();
        let mut kic = Matrix4x8::zeros();
        let mut kii = Matrix4::zeros();
        let centre = self.jacobian(element, 0.0, 0.0)?;

        for gp in self.quadrature() {
            let (bc, bi, jacobian) =
                self.compatible_and_incompatible(element, &centre, gp.xi, gp.eta)?;
            let factor = gp.weight() * jacobian.determinant * element.section.thickness;

            kcc += bc.transpose() * stress_strain_mat * bc * factor;
            kci += bc.transpose() * stress_strain_mat * bi * factor;
            kic += bi.transpose() * stress_strain_mat * bc * factor;
            kii += bi.transpose() * stress_strain_mat * bi * factor;
        }

        let kii_inv = kii
            .try_inverse()
            .filter(|inv| inv.iter().all(|v| v.is_finite()))
            .ok_or_else(|| FeaError::DegenerateElement {
                element: element.id,
                reason: "internal mode stiffness is singular and cannot be condensed".to_owned(),
            })?;

        Ok(IncompatibleBlocks {
            kcc,
            kci,
            kic,
            kii_inv,
        })
    }
}

impl ElementKernel for Quad4Incompatible {
    fn element_type(&self) -> ElementType {
        ElementType::Quad4Incompatible
    }

    fn shape_derivatives(&self, xi: f64, eta: f64) -> ShapeDerivatives {
        bilinear_derivatives(xi, eta)
    }

    /// Condensed stiffness `Kcc - Kci Kii^-1 Kic`
    fn stiffness(
        &self,
        element: &Element,
        stress_strain_mat: &Matrix3<f64>,
    ) -> Result<DMatrix<f64>, FeaError> {
        let blocks = self.integrate_blocks(element, stress_strain_mat)?;
        let condensed = blocks.kcc - blocks.kci * blocks.kii_inv * blocks.kic;

        Ok(DMatrix::from_column_slice(8, 8, condensed.as_slice()))
    }

    /// Condensed strain matrices `Bc - Bi Kii^-1 Kic`, so that recovered
    /// stresses include the internal modes
    fn stress_matrices(
        &self,
        element: &Element,
        stress_strain_mat: &Matrix3<f64>,
    ) -> Result<Vec<Matrix3xX<f64>>, FeaError> {
        let blocks = self.integrate_blocks(element, stress_strain_mat)?;
        let recovery = blocks.kii_inv * blocks.kic;
        let centre = self.jacobian(element, 0.0, 0.0)?;

        self.quadrature()
            .iter()
            .map(|gp| {
                let (bc, bi, _) =
                    self.compatible_and_incompatible(element, &centre, gp.xi, gp.eta)?;
                let condensed = bc - bi * recovery;
                Ok(Matrix3xX::from_column_slice(condensed.as_slice()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::test_support::*;
    use crate::elements::Quad4;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::DVector;

    fn rectangle(length: f64, height: f64) -> Element {
        element_from(&[(0.0, 0.0), (length, 0.0), (length, height), (0.0, height)], 1.0)
    }

    #[test]
    fn stiffness_is_symmetric_with_three_rigid_body_modes() {
        let element = element_from(&[(0.0, 0.0), (2.0, 0.1), (2.2, 1.4), (0.1, 1.0)], 0.8);
        let ke = Quad4Incompatible.stiffness(&element, &d_matrix()).unwrap();

        assert_eq!(ke.shape(), (8, 8));
        assert_relative_eq!(ke, ke.transpose(), epsilon = 1e-9);
        assert_eq!(symmetric_rank(&ke), 5);

        for mode in rigid_body_modes(&element) {
            let forces = &ke * DVector::from_vec(mode);
            assert_abs_diff_eq!(forces.amax(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn condensation_softens_the_bilinear_element() {
        let element = rectangle(4.0, 1.0);
        let d = d_matrix();
        let q4 = Quad4.stiffness(&element, &d).unwrap();
        let q4i = Quad4Incompatible.stiffness(&element, &d).unwrap();

        // in-plane bending mode: top fibres stretch, bottom fibres compress
        let bending = DVector::from_vec(vec![1.0, 0.0, -1.0, 0.0, 1.0, 0.0, -1.0, 0.0]);
        let energy_q4 = bending.dot(&(&q4 * &bending));
        let energy_q4i = bending.dot(&(&q4i * &bending));

        assert!(energy_q4i < energy_q4);
        // the difference is positive semi-definite
        let difference = (&q4 - &q4i).symmetric_eigen();
        assert!(difference.eigenvalues.iter().all(|&l| l > -1e-9));
    }

    #[test]
    fn recovers_exact_pure_bending_stress_in_a_rectangle() {
        // u = (x - 1)(y - 1) on the corners of a 2 x 2 square is pure bending;
        // the internal modes supply the parabolic v field
        let element = rectangle(2.0, 2.0);
        let d = d_matrix();
        let u = DVector::from_vec(vec![1.0, 0.0, -1.0, 0.0, 1.0, 0.0, -1.0, 0.0]);
        let matrices = Quad4Incompatible.stress_matrices(&element, &d).unwrap();
        assert_eq!(matrices.len(), 4);

        for (gp, b) in Quad4Incompatible.quadrature().iter().zip(&matrices) {
            let stress = d * (b * &u);
            assert_relative_eq!(stress[0], 1000.0 * gp.eta, epsilon = 1e-9);
            assert_abs_diff_eq!(stress[1], 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(stress[2], 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn condensed_strains_reproduce_condensed_energy() {
        let element = element_from(&[(0.0, 0.0), (2.0, 0.1), (2.2, 1.4), (0.1, 1.0)], 1.0);
        let d = d_matrix();
        let ke = Quad4Incompatible.stiffness(&element, &d).unwrap();
        let matrices = Quad4Incompatible.stress_matrices(&element, &d).unwrap();
        let u = DVector::from_vec(vec![0.1, -0.2, 0.3, 0.0, -0.1, 0.4, 0.2, 0.1]);

        let integrated: f64 = Quad4Incompatible
            .quadrature()
            .iter()
            .zip(&matrices)
            .map(|(gp, b)| {
                let strain = b * &u;
                let jacobian = Quad4Incompatible.jacobian(&element, gp.xi, gp.eta).unwrap();
                gp.weight() * jacobian.determinant * strain.dot(&(d * &strain))
            })
            .sum();

        assert_relative_eq!(integrated, u.dot(&(&ke * &u)), epsilon = 1e-9);
    }

    #[test]
    fn internal_modes_integrate_to_zero_on_a_distorted_element() {
        let element = element_from(&[(0.0, 0.0), (2.0, 0.1), (2.2, 1.4), (0.1, 1.0)], 1.0);
        let centre = Quad4Incompatible.jacobian(&element, 0.0, 0.0).unwrap();

        let mut integral = Matrix3x4::zeros();
        for gp in Quad4Incompatible.quadrature() {
            let (_, bi, jacobian) = Quad4Incompatible
                .compatible_and_incompatible(&element, &centre, gp.xi, gp.eta)
                .unwrap();
            integral += bi * (gp.weight() * jacobian.determinant);
        }
        assert_abs_diff_eq!(integral.amax(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_strain_is_exact_on_a_distorted_element() {
        // u = 0.002 x + 0.001 y, v = -0.0005 x + 0.003 y
        let element = element_from(&[(0.0, 0.0), (2.0, 0.1), (2.2, 1.4), (0.1, 1.0)], 1.0);
        let d = d_matrix();
        let u = DVector::from_iterator(
            8,
            (0..4).flat_map(|i| {
                let (x, y) = (element.x[i], element.y[i]);
                [0.002 * x + 0.001 * y, -0.0005 * x + 0.003 * y]
            }),
        );
        let strain = nalgebra::Vector3::new(0.002, 0.003, 0.001 - 0.0005);

        for b in Quad4Incompatible.stress_matrices(&element, &d).unwrap() {
            assert_relative_eq!(b * &u, strain, epsilon = 1e-12);
        }
    }

    #[test]
    fn zero_thickness_cannot_be_condensed() {
        let element = element_from(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)], 0.0);
        let err = Quad4Incompatible.stiffness(&element, &d_matrix()).unwrap_err();
        assert!(matches!(err, FeaError::DegenerateElement { .. }));
    }
}
