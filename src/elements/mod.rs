//! Quadrilateral element kernels.
//!
//! Every element family implements [`ElementKernel`]. The kernel for a run is
//! picked once from the mesh's [`ElementType`] with [`ElementType::kernel`];
//! the kernels themselves are stateless and safe to share across threads.

use nalgebra::{DMatrix, DVector, Matrix2, Matrix3, Matrix3xX, Vector2};

use crate::{
    datatypes::{Element, ElementType, DOF},
    error::FeaError,
    quadrature::{gauss_points, GaussPoint},
};

mod quad4;
mod quad4_incompatible;
mod quad8;

pub use quad4::Quad4;
pub use quad4_incompatible::Quad4Incompatible;
pub use quad8::Quad8;

/// Shape function derivatives with respect to the natural coordinates,
/// one entry per element node
#[derive(Debug, Clone)]
pub struct ShapeDerivatives {
    pub d_xi: DVector<f64>,
    pub d_eta: DVector<f64>,
}

/// The Jacobian `[[dx/dxi, dy/dxi], [dx/deta, dy/deta]]` at a point
#[derive(Debug, Clone, Copy)]
pub struct Jacobian {
    pub matrix: Matrix2<f64>,
    pub determinant: f64,
    pub inverse: Matrix2<f64>,
}

pub trait ElementKernel: Sync {
    fn element_type(&self) -> ElementType;

    fn shape_derivatives(&self, xi: f64, eta: f64) -> ShapeDerivatives;

    fn node_count(&self) -> usize {
        self.element_type().node_count()
    }

    fn quadrature(&self) -> &'static [GaussPoint] {
        gauss_points(self.element_type())
    }

    /// Computes the Jacobian of the element at a natural coordinate
    ///
    /// # Arguments
    /// * `element` - The element to target
    /// * `xi`, `eta` - The natural coordinates
    ///
    /// # Returns
    /// The Jacobian, or a degenerate element error if its determinant is not
    /// positive
    fn jacobian(&self, element: &Element, xi: f64, eta: f64) -> Result<Jacobian, FeaError> {
        check_node_count(element, self.node_count())?;
        compute_jacobian(element, &self.shape_derivatives(xi, eta), xi, eta)
    }

    /// Computes the 3 x 2n strain-displacement matrix of the element
    ///
    /// # Arguments
    /// * `element` - The element to target
    /// * `xi`, `eta` - The natural coordinates
    ///
    /// # Returns
    /// The strain-displacement matrix and the Jacobian it was built from
    fn strain_displacement(
        &self,
        element: &Element,
        xi: f64,
        eta: f64,
    ) -> Result<(Matrix3xX<f64>, Jacobian), FeaError> {
        check_node_count(element, self.node_count())?;
        let derivatives = self.shape_derivatives(xi, eta);
        let jacobian = compute_jacobian(element, &derivatives, xi, eta)?;

        Ok((build_strain_displacement(&derivatives, &jacobian), jacobian))
    }

    /// Integrates the element stiffness matrix
    ///
    /// # Arguments
    /// * `element` - The element to target
    /// * `stress_strain_mat` - The plane-stress stress-strain matrix
    ///
    /// # Returns
    /// A 2n x 2n stiffness matrix in element dof order
    fn stiffness(
        &self,
        element: &Element,
        stress_strain_mat: &Matrix3<f64>,
    ) -> Result<DMatrix<f64>, FeaError> {
        let size = DOF * self.node_count();
        let mut stiffness_mat = DMatrix::zeros(size, size);

        for gp in self.quadrature() {
            let (b, jacobian) = self.strain_displacement(element, gp.xi, gp.eta)?;
            stiffness_mat += (b.transpose() * stress_strain_mat * &b)
                * (gp.weight() * jacobian.determinant * element.section.thickness);
        }

        Ok(stiffness_mat)
    }

    /// Matrices mapping element displacements to strain at each gauss point,
    /// in quadrature order
    fn stress_matrices(
        &self,
        element: &Element,
        _stress_strain_mat: &Matrix3<f64>,
    ) -> Result<Vec<Matrix3xX<f64>>, FeaError> {
        self.quadrature()
            .iter()
            .map(|gp| Ok(self.strain_displacement(element, gp.xi, gp.eta)?.0))
            .collect()
    }
}

impl ElementType {
    /// The kernel that implements this element family
    pub fn kernel(&self) -> &'static dyn ElementKernel {
        match self {
            ElementType::Quad4 => &Quad4,
            ElementType::Quad8 => &Quad8,
            ElementType::Quad4Incompatible => &Quad4Incompatible,
        }
    }
}

fn check_node_count(element: &Element, expected: usize) -> Result<(), FeaError> {
    if element.nodes.len() != expected || element.x.len() != expected {
        return Err(FeaError::Input(format!(
            "Element {} has {} nodes but the element type requires {expected}",
            element.id,
            element.nodes.len()
        )));
    }
    Ok(())
}

pub(crate) fn compute_jacobian(
    element: &Element,
    derivatives: &ShapeDerivatives,
    xi: f64,
    eta: f64,
) -> Result<Jacobian, FeaError> {
    let dx_dxi = derivatives.d_xi.dot(&element.x);
    let dy_dxi = derivatives.d_xi.dot(&element.y);
    let dx_deta = derivatives.d_eta.dot(&element.x);
    let dy_deta = derivatives.d_eta.dot(&element.y);

    let matrix = Matrix2::new(dx_dxi, dy_dxi, dx_deta, dy_deta);
    let determinant = matrix.determinant();

    if !determinant.is_finite() || determinant <= 0.0 {
        return Err(FeaError::DegenerateElement {
            element: element.id,
            reason: format!(
                "jacobian determinant {determinant:e} at (xi, eta) = ({xi:.4}, {eta:.4}); \
                 check that the corner nodes are distinct and counter-clockwise"
            ),
        });
    }

    let inverse = matrix.try_inverse().ok_or_else(|| FeaError::DegenerateElement {
        element: element.id,
        reason: format!("jacobian is not invertible at (xi, eta) = ({xi:.4}, {eta:.4})"),
    })?;

    Ok(Jacobian {
        matrix,
        determinant,
        inverse,
    })
}

pub(crate) fn build_strain_displacement(
    derivatives: &ShapeDerivatives,
    jacobian: &Jacobian,
) -> Matrix3xX<f64> {
    let node_count = derivatives.d_xi.len();
    let mut b = Matrix3xX::zeros(DOF * node_count);

    for i in 0..node_count {
        let natural = Vector2::new(derivatives.d_xi[i], derivatives.d_eta[i]);
        let physical = jacobian.inverse * natural;
        let (dn_dx, dn_dy) = (physical[0], physical[1]);

        b[(0, 2 * i)] = dn_dx;
        b[(1, 2 * i + 1)] = dn_dy;
        b[(2, 2 * i)] = dn_dy;
        b[(2, 2 * i + 1)] = dn_dx;
    }

    b
}
