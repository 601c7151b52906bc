//! Nodal stress recovery.
//!
//! Stresses are evaluated at the gauss points of every element, fitted with a
//! complete quadratic in natural coordinates by least squares, extrapolated
//! to the four corners, and averaged over the elements sharing each corner
//! node. The fit uses the minimum-norm pseudo-inverse, so the 2x2 schemes
//! (four points, six unknowns) still have a unique answer.

use log::debug;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use rayon::prelude::*;

use crate::{
    datatypes::{Element, Mesh},
    elements::ElementKernel,
    error::FeaError,
    quadrature::GaussPoint,
};

/// Singular values below this are dropped from the least squares fit
const FIT_TOLERANCE: f64 = 1e-10;

const NATURAL_CORNERS: [(f64, f64); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

/// Averaged stress at a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodalStress {
    pub sx: f64,
    pub sy: f64,
    pub txy: f64,
    pub von_mises: f64,
}

impl NodalStress {
    pub fn from_components(sx: f64, sy: f64, txy: f64) -> NodalStress {
        NodalStress {
            sx,
            sy,
            txy,
            von_mises: von_mises(sx, sy, txy),
        }
    }
}

/// Plane stress von Mises equivalent stress
pub fn von_mises(sx: f64, sy: f64, txy: f64) -> f64 {
    // never negative for real inputs, the clamp only absorbs rounding
    (sx * sx - sx * sy + sy * sy + 3.0 * txy * txy).max(0.0).sqrt()
}

/// Running sums of extrapolated corner stresses, indexed by node arena index
#[derive(Debug, Clone)]
pub struct StressAccumulator {
    sums: Vec<Vector3<f64>>,
    counts: Vec<usize>,
}

impl StressAccumulator {
    pub fn new(node_count: usize) -> StressAccumulator {
        StressAccumulator {
            sums: vec![Vector3::zeros(); node_count],
            counts: vec![0; node_count],
        }
    }

    pub fn add(&mut self, node_index: usize, stress: &Vector3<f64>) {
        self.sums[node_index] += stress;
        self.counts[node_index] += 1;
    }

    pub fn count(&self, node_index: usize) -> usize {
        self.counts[node_index]
    }

    /// Averages every node that received a contribution. Nodes without any
    /// get no record.
    pub fn finalize(self) -> StressField {
        let records = self
            .sums
            .iter()
            .zip(&self.counts)
            .map(|(sum, &count)| {
                (count > 0).then(|| {
                    let mean = sum / count as f64;
                    NodalStress::from_components(mean[0], mean[1], mean[2])
                })
            })
            .collect();

        StressField {
            records,
            contributions: self.counts,
        }
    }
}

/// Averaged nodal stresses, indexed by node arena index
#[derive(Debug, Clone, PartialEq)]
pub struct StressField {
    records: Vec<Option<NodalStress>>,
    contributions: Vec<usize>,
}

impl StressField {
    pub fn get(&self, node_index: usize) -> Option<&NodalStress> {
        self.records.get(node_index).and_then(|r| r.as_ref())
    }

    /// Number of element corners that contributed to a node's average
    pub fn contributions(&self, node_index: usize) -> usize {
        self.contributions.get(node_index).copied().unwrap_or(0)
    }

    pub fn recorded_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &NodalStress)> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|s| (i, s)))
    }
}

fn quadratic_basis(xi: f64, eta: f64) -> [f64; 6] {
    [1.0, xi, eta, xi * xi, eta * eta, xi * eta]
}

/// Builds the matrix that maps gauss point values to corner values through a
/// least squares quadratic fit
///
/// # Arguments
/// * `gauss_points` - The quadrature of the element type
///
/// # Returns
/// A 4 x n matrix, one row per natural corner
pub fn extrapolation_matrix(gauss_points: &[GaussPoint]) -> Result<DMatrix<f64>, FeaError> {
    let design = DMatrix::from_fn(gauss_points.len(), 6, |r, c| {
        quadratic_basis(gauss_points[r].xi, gauss_points[r].eta)[c]
    });
    let corners = DMatrix::from_fn(4, 6, |r, c| {
        let (xi, eta) = NATURAL_CORNERS[r];
        quadratic_basis(xi, eta)[c]
    });

    let fit = design.pseudo_inverse(FIT_TOLERANCE).map_err(|err| {
        FeaError::Input(format!("Unable to build stress extrapolation: {err}"))
    })?;

    Ok(corners * fit)
}

/// Gathers the element's nodal displacements in element dof order
pub fn element_displacements(element: &Element, displacements: &DVector<f64>) -> DVector<f64> {
    let dofs = element.dofs();
    DVector::from_iterator(dofs.len(), dofs.iter().map(|&dof| displacements[dof]))
}

/// Calculates the stress at each gauss point of an element
///
/// # Arguments
/// * `element` - The element to target
/// * `kernel` - The element kernel
/// * `stress_strain_mat` - The plane-stress stress-strain matrix
/// * `displacements` - The global displacement vector
///
/// # Returns
/// (sx, sy, txy) at each gauss point, in quadrature order
pub fn gauss_point_stresses(
    element: &Element,
    kernel: &dyn ElementKernel,
    stress_strain_mat: &Matrix3<f64>,
    displacements: &DVector<f64>,
) -> Result<Vec<Vector3<f64>>, FeaError> {
    let element_disp = element_displacements(element, displacements);

    Ok(kernel
        .stress_matrices(element, stress_strain_mat)?
        .iter()
        .map(|b| stress_strain_mat * (b * &element_disp))
        .collect())
}

/// Extrapolates an element's gauss point stresses to its four corners
pub fn corner_stresses(
    element: &Element,
    kernel: &dyn ElementKernel,
    stress_strain_mat: &Matrix3<f64>,
    displacements: &DVector<f64>,
    extrapolation: &DMatrix<f64>,
) -> Result<[Vector3<f64>; 4], FeaError> {
    let gauss = gauss_point_stresses(element, kernel, stress_strain_mat, displacements)?;
    let samples = DMatrix::from_fn(gauss.len(), 3, |r, c| gauss[r][c]);
    let corners = extrapolation * samples;

    Ok(std::array::from_fn(|i| {
        Vector3::new(corners[(i, 0)], corners[(i, 1)], corners[(i, 2)])
    }))
}

/// Recovers averaged stresses at the corner nodes of a solved mesh
///
/// # Arguments
/// * `mesh` - The solved mesh
/// * `kernel` - The element kernel for the mesh's element type
/// * `stress_strain_mat` - The plane-stress stress-strain matrix
/// * `displacements` - The global displacement vector
///
/// # Returns
/// A stress field with a record for every node that is an element corner
pub fn recover_stresses(
    mesh: &Mesh,
    kernel: &dyn ElementKernel,
    stress_strain_mat: &Matrix3<f64>,
    displacements: &DVector<f64>,
) -> Result<StressField, FeaError> {
    if displacements.len() != mesh.dof_count() {
        return Err(FeaError::Input(format!(
            "Displacement vector has {} entries, the mesh has {} dofs",
            displacements.len(),
            mesh.dof_count()
        )));
    }

    let extrapolation = extrapolation_matrix(kernel.quadrature())?;

    let element_corners = mesh
        .elements
        .par_iter()
        .map(|element| {
            corner_stresses(
                element,
                kernel,
                stress_strain_mat,
                displacements,
                &extrapolation,
            )
        })
        .collect::<Result<Vec<_>, FeaError>>()?;

    let mut accumulator = StressAccumulator::new(mesh.nodes.len());
    for (element, corners) in mesh.elements.iter().zip(&element_corners) {
        for (node, stress) in element.corner_nodes.iter().zip(corners) {
            accumulator.add(*node, stress);
        }
    }
    debug!("extrapolated stresses from {} elements", element_corners.len());

    Ok(accumulator.finalize())
}
