use indicatif::ProgressBar;
use log::{debug, info};
use nalgebra::{DMatrix, DVector, Matrix3};
use rayon::prelude::*;

use crate::{
    constitutive::stress_strain_matrix,
    datatypes::{ElementType, Mesh, DOF},
    elements::ElementKernel,
    error::FeaError,
    stress::{recover_stresses, StressField},
};

/// Smallest accepted ratio between a Cholesky pivot and the diagonal entry
/// it came from. Below this the system is treated as singular.
pub const PIVOT_TOLERANCE: f64 = 1e-12;

/// Everything produced by a successful analysis run
#[derive(Debug, Clone)]
pub struct AnalysisResults {
    pub element_type: ElementType,
    /// Global stiffness matrix as assembled, before constraints are applied
    pub stiffness: DMatrix<f64>,
    /// Nodal displacements, dofs `2i` and `2i+1` for arena index `i`
    pub displacements: DVector<f64>,
    /// `K d`: applied loads on free dofs, support reactions on constrained dofs
    pub nodal_forces: DVector<f64>,
    pub stresses: StressField,
}

impl AnalysisResults {
    /// The (ux, uy) displacement of the node at an arena index
    pub fn displacement(&self, node_index: usize) -> [f64; 2] {
        [
            self.displacements[DOF * node_index],
            self.displacements[DOF * node_index + 1],
        ]
    }

    /// The (fx, fy) nodal force of the node at an arena index
    pub fn nodal_force(&self, node_index: usize) -> [f64; 2] {
        [
            self.nodal_forces[DOF * node_index],
            self.nodal_forces[DOF * node_index + 1],
        ]
    }
}

/// Computes the stiffness matrix of every element in parallel
///
/// # Arguments
/// * `mesh` - The mesh to target
/// * `kernel` - The element kernel for the mesh's element type
/// * `stress_strain_mat` - The plane-stress stress-strain matrix
///
/// # Returns
/// One stiffness matrix per element, in the order of `mesh.elements`
pub fn build_element_stiffness_matrices(
    mesh: &Mesh,
    kernel: &dyn ElementKernel,
    stress_strain_mat: &Matrix3<f64>,
) -> Result<Vec<DMatrix<f64>>, FeaError> {
    let bar = ProgressBar::new(mesh.elements.len() as u64);

    let element_stiffness_matrices = mesh
        .elements
        .par_iter()
        .map(|element| {
            let stiffness_mat = kernel.stiffness(element, stress_strain_mat);
            bar.inc(1);
            stiffness_mat
        })
        .collect::<Result<Vec<_>, FeaError>>()?;

    bar.finish_and_clear();
    info!(
        "built {} element stiffness matrices",
        element_stiffness_matrices.len()
    );

    Ok(element_stiffness_matrices)
}

/// Compiles element stiffness matrices into a total stiffness matrix
///
/// # Arguments
/// * `mesh` - The mesh the matrices belong to
/// * `element_stiffness_matrices` - A slice of element stiffness matrices
///     that corresponds to `mesh.elements`
///
/// # Returns
/// A dense 2N x 2N matrix
pub fn assemble(mesh: &Mesh, element_stiffness_matrices: &[DMatrix<f64>]) -> DMatrix<f64> {
    let mut total_stiffness_matrix: DMatrix<f64> =
        DMatrix::zeros(mesh.dof_count(), mesh.dof_count());

    for (stiffness_mat, element) in element_stiffness_matrices.iter().zip(&mesh.elements) {
        for (local_row, node_row) in element.nodes.iter().enumerate() {
            for (local_col, node_col) in element.nodes.iter().enumerate() {
                let global_row = node_row * DOF;
                let global_col = node_col * DOF;
                let local_row = local_row * DOF;
                let local_col = local_col * DOF;

                // Add RowX ColX
                total_stiffness_matrix[(global_row, global_col)] +=
                    stiffness_mat[(local_row, local_col)];
                // Add RowX ColY
                total_stiffness_matrix[(global_row, global_col + 1)] +=
                    stiffness_mat[(local_row, local_col + 1)];
                // Add RowY ColX
                total_stiffness_matrix[(global_row + 1, global_col)] +=
                    stiffness_mat[(local_row + 1, local_col)];
                // Add RowY ColY
                total_stiffness_matrix[(global_row + 1, global_col + 1)] +=
                    stiffness_mat[(local_row + 1, local_col + 1)];
            }
        }
    }

    total_stiffness_matrix
}

/// Creates the global load vector from the nodal forces, in node order
pub fn build_load_vector(mesh: &Mesh) -> DVector<f64> {
    DVector::from_iterator(
        mesh.dof_count(),
        mesh.nodes.iter().flat_map(|node| node.force),
    )
}

/// Lists every constrained dof with its prescribed displacement
pub fn collect_constraints(mesh: &Mesh) -> Vec<(usize, f64)> {
    let mut constraints = Vec::new();
    for (i, node) in mesh.nodes.iter().enumerate() {
        for (axis, constraint) in node.constraint.iter().enumerate() {
            if let Some(value) = constraint {
                constraints.push((DOF * i + axis, *value));
            }
        }
    }
    constraints
}

/// Applies displacement constraints by row and column elimination
///
/// The prescribed value is moved to the right hand side before its column is
/// zeroed, so non-zero prescribed displacements are honoured. For zero values
/// this is plain elimination.
///
/// # Arguments
/// * `stiffness` - The total stiffness matrix, modified in place
/// * `loads` - The global load vector, modified in place
/// * `constraints` - Pairs of constrained dof and prescribed displacement
pub fn apply_constraints(
    stiffness: &mut DMatrix<f64>,
    loads: &mut DVector<f64>,
    constraints: &[(usize, f64)],
) {
    for &(dof, value) in constraints {
        if value != 0.0 {
            let column = stiffness.column(dof).clone_owned();
            loads.axpy(-value, &column, 1.0);
        }
    }

    for &(dof, value) in constraints {
        stiffness.row_mut(dof).fill(0.0);
        stiffness.column_mut(dof).fill(0.0);
        stiffness[(dof, dof)] = 1.0;
        loads[dof] = value;
    }
}

fn singular_system(mesh: &Mesh, dof: usize) -> FeaError {
    FeaError::SingularSystem {
        dof,
        node: mesh.nodes.get(dof / DOF).map_or(-1, |n| n.id),
        axis: if dof % DOF == 0 { 'x' } else { 'y' },
    }
}

/// Finds the dof that dominates the softest mode of a matrix that failed to
/// factorise
fn locate_singular_dof(stiffness: DMatrix<f64>) -> usize {
    let eigen = stiffness.symmetric_eigen();
    let softest = eigen.eigenvalues.iamin();
    eigen.eigenvectors.column(softest).iamax()
}

/// Solves the constrained system `K d = f` by Cholesky factorisation
///
/// # Arguments
/// * `mesh` - The mesh the system belongs to, used for error context
/// * `stiffness` - The constrained total stiffness matrix
/// * `loads` - The constrained load vector
///
/// # Returns
/// The displacement vector, or a singular system error naming the first dof
/// without stiffness
pub fn solve_system(
    mesh: &Mesh,
    stiffness: DMatrix<f64>,
    loads: &DVector<f64>,
) -> Result<DVector<f64>, FeaError> {
    let diagonal = stiffness.diagonal();

    let cholesky = match stiffness.clone().cholesky() {
        Some(c) => c,
        None => return Err(singular_system(mesh, locate_singular_dof(stiffness))),
    };

    let lower = cholesky.l_dirty();
    for (dof, &diag) in diagonal.iter().enumerate() {
        let pivot = lower[(dof, dof)].powi(2);
        if !(pivot > PIVOT_TOLERANCE * diag.abs()) {
            return Err(singular_system(mesh, dof));
        }
    }

    let displacements = cholesky.solve(loads);
    if let Some(dof) = displacements.iter().position(|d| !d.is_finite()) {
        return Err(singular_system(mesh, dof));
    }

    Ok(displacements)
}

/// Runs the solver on a mesh
///
/// # Arguments
/// * `mesh` - The mesh, with boundary conditions and loads applied
///
/// # Returns
/// The displacements, nodal forces and recovered nodal stresses
pub fn run(mesh: &Mesh) -> Result<AnalysisResults, FeaError> {
    let kernel = mesh.element_type.kernel();
    let stress_strain_mat = stress_strain_matrix(&mesh.material)?;

    info!(
        "analysing {} {} elements over {} nodes",
        mesh.elements.len(),
        mesh.element_type,
        mesh.nodes.len()
    );

    // Build element stiffness matrix for each element
    let element_stiffness_matrices =
        build_element_stiffness_matrices(mesh, kernel, &stress_strain_mat)?;

    // Compile matrices into total stiffness matrix
    let total_stiffness_matrix = assemble(mesh, &element_stiffness_matrices);
    info!(
        "assembled {n}x{n} total stiffness matrix",
        n = total_stiffness_matrix.nrows()
    );

    // Apply boundary conditions
    let mut constrained = total_stiffness_matrix.clone();
    let mut loads = build_load_vector(mesh);
    let constraints = collect_constraints(mesh);
    apply_constraints(&mut constrained, &mut loads, &constraints);
    debug!("applied {} displacement constraints", constraints.len());

    // Solve system
    let start = std::time::Instant::now();
    let displacements = solve_system(mesh, constrained, &loads)?;
    let elapsed = (std::time::Instant::now() - start).as_secs_f32();
    info!("solved system in {:.3} seconds", elapsed);

    let nodal_forces = &total_stiffness_matrix * &displacements;

    // Solve for stress
    let stresses = recover_stresses(mesh, kernel, &stress_strain_mat, &displacements)?;
    info!("recovered stresses at {} nodes", stresses.recorded_count());

    Ok(AnalysisResults {
        element_type: mesh.element_type,
        stiffness: total_stiffness_matrix,
        displacements,
        nodal_forces,
        stresses,
    })
}
