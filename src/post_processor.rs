use std::io::{BufWriter, Write};

use log::info;
use nalgebra::DVector;

use crate::{
    datatypes::{Mesh, DOF},
    error::FeaError,
    solver::AnalysisResults,
    stress::StressField,
};

/// Finds the largest displacement magnitude along each axis
///
/// # Arguments
/// * `displacements` - The global displacement vector
///
/// # Returns
/// (ux, uy), each the entry of largest magnitude for its axis, sign kept
pub fn extreme_displacements(displacements: &DVector<f64>) -> (f64, f64) {
    let extreme = |axis: usize| {
        displacements
            .iter()
            .skip(axis)
            .step_by(DOF)
            .fold(0.0_f64, |best, &u| if u.abs() > best.abs() { u } else { best })
    };

    (extreme(0), extreme(1))
}

/// The largest von Mises stress over all recorded nodes, with its arena index
pub fn max_von_mises(stresses: &StressField) -> Option<(usize, f64)> {
    stresses
        .iter()
        .map(|(i, s)| (i, s.von_mises))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

fn write_failed(path: &str, err: std::io::Error) -> FeaError {
    FeaError::Output(format!("Failed to write {path}: {err}"))
}

/// Writes the per-node results to a CSV file
///
/// # Arguments
/// * `mesh` - The analysed mesh
/// * `results` - The results of the analysis of `mesh`
/// * `nodes_output` - The filename of the output nodes csv
pub fn csv_output(
    mesh: &Mesh,
    results: &AnalysisResults,
    nodes_output: &str,
) -> Result<(), FeaError> {
    let nodes_file = match std::fs::File::create(nodes_output) {
        Ok(f) => f,
        Err(err) => {
            return Err(FeaError::Output(format!(
                "Failed to create {nodes_output}: {err}"
            )));
        }
    };
    let mut writer = BufWriter::new(nodes_file);

    writeln!(writer, "id,x,y,ux,uy,fx,fy,sx,sy,txy,von_mises")
        .map_err(|err| write_failed(nodes_output, err))?;

    for (index, node) in mesh.nodes.iter().enumerate() {
        let [ux, uy] = results.displacement(index);
        let [fx, fy] = results.nodal_force(index);
        let stress = match results.stresses.get(index) {
            Some(s) => format!("{},{},{},{}", s.sx, s.sy, s.txy, s.von_mises),
            None => ",,,".to_owned(),
        };

        writeln!(
            writer,
            "{id},{x},{y},{ux},{uy},{fx},{fy},{stress}",
            id = node.id,
            x = node.vertex.x,
            y = node.vertex.y,
        )
        .map_err(|err| write_failed(nodes_output, err))?;
    }

    writer.flush().map_err(|err| write_failed(nodes_output, err))?;
    info!("wrote output to {nodes_output}");

    Ok(())
}
