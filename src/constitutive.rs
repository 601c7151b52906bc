use nalgebra::{matrix, Matrix3};

use crate::{datatypes::Material, error::FeaError};

/// Calculates the plane-stress stress-strain matrix
///
/// # Arguments
/// * `material` - The isotropic material of the model
///
/// # Returns
/// A 3x3 stress-strain matrix, or an input error when the material constants
/// would make it degenerate
pub fn stress_strain_matrix(material: &Material) -> Result<Matrix3<f64>, FeaError> {
    let youngs_modulus = material.youngs_modulus;
    let poisson_ratio = material.poisson_ratio;

    if !youngs_modulus.is_finite() || youngs_modulus <= 0.0 {
        return Err(FeaError::Input(format!(
            "Material {} has non-positive Young's modulus {youngs_modulus}",
            material.id
        )));
    }
    if !poisson_ratio.is_finite() || poisson_ratio.abs() >= 1.0 {
        return Err(FeaError::Input(format!(
            "Material {} has Poisson ratio {poisson_ratio} outside of (-1, 1)",
            material.id
        )));
    }

    let mut stress_strain_mat: Matrix3<f64> = matrix![
        1.0, poisson_ratio, 0.0;
        poisson_ratio, 1.0, 0.0;
        0.0, 0.0, (1.0 - poisson_ratio) / 2.0;
    ];

    stress_strain_mat *= youngs_modulus / (1.0 - f64::powi(poisson_ratio, 2));

    Ok(stress_strain_mat)
}
