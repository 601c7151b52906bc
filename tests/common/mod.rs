#![allow(dead_code)]

use quadfem::{datatypes::Mesh, mesher::parse_model};

/// A 2 x 2 grid of quadrilaterals over the square [0, 2] x [0, 2].
///
/// `x_line` and `y_line` place the interior grid lines and `centre` the
/// interior node, so the grid can be made of non-uniform rectangles or of
/// distorted quadrilaterals.
pub fn two_by_two_grid(element_type: &str, x_line: f64, y_line: f64, centre: (f64, f64)) -> Mesh {
    let xs = [0.0, x_line, 2.0];
    let ys = [0.0, y_line, 2.0];

    let mut nodes = Vec::new();
    for (j, y) in ys.iter().enumerate() {
        for (i, x) in xs.iter().enumerate() {
            let id = 3 * j + i;
            let (x, y) = if id == 4 { centre } else { (*x, *y) };
            nodes.push(format!(r#"{{"id": {id}, "x": {x}, "y": {y}}}"#));
        }
    }

    let input = format!(
        r#"{{
            "materials": [{{"id": 0, "name": "patch", "E": 1000, "nu": 0.3}}],
            "sections": [{{"id": 0, "thickness": 1}}],
            "nodes": [{nodes}],
            "elements": [
                {{"id": 0, "section_id": 0, "nodes": [0, 1, 4, 3]}},
                {{"id": 1, "section_id": 0, "nodes": [1, 2, 5, 4]}},
                {{"id": 2, "section_id": 0, "nodes": [3, 4, 7, 6]}},
                {{"id": 3, "section_id": 0, "nodes": [4, 5, 8, 7]}}
            ],
            "analysis_settings": [{{"element_type": "{element_type}"}}]
        }}"#,
        nodes = nodes.join(", ")
    );

    parse_model(&input).unwrap()
}

/// A cantilever of `nx` by `ny` elements over [0, length] x [0, height],
/// fully fixed at x = 0 and carrying a total downward shear `load` at the
/// free end, lumped consistently over the end nodes.
pub fn cantilever(element_type: &str, length: f64, height: f64, nx: usize, ny: usize, load: f64) -> Mesh {
    let id = |i: usize, j: usize| j * (nx + 1) + i;

    let mut nodes = Vec::new();
    let mut constraints = Vec::new();
    let mut loads = Vec::new();
    for j in 0..=ny {
        for i in 0..=nx {
            let x = length * i as f64 / nx as f64;
            let y = height * j as f64 / ny as f64;
            nodes.push(format!(r#"{{"id": {}, "x": {x}, "y": {y}}}"#, id(i, j)));
        }
        constraints.push(format!(r#"{{"node": {}, "type": [0.0, 0.0]}}"#, id(0, j)));

        let share = if j == 0 || j == ny { 0.5 } else { 1.0 };
        let fy = -load * share / ny as f64;
        loads.push(format!(r#"{{"node": {}, "value": [0.0, {fy}]}}"#, id(nx, j)));
    }

    let mut elements = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            elements.push(format!(
                r#"{{"id": {}, "section_id": 0, "nodes": [{}, {}, {}, {}]}}"#,
                j * nx + i,
                id(i, j),
                id(i + 1, j),
                id(i + 1, j + 1),
                id(i, j + 1)
            ));
        }
    }

    let input = format!(
        r#"{{
            "materials": [{{"id": 0, "name": "steel", "E": 200000, "nu": 0.3}}],
            "sections": [{{"id": 0, "thickness": 1}}],
            "nodes": [{}],
            "elements": [{}],
            "boundary_conditions": [{}],
            "loads": [{}],
            "analysis_settings": [{{"element_type": "{element_type}"}}]
        }}"#,
        nodes.join(", "),
        elements.join(", "),
        constraints.join(", "),
        loads.join(", ")
    );

    parse_model(&input).unwrap()
}
