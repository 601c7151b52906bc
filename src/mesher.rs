use std::collections::{BTreeMap, HashMap};

use json::JsonValue;
use log::{debug, info};

use crate::{
    constitutive::stress_strain_matrix,
    datatypes::{Element, ElementType, Material, Mesh, Node, Section},
    error::FeaError,
};

const REQUIRED_FIELDS: [&str; 5] = [
    "materials",
    "sections",
    "nodes",
    "elements",
    "analysis_settings",
];

/// An element as listed in the input file, before node ids are resolved
struct RawElement {
    id: i64,
    section: Section,
    node_ids: Vec<i64>,
}

fn required_f64(value: &JsonValue, field: &str, context: &str) -> Result<f64, FeaError> {
    value[field].as_f64().ok_or_else(|| {
        FeaError::Input(format!("{context} is missing numeric field '{field}'"))
    })
}

fn required_i64(value: &JsonValue, field: &str, context: &str) -> Result<i64, FeaError> {
    value[field].as_i64().ok_or_else(|| {
        FeaError::Input(format!("{context} is missing integer field '{field}'"))
    })
}

/// Reads an `[x, y]` pair where each entry is a number or null
fn optional_pair(value: &JsonValue, context: &str) -> Result<[Option<f64>; 2], FeaError> {
    if !value.is_array() || value.len() != 2 {
        return Err(FeaError::Input(format!(
            "{context} must be a two element array"
        )));
    }

    let mut pair = [None, None];
    for (axis, entry) in value.members().enumerate() {
        if entry.is_null() {
            continue;
        }
        pair[axis] = Some(entry.as_f64().ok_or_else(|| {
            FeaError::Input(format!("{context} has a non-numeric entry {entry}"))
        })?);
    }
    Ok(pair)
}

/// Parses the input json into a JsonValue object
///
/// # Arguments
/// * `contents` - The input file contents
///
/// # Returns
/// A JsonValue object with every required top level array present
fn load_input_json(contents: &str) -> Result<JsonValue, FeaError> {
    let input_json = match json::parse(contents) {
        Ok(f) => f,
        Err(err) => {
            return Err(FeaError::Input(format!(
                "Error in input file json: {err}"
            )))
        }
    };

    for field in REQUIRED_FIELDS {
        if !input_json[field].is_array() {
            return Err(FeaError::Input(format!(
                "Input json missing {field} array"
            )));
        }
    }

    Ok(input_json)
}

fn parse_materials(input_json: &JsonValue) -> Result<Vec<Material>, FeaError> {
    let mut materials: Vec<Material> = Vec::new();

    for material_json in input_json["materials"].members() {
        let id = required_i64(material_json, "id", "Material")?;
        let context = format!("Material {id}");
        if materials.iter().any(|m| m.id == id) {
            return Err(FeaError::Input(format!("Duplicate material id {id}")));
        }

        let material = Material {
            id,
            name: material_json["name"].as_str().unwrap_or_default().to_owned(),
            youngs_modulus: required_f64(material_json, "E", &context)?,
            poisson_ratio: required_f64(material_json, "nu", &context)?,
        };
        // reject constants that cannot form a stress-strain matrix
        stress_strain_matrix(&material)?;
        materials.push(material);
    }

    Ok(materials)
}

fn parse_sections(input_json: &JsonValue) -> Result<HashMap<i64, Section>, FeaError> {
    let mut sections = HashMap::new();

    for section_json in input_json["sections"].members() {
        let id = required_i64(section_json, "id", "Section")?;
        let thickness = required_f64(section_json, "thickness", &format!("Section {id}"))?;

        if !(thickness > 0.0) || !thickness.is_finite() {
            return Err(FeaError::Input(format!(
                "Section {id} has non-positive thickness {thickness}"
            )));
        }
        if sections.insert(id, Section { id, thickness }).is_some() {
            return Err(FeaError::Input(format!("Duplicate section id {id}")));
        }
    }

    Ok(sections)
}

fn parse_nodes(input_json: &JsonValue) -> Result<BTreeMap<i64, Node>, FeaError> {
    let mut nodes = BTreeMap::new();

    for node_json in input_json["nodes"].members() {
        let id = required_i64(node_json, "id", "Node")?;
        let context = format!("Node {id}");
        let node = Node::new(
            id,
            required_f64(node_json, "x", &context)?,
            required_f64(node_json, "y", &context)?,
        );

        if nodes.insert(id, node).is_some() {
            return Err(FeaError::Input(format!("Duplicate node id {id}")));
        }
    }

    if nodes.is_empty() {
        return Err(FeaError::Input("Input json has no nodes".to_owned()));
    }

    Ok(nodes)
}

fn parse_elements(
    input_json: &JsonValue,
    sections: &HashMap<i64, Section>,
    nodes: &BTreeMap<i64, Node>,
    element_type: ElementType,
) -> Result<Vec<RawElement>, FeaError> {
    let mut elements: Vec<RawElement> = Vec::new();

    for element_json in input_json["elements"].members() {
        let id = required_i64(element_json, "id", "Element")?;
        if elements.iter().any(|e| e.id == id) {
            return Err(FeaError::Input(format!("Duplicate element id {id}")));
        }

        let section_id = required_i64(element_json, "section_id", &format!("Element {id}"))?;
        let section = *sections.get(&section_id).ok_or_else(|| {
            FeaError::Input(format!(
                "Element {id} references missing section {section_id}"
            ))
        })?;

        let mut node_ids = Vec::new();
        for node_json in element_json["nodes"].members() {
            let node_id = node_json.as_i64().ok_or_else(|| {
                FeaError::Input(format!("Element {id} has a non-integer node id"))
            })?;
            if !nodes.contains_key(&node_id) {
                return Err(FeaError::Input(format!(
                    "Element {id} references missing node {node_id}"
                )));
            }
            node_ids.push(node_id);
        }

        let accepted = match element_type {
            ElementType::Quad8 => node_ids.len() == 4 || node_ids.len() == 8,
            _ => node_ids.len() == 4,
        };
        if !accepted {
            return Err(FeaError::Input(format!(
                "Element {id} has {} nodes, which is invalid for {element_type}",
                node_ids.len()
            )));
        }

        elements.push(RawElement {
            id,
            section,
            node_ids,
        });
    }

    if elements.is_empty() {
        return Err(FeaError::Input("Input json has no elements".to_owned()));
    }

    Ok(elements)
}

/// Applies boundary conditions to the nodes from the input json
///
/// # Arguments
/// * `input_json` - The input file as a JsonValue object
/// * `nodes` - A mutable reference to the nodes, keyed by id
fn apply_boundary_conditions(
    input_json: &JsonValue,
    nodes: &mut BTreeMap<i64, Node>,
) -> Result<(), FeaError> {
    for bc_json in input_json["boundary_conditions"].members() {
        let node_id = required_i64(bc_json, "node", "Boundary condition")?;
        let context = format!("Boundary condition on node {node_id}");
        let node = nodes
            .get_mut(&node_id)
            .ok_or_else(|| FeaError::Input(format!("{context} references a missing node")))?;

        node.constraint = optional_pair(&bc_json["type"], &context)?;
    }

    Ok(())
}

/// Applies nodal loads to the nodes from the input json
fn apply_loads(input_json: &JsonValue, nodes: &mut BTreeMap<i64, Node>) -> Result<(), FeaError> {
    for load_json in input_json["loads"].members() {
        let node_id = required_i64(load_json, "node", "Load")?;
        let context = format!("Load on node {node_id}");
        let node = nodes
            .get_mut(&node_id)
            .ok_or_else(|| FeaError::Input(format!("{context} references a missing node")))?;

        let [fx, fy] = optional_pair(&load_json["value"], &context)?;
        node.force = [fx.unwrap_or(0.0), fy.unwrap_or(0.0)];
    }

    Ok(())
}

/// Reads the element type and the mesh-wide material from analysis_settings
fn parse_analysis_settings(
    input_json: &JsonValue,
    materials: &[Material],
) -> Result<(ElementType, Material), FeaError> {
    let settings = &input_json["analysis_settings"][0];
    if !settings.is_object() {
        return Err(FeaError::Input(
            "Input json analysis_settings must contain one settings object".to_owned(),
        ));
    }

    let element_type = settings["element_type"]
        .as_str()
        .ok_or_else(|| {
            FeaError::Input("Input json analysis_settings missing element_type".to_owned())
        })?
        .parse::<ElementType>()?;

    let material = match settings["material_id"].as_i64() {
        Some(material_id) => materials.iter().find(|m| m.id == material_id).ok_or_else(|| {
            FeaError::Input(format!(
                "analysis_settings references missing material {material_id}"
            ))
        })?,
        None => materials
            .first()
            .ok_or_else(|| FeaError::Input("Input json has no materials".to_owned()))?,
    };

    Ok((element_type, material.clone()))
}

/// Adds a mid-side node to every edge of the 4-node elements. Neighbouring
/// elements share the node on their common edge, including mid-side nodes
/// listed by 8-node elements of the same model.
///
/// # Arguments
/// * `elements` - The raw elements, extended in place to 8 nodes
/// * `nodes` - The nodes keyed by id; generated nodes are inserted
///
/// # Returns
/// The number of nodes created
fn generate_mid_nodes(elements: &mut [RawElement], nodes: &mut BTreeMap<i64, Node>) -> usize {
    let mut edge_nodes: HashMap<(i64, i64), i64> = HashMap::new();
    let mut next_node_id = nodes.keys().next_back().map_or(0, |id| id + 1);
    let mut created = 0;

    // elements listed with 8 nodes already own the mid-side nodes of their edges
    for element in elements.iter().filter(|e| e.node_ids.len() == 8) {
        for i in 0..4 {
            let (a, b) = (element.node_ids[i], element.node_ids[(i + 1) % 4]);
            edge_nodes
                .entry((a.min(b), a.max(b)))
                .or_insert(element.node_ids[4 + i]);
        }
    }

    for element in elements.iter_mut().filter(|e| e.node_ids.len() == 4) {
        let corners = [
            element.node_ids[0],
            element.node_ids[1],
            element.node_ids[2],
            element.node_ids[3],
        ];

        for i in 0..4 {
            let (a, b) = (corners[i], corners[(i + 1) % 4]);
            let key = (a.min(b), a.max(b));

            let mid_id = match edge_nodes.get(&key) {
                Some(&id) => id,
                None => {
                    let (va, vb) = (nodes[&a].vertex, nodes[&b].vertex);
                    let id = next_node_id;
                    next_node_id += 1;
                    nodes.insert(id, Node::new(id, (va.x + vb.x) / 2.0, (va.y + vb.y) / 2.0));
                    edge_nodes.insert(key, id);
                    created += 1;
                    id
                }
            };
            element.node_ids.push(mid_id);
        }
    }

    created
}

/// Builds a mesh from the contents of an input file
///
/// # Arguments
/// * `contents` - The input json document
///
/// # Returns
/// A mesh with boundary conditions and loads applied, ready for the solver
pub fn parse_model(contents: &str) -> Result<Mesh, FeaError> {
    let input_json = load_input_json(contents)?;

    let materials = parse_materials(&input_json)?;
    let sections = parse_sections(&input_json)?;
    let (element_type, material) = parse_analysis_settings(&input_json, &materials)?;

    let mut nodes = parse_nodes(&input_json)?;
    let mut raw_elements = parse_elements(&input_json, &sections, &nodes, element_type)?;
    apply_boundary_conditions(&input_json, &mut nodes)?;
    apply_loads(&input_json, &mut nodes)?;

    if element_type == ElementType::Quad8 {
        let created = generate_mid_nodes(&mut raw_elements, &mut nodes);
        debug!("generated {created} mid-side nodes");
    }

    // BTreeMap iteration keeps the arena sorted by node id
    let node_arena: Vec<Node> = nodes.into_values().collect();
    let index_of: HashMap<i64, usize> = node_arena
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id, i))
        .collect();

    let elements = raw_elements
        .into_iter()
        .map(|raw| {
            let indices = raw.node_ids.iter().map(|id| index_of[id]).collect();
            Element::new(raw.id, indices, raw.section, &node_arena)
        })
        .collect::<Result<Vec<_>, FeaError>>()?;

    Ok(Mesh {
        nodes: node_arena,
        elements,
        material,
        element_type,
    })
}

/// Loads a mesh from an input file
///
/// # Arguments
/// * `input_file` - The path to the input json
pub fn load_model(input_file: &str) -> Result<Mesh, FeaError> {
    let contents = match std::fs::read_to_string(input_file) {
        Ok(f) => f,
        Err(err) => {
            return Err(FeaError::Input(format!(
                "Unable to open input file {input_file}: {err}"
            )))
        }
    };

    let mesh = parse_model(&contents)?;
    info!(
        "loaded {} nodes and {} {} elements from {input_file}",
        mesh.nodes.len(),
        mesh.elements.len(),
        mesh.element_type
    );

    Ok(mesh)
}
