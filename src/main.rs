use clap::Parser;
use env_logger::Env;
use log::{error, info};

use quadfem::{error::FeaError, mesher, post_processor, solver};

/// Plane-stress finite element analysis of quadrilateral meshes
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The input model json
    input_json: String,

    /// Where to write the nodal results
    #[arg(short, long, default_value = "nodes.csv")]
    output: String,
}

fn analyse(args: &Args) -> Result<(), FeaError> {
    let mesh = mesher::load_model(&args.input_json)?;
    let results = solver::run(&mesh)?;

    let (ux, uy) = post_processor::extreme_displacements(&results.displacements);
    info!("max displacement: ux = {ux:e}, uy = {uy:e}");
    if let Some((index, von_mises)) = post_processor::max_von_mises(&results.stresses) {
        info!(
            "max von Mises stress: {von_mises:e} at node {}",
            mesh.nodes[index].id
        );
    }

    post_processor::csv_output(&mesh, &results, &args.output)
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Err(err) = analyse(&args) {
        error!("{err}");
        std::process::exit(1)
    }
}
