use clap::Args;
use markerwatch_core::Coordinate;

#[derive(Args)]
pub struct DistanceArgs {
    #[arg(allow_hyphen_values = true)]
    pub lat1: f64,
    #[arg(allow_hyphen_values = true)]
    pub lon1: f64,
    #[arg(allow_hyphen_values = true)]
    pub lat2: f64,
    #[arg(allow_hyphen_values = true)]
    pub lon2: f64,
}

pub fn run(args: DistanceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let from = Coordinate::checked(args.lat1, args.lon1)?;
    let to = Coordinate::checked(args.lat2, args.lon2)?;
    println!("{:.2}", from.distance_to(&to));
    Ok(())
}
