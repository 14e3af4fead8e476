// crates.io
use clap::Parser;
// self
use pilot_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	pilot_eval::run(args).await
}
