use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = pilot_ask::Args::parse();
	pilot_ask::run(args).await
}
