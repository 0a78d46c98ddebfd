use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = keel_api::Args::parse();
	keel_api::run(args).await
}
