use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = xqgen::Args::parse();

	xqgen::run(args).await
}
