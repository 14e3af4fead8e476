use std::sync::Arc;

use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects},
};
use tracing_subscriber::EnvFilter;

use pilot_config::Config;
use pilot_domain::TermTables;
use pilot_service::{DefaultBackend, Retriever};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.literal(AnsiColor::Blue.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
}

/// Installs the global subscriber. An unparsable `service.log_level` falls back to `info`.
pub fn init_tracing(config: &Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.try_init()
		.map_err(|err| color_eyre::eyre::eyre!("Failed to install tracing subscriber: {err}"))?;

	Ok(())
}

/// Term tables from `[terms] path`, or the embedded tables when no path is configured.
pub fn load_term_tables(config: &Config) -> color_eyre::Result<Arc<TermTables>> {
	let tables = match config.terms.as_ref().and_then(|terms| terms.path.as_deref()) {
		Some(path) => TermTables::load(path)?,
		None => TermTables::embedded()?,
	};

	tracing::info!(
		synonyms = tables.synonym_entries(),
		related = tables.related_entries(),
		"Term tables loaded."
	);

	Ok(Arc::new(tables))
}

/// The process-wide retriever: built once at startup and shared with every caller.
pub fn build_retriever(config: &Config) -> color_eyre::Result<Arc<Retriever>> {
	let tables = load_term_tables(config)?;
	let backend = Arc::new(DefaultBackend::new(&config.backend)?);
	let retriever = Retriever::new(config.retrieval.clone(), tables, backend)?;

	Ok(Arc::new(retriever))
}
