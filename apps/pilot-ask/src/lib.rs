use std::path::PathBuf;

use clap::Parser;

use pilot_domain::{SearchFilters, Term};
use pilot_service::{RetrievalResult, SearchRequest};

#[derive(Debug, Parser)]
#[command(
	version = pilot_cli::VERSION,
	rename_all = "kebab",
	styles = pilot_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Learner domain or interest that biases the search. Repeatable.
	#[arg(long = "hint", value_name = "TERM")]
	pub hints: Vec<String>,
	/// Restrict the backend to these sections. Repeatable.
	#[arg(long = "section", value_name = "NAME")]
	pub sections: Vec<String>,
	/// Restrict the backend to these topics. Repeatable.
	#[arg(long = "topic", value_name = "NAME")]
	pub topics: Vec<String>,
	/// Print the generation context, capped at this many characters, instead of JSON.
	#[arg(long, value_name = "CHARS")]
	pub context: Option<usize>,
	#[arg(required = true, num_args = 1.., value_name = "QUESTION")]
	pub question: Vec<String>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = pilot_config::load(&args.config)?;
	pilot_cli::init_tracing(&config)?;
	let retriever = pilot_cli::build_retriever(&config)?;
	let req = build_request(&args);
	let result = retriever.search_with(&req).await?;
	if result.is_empty() {
		tracing::info!(trace_id = %result.trace_id, "No relevant material found.");
	}
	println!("{}", render(&result, args.context)?);
	Ok(())
}

pub fn build_request(args: &Args) -> SearchRequest {
	let hints = args.hints.iter().filter_map(|raw| Term::new(raw)).collect();
	let filters = SearchFilters { sections: args.sections.clone(), topics: args.topics.clone() };
	let req = SearchRequest::new(args.question.join(" ")).with_hints(hints);

	if filters.is_empty() { req } else { req.with_filters(filters) }
}

pub fn render(result: &RetrievalResult, context: Option<usize>) -> color_eyre::Result<String> {
	match context {
		Some(max_chars) => Ok(pilot_service::build_generation_context(result, max_chars)),
		None => Ok(serde_json::to_string_pretty(result)?),
	}
}
