use clap::Parser;
use serde_json::Value;

use pilot_ask::Args;
use pilot_config::RetrievalConfig;
use pilot_domain::Candidate;
use pilot_service::Retriever;
use pilot_testkit::{ScriptedBackend, embedded_tables, terms};

fn parse(argv: &[&str]) -> Args {
	Args::try_parse_from(argv).expect("Arguments must parse.")
}

async fn sample_result() -> pilot_service::RetrievalResult {
	let backend = ScriptedBackend::returning(vec![
		Candidate::new("boundary", "Границы системы отделяют её от окружения.")
			.with_section("Основы")
			.with_prior(0.8),
	])
	.into_shared();
	let tables = embedded_tables().expect("Embedded tables must parse.");
	let retriever =
		Retriever::new(RetrievalConfig::default(), tables, backend).expect("Retriever must build.");

	retriever.search("границы системы", &[]).await.expect("Search must succeed.")
}

#[test]
fn joins_question_words_and_collects_hints_and_filters() {
	let args = parse(&[
		"pilot-ask",
		"-c",
		"pilot.toml",
		"--hint",
		"Холизм",
		"--hint",
		"  ",
		"--section",
		"Основы",
		"Что",
		"такое",
		"система?",
	]);
	let req = pilot_ask::build_request(&args);

	assert_eq!(req.query, "Что такое система?");
	assert_eq!(req.hints, terms(&["холизм"]));
	assert_eq!(req.filters.map(|filters| filters.sections), Some(vec!["Основы".to_string()]));
}

#[test]
fn omits_empty_filters() {
	let args = parse(&["pilot-ask", "--config", "pilot.toml", "система"]);

	assert!(pilot_ask::build_request(&args).filters.is_none());
	assert!(Args::try_parse_from(["pilot-ask", "-c", "pilot.toml"]).is_err());
}

#[tokio::test]
async fn renders_json_or_generation_context() {
	let result = sample_result().await;
	let rendered = pilot_ask::render(&result, None).expect("JSON must render.");
	let json: Value = serde_json::from_str(&rendered).expect("Output must be JSON.");

	assert_eq!(json["candidates"][0]["candidate"]["id"], "boundary");
	assert_eq!(json["fallback_fired"], false);
	assert_eq!(json["expanded_query"]["terms"][0]["origin"], "query");

	let context = pilot_ask::render(&result, Some(500)).expect("Context must render.");

	assert_eq!(context, "[Основы]\nГраницы системы отделяют её от окружения.");
}
