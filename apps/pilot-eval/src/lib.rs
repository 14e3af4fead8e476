use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use pilot_config::Config;
use pilot_domain::{SearchFilters, Term};
use pilot_service::{Retriever, SearchRequest};

#[derive(Debug, Parser)]
#[command(
	version = pilot_cli::VERSION,
	rename_all = "kebab",
	styles = pilot_cli::styles(),
)]
pub struct Args {
	#[arg(long = "config-a", short = 'c', value_name = "FILE", visible_alias = "config")]
	pub config_a: PathBuf,
	/// Second configuration to compare against the first.
	#[arg(long = "config-b", value_name = "FILE")]
	pub config_b: Option<PathBuf>,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	#[serde(default)]
	defaults: EvalDefaults,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Default, Deserialize, Clone)]
struct EvalDefaults {
	#[serde(default)]
	hints: Vec<String>,
	#[serde(default)]
	sections: Vec<String>,
	#[serde(default)]
	topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	query: String,
	hints: Option<Vec<String>>,
	sections: Option<Vec<String>>,
	topics: Option<Vec<String>>,
	expected_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: EvalDatasetInfo,
	settings: EvalSettings,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
struct EvalDatasetInfo {
	name: String,
	query_count: usize,
	generated_at: String,
}

#[derive(Debug, Serialize)]
struct EvalSettings {
	config_path: String,
	max_results: u32,
	fallback_max_results: u32,
	min_relevance_threshold: f32,
	fallback_enabled: bool,
}

/// Ranking quality of one retrieved list, or its mean over a dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
struct RankQuality {
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
}
impl RankQuality {
	/// Scores `retrieved` against the expected ids and returns the quality with the hit count.
	fn measure(retrieved: &[String], expected: &HashSet<String>) -> (Self, usize) {
		let hit_ranks: Vec<usize> = retrieved
			.iter()
			.enumerate()
			.filter(|(_, id)| expected.contains(*id))
			.map(|(idx, _)| idx + 1)
			.collect();
		let dcg: f64 = hit_ranks.iter().copied().map(discount).sum();
		let idcg: f64 = (1..=expected.len().min(retrieved.len())).map(discount).sum();
		let quality = Self {
			recall_at_k: ratio(hit_ranks.len(), expected.len()),
			precision_at_k: ratio(hit_ranks.len(), retrieved.len()),
			rr: hit_ranks.first().map_or(0.0, |rank| 1.0 / *rank as f64),
			ndcg: if idcg > 0.0 { dcg / idcg } else { 0.0 },
		};

		(quality, hit_ranks.len())
	}

	fn mean<'a>(items: impl ExactSizeIterator<Item = &'a Self>) -> Self {
		let count = items.len().max(1) as f64;
		let total = items.fold(Self::default(), |acc, item| Self {
			recall_at_k: acc.recall_at_k + item.recall_at_k,
			precision_at_k: acc.precision_at_k + item.precision_at_k,
			rr: acc.rr + item.rr,
			ndcg: acc.ndcg + item.ndcg,
		});

		Self {
			recall_at_k: total.recall_at_k / count,
			precision_at_k: total.precision_at_k / count,
			rr: total.rr / count,
			ndcg: total.ndcg / count,
		}
	}

	fn minus(self, base: Self) -> Self {
		Self {
			recall_at_k: self.recall_at_k - base.recall_at_k,
			precision_at_k: self.precision_at_k - base.precision_at_k,
			rr: self.rr - base.rr,
			ndcg: self.ndcg - base.ndcg,
		}
	}
}

#[derive(Debug, Serialize)]
struct EvalSummary {
	#[serde(flatten)]
	quality: RankQuality,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
	fallback_rate: f64,
}
impl EvalSummary {
	fn from_reports(reports: &[QueryReport]) -> Self {
		let mut latencies: Vec<f64> = reports.iter().map(|report| report.latency_ms).collect();
		let fallbacks = reports.iter().filter(|report| report.fallback_fired).count();

		latencies.sort_by(f64::total_cmp);

		Self {
			quality: RankQuality::mean(reports.iter().map(|report| &report.quality)),
			latency_ms_p50: percentile(&latencies, 0.50),
			latency_ms_p95: percentile(&latencies, 0.95),
			fallback_rate: ratio(fallbacks, reports.len()),
		}
	}

	/// Field-wise `self - base`.
	fn delta_from(&self, base: &Self) -> Self {
		Self {
			quality: self.quality.minus(base.quality),
			latency_ms_p50: self.latency_ms_p50 - base.latency_ms_p50,
			latency_ms_p95: self.latency_ms_p95 - base.latency_ms_p95,
			fallback_rate: self.fallback_rate - base.fallback_rate,
		}
	}
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	query: String,
	trace_id: Uuid,
	expected_count: usize,
	retrieved_count: usize,
	relevant_count: usize,
	#[serde(flatten)]
	quality: RankQuality,
	latency_ms: f64,
	fallback_fired: bool,
	backend_fetches: u32,
	expected_ids: Vec<String>,
	retrieved_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CompareOutput {
	dataset: EvalDatasetInfo,
	settings_a: EvalSettings,
	settings_b: EvalSettings,
	summary_a: EvalSummary,
	summary_b: EvalSummary,
	/// `summary_b - summary_a`.
	summary_delta: EvalSummary,
	queries: Vec<CompareQueryReport>,
}

#[derive(Debug, Serialize)]
struct CompareQueryReport {
	id: String,
	query: String,
	quality_delta: RankQuality,
	retrieved_ids_a: Vec<String>,
	retrieved_ids_b: Vec<String>,
}

struct MergedQuery {
	id: String,
	expected_ids: Vec<String>,
	request: SearchRequest,
}

struct EvalRun {
	dataset: EvalDatasetInfo,
	settings: EvalSettings,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config_a = pilot_config::load(&args.config_a)?;

	pilot_cli::init_tracing(&config_a)?;

	let dataset = load_dataset(&args.dataset)?;
	let run_a = eval_config(&args.config_a, &config_a, &dataset).await?;

	if let Some(config_b_path) = &args.config_b {
		let config_b = pilot_config::load(config_b_path)?;
		let run_b = eval_config(config_b_path, &config_b, &dataset).await?;
		let queries = build_compare_queries(&run_a.queries, &run_b.queries);
		let summary_delta = run_b.summary.delta_from(&run_a.summary);
		let output = CompareOutput {
			dataset: run_a.dataset,
			settings_a: run_a.settings,
			settings_b: run_b.settings,
			summary_a: run_a.summary,
			summary_b: run_b.summary,
			summary_delta,
			queries,
		};
		let json = serde_json::to_string_pretty(&output)?;

		println!("{json}");

		return Ok(());
	}

	let output = EvalOutput {
		dataset: run_a.dataset,
		settings: run_a.settings,
		summary: run_a.summary,
		queries: run_a.queries,
	};
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

async fn eval_config(
	config_path: &Path,
	config: &Config,
	dataset: &EvalDataset,
) -> color_eyre::Result<EvalRun> {
	let retriever = pilot_cli::build_retriever(config)?;
	let mut reports = Vec::with_capacity(dataset.queries.len());

	for (index, query) in dataset.queries.iter().enumerate() {
		let merged = merge_query(&dataset.defaults, query, index)?;

		reports.push(run_query(&retriever, merged).await?);
	}

	let summary = EvalSummary::from_reports(&reports);
	let cfg = &config.retrieval;

	tracing::info!(
		config = %config_path.display(),
		queries = reports.len(),
		mean_ndcg = summary.quality.ndcg,
		fallback_rate = summary.fallback_rate,
		"Evaluation finished."
	);

	Ok(EvalRun {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "unnamed".to_string()),
			query_count: dataset.queries.len(),
			generated_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
		},
		settings: EvalSettings {
			config_path: config_path.display().to_string(),
			max_results: cfg.max_results,
			fallback_max_results: cfg.fallback_max_results,
			min_relevance_threshold: cfg.min_relevance_threshold,
			fallback_enabled: cfg.fallback_enabled,
		},
		summary,
		queries: reports,
	})
}

async fn run_query(retriever: &Retriever, merged: MergedQuery) -> color_eyre::Result<QueryReport> {
	let start = Instant::now();
	let result = retriever.search_with(&merged.request).await?;
	let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;
	let retrieved_ids =
		unique_ids(result.candidates.iter().map(|item| item.candidate.id.clone()));
	let expected: HashSet<String> = merged.expected_ids.iter().cloned().collect();
	let (quality, relevant_count) = RankQuality::measure(&retrieved_ids, &expected);

	Ok(QueryReport {
		id: merged.id,
		query: merged.request.query,
		trace_id: result.trace_id,
		expected_count: expected.len(),
		retrieved_count: retrieved_ids.len(),
		relevant_count,
		quality,
		latency_ms,
		fallback_fired: result.fallback_fired,
		backend_fetches: result.backend_fetches,
		expected_ids: merged.expected_ids,
		retrieved_ids,
	})
}

fn merge_query(
	defaults: &EvalDefaults,
	query: &EvalQuery,
	index: usize,
) -> color_eyre::Result<MergedQuery> {
	if query.expected_ids.is_empty() {
		return Err(eyre::eyre!("Query at index {index} must include at least one expected_id."));
	}

	let hints = query
		.hints
		.as_ref()
		.unwrap_or(&defaults.hints)
		.iter()
		.filter_map(|raw| Term::new(raw))
		.collect();
	let filters = SearchFilters {
		sections: query.sections.clone().unwrap_or_else(|| defaults.sections.clone()),
		topics: query.topics.clone().unwrap_or_else(|| defaults.topics.clone()),
	};
	let mut request = SearchRequest::new(query.query.clone()).with_hints(hints);

	if !filters.is_empty() {
		request = request.with_filters(filters);
	}

	let id = query.id.clone().unwrap_or_else(|| format!("query-{index}"));

	Ok(MergedQuery { id, expected_ids: query.expected_ids.clone(), request })
}

fn build_compare_queries(a: &[QueryReport], b: &[QueryReport]) -> Vec<CompareQueryReport> {
	a.iter()
		.zip(b)
		.map(|(a, b)| CompareQueryReport {
			id: a.id.clone(),
			query: a.query.clone(),
			quality_delta: b.quality.minus(a.quality),
			retrieved_ids_a: a.retrieved_ids.clone(),
			retrieved_ids_b: b.retrieved_ids.clone(),
		})
		.collect()
}

/// Order-preserving de-duplication of fragment ids.
fn unique_ids<I>(iter: I) -> Vec<String>
where
	I: Iterator<Item = String>,
{
	let mut seen = HashSet::new();

	iter.filter(|id| seen.insert(id.clone())).collect()
}

fn discount(rank: usize) -> f64 {
	1.0 / (rank as f64 + 1.0).log2()
}

fn ratio(part: usize, whole: usize) -> f64 {
	if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

/// Linear interpolation between closest ranks of an ascending slice.
fn percentile(sorted: &[f64], quantile: f64) -> f64 {
	let Some(last) = sorted.len().checked_sub(1) else {
		return 0.0;
	};
	let pos = quantile.clamp(0.0, 1.0) * last as f64;
	let lower = pos.floor() as usize;
	let upper = (lower + 1).min(last);

	sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ids(raw: &[&str]) -> Vec<String> {
		raw.iter().map(|id| id.to_string()).collect()
	}

	fn report(id: &str, recall_at_k: f64, fallback_fired: bool, latency_ms: f64) -> QueryReport {
		QueryReport {
			id: id.to_string(),
			query: "система".to_string(),
			trace_id: Uuid::nil(),
			expected_count: 1,
			retrieved_count: 1,
			relevant_count: 1,
			quality: RankQuality { recall_at_k, precision_at_k: 1.0, rr: 1.0, ndcg: 1.0 },
			latency_ms,
			fallback_fired,
			backend_fetches: if fallback_fired { 2 } else { 1 },
			expected_ids: ids(&["a"]),
			retrieved_ids: ids(&["a"]),
		}
	}

	#[test]
	fn metrics_reward_early_hits() {
		let expected: HashSet<String> = ids(&["a", "c"]).into_iter().collect();
		let (quality, hits) = RankQuality::measure(&ids(&["b", "a", "c"]), &expected);

		assert_eq!(hits, 2);
		assert!((quality.recall_at_k - 1.0).abs() < 1e-12);
		assert!((quality.precision_at_k - 2.0 / 3.0).abs() < 1e-12);
		assert!((quality.rr - 0.5).abs() < 1e-12);

		let dcg = 1.0 / 3.0_f64.log2() + 1.0 / 4.0_f64.log2();
		let idcg = 1.0 + 1.0 / 3.0_f64.log2();

		assert!((quality.ndcg - dcg / idcg).abs() < 1e-12);
	}

	#[test]
	fn empty_retrieval_scores_zero() {
		let expected: HashSet<String> = ids(&["a"]).into_iter().collect();
		let (quality, hits) = RankQuality::measure(&[], &expected);

		assert_eq!(hits, 0);
		assert_eq!(quality, RankQuality::default());
	}

	#[test]
	fn percentile_interpolates_between_ranks() {
		let values = [10.0, 20.0, 30.0, 40.0];

		assert_eq!(percentile(&values, 0.0), 10.0);
		assert_eq!(percentile(&values, 1.0), 40.0);
		assert!((percentile(&values, 0.5) - 25.0).abs() < 1e-12);
		assert_eq!(percentile(&[], 0.5), 0.0);
	}

	#[test]
	fn summary_reports_fallback_rate() {
		let reports = vec![report("q1", 1.0, true, 3.0), report("q2", 0.0, false, 1.0)];
		let summary = EvalSummary::from_reports(&reports);

		assert!((summary.fallback_rate - 0.5).abs() < 1e-12);
		assert!((summary.quality.recall_at_k - 0.5).abs() < 1e-12);
		assert!((summary.latency_ms_p50 - 2.0).abs() < 1e-12);
	}

	#[test]
	fn query_fields_override_dataset_defaults() {
		let defaults = EvalDefaults {
			hints: vec!["холизм".to_string()],
			sections: vec!["Основы".to_string()],
			topics: Vec::new(),
		};
		let query = EvalQuery {
			id: None,
			query: "Что такое система?".to_string(),
			hints: Some(vec!["Эмерджентность".to_string()]),
			sections: None,
			topics: None,
			expected_ids: ids(&["system"]),
		};
		let merged = merge_query(&defaults, &query, 3).expect("Query must merge.");

		assert_eq!(merged.id, "query-3");
		assert_eq!(merged.request.hints, vec![Term::new("эмерджентность").expect("Valid term.")]);
		assert_eq!(
			merged.request.filters.map(|filters| filters.sections),
			Some(vec!["Основы".to_string()])
		);
	}

	#[test]
	fn queries_without_expectations_are_rejected() {
		let query = EvalQuery {
			id: Some("q".to_string()),
			query: "система".to_string(),
			hints: None,
			sections: None,
			topics: None,
			expected_ids: Vec::new(),
		};

		assert!(merge_query(&EvalDefaults::default(), &query, 0).is_err());
	}

	#[test]
	fn dataset_parses_with_optional_defaults() {
		let dataset: EvalDataset = serde_json::from_str(
			r#"{ "queries": [{ "query": "границы системы", "expected_ids": ["boundary"] }] }"#,
		)
		.expect("Dataset must parse.");

		assert!(dataset.name.is_none());
		assert!(dataset.defaults.hints.is_empty());
		assert_eq!(dataset.queries[0].expected_ids, ids(&["boundary"]));
	}

	#[test]
	fn compare_reports_b_minus_a() {
		let a = vec![report("q1", 0.5, false, 2.0)];
		let b = vec![report("q1", 1.0, true, 5.0)];
		let queries = build_compare_queries(&a, &b);
		let delta = EvalSummary::from_reports(&b).delta_from(&EvalSummary::from_reports(&a));

		assert!((queries[0].quality_delta.recall_at_k - 0.5).abs() < 1e-12);
		assert_eq!(queries[0].quality_delta.ndcg, 0.0);
		assert!((delta.fallback_rate - 1.0).abs() < 1e-12);
		assert!((delta.latency_ms_p95 - 3.0).abs() < 1e-12);
	}

	#[test]
	fn summary_serializes_flat() {
		let summary = EvalSummary::from_reports(&[report("q1", 1.0, false, 4.0)]);
		let json = serde_json::to_value(&summary).expect("Summary must serialize.");

		assert_eq!(json["recall_at_k"], 1.0);
		assert_eq!(json["latency_ms_p50"], 4.0);
		assert!(json.get("quality").is_none());
	}
}
