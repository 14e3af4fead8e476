use crate::search::{RetrievalResult, ranking::ScoredCandidate};

const BLOCK_SEPARATOR: &str = "\n\n";
const ELLIPSIS: char = '…';

/// Renders ranked fragments as headed text blocks for the generation step.
///
/// Blocks are added in rank order while they fit into `max_chars`. When not even the first
/// block fits, it is cut to the budget and ends with an ellipsis. An empty result renders as
/// an empty string.
pub fn build_generation_context(result: &RetrievalResult, max_chars: usize) -> String {
	let mut out = String::new();
	let mut used = 0;

	for (idx, item) in result.candidates.iter().enumerate() {
		let block = render_block(item);
		let block_chars = block.chars().count();
		let separator_chars = if out.is_empty() { 0 } else { BLOCK_SEPARATOR.chars().count() };

		if used + separator_chars + block_chars > max_chars {
			if idx == 0 {
				out = truncate_chars(&block, max_chars);
			}

			break;
		}
		if !out.is_empty() {
			out.push_str(BLOCK_SEPARATOR);
		}

		out.push_str(&block);

		used += separator_chars + block_chars;
	}

	out
}

fn render_block(item: &ScoredCandidate) -> String {
	let location = &item.candidate.location;
	let labels: Vec<&str> = [location.section.as_deref(), location.topic.as_deref()]
		.into_iter()
		.flatten()
		.map(str::trim)
		.filter(|label| !label.is_empty())
		.collect();
	let text = item.candidate.text.trim();

	if labels.is_empty() { text.to_string() } else { format!("[{}]\n{text}", labels.join(" / ")) }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
	if max_chars == 0 {
		return String::new();
	}

	let mut out: String = text.chars().take(max_chars - 1).collect();

	out.push(ELLIPSIS);

	out
}
