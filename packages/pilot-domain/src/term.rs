use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_script::{Script, UnicodeScript};
use unicode_segmentation::UnicodeSegmentation;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
	Ru,
	En,
	Other,
}
impl Lang {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Ru => "ru",
			Self::En => "en",
			Self::Other => "other",
		}
	}
}

/// A normalized word or short phrase.
///
/// Two terms are equal exactly when their normalized text is equal. The language tag is
/// derived from the text, so it never distinguishes otherwise equal terms.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Term {
	text: String,
	lang: Lang,
}
impl Term {
	/// Returns `None` when the input is blank after normalization.
	pub fn new(raw: &str) -> Option<Self> {
		let text = normalize(raw);

		if text.is_empty() {
			return None;
		}

		let lang = detect_lang(&text);

		Some(Self { text, lang })
	}

	pub fn as_str(&self) -> &str {
		&self.text
	}

	pub fn lang(&self) -> Lang {
		self.lang
	}

	pub fn is_phrase(&self) -> bool {
		self.text.contains(' ')
	}

	/// Word tokens of the term, in order. A single-word term yields itself.
	pub fn words(&self) -> Vec<String> {
		tokenize(&self.text)
	}
}
impl fmt::Display for Term {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.text)
	}
}
impl TryFrom<String> for Term {
	type Error = String;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(&value).ok_or_else(|| "term must be non-empty after normalization".to_string())
	}
}
impl From<Term> for String {
	fn from(term: Term) -> Self {
		term.text
	}
}

/// NFKC, lowercase, drop invisible format characters and collapse whitespace runs.
pub fn normalize(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());
	let mut pending_space = false;

	for ch in raw.nfkc().flat_map(char::to_lowercase) {
		if is_invisible(ch) {
			continue;
		}
		if ch.is_whitespace() {
			pending_space = !out.is_empty();

			continue;
		}
		if pending_space {
			out.push(' ');

			pending_space = false;
		}

		out.push(ch);
	}

	out
}

/// Splits text into normalized word tokens, keeping their order and repeats.
pub fn tokenize(text: &str) -> Vec<String> {
	normalize(text).unicode_words().map(str::to_string).collect()
}

fn is_invisible(ch: char) -> bool {
	matches!(
		ch,
		'\u{00AD}' // soft hyphen
			| '\u{200B}' // zero width space
			| '\u{200C}' // zero width non-joiner
			| '\u{200D}' // zero width joiner
			| '\u{2060}' // word joiner
			| '\u{FEFF}' // zero width no-break space
	)
}

fn detect_lang(text: &str) -> Lang {
	let mut cyrillic = 0_usize;
	let mut latin = 0_usize;

	for ch in text.chars() {
		match ch.script() {
			Script::Cyrillic => cyrillic += 1,
			Script::Latin => latin += 1,
			_ => {},
		}
	}

	if cyrillic == 0 && latin == 0 {
		Lang::Other
	} else if cyrillic >= latin {
		Lang::Ru
	} else {
		Lang::En
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_case_width_and_whitespace() {
		assert_eq!(normalize("  Границы\t  СИСТЕМЫ \n"), "границы системы");
		assert_eq!(normalize("Ｓｙｓｔｅｍ"), "system");
		assert_eq!(normalize("sys\u{200B}tem"), "system");
	}

	#[test]
	fn tokenizes_unicode_words_without_punctuation() {
		assert_eq!(tokenize("Что такое система?"), vec!["что", "такое", "система"]);
		assert_eq!(tokenize("system-level, boundary!"), vec!["system", "level", "boundary"]);
	}

	#[test]
	fn tags_language_by_dominant_script() {
		assert_eq!(Term::new("Система").map(|term| term.lang()), Some(Lang::Ru));
		assert_eq!(Term::new("emergence").map(|term| term.lang()), Some(Lang::En));
		assert_eq!(Term::new("42").map(|term| term.lang()), Some(Lang::Other));
	}

	#[test]
	fn blank_input_is_not_a_term() {
		assert!(Term::new(" \t\u{200B} ").is_none());
	}
}
