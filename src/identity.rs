//! Derives the jira label that ties an alert group to its issue.
//!
//! The label is the only link between alertmanager groups and jira issues, so
//! it has to be a pure function of the group labels: the same group has to map
//! onto the same label across restarts and regardless of label order.

use std::fmt::Write;

use sha2::{Digest, Sha512};
use unicode_general_category::{get_general_category, GeneralCategory};

use crate::alert::KV;

/// prefix of the readable identity label
const PLAIN_PREFIX: &str = "ALERT{";

/// prefix of the hashed identity label
const HASHED_PREFIX: &str = "JIRALERT{";

/// Quotes `value` with surrounding double quotes the way Go's `%q` does.
///
/// Labels of existing issues and their hashes were built with this quoting,
/// so it has to match byte for byte. Printable characters are kept, quotes and
/// backslashes are escaped, the rest becomes `\a`..`\v`, `\xNN`, `\uNNNN` or
/// `\UNNNNNNNN`. All of these are valid escapes in JQL string literals too.
pub fn quote(value: &str) -> String {
	let mut quoted = String::with_capacity(value.len() + 2);
	quoted.push('"');

	for c in value.chars() {
		match c {
			'"' => quoted.push_str("\\\""),
			'\\' => quoted.push_str("\\\\"),
			c if is_print(c) => quoted.push(c),
			'\u{7}' => quoted.push_str("\\a"),
			'\u{8}' => quoted.push_str("\\b"),
			'\u{c}' => quoted.push_str("\\f"),
			'\n' => quoted.push_str("\\n"),
			'\r' => quoted.push_str("\\r"),
			'\t' => quoted.push_str("\\t"),
			'\u{b}' => quoted.push_str("\\v"),
			// writing into a String can't fail
			c if c < ' ' || c == '\u{7f}' => {
				let _ = write!(quoted, "\\x{:02x}", c as u32);
			}
			c if (c as u32) < 0x10000 => {
				let _ = write!(quoted, "\\u{:04x}", c as u32);
			}
			c => {
				let _ = write!(quoted, "\\U{:08x}", c as u32);
			}
		}
	}

	quoted.push('"');
	quoted
}

/// Go's `unicode.IsPrint`: letters, marks, numbers, punctuation, symbols and
/// the ASCII space.
fn is_print(c: char) -> bool {
	use GeneralCategory::*;

	if c == ' ' {
		return true;
	}

	matches!(
		get_general_category(c),
		UppercaseLetter
			| LowercaseLetter
			| TitlecaseLetter
			| ModifierLetter
			| OtherLetter
			| NonspacingMark
			| SpacingMark
			| EnclosingMark
			| DecimalNumber
			| LetterNumber
			| OtherNumber
			| ConnectorPunctuation
			| DashPunctuation
			| OpenPunctuation
			| ClosePunctuation
			| InitialPunctuation
			| FinalPunctuation
			| OtherPunctuation
			| MathSymbol
			| CurrencySymbol
			| ModifierSymbol
			| OtherSymbol
	)
}

/// Renders a label or annotation as jira label `name="value"`. Jira labels
/// can't contain whitespace, so spaces get removed.
pub fn label_pair(name: &str, value: &str) -> String {
	strip_spaces(&format!("{name}={}", quote(value)))
}

/// removes all spaces from `label`
pub fn strip_spaces(label: &str) -> String {
	label.replace(' ', "")
}

/// Returns the group labels as a single jira label.
///
/// * readable form: `ALERT{name="value",...}` with all spaces removed. The
///   length grows with the group labels and may exceed jira's limit of 255
///   characters.
///
/// * hashed form (`hashed`): `JIRALERT{<sha512 hex of the pairs>}`, always 138
///   characters long.
pub fn group_ticket_label(labels: &KV, hashed: bool) -> String {
	if hashed {
		let mut hasher = Sha512::new();
		for (name, value) in labels {
			hasher.update(format!("{name}={},", quote(value)).as_bytes());
		}
		return format!("{HASHED_PREFIX}{}}}", hex::encode(hasher.finalize()));
	}

	let mut label = String::from(PLAIN_PREFIX);
	for (name, value) in labels {
		label.push_str(name);
		label.push('=');
		label.push_str(&quote(value));
		label.push(',');
	}
	// drops the trailing comma. Without group labels this drops the brace and
	// yields `ALERT}`, which is what existing issues of such groups carry.
	label.pop();
	label.push('}');

	strip_spaces(&label)
}
