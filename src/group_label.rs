//! Derives the label that ties an alert group to its ticket.
//!
//! The label is searched for and attached to newly created tickets, so the
//! same encoding has to be used for the whole lifetime of a receiver or
//! existing tickets can't be found anymore.

use std::fmt::Write;

use sha2::{Digest, Sha512};

use crate::alert::KV;

/// Returns the group labels as a single ticket label.
///
/// Plain mode yields `ALERT{k1="v1",k2="v2"}` with all spaces removed. Hashed
/// mode yields `JIRALERT{<sha512 hex>}`, which stays below jira's label length
/// limit for arbitrarily large label sets.
pub fn group_ticket_label(group_labels: &KV, hashed: bool) -> String {
	if hashed {
		let mut hasher = Sha512::new();
		for (name, value) in group_labels {
			hasher.update(format!("{name}={},", quote(value)).as_bytes());
		}
		return format!("JIRALERT{{{}}}", hex::encode(hasher.finalize()));
	}

	let mut label = String::from("ALERT{");
	for (i, (name, value)) in group_labels.iter().enumerate() {
		if i > 0 {
			label.push(',');
		}
		// writing into a String can't fail
		let _ = write!(label, "{name}={}", quote(value));
	}
	label.push('}');

	label.replace(' ', "")
}

/// Quotes `value` the way labels of existing tickets were quoted: printable
/// characters are kept, `"` and `\` are backslash escaped, everything else
/// becomes `\a`-style, `\xNN`, `\uNNNN` or `\UNNNNNNNN` escapes.
pub(crate) fn quote(value: &str) -> String {
	let mut quoted = String::with_capacity(value.len() + 2);
	quoted.push('"');

	for c in value.chars() {
		match c {
			'"' | '\\' => {
				quoted.push('\\');
				quoted.push(c);
			}
			c if is_printable(c) => quoted.push(c),
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

/// format characters (Cf)
const FORMAT: &[(u32, u32)] = &[
	(0x00ad, 0x00ad),
	(0x0600, 0x0605),
	(0x061c, 0x061c),
	(0x06dd, 0x06dd),
	(0x070f, 0x070f),
	(0x0890, 0x0891),
	(0x08e2, 0x08e2),
	(0x180e, 0x180e),
	(0x200b, 0x200f),
	(0x202a, 0x202e),
	(0x2060, 0x2064),
	(0x2066, 0x206f),
	(0xfeff, 0xfeff),
	(0xfff9, 0xfffb),
	(0x110bd, 0x110bd),
	(0x110cd, 0x110cd),
	(0x13430, 0x1343f),
	(0x1bca0, 0x1bca3),
	(0x1d173, 0x1d17a),
	(0xe0001, 0xe0001),
	(0xe0020, 0xe007f),
];

/// private use characters (Co)
const PRIVATE_USE: &[(u32, u32)] = &[(0xe000, 0xf8ff), (0xf0000, 0xffffd), (0x100000, 0x10fffd)];

/// Letters, marks, numbers, punctuation, symbols and the ASCII space.
/// Unassigned code points are treated as printable.
fn is_printable(c: char) -> bool {
	if c == ' ' {
		return true;
	}
	if c.is_control() || c.is_whitespace() {
		return false;
	}

	let code = c as u32;
	!FORMAT.iter().chain(PRIVATE_USE).any(|&(start, end)| (start..=end).contains(&code))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn kv(pairs: &[(&str, &str)]) -> KV {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn plain_label_is_sorted() {
		let expected = r#"ALERT{a="b",c="d"}"#;

		assert_eq!(group_ticket_label(&kv(&[("a", "b"), ("c", "d")]), false), expected);
		assert_eq!(group_ticket_label(&kv(&[("c", "d"), ("a", "b")]), false), expected);
	}

	#[test]
	fn plain_label_sorts_bytewise_and_strips_spaces() {
		assert_eq!(group_ticket_label(&kv(&[("a", "B"), ("C", "d")]), false), r#"ALERT{C="d",a="B"}"#);
		assert_eq!(
			group_ticket_label(&kv(&[("alertname", "Disk almost full")]), false),
			r#"ALERT{alertname="Diskalmostfull"}"#
		);
	}

	#[test]
	fn plain_label_escapes_quotes() {
		assert_eq!(group_ticket_label(&kv(&[("job", r#"a"b"#)]), false), r#"ALERT{job="a\"b"}"#);
	}

	#[test]
	fn quotes_like_existing_labels() {
		assert_eq!(quote("x\u{1}y\u{a0}z\u{7}"), r#""x\x01y\u00a0z\a""#);
		assert_eq!(quote("tab\tnew\nline\u{7f}"), r#""tab\tnew\nline\x7f""#);
		assert_eq!(quote("zero\u{200b}width\u{f0000}"), r#""zero\u200bwidth\U000f0000""#);
		assert_eq!(quote("größe ✓ 日本"), "\"größe ✓ 日本\"");
		assert_eq!(quote(r"C:\tmp"), r#""C:\\tmp""#);
	}

	#[test]
	fn plain_label_escapes_control_characters() {
		assert_eq!(
			group_ticket_label(&kv(&[("a", "x\u{1}y\u{a0}z\u{7}")]), false),
			r#"ALERT{a="x\x01y\u00a0z\a"}"#
		);
	}

	#[test]
	fn empty_group() {
		assert_eq!(group_ticket_label(&KV::new(), false), "ALERT{}");
	}

	#[test]
	fn hashed_label_is_stable() {
		assert_eq!(
			group_ticket_label(&kv(&[("a", "B"), ("C", "d")]), true),
			"JIRALERT{9897cb21a3d1ba47d2aab501ce9bc60b74bf65e26658f8e34a7fc81705e6b6eadfe6ad8edfe7c68142b3fe10f2c89127bd85e5f3687fe6b9ff1eff4b3f71dd49}"
		);
	}

	#[test]
	fn hashed_label_depends_on_labels() {
		let first = group_ticket_label(&kv(&[("alertname", "A")]), true);
		let second = group_ticket_label(&kv(&[("alertname", "B")]), true);

		assert_ne!(first, second);
		assert_eq!(first, group_ticket_label(&kv(&[("alertname", "A")]), true));
		assert_eq!(first.len(), "JIRALERT{}".len() + 128);
	}
}
