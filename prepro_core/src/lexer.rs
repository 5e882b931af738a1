//! The directive extractor.
//!
//! Splits template text into literal text and `//#` directive lines. A
//! directive is matched at the start of input or at a line break, then:
//! leading whitespace (which may span blank lines), two or more `/`,
//! optional horizontal whitespace, `#`, and the payload up to the end of the
//! line. The line break that ends a directive stays with the following
//! literal.

/// One piece of a template, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
	/// Text copied verbatim into the output.
	Literal {
		text: String,
		/// 1-indexed template line the text starts on.
		line: usize,
	},
	/// A statement executed during render.
	Directive {
		code: String,
		/// 1-indexed template line of the `//#` marker.
		line: usize,
		/// 1-indexed column where the payload starts (just after `#`).
		column: usize,
	},
}

impl Segment {
	pub fn line(&self) -> usize {
		match self {
			Self::Literal { line, .. } | Self::Directive { line, .. } => *line,
		}
	}

	pub fn is_directive(&self) -> bool {
		matches!(self, Self::Directive { .. })
	}
}

/// Line-start byte offsets for offset-to-line lookups.
struct LineTable {
	line_starts: Vec<usize>,
}

impl LineTable {
	fn new(content: &str) -> Self {
		let mut line_starts = vec![0];
		for (i, byte) in content.bytes().enumerate() {
			if byte == b'\n' {
				line_starts.push(i + 1);
			}
		}
		Self { line_starts }
	}

	/// 1-indexed line containing `offset`.
	fn line_of(&self, offset: usize) -> usize {
		match self.line_starts.binary_search(&offset) {
			Ok(exact) => exact + 1,
			Err(insert) => insert,
		}
	}

	/// 1-indexed byte column of `offset` within its line.
	fn column_of(&self, offset: usize) -> usize {
		offset - self.line_starts[self.line_of(offset) - 1] + 1
	}
}

/// Byte offsets of one matched directive.
struct DirectiveMatch {
	/// Start of the marker (`//`).
	marker: usize,
	/// Payload range, excluding the line terminator.
	code: std::ops::Range<usize>,
}

/// Whitespace before a marker. A byte order mark counts, so a file that
/// starts with one can still open with a directive.
fn is_leading_whitespace(c: char) -> bool {
	c.is_whitespace() || c == BYTE_ORDER_MARK
}

const BYTE_ORDER_MARK: char = '\u{feff}';

fn is_horizontal_whitespace(c: char) -> bool {
	c.is_whitespace() && c != '\n' && c != '\r'
}

/// Try to match a directive starting exactly at `from`, where `from` is the
/// start of input or the first byte after a line break.
fn match_directive(source: &str, from: usize) -> Option<DirectiveMatch> {
	let rest = &source[from..];
	let trimmed = rest.trim_start_matches(is_leading_whitespace);
	let marker = from + (rest.len() - trimmed.len());

	let slashes = source[marker..].bytes().take_while(|&b| b == b'/').count();
	if slashes < 2 {
		return None;
	}

	let after_slashes = &source[marker + slashes..];
	let trimmed = after_slashes.trim_start_matches(is_horizontal_whitespace);
	let hash = marker + slashes + (after_slashes.len() - trimmed.len());
	if !source[hash..].starts_with('#') {
		return None;
	}

	let code_start = hash + 1;
	let mut code_end = source[code_start..]
		.find('\n')
		.map_or(source.len(), |offset| code_start + offset);
	if code_end > code_start && source.as_bytes()[code_end - 1] == b'\r' {
		code_end -= 1;
	}

	Some(DirectiveMatch {
		marker,
		code: code_start..code_end,
	})
}

/// Split `source` into literal and directive segments, preserving order.
///
/// A source without directives yields exactly one literal equal to the whole
/// source. Otherwise empty literals between adjacent directives are dropped.
pub fn extract(source: &str) -> Vec<Segment> {
	let line_table = LineTable::new(source);
	let mut segments = Vec::new();
	let mut literal_start = 0;
	let mut cursor = 0;
	let mut at_input_start = true;

	loop {
		// Each candidate is (match start, first byte after the line break).
		let candidate = if at_input_start {
			at_input_start = false;
			Some((0, 0))
		} else {
			source[cursor..].find('\n').map(|offset| {
				let newline = cursor + offset;
				let start = if newline > literal_start && source.as_bytes()[newline - 1] == b'\r' {
					newline - 1
				} else {
					newline
				};
				(start, newline + 1)
			})
		};

		let Some((start, body)) = candidate else {
			break;
		};

		let Some(found) = match_directive(source, body) else {
			cursor = body;
			continue;
		};

		if start > literal_start {
			segments.push(Segment::Literal {
				text: source[literal_start..start].to_string(),
				line: line_table.line_of(literal_start),
			});
		}

		segments.push(Segment::Directive {
			code: source[found.code.clone()].to_string(),
			line: line_table.line_of(found.marker),
			column: line_table.column_of(found.code.start),
		});

		literal_start = found.code.end;
		cursor = found.code.end;
	}

	let directives = segments.iter().filter(|s| s.is_directive()).count();
	if directives == 0 {
		return vec![Segment::Literal {
			text: source.to_string(),
			line: 1,
		}];
	}

	if literal_start < source.len() {
		segments.push(Segment::Literal {
			text: source[literal_start..].to_string(),
			line: line_table.line_of(literal_start),
		});
	}

	tracing::trace!(
		segments = segments.len(),
		directives,
		"extracted template segments"
	);

	segments
}
