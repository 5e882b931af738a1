//! The unit compiler: turns extracted segments into one executable script.

use std::fmt::Write as _;
use std::path::Path;

use rhai::AST;
use rhai::Engine;
use rhai::Position;

use crate::PreproError;
use crate::PreproResult;
use crate::Segment;

/// Where a generated script line came from in the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOrigin {
	/// 1-indexed template line.
	pub line: usize,
	/// Added to a script column to get the template column. Zero for
	/// literal lines.
	pub column_offset: usize,
}

/// Generated script text for a template, before compilation.
///
/// Literal segments become `print("...")` statements and directive payloads
/// are inserted verbatim, each followed by a `;` line so that a directive
/// ending in a comment or an open block still terminates cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitSource {
	script: String,
	origins: Vec<LineOrigin>,
}

impl UnitSource {
	pub fn script(&self) -> &str {
		&self.script
	}

	/// Template origin of the 1-indexed script line, clamped to the last
	/// known line.
	pub fn origin(&self, script_line: usize) -> LineOrigin {
		self.origins
			.get(script_line.saturating_sub(1))
			.or(self.origins.last())
			.copied()
			.unwrap_or(LineOrigin {
				line: 1,
				column_offset: 0,
			})
	}

	fn push_line(&mut self, text: &str, origin: LineOrigin) {
		self.script.push_str(text);
		self.script.push('\n');
		self.origins.push(origin);
	}
}

/// Build the script for `segments`, preserving their order.
pub fn compile_unit(segments: &[Segment]) -> UnitSource {
	let mut unit = UnitSource::default();

	for segment in segments {
		match segment {
			Segment::Literal { text, line } => {
				if text.is_empty() {
					continue;
				}

				let statement = format!("print({});", quote_literal(text));
				unit.push_line(
					&statement,
					LineOrigin {
						line: *line,
						column_offset: 0,
					},
				);
			}
			Segment::Directive { code, line, column } => {
				let origin = LineOrigin {
					line: *line,
					column_offset: column - 1,
				};
				unit.push_line(code, origin);
				unit.push_line(";", origin);
			}
		}
	}

	tracing::trace!(
		script_lines = unit.origins.len(),
		script_bytes = unit.script.len(),
		"generated unit script"
	);

	unit
}

/// Quote `text` as a script string literal.
fn quote_literal(text: &str) -> String {
	let mut quoted = String::with_capacity(text.len() + 2);
	quoted.push('"');

	for c in text.chars() {
		match c {
			'\\' => quoted.push_str("\\\\"),
			'"' => quoted.push_str("\\\""),
			'\n' => quoted.push_str("\\n"),
			'\r' => quoted.push_str("\\r"),
			'\t' => quoted.push_str("\\t"),
			c if c.is_control() => {
				let _ = write!(quoted, "\\u{:04X}", u32::from(c));
			}
			c => quoted.push(c),
		}
	}

	quoted.push('"');
	quoted
}

/// A unit compiled against a particular engine, ready to run.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
	ast: AST,
	source: UnitSource,
}

impl CompiledUnit {
	/// Compile `source` with `engine`. Syntax errors are reported against
	/// the template at `path`.
	pub fn compile(engine: &Engine, path: &Path, source: UnitSource) -> PreproResult<Self> {
		let ast = engine.compile(source.script()).map_err(|error| {
			let (line, column) = template_position(&source, error.1);
			PreproError::Compile {
				path: path.to_path_buf(),
				line,
				column,
				message: error.0.to_string(),
			}
		})?;

		Ok(Self { ast, source })
	}

	pub fn ast(&self) -> &AST {
		&self.ast
	}

	pub fn source(&self) -> &UnitSource {
		&self.source
	}

	/// Template line for a script position.
	pub fn template_line(&self, position: Position) -> usize {
		template_position(&self.source, position).0
	}
}

/// Map a script position to a 1-indexed template `(line, column)`.
fn template_position(source: &UnitSource, position: Position) -> (usize, usize) {
	let Some(script_line) = position.line() else {
		return (source.origin(usize::MAX).line, 1);
	};

	let origin = source.origin(script_line);
	let column = position.position().unwrap_or(1) + origin.column_offset;
	(origin.line, column)
}
