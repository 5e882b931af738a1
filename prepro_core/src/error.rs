use std::path::PathBuf;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, Diagnostic, Error)]
#[non_exhaustive]
pub enum PreproError {
	#[error("failed to read `{}`: {source}", path.display())]
	#[diagnostic(code(prepro::io_error))]
	Io {
		path: PathBuf,
		#[source]
		source: Arc<std::io::Error>,
	},

	#[error("syntax error in `{}` at line {line}, column {column}: {message}", path.display())]
	#[diagnostic(
		code(prepro::compile),
		help("directive lines (`//# ...`) are joined into a single script; check that blocks opened by one directive are closed by a later one")
	)]
	Compile {
		path: PathBuf,
		line: usize,
		column: usize,
		message: String,
	},

	#[error("error while rendering `{}` at line {line}: {message}", path.display())]
	#[diagnostic(code(prepro::execution))]
	Execution {
		path: PathBuf,
		line: usize,
		message: String,
	},

	#[error("`{operation}` is not implemented")]
	#[diagnostic(
		code(prepro::not_implemented),
		help("`{operation}` is reserved for a future release; use `If` instead")
	)]
	NotImplemented { operation: String },

	#[error("include cycle detected: {chain}")]
	#[diagnostic(
		code(prepro::include_cycle),
		help("a template cannot include itself, directly or through other templates")
	)]
	IncludeCycle { chain: String },

	#[error("include depth limit of {limit} exceeded while including `{}`", path.display())]
	#[diagnostic(
		code(prepro::include_depth),
		help("raise `max_include_depth` in prepro.toml if the nesting is intentional")
	)]
	IncludeDepth { path: PathBuf, limit: usize },

	#[error("the render buffer was used before the execution context was activated")]
	#[diagnostic(code(prepro::inactive_context))]
	InactiveContext,

	#[error("failed to convert template data: {reason}")]
	#[diagnostic(code(prepro::data))]
	Data { reason: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(prepro::config_parse),
		help("check that prepro.toml is valid TOML with [data] and/or [defines] sections")
	)]
	ConfigParse(String),

	#[error("failed to load data file `{path}`: {reason}")]
	#[diagnostic(code(prepro::data_file))]
	DataFile { path: String, reason: String },

	#[error("unsupported data file format: `{0}`")]
	#[diagnostic(
		code(prepro::unsupported_format),
		help("supported formats: text, json, toml, yaml, yml")
	)]
	UnsupportedDataFormat(String),
}

impl PreproError {
	/// Wrap an I/O failure for `path`.
	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source: Arc::new(source),
		}
	}

	/// The stable diagnostic code, e.g. `prepro::include_cycle`.
	pub fn kind(&self) -> String {
		self.code().map(|code| code.to_string()).unwrap_or_default()
	}
}

pub type PreproResult<T> = Result<T, PreproError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
