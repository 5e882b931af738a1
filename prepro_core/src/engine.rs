use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use rhai::Dynamic;
use rhai::Engine;
use rhai::EvalAltResult;
use rhai::Scope;

use crate::Host;
use crate::OsHost;
use crate::PreproError;
use crate::PreproResult;
use crate::compiler::CompiledUnit;
use crate::compiler::compile_unit;
use crate::context::ExecutionContext;
use crate::context::IncludeChain;
use crate::context::innermost;
use crate::context::recover_error;
use crate::context::register_operations;
use crate::lexer::extract;

/// Default limit on nested `include` calls.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

/// Options for a single top-level render.
///
/// ```rust
/// use prepro_core::MemoryHost;
/// use prepro_core::RenderOptions;
/// use prepro_core::render;
/// use std::sync::Arc;
///
/// let options = RenderOptions::default()
/// 	.data(serde_json::json!({ "name": "world" }))
/// 	.host(Arc::new(MemoryHost::new()));
/// let output = render("/greeting.tpl", "//# print(`hello ${data.name}`);\n", options).unwrap();
/// assert_eq!(output, "hello world\n");
/// ```
#[derive(Clone)]
pub struct RenderOptions {
	data: serde_json::Value,
	host: Arc<dyn Host>,
	max_include_depth: usize,
}

impl Default for RenderOptions {
	fn default() -> Self {
		Self {
			data: serde_json::Value::Object(serde_json::Map::new()),
			host: Arc::new(OsHost),
			max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
		}
	}
}

impl std::fmt::Debug for RenderOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RenderOptions")
			.field("data", &self.data)
			.field("max_include_depth", &self.max_include_depth)
			.finish_non_exhaustive()
	}
}

impl RenderOptions {
	/// The value bound to `data` in the template.
	#[must_use]
	pub fn data(mut self, data: serde_json::Value) -> Self {
		self.data = data;
		self
	}

	#[must_use]
	pub fn host(mut self, host: Arc<dyn Host>) -> Self {
		self.host = host;
		self
	}

	/// Nested includes beyond `limit` fail with
	/// [`PreproError::IncludeDepth`].
	#[must_use]
	pub fn max_include_depth(mut self, limit: usize) -> Self {
		self.max_include_depth = limit;
		self
	}
}

/// Render the template `source`, which lives at `path`.
///
/// `path` is only used to resolve relative `include`, `readFile` and
/// `resolveFile` targets and to label errors; it is never read.
pub fn render(
	path: impl AsRef<Path>,
	source: &str,
	options: RenderOptions,
) -> PreproResult<String> {
	let RenderOptions {
		data,
		host,
		max_include_depth,
	} = options;

	let data = rhai::serde::to_dynamic(&data)
		.map_err(|error| PreproError::Data {
			reason: error.to_string(),
		})?
		.into_shared();

	let path = host.resolve_path(Path::new(""), path.as_ref());
	let chain = IncludeChain::root(path.clone(), max_include_depth);
	render_nested(&path, source, data, host, chain)
}

/// Read `path` with the default host and render it with empty data.
pub fn render_file(path: impl AsRef<Path>) -> PreproResult<String> {
	render_file_with(path, RenderOptions::default())
}

/// Read `path` through the options' host and render it.
pub fn render_file_with(path: impl AsRef<Path>, options: RenderOptions) -> PreproResult<String> {
	let path = path.as_ref();
	let source = options.host.read_file(path)?;
	render(path, &source, options)
}

/// Render one unit with an already-converted data value. Every `include`
/// re-enters here with a fresh context and engine.
pub(crate) fn render_nested(
	path: &Path,
	source: &str,
	data: Dynamic,
	host: Arc<dyn Host>,
	chain: IncludeChain,
) -> PreproResult<String> {
	tracing::debug!(
		path = %path.display(),
		bytes = source.len(),
		depth = chain.depth(),
		"rendering template"
	);

	let context = Rc::new(ExecutionContext::new(path, data.clone(), host, chain));
	let unit = compile_unit(&extract(source));

	let mut engine = Engine::new();
	register_operations(&mut engine, &context);
	let compiled = CompiledUnit::compile(&engine, path, unit)?;

	let mut scope = Scope::new();
	scope.push_dynamic("data", data);

	context.activate()?;
	engine
		.run_ast_with_scope(&mut scope, compiled.ast())
		.map_err(|error| execution_error(path, &compiled, &error))?;

	let output = context.finish()?;
	tracing::debug!(
		path = %path.display(),
		bytes = output.len(),
		"rendered template"
	);

	Ok(output)
}

/// Surface errors raised by operations unchanged; everything else becomes
/// [`PreproError::Execution`] located in the template.
fn execution_error(path: &Path, compiled: &CompiledUnit, error: &EvalAltResult) -> PreproError {
	if let Some(recovered) = recover_error(error) {
		return recovered;
	}

	let inner = innermost(error);
	let position = inner.position();
	let mut message = inner.to_string();
	if !position.is_none() {
		let suffix = format!(" ({position})");
		if let Some(stripped) = message.strip_suffix(&suffix) {
			message = stripped.to_string();
		}
	}

	PreproError::Execution {
		path: path.to_path_buf(),
		line: compiled.template_line(position),
		message,
	}
}
