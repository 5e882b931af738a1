//! Per-render state and the operations directive code can call.
//!
//! Each render call (including every nested `include`) owns one
//! [`ExecutionContext`]. The output buffer is a field of the context: a stack
//! whose top is the buffer `print` writes to. `capture` pushes a fresh buffer
//! for the duration of its callback.

use std::cell::Cell;
use std::cell::RefCell;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use rhai::Dynamic;
use rhai::Engine;
use rhai::EvalAltResult;
use rhai::FnPtr;
use rhai::NativeCallContext;
use rhai::Position;

use crate::Host;
use crate::PreproError;
use crate::PreproResult;
use crate::engine::render_nested;

/// Names of the operations bound into every unit's scope.
pub const EXPOSED_OPERATIONS: [&str; 7] = [
	"print",
	"capture",
	"If",
	"include",
	"readFile",
	"resolveFile",
	"uncommentIf",
];

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

impl From<PreproError> for Box<EvalAltResult> {
	fn from(error: PreproError) -> Self {
		Box::new(EvalAltResult::ErrorRuntime(Dynamic::from(error), Position::NONE))
	}
}

/// Recover a [`PreproError`] that was raised inside script code, looking
/// through function-call wrappers.
pub(crate) fn recover_error(error: &EvalAltResult) -> Option<PreproError> {
	match innermost(error) {
		EvalAltResult::ErrorRuntime(value, _) => value.clone().try_cast::<PreproError>(),
		_ => None,
	}
}

pub(crate) fn innermost(mut error: &EvalAltResult) -> &EvalAltResult {
	while let EvalAltResult::ErrorInFunctionCall(_, _, inner, _) = error {
		error = inner;
	}
	error
}

/// The files currently being rendered, outermost first.
#[derive(Debug, Clone)]
pub(crate) struct IncludeChain {
	files: Vec<PathBuf>,
	limit: usize,
}

impl IncludeChain {
	pub(crate) fn root(path: PathBuf, limit: usize) -> Self {
		Self {
			files: vec![path],
			limit,
		}
	}

	/// The chain for rendering `path` from the current file.
	pub(crate) fn enter(&self, path: &Path) -> PreproResult<Self> {
		if self.files.iter().any(|file| file == path) {
			let chain = self
				.files
				.iter()
				.chain(std::iter::once(&path.to_path_buf()))
				.map(|file| file.display().to_string())
				.collect::<Vec<_>>()
				.join(" -> ");
			return Err(PreproError::IncludeCycle { chain });
		}

		if self.files.len() > self.limit {
			return Err(PreproError::IncludeDepth {
				path: path.to_path_buf(),
				limit: self.limit,
			});
		}

		let mut files = self.files.clone();
		files.push(path.to_path_buf());
		Ok(Self {
			files,
			limit: self.limit,
		})
	}

	pub(crate) fn depth(&self) -> usize {
		self.files.len() - 1
	}
}

/// State for one render call.
///
/// A context starts inactive. [`ExecutionContext::activate`] installs the
/// root buffer exactly once, before the unit body runs; buffer operations on
/// an inactive context fail with [`PreproError::InactiveContext`].
pub struct ExecutionContext {
	file_path: PathBuf,
	data: Dynamic,
	host: Arc<dyn Host>,
	buffers: RefCell<Vec<String>>,
	activated: Cell<bool>,
	chain: IncludeChain,
}

impl std::fmt::Debug for ExecutionContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ExecutionContext")
			.field("file_path", &self.file_path)
			.field("buffers", &self.buffers)
			.field("depth", &self.chain.depth())
			.finish_non_exhaustive()
	}
}

impl ExecutionContext {
	pub(crate) fn new(
		file_path: &Path,
		data: Dynamic,
		host: Arc<dyn Host>,
		chain: IncludeChain,
	) -> Self {
		Self {
			file_path: file_path.to_path_buf(),
			data,
			host,
			buffers: RefCell::new(Vec::new()),
			activated: Cell::new(false),
			chain,
		}
	}

	pub fn file_path(&self) -> &Path {
		&self.file_path
	}

	pub fn data(&self) -> &Dynamic {
		&self.data
	}

	pub fn is_active(&self) -> bool {
		self.activated.get()
	}

	/// Install the root buffer. Only the first call succeeds.
	pub fn activate(&self) -> PreproResult<()> {
		if self.activated.replace(true) {
			return Err(PreproError::InactiveContext);
		}

		self.buffers.borrow_mut().push(String::new());
		Ok(())
	}

	/// Append `text` to the current buffer.
	pub fn print(&self, text: &str) -> PreproResult<()> {
		let mut buffers = self.buffers.borrow_mut();
		let current = buffers.last_mut().ok_or(PreproError::InactiveContext)?;
		current.push_str(text);
		Ok(())
	}

	/// Run `callback` against an empty buffer and return what it wrote. The
	/// enclosing buffer is restored whether or not the callback fails.
	pub fn capture<E>(&self, callback: impl FnOnce() -> Result<(), E>) -> Result<String, E>
	where
		E: From<PreproError>,
	{
		if !self.is_active() {
			return Err(PreproError::InactiveContext.into());
		}

		let scope = BufferScope::open(&self.buffers);
		callback()?;
		Ok(scope.close())
	}

	/// Run `callback` iff `condition` is truthy. Writes land in the current
	/// buffer.
	pub fn render_if<E>(
		&self,
		condition: &Dynamic,
		callback: impl FnOnce() -> Result<(), E>,
	) -> Result<(), E> {
		if is_truthy(condition) {
			callback()?;
		}
		Ok(())
	}

	/// Resolve `relative_path` against the directory of the current file.
	pub fn resolve_file(&self, relative_path: &str) -> PathBuf {
		let base_dir = self.host.dirname(&self.file_path);
		self.host.resolve_path(&base_dir, Path::new(relative_path))
	}

	/// Resolve, then read through the host.
	pub fn read_file(&self, relative_path: &str) -> PreproResult<String> {
		let target = self.resolve_file(relative_path);
		self.host.read_file(&target)
	}

	/// Render another template and print the result into the current buffer.
	/// Without `data` the current data value is shared with the included
	/// template, so its changes are visible afterwards. An explicit `data`
	/// argument arrives as a value (Rhai passes non-receiver arguments by
	/// value) and changes made by the included template stay local to it.
	pub fn include(&self, relative_path: &str, data: Option<Dynamic>) -> PreproResult<()> {
		let target = self.resolve_file(relative_path);
		let chain = self.chain.enter(&target)?;

		tracing::debug!(
			from = %self.file_path.display(),
			target = %target.display(),
			depth = chain.depth(),
			"including template"
		);

		let source = self.host.read_file(&target)?;
		let data = match data {
			Some(data) => data.into_shared(),
			None => self.data.clone(),
		};

		let rendered = render_nested(&target, &source, data, Arc::clone(&self.host), chain)?;
		self.print(&rendered)
	}

	/// Reserved conditional-comment helper.
	pub fn uncomment_if(&self, _condition: &Dynamic) -> PreproResult<()> {
		Err(PreproError::NotImplemented {
			operation: "uncommentIf".to_string(),
		})
	}

	/// Take the root buffer once the unit has finished.
	pub(crate) fn finish(&self) -> PreproResult<String> {
		let mut buffers = self.buffers.borrow_mut();
		let output = buffers.pop().ok_or(PreproError::InactiveContext)?;
		buffers.clear();
		Ok(output)
	}
}

/// Pushes a buffer on open; pops back to the previous depth on drop.
struct BufferScope<'a> {
	buffers: &'a RefCell<Vec<String>>,
	depth: usize,
}

impl<'a> BufferScope<'a> {
	fn open(buffers: &'a RefCell<Vec<String>>) -> Self {
		let mut stack = buffers.borrow_mut();
		let depth = stack.len();
		stack.push(String::new());
		Self { buffers, depth }
	}

	fn close(self) -> String {
		let mut stack = self.buffers.borrow_mut();
		stack.truncate(self.depth + 1);
		stack.pop().unwrap_or_default()
	}
}

impl Drop for BufferScope<'_> {
	fn drop(&mut self) {
		if let Ok(mut stack) = self.buffers.try_borrow_mut() {
			stack.truncate(self.depth);
		}
	}
}

/// Loose truthiness: `()`, `false`, `0`, `0.0`, `NaN` and `""` are falsy.
pub fn is_truthy(value: &Dynamic) -> bool {
	let value = value.flatten_clone();

	if value.is_unit() {
		return false;
	}
	if let Ok(flag) = value.as_bool() {
		return flag;
	}
	if let Ok(number) = value.as_int() {
		return number != 0;
	}
	if let Ok(number) = value.as_float() {
		return number.abs() > 0.0;
	}
	if value.is_string() {
		return value.into_string().is_ok_and(|text| !text.is_empty());
	}

	true
}

/// Bind the context's operations into `engine` under their script names.
pub(crate) fn register_operations(engine: &mut Engine, context: &Rc<ExecutionContext>) {
	{
		let context = Rc::clone(context);
		engine.on_print(move |text| {
			if let Err(error) = context.print(text) {
				tracing::error!(%error, "print outside an active render");
			}
		});
	}

	engine.on_debug(|text, source, position| {
		tracing::debug!(source = source.unwrap_or_default(), %position, "{text}");
	});

	{
		let context = Rc::clone(context);
		engine.register_fn(
			"capture",
			move |call: NativeCallContext, callback: FnPtr| -> ScriptResult<String> {
				context.capture(|| {
					callback
						.call_within_context::<Dynamic>(&call, ())
						.map(|_| ())
				})
			},
		);
	}

	{
		let context = Rc::clone(context);
		engine.register_fn(
			"If",
			move |call: NativeCallContext, condition: Dynamic, callback: FnPtr| -> ScriptResult<()> {
				context.render_if(&condition, || {
					callback
						.call_within_context::<Dynamic>(&call, ())
						.map(|_| ())
				})
			},
		);
	}

	{
		let context = Rc::clone(context);
		engine.register_fn("include", move |path: &str| -> ScriptResult<()> {
			Ok(context.include(path, None)?)
		});
	}

	{
		let context = Rc::clone(context);
		engine.register_fn(
			"include",
			move |path: &str, data: Dynamic| -> ScriptResult<()> {
				Ok(context.include(path, Some(data))?)
			},
		);
	}

	{
		let context = Rc::clone(context);
		engine.register_fn("readFile", move |path: &str| -> ScriptResult<String> {
			Ok(context.read_file(path)?)
		});
	}

	{
		let context = Rc::clone(context);
		engine.register_fn("resolveFile", move |path: &str| -> String {
			context.resolve_file(path).display().to_string()
		});
	}

	{
		let context = Rc::clone(context);
		engine.register_fn(
			"uncommentIf",
			move |condition: Dynamic, _callback: FnPtr| -> ScriptResult<()> {
				Ok(context.uncomment_if(&condition)?)
			},
		);
	}
}
