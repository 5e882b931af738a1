use std::path::Path;
use std::sync::Arc;

use rstest::fixture;

use crate::Host;
use crate::MemoryHost;
use crate::PreproResult;
use crate::RenderOptions;
use crate::render;

/// Templates laid out under `/project`:
///
/// ```text
/// /project/main.tpl          includes partials/header.tpl
/// /project/partials/header.tpl
/// /project/partials/footer.tpl  includes ../shared/note.txt via readFile
/// /project/shared/note.txt
/// /project/cycle/a.tpl <-> /project/cycle/b.tpl
/// ```
#[fixture]
pub(crate) fn project_host() -> MemoryHost {
	MemoryHost::new()
		.with_file(
			"/project/main.tpl",
			"# main\n//# include(\"partials/header.tpl\");\nbody\n",
		)
		.with_file(
			"/project/partials/header.tpl",
			"//# print(`header for ${data.name}`);\n",
		)
		.with_file(
			"/project/partials/footer.tpl",
			"//# print(readFile(\"../shared/note.txt\"));\n",
		)
		.with_file("/project/shared/note.txt", "see LICENSE")
		.with_file("/project/cycle/a.tpl", "//# include(\"b.tpl\");\n")
		.with_file("/project/cycle/b.tpl", "//# include(\"a.tpl\");\n")
}

/// A chain `/depth/0.tpl -> 1.tpl -> ... -> {levels}.tpl`.
pub(crate) fn nested_host(levels: usize) -> MemoryHost {
	let host = MemoryHost::new();
	for level in 0..levels {
		host.insert(
			format!("/depth/{level}.tpl"),
			format!("{level}\n//# include(\"{}.tpl\");\n", level + 1),
		);
	}
	host.insert(format!("/depth/{levels}.tpl"), "end");
	host
}

pub(crate) fn options_for(host: &MemoryHost, data: serde_json::Value) -> RenderOptions {
	RenderOptions::default()
		.data(data)
		.host(Arc::new(host.clone()))
}

/// Render a template that lives inside `host`.
pub(crate) fn render_stored(
	host: &MemoryHost,
	path: &str,
	data: serde_json::Value,
) -> PreproResult<String> {
	let source = host.read_file(Path::new(path))?;
	render(path, &source, options_for(host, data))
}

/// Render `source` as if it lived at `path`, with no other files.
pub(crate) fn render_source(source: &str, data: serde_json::Value) -> PreproResult<String> {
	render(
		"/template.tpl",
		source,
		options_for(&MemoryHost::new(), data),
	)
}
