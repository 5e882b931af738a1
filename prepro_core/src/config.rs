use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::PreproError;
use crate::PreproResult;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["prepro.toml", ".prepro.toml", ".config/prepro.toml"];

/// Data source entry for a `[data]` namespace.
///
/// Plain string entries infer the format from the file extension:
///
/// ```toml
/// [data]
/// pkg = "package.json"
/// ```
///
/// Typed entries provide an explicit format:
///
/// ```toml
/// [data]
/// release = { path = "release-info", format = "json" }
/// ```
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
#[non_exhaustive]
pub enum DataSource {
	Path(PathBuf),
	Typed(TypedDataSource),
}

impl DataSource {
	/// The configured path, relative to the project root.
	pub fn path(&self) -> &Path {
		match self {
			Self::Path(path) => path.as_path(),
			Self::Typed(typed) => typed.path.as_path(),
		}
	}

	/// The format used to parse the file: the explicit override, or the
	/// lowercased file extension.
	pub fn format(&self) -> String {
		match self {
			Self::Path(path) => {
				path.extension()
					.and_then(|e| e.to_str())
					.unwrap_or("")
					.to_ascii_lowercase()
			}
			Self::Typed(typed) => typed.format.trim().to_ascii_lowercase(),
		}
	}
}

/// Typed data source configuration for `[data]` entries.
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
pub struct TypedDataSource {
	pub path: PathBuf,
	pub format: String,
}

/// Configuration loaded from a `prepro.toml` file.
///
/// ```toml
/// max_include_depth = 32
///
/// [data]
/// pkg = "package.json"
/// settings = { path = "settings.conf", format = "yaml" }
///
/// [defines]
/// DEBUG = true
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct PreproConfig {
	/// Map of namespace name to data file.
	#[serde(default)]
	pub data: BTreeMap<String, DataSource>,
	/// Top-level values merged into the template data.
	#[serde(default)]
	pub defines: BTreeMap<String, serde_json::Value>,
	/// Overrides the default nesting limit for `include`.
	#[serde(default)]
	pub max_include_depth: Option<usize>,
}

impl PreproConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> PreproResult<Option<PreproConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content =
			std::fs::read_to_string(&config_path).map_err(|e| PreproError::io(&config_path, e))?;
		let config: PreproConfig =
			toml::from_str(&content).map_err(|e| PreproError::ConfigParse(e.to_string()))?;

		tracing::debug!(path = %config_path.display(), "loaded config");
		Ok(Some(config))
	}

	/// Build the template data object: each `[data]` namespace parsed from
	/// its file, then `[defines]` on top.
	pub fn load_data(&self, root: &Path) -> PreproResult<serde_json::Value> {
		let mut data = serde_json::Map::new();

		for (namespace, source) in &self.data {
			let rel_path = source.path();
			let path_display = rel_path.display().to_string();
			let content =
				std::fs::read_to_string(root.join(rel_path)).map_err(|e| PreproError::DataFile {
					path: path_display.clone(),
					reason: e.to_string(),
				})?;
			let value = parse_data_file(&content, &source.format(), &path_display)?;
			data.insert(namespace.clone(), value);
		}

		for (name, value) in &self.defines {
			data.insert(name.clone(), value.clone());
		}

		Ok(serde_json::Value::Object(data))
	}
}

/// Parse a `KEY=VALUE` define. The value is read as JSON when it parses,
/// otherwise kept as a string. A bare `KEY` defines `true`.
pub fn parse_define(define: &str) -> PreproResult<(String, serde_json::Value)> {
	let (key, value) = match define.split_once('=') {
		Some((key, value)) => {
			let value = serde_json::from_str(value)
				.unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
			(key.trim(), value)
		}
		None => (define.trim(), serde_json::Value::Bool(true)),
	};

	if key.is_empty() {
		return Err(PreproError::Data {
			reason: format!("define `{define}` has an empty name"),
		});
	}

	Ok((key.to_string(), value))
}

fn parse_data_file(
	content: &str,
	format: &str,
	path_display: &str,
) -> PreproResult<serde_json::Value> {
	let data_file_error = |reason: String| {
		PreproError::DataFile {
			path: path_display.to_string(),
			reason,
		}
	};

	match format {
		"text" | "txt" => Ok(serde_json::Value::String(content.to_string())),
		"json" => serde_json::from_str(content).map_err(|e| data_file_error(e.to_string())),
		"toml" => {
			let value: toml::Value =
				toml::from_str(content).map_err(|e| data_file_error(e.to_string()))?;
			Ok(toml_to_json(value))
		}
		"yaml" | "yml" => {
			serde_yaml_ng::from_str(content).map_err(|e| data_file_error(e.to_string()))
		}
		other => Err(PreproError::UnsupportedDataFormat(other.to_string())),
	}
}

/// Convert a `toml::Value` to a `serde_json::Value`. Non-finite floats become
/// `null`; datetimes become strings.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
	match value {
		toml::Value::String(s) => serde_json::Value::String(s),
		toml::Value::Integer(i) => serde_json::Value::from(i),
		toml::Value::Float(f) => {
			serde_json::Number::from_f64(f).map_or(serde_json::Value::Null, serde_json::Value::Number)
		}
		toml::Value::Boolean(b) => serde_json::Value::Bool(b),
		toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
		toml::Value::Array(arr) => serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect()),
		toml::Value::Table(table) => {
			serde_json::Value::Object(
				table
					.into_iter()
					.map(|(key, value)| (key, toml_to_json(value)))
					.collect(),
			)
		}
	}
}
