use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use owo_colors::OwoColorize;
use prepro_cli::Commands;
use prepro_cli::PreproCli;
use prepro_core::PreproConfig;
use prepro_core::PreproError;
use prepro_core::RenderOptions;
use prepro_core::parse_define;
use prepro_core::render_file_with;
use similar::ChangeTag;
use similar::TextDiff;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
}

const SAMPLE_CONFIG: &str = "# prepro configuration\n\n# Map data files to namespaces. Values \
                             are available to directives as\n# `data.<namespace>`.\n# \
                             [data]\n# pkg = \"package.json\"\n\n# Maximum nesting of \
                             `include` calls.\nmax_include_depth = 32\n\n# Top-level values, \
                             overridable with `-D KEY=VALUE`.\n[defines]\nname = \
                             \"example\"\nDEBUG = false\n";

const SAMPLE_TEMPLATE: &str = "# example.conf, rendered by `prepro render \
                               example.conf.tpl`\n//# print(\"\\nname = \\\"\" + data.name + \
                               \"\\\"\");\n//# If(data.DEBUG, || {\nlog_level = \"debug\"\n//# \
                               });\n";

fn main() {
	let args = PreproCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	init_tracing(args.verbose, use_color);

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Init) => run_init(&args),
		Some(Commands::Render {
			input,
			output,
			watch,
			..
		}) => run_render(&args, input, output.as_deref(), *watch),
		Some(Commands::Check {
			input,
			output,
			diff,
			..
		}) => {
			match run_check(&args, input, output, *diff) {
				Ok(true) => process::exit(1),
				Ok(false) => Ok(()),
				Err(e) => Err(e),
			}
		}
		None => {
			eprintln!("No subcommand specified. Run `prepro --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		report_error(e);
		process::exit(2);
	}
}

/// Log to stderr. `PREPRO_LOG` takes an `EnvFilter` directive; without it
/// only warnings are shown, or debug output with `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let fallback = if verbose { "debug" } else { "warn" };
	let filter = tracing_subscriber::EnvFilter::try_from_env("PREPRO_LOG")
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.try_init();
}

/// Render through miette when the error is a [`PreproError`] so that codes
/// and help text are shown.
fn report_error(error: Box<dyn std::error::Error>) {
	match error.downcast::<PreproError>() {
		Ok(prepro_err) => {
			let report: miette::Report = (*prepro_err).into();
			eprintln!("{report:?}");
		}
		Err(e) => {
			eprintln!("{} {e}", colored!("error:", red));
		}
	}
}

fn resolve_root(args: &PreproCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Build render options from `prepro.toml` and `-D` defines.
fn render_options(args: &PreproCli) -> CliResult<RenderOptions> {
	let root = resolve_root(args);
	let config = PreproConfig::load(&root)?;

	let mut data = match &config {
		Some(config) => {
			tracing::debug!(root = %root.display(), "loaded prepro.toml");
			config.load_data(&root)?
		}
		None => {
			tracing::debug!(root = %root.display(), "no prepro.toml found");
			serde_json::Value::Object(serde_json::Map::new())
		}
	};

	for define in args.all_defines() {
		let (key, value) = parse_define(define)?;
		tracing::debug!(%key, %value, "applying define");
		if let serde_json::Value::Object(map) = &mut data {
			map.insert(key, value);
		}
	}

	let mut options = RenderOptions::default().data(data);
	if let Some(limit) = config.and_then(|config| config.max_include_depth) {
		options = options.max_include_depth(limit);
	}

	Ok(options)
}

fn run_init(args: &PreproCli) -> CliResult<()> {
	let root = resolve_root(args);
	let config_path = root.join("prepro.toml");
	let template_path = root.join("example.conf.tpl");

	if config_path.exists() {
		println!("Config file already exists: {}", config_path.display());
	} else {
		std::fs::write(&config_path, SAMPLE_CONFIG)
			.map_err(|e| PreproError::io(&config_path, e))?;
		println!("Created prepro.toml");
	}

	let template_exists = template_path.exists();
	if template_exists {
		println!("Template file already exists: {}", template_path.display());
	} else {
		std::fs::write(&template_path, SAMPLE_TEMPLATE)
			.map_err(|e| PreproError::io(&template_path, e))?;
		println!("Created template file: {}", template_path.display());
	}

	if !template_exists {
		println!();
		println!("Next steps:");
		println!("  1. Edit {} and prepro.toml", template_path.display());
		println!("  2. Run `prepro render example.conf.tpl -o example.conf`");
		println!("  3. Run `prepro check example.conf.tpl -o example.conf` in CI");
	}

	Ok(())
}

fn run_render(
	args: &PreproCli,
	input: &Path,
	output: Option<&Path>,
	watch: bool,
) -> CliResult<()> {
	run_render_once(args, input, output)?;

	if !watch {
		return Ok(());
	}

	eprintln!("\nWatching for file changes... (press Ctrl+C to stop)");

	let root = resolve_root(args);
	let ignored = output.map(std::path::absolute).transpose()?;
	let (tx, rx) = mpsc::channel();

	let mut watcher =
		notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
			if let Ok(event) = res {
				let relevant = matches!(
					event.kind,
					notify::EventKind::Modify(_) | notify::EventKind::Create(_)
				) && event
					.paths
					.iter()
					.any(|path| ignored.as_deref() != Some(path.as_path()));
				if relevant {
					let _ = tx.send(());
				}
			}
		})?;

	use notify::Watcher;
	watcher.watch(&root, notify::RecursiveMode::Recursive)?;
	if let Some(parent) = std::path::absolute(input)?.parent() {
		if !parent.starts_with(std::path::absolute(&root)?) {
			watcher.watch(parent, notify::RecursiveMode::Recursive)?;
		}
	}

	loop {
		rx.recv()?;
		// Debounce: drain additional events within 200ms.
		while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}

		tracing::debug!(input = %input.display(), "re-rendering after file change");
		eprintln!("\nFile change detected, rendering...");
		if let Err(e) = run_render_once(args, input, output) {
			report_error(e);
		}
	}
}

fn run_render_once(args: &PreproCli, input: &Path, output: Option<&Path>) -> CliResult<()> {
	let options = render_options(args)?;
	let rendered = render_file_with(input, options)?;

	match output {
		Some(output) => {
			std::fs::write(output, &rendered).map_err(|e| PreproError::io(output, e))?;
			println!(
				"{} {} -> {}",
				colored!("Rendered", green),
				input.display(),
				output.display()
			);
		}
		None => print!("{rendered}"),
	}

	Ok(())
}

/// Render `input` and compare against `output`. Returns `true` when the
/// output file is stale.
fn run_check(args: &PreproCli, input: &Path, output: &Path, show_diff: bool) -> CliResult<bool> {
	let options = render_options(args)?;
	let expected = render_file_with(input, options)?;
	let current = std::fs::read_to_string(output).map_err(|e| PreproError::io(output, e))?;

	tracing::debug!(
		output = %output.display(),
		current_bytes = current.len(),
		expected_bytes = expected.len(),
		"comparing rendered output"
	);

	if current == expected {
		println!("Check passed: {} is up to date.", output.display());
		return Ok(false);
	}

	eprintln!(
		"{} {} is out of date with {}",
		colored!("Stale:", yellow),
		output.display(),
		input.display()
	);
	if show_diff {
		print_diff(&current, &expected);
	}
	eprintln!(
		"\nRun `prepro render {} -o {}` to update it.",
		input.display(),
		output.display()
	);

	Ok(true)
}

/// Print a line diff between two strings, colorized.
fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		let line = change.to_string_lossy();
		let line = line.strip_suffix('\n').unwrap_or(&line);
		match change.tag() {
			ChangeTag::Delete => {
				eprintln!("  {}", colored!(format!("-{line}"), red));
			}
			ChangeTag::Insert => {
				eprintln!("  {}", colored!(format!("+{line}"), green));
			}
			ChangeTag::Equal => {
				eprintln!("   {line}");
			}
		}
	}
}
