use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Render source templates driven by `//#` directive lines.",
	long_about = "prepro is a preprocessor for configuration and source files.\n\nAny line whose \
	              first non-blank characters are `//#` is a directive: a line of script that \
	              runs while the template renders. Everything else is copied to the output in \
	              order.\n\nQuick start:\n  prepro init                     Create a sample \
	              template and prepro.toml\n  prepro render app.conf.tpl      Print the rendered \
	              template\n  prepro check app.conf.tpl -o app.conf  Verify a rendered file is \
	              up to date"
)]
pub struct PreproCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory, where `prepro.toml` is looked up.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Define a top-level data value as `KEY=VALUE`. The value is parsed as
	/// JSON when possible and kept as a string otherwise. Overrides values
	/// from `prepro.toml`.
	#[arg(long = "define", short = 'D', value_name = "KEY=VALUE")]
	pub defines: Vec<String>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Initialize prepro in a project with a sample template and config.
	///
	/// Creates `prepro.toml` and `example.conf.tpl` in the project root.
	/// Existing files are left untouched.
	Init,
	/// Render a template.
	///
	/// Writes the result to stdout, or to `--output` when given. Relative
	/// `include` and `readFile` paths resolve against the template's own
	/// directory.
	Render {
		/// The template to render.
		input: PathBuf,

		/// Write the result to this file instead of stdout.
		#[arg(long, short)]
		output: Option<PathBuf>,

		/// Watch the project for file changes and re-render automatically.
		#[arg(long, default_value_t = false)]
		watch: bool,

		/// Define a top-level data value as `KEY=VALUE`.
		#[arg(long = "define", short = 'D', value_name = "KEY=VALUE")]
		defines: Vec<String>,
	},
	/// Check that a rendered file is up to date with its template.
	///
	/// Renders the template and compares the result to the output file.
	/// Exits with status code 1 when they differ. Ideal for CI pipelines.
	Check {
		/// The template to render.
		input: PathBuf,

		/// The previously rendered file to compare against.
		#[arg(long, short)]
		output: PathBuf,

		/// Show a line diff between the current and expected content.
		#[arg(long, default_value_t = false)]
		diff: bool,

		/// Define a top-level data value as `KEY=VALUE`.
		#[arg(long = "define", short = 'D', value_name = "KEY=VALUE")]
		defines: Vec<String>,
	},
}

impl PreproCli {
	/// `-D` values in command-line order: those before the subcommand, then
	/// those after it.
	pub fn all_defines(&self) -> Vec<&str> {
		let command_defines: &[String] = match &self.command {
			Some(Commands::Render { defines, .. } | Commands::Check { defines, .. }) => {
				defines.as_slice()
			}
			Some(Commands::Init) | None => &[],
		};

		self.defines
			.iter()
			.chain(command_defines)
			.map(String::as_str)
			.collect()
	}
}
