use assert_cmd::Command;

pub fn prepro_cmd() -> Command {
	let mut cmd = Command::new(env!("CARGO_BIN_EXE_prepro"));
	cmd.env("NO_COLOR", "1").env_remove("PREPRO_LOG");
	cmd
}
