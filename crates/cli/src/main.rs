use std::process::ExitCode;

fn main() -> ExitCode {
    sendmoney_cli::run()
}
