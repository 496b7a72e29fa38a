use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use yeagar_transformer::{Driver, DriverOptions};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("YEAGAR_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = DriverOptions::from_args(std::env::args_os());
    let driver = match Driver::new(&options) {
        Ok(driver) => driver,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match driver.transform_units(&options.files) {
        Ok(outputs) => {
            for (path, code) in outputs {
                println!("// {}\n{}", path.display(), code);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
