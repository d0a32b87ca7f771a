use clap::Parser;

use autoinstaller::{
    config::{CliArgs, DeployConfig},
    deploy, telemetry,
};

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();
    telemetry::init(cli.verbose);
    if !cli.output.is_structured(cli.dry_run) {
        println!("{}", deploy::intro_text());
    }

    match DeployConfig::from_args(cli) {
        Ok(config) => match deploy::run(&config).await {
            Ok(code) => std::process::exit(code),
            Err(err) => {
                eprintln!("error: {err}");
                std::process::exit(1);
            }
        },
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    }
}
