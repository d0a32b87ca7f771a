use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use autoinstaller::config::{CliArgs, DeployConfig, OutputFormat};
use autoinstaller::deploy::{run_with_output, run_with_runner};
use autoinstaller::error::{DeployerError, Result};
use autoinstaller::{CommandLine, CommandRunner};
use clap::Parser;
use tempfile::{TempDir, tempdir};

struct MockRunner {
    exit_code: i32,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockRunner {
    fn new(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, command: &CommandLine) -> Result<i32> {
        self.calls.lock().unwrap().push(command.tokens().to_vec());
        Ok(self.exit_code)
    }
}

fn write_conf(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("autoinstaller.conf");
    fs::write(&path, contents).expect("write config");
    path
}

fn load(dir: &TempDir, contents: &str, extra: &[&str]) -> Result<DeployConfig> {
    let conf = write_conf(dir.path(), contents);
    let mut args = vec![
        "autoinstaller",
        "--config",
        conf.to_str().expect("config path"),
        "--runner",
        "ansible-playbook",
        "--playbook-dir",
        "./ansible",
    ];
    args.extend_from_slice(extra);
    let mut config = DeployConfig::from_args(CliArgs::parse_from(args))?;
    config.generated_inventory = dir.path().join("autoinstaller-other-hosts");
    Ok(config)
}

#[tokio::test]
async fn dry_run_never_invokes_runner() {
    let temp = tempdir().expect("temp dir");
    let config = load(
        &temp,
        "[global]\ndeployment = aws\n[aws]\nregion = us-east-1\n",
        &["--dry-run"],
    )
    .expect("config");

    let runner = MockRunner::new(9);
    let mut out = Vec::new();
    let code = run_with_output(&config, &runner, &mut out)
        .await
        .expect("dry run");
    assert_eq!(code, 0);
    assert!(runner.calls().is_empty());

    let printed = String::from_utf8(out).expect("utf8");
    assert!(printed.contains("*** Dry Run Mode Enabled"), "{printed}");
    assert!(
        printed.contains(
            "* Dry run command: ansible-playbook -i ./ansible/hosts -e deployment=aws -e region=us-east-1 ./ansible/site.yml\n"
        ),
        "{printed}"
    );
}

#[tokio::test]
async fn json_dry_run_prints_only_the_plan() {
    let temp = tempdir().expect("temp dir");
    let config = load(
        &temp,
        "[global]\ndeployment = aws\n",
        &["--dry-run", "--output", "json"],
    )
    .expect("config");
    assert_eq!(config.output, OutputFormat::Json);

    let runner = MockRunner::new(0);
    let mut out = Vec::new();
    run_with_output(&config, &runner, &mut out)
        .await
        .expect("dry run");

    let plan: serde_json::Value = serde_json::from_slice(&out).expect("stdout is json");
    assert_eq!(plan["deployment"], "aws");
    assert_eq!(plan["dry_run"], true);
    assert_eq!(plan["inventory"], "./ansible/hosts");
    assert_eq!(plan["command"][0], "ansible-playbook");
    assert_eq!(
        plan["shell_command"],
        "ansible-playbook -i ./ansible/hosts -e deployment=aws ./ansible/site.yml"
    );
}

#[tokio::test]
async fn structured_output_flag_does_not_silence_a_real_run() {
    let temp = tempdir().expect("temp dir");
    let config = load(&temp, "[global]\ndeployment = aws\n", &["--output", "json"])
        .expect("config");

    let runner = MockRunner::new(0);
    let mut out = Vec::new();
    let code = run_with_output(&config, &runner, &mut out)
        .await
        .expect("run");
    assert_eq!(code, 0);

    let printed = String::from_utf8(out).expect("utf8");
    assert!(printed.contains("* Loaded global configuration options"), "{printed}");
    assert!(
        printed.contains(
            "* Running: ansible-playbook -i ./ansible/hosts -e deployment=aws ./ansible/site.yml"
        ),
        "{printed}"
    );
}

#[tokio::test]
async fn failure_status_starts_on_its_own_line() {
    let temp = tempdir().expect("temp dir");
    let config = load(&temp, "[global]\ndeployment = aws\n", &[]).expect("config");

    let runner = MockRunner::new(7);
    let mut out = Vec::new();
    let code = run_with_output(&config, &runner, &mut out)
        .await
        .expect("run");
    assert_eq!(code, 7);

    let printed = String::from_utf8(out).expect("utf8");
    assert!(
        printed.ends_with("\n\n* ansible-playbook exited with status 7\n"),
        "{printed}"
    );
}

#[tokio::test]
async fn execution_mirrors_runner_exit_code() {
    let temp = tempdir().expect("temp dir");
    let config = load(
        &temp,
        "[global]\ndeployment = aws\n[debug]\nverbosity = 2\n[aws]\nregion = us-east-1\n",
        &[],
    )
    .expect("config");

    let runner = MockRunner::new(4);
    let code = run_with_runner(&config, &runner).await.expect("run");
    assert_eq!(code, 4);
    assert_eq!(
        runner.calls(),
        vec![vec![
            "ansible-playbook",
            "-i",
            "./ansible/hosts",
            "-e",
            "deployment=aws",
            "-e",
            "verbosity=2",
            "-e",
            "region=us-east-1",
            "./ansible/site.yml",
        ]]
    );
}

#[tokio::test]
async fn external_hosts_get_generated_inventory() {
    let temp = tempdir().expect("temp dir");
    let config = load(
        &temp,
        "[global]\ndeployment = aws\n[other]\nmaster = 1.2.3.4\nnode = 5.6.7.8\n",
        &["--provider", "other"],
    )
    .expect("config");

    let runner = MockRunner::new(0);
    let code = run_with_runner(&config, &runner).await.expect("run");
    assert_eq!(code, 0);

    let inventory = temp.path().join("autoinstaller-other-hosts");
    let text = fs::read_to_string(&inventory).expect("inventory written");
    assert!(text.contains("[master]\n1.2.3.4\n"));
    assert!(text.contains("[node]\n5.6.7.8\n"));

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][2], inventory.display().to_string());
    assert!(calls[0].contains(&"deployment=other".to_string()));
    assert!(calls[0].contains(&"master=1.2.3.4".to_string()));
}

#[tokio::test]
async fn inventory_write_failure_stops_before_runner() {
    let temp = tempdir().expect("temp dir");
    let mut config = load(
        &temp,
        "[global]\ndeployment = other\n[other]\nmaster = a\nnode = b\n",
        &[],
    )
    .expect("config");
    config.generated_inventory = temp.path().join("missing").join("hosts");

    let runner = MockRunner::new(0);
    let err = run_with_runner(&config, &runner).await.unwrap_err();
    assert!(matches!(err, DeployerError::InventoryWrite { .. }), "{err}");
    assert!(runner.calls().is_empty());
}

#[test]
fn missing_global_section_is_fatal() {
    let temp = tempdir().expect("temp dir");
    let err = load(&temp, "[aws]\nregion = us-east-1\n", &["--provider", "aws"]).unwrap_err();
    assert!(matches!(err, DeployerError::MissingSection(_)), "{err}");
}

#[test]
fn missing_config_file_is_fatal() {
    let temp = tempdir().expect("temp dir");
    let missing = temp.path().join("nope.conf");
    let cli = CliArgs::parse_from([
        "autoinstaller",
        "--config",
        missing.to_str().expect("path"),
    ]);
    let err = DeployConfig::from_args(cli).unwrap_err();
    assert!(matches!(err, DeployerError::ConfigNotFound(_)), "{err}");
}
