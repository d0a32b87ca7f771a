use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{Instrument, info, info_span};

use crate::command::CommandLine;
use crate::config::{DEBUG_SECTION, DeployConfig, GLOBAL_SECTION, OutputFormat};
use crate::error::Result;
use crate::inventory::write_inventory;
use crate::runner::{CommandRunner, ShellRunner, check_runner};
use crate::store::Section;
use crate::vars::extra_vars;

pub const GITHUB_URL: &str = "https://github.com/OpenShiftInAction";
pub const AUTOINSTALLER_URL: &str = "https://github.com/OpenShiftInAction/autoinstaller";
pub const FORUM_URL: &str = "https://forums.manning.com/forums/openshift-in-action";

/// What is about to run, as shown in dry-run output.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentPlan {
    pub deployment: String,
    pub dry_run: bool,
    pub inventory: PathBuf,
    pub command: CommandLine,
    pub shell_command: String,
}

/// Sink for user-facing status lines. When stdout carries a structured plan
/// the status lines go to the log instead.
pub struct Console<W: Write> {
    out: W,
    format: OutputFormat,
    structured: bool,
}

impl<W: Write> Console<W> {
    pub fn new(out: W, format: OutputFormat, dry_run: bool) -> Self {
        Self {
            out,
            format,
            structured: format.is_structured(dry_run),
        }
    }

    pub fn line(&mut self, message: impl AsRef<str>) -> Result<()> {
        if self.structured {
            info!("{}", message.as_ref());
            return Ok(());
        }
        writeln!(self.out, "{}", message.as_ref())?;
        self.out.flush()?;
        Ok(())
    }

    /// Print the dry-run plan in the selected format.
    pub fn plan(&mut self, plan: &DeploymentPlan) -> Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "* Dry run command: {}", plan.shell_command)?,
            OutputFormat::Json => writeln!(self.out, "{}", serde_json::to_string_pretty(plan)?)?,
            OutputFormat::Yaml => write!(self.out, "{}", serde_yaml_bw::to_string(plan)?)?,
        }
        self.out.flush()?;
        Ok(())
    }
}

pub fn intro_text() -> String {
    format!(
        "
Thank you for reading OpenShift In Action. The autoinstaller application is
designed to help you save time when building out your environment to work
through the examples in the book.

A complete feature list and additional information is available in README.md in
{AUTOINSTALLER_URL}.

If you have issues, please contact us on GitHub at {GITHUB_URL} or on the Manning
book forum at {FORUM_URL}.

Thanks again!

The OpenShift In Action Team
"
    )
}

pub async fn run(config: &DeployConfig) -> Result<i32> {
    run_with_runner(config, &ShellRunner).await
}

/// Assemble the runner command for `config`, then either print it (dry run)
/// or execute it with `runner`. Returns the exit code to leave with.
pub async fn run_with_runner(config: &DeployConfig, runner: &dyn CommandRunner) -> Result<i32> {
    run_with_output(config, runner, &mut io::stdout()).await
}

/// Like [`run_with_runner`] with status lines and the plan written to `out`.
pub async fn run_with_output<W: Write>(
    config: &DeployConfig,
    runner: &dyn CommandRunner,
    out: &mut W,
) -> Result<i32> {
    let span = info_span!(
        "deployment",
        deployment = %config.target.kind,
        dry_run = config.dry_run,
        chapter = config.chapter
    );
    let mut console = Console::new(out, config.output, config.dry_run);
    deploy(config, runner, &mut console).instrument(span).await
}

async fn deploy<W: Write>(
    config: &DeployConfig,
    runner: &dyn CommandRunner,
    console: &mut Console<W>,
) -> Result<i32> {
    report_loaded(config, console)?;

    let inventory = match config.target.kind.hosts() {
        Some(hosts) => {
            console.line(format!(
                "* Creating inventory for {} and {} at {}",
                hosts.master,
                hosts.node,
                config.generated_inventory.display()
            ))?;
            write_inventory(&config.generated_inventory, hosts)?
        }
        None => config.default_inventory(),
    };

    let command = assemble(config, &inventory);
    let plan = DeploymentPlan {
        deployment: config.target.kind.name().to_string(),
        dry_run: config.dry_run,
        inventory,
        shell_command: command.to_shell_string(),
        command,
    };
    info!(command = %plan.shell_command, "assembled runner command");

    if config.dry_run {
        check_runner(&config.runner);
        console.plan(&plan)?;
        return Ok(0);
    }

    console.line(format!("* Running: {}", plan.shell_command))?;
    let code = runner.run(&plan.command).await?;
    info!(code, "provisioning runner finished");
    if code != 0 {
        // The relayed stderr may not end with a newline.
        console.line(format!("\n* {} exited with status {code}", config.runner))?;
    }
    Ok(code)
}

/// `<runner> -i <inventory> <extra vars> <playbook_dir>/<playbook>`
pub fn assemble(config: &DeployConfig, inventory: &Path) -> CommandLine {
    let empty = Section::new();
    let debug = config.target.debug.as_ref().unwrap_or(&empty);
    let options = config.target.options.as_ref().unwrap_or(&empty);

    let mut tokens = vec![
        config.runner.clone(),
        "-i".to_string(),
        inventory.display().to_string(),
    ];
    tokens.extend(extra_vars(&[&config.global, debug, options]));
    tokens.push(config.playbook_path().display().to_string());
    CommandLine::new(tokens)
}

fn report_loaded<W: Write>(config: &DeployConfig, console: &mut Console<W>) -> Result<()> {
    if config.dry_run {
        console.line("*** Dry Run Mode Enabled - no actual systems will be deployed\n")?;
    }
    console.line(format!(
        "* Using {} for configuration",
        config.config_path.display()
    ))?;
    if config.chapter > 0 {
        console.line(format!("* Chapter {} selected", config.chapter))?;
    }
    console.line(format!("* Loaded {GLOBAL_SECTION} configuration options"))?;
    if config.target.debug.is_some() {
        console.line(format!("* Loaded {DEBUG_SECTION} configuration options"))?;
    }
    let name = config.target.kind.name();
    if config.target.options.is_some() {
        console.line(format!("* Loaded {name} configuration options"))
    } else {
        console.line(format!("* No {name} options found - none loaded"))
    }
}
