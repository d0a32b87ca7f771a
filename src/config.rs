use std::fmt;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{DeployerError, Result};
use crate::inventory::{HostPair, default_inventory_path};
use crate::store::{ConfigStore, Section};

/// Section every configuration file must carry.
pub const GLOBAL_SECTION: &str = "global";
/// Optional section merged between global and deployment options.
pub const DEBUG_SECTION: &str = "debug";
/// Key in the global section naming the deployment kind.
pub const DEPLOYMENT_KEY: &str = "deployment";
/// Deployment kind whose hosts already exist and are listed in the config.
pub const EXTERNAL_HOSTS_KIND: &str = "other";

/// Output format for the assembled command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Whether stdout carries only the serialized plan. Structured formats
    /// apply to dry runs; a real run always prints its status lines.
    pub fn is_structured(self, dry_run: bool) -> bool {
        dry_run && self != OutputFormat::Text
    }
}

/// Top-level CLI structure.
#[derive(Debug, Parser)]
#[command(
    name = "autoinstaller",
    version,
    about = "Autoinstaller for OpenShift in Action",
    long_about = "Reads autoinstaller.conf, turns its [global], [debug] and deployment sections into ansible extra vars and runs the OpenShift playbook. Use --dry-run to print the ansible-playbook command without launching it."
)]
pub struct CliArgs {
    /// Chapter you would like to provision through.
    #[arg(short, long, default_value_t = 0)]
    pub chapter: u32,

    /// Autoinstaller config file.
    #[arg(long = "config", default_value = "autoinstaller.conf")]
    pub config_file: PathBuf,

    /// Deployment to use (overrides `deployment` in [global]).
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Output the installation command but do not launch the installer.
    #[arg(short, long, default_value_t = false)]
    pub dry_run: bool,

    /// Provisioning runner binary.
    #[arg(long, env = "AUTOINSTALLER_RUNNER", default_value = "ansible-playbook")]
    pub runner: String,

    /// Directory holding the playbook and the default `hosts` inventory.
    #[arg(long, default_value = "./ansible")]
    pub playbook_dir: PathBuf,

    /// Playbook entrypoint inside --playbook-dir.
    #[arg(long, default_value = "site.yml")]
    pub playbook: String,

    /// Output format for the assembled command (text|json|yaml).
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Selected deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentKind {
    /// Two existing hosts; an inventory is generated for them.
    ExternalHosts(HostPair),
    /// Any other deployment, named after its config section.
    Provider(String),
}

impl DeploymentKind {
    pub fn name(&self) -> &str {
        match self {
            DeploymentKind::ExternalHosts(_) => EXTERNAL_HOSTS_KIND,
            DeploymentKind::Provider(name) => name.as_str(),
        }
    }

    pub fn hosts(&self) -> Option<&HostPair> {
        match self {
            DeploymentKind::ExternalHosts(hosts) => Some(hosts),
            DeploymentKind::Provider(_) => None,
        }
    }
}

impl fmt::Display for DeploymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Deployment kind plus the sections that feed its variables.
#[derive(Debug, Clone)]
pub struct DeploymentTarget {
    pub kind: DeploymentKind,
    /// The section named after the kind, if the file has one.
    pub options: Option<Section>,
    /// The `[debug]` section, if the file has one.
    pub debug: Option<Section>,
}

/// Complete configuration used by the autoinstaller. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub chapter: u32,
    pub config_path: PathBuf,
    pub dry_run: bool,
    pub runner: String,
    pub playbook_dir: PathBuf,
    pub playbook: String,
    pub output: OutputFormat,
    pub global: Section,
    pub target: DeploymentTarget,
    /// Where the inventory for external hosts is written.
    pub generated_inventory: PathBuf,
}

impl DeployConfig {
    /// Load the configuration file named by `cli` and build the config.
    pub fn from_args(cli: CliArgs) -> Result<Self> {
        let store = ConfigStore::load(&cli.config_file)?;
        Self::from_store(cli, &store)
    }

    /// Build the config from an already parsed store.
    pub fn from_store(cli: CliArgs, store: &ConfigStore) -> Result<Self> {
        let mut global = store.required_section(GLOBAL_SECTION)?;

        let deployment = match cli.provider.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            Some(_) => {
                return Err(DeployerError::Config(
                    "--provider must not be empty".to_string(),
                ));
            }
            None => global
                .get(DEPLOYMENT_KEY)
                .map(str::to_string)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    DeployerError::Config(format!(
                        "[{GLOBAL_SECTION}] must set '{DEPLOYMENT_KEY}' or pass --provider"
                    ))
                })?,
        };
        // The playbook sees the deployment actually chosen.
        global.set(DEPLOYMENT_KEY, deployment.as_str());

        let options = store.section(&deployment)?;
        let kind = if deployment == EXTERNAL_HOSTS_KIND {
            DeploymentKind::ExternalHosts(host_pair(options.as_ref())?)
        } else {
            DeploymentKind::Provider(deployment)
        };

        let config_path = store
            .source()
            .map(Path::to_path_buf)
            .unwrap_or(cli.config_file);

        Ok(Self {
            chapter: cli.chapter,
            config_path,
            dry_run: cli.dry_run,
            runner: cli.runner,
            playbook_dir: cli.playbook_dir,
            playbook: cli.playbook,
            output: cli.output,
            global,
            target: DeploymentTarget {
                kind,
                options,
                debug: store.section(DEBUG_SECTION)?,
            },
            generated_inventory: default_inventory_path(),
        })
    }

    /// Inventory checked in next to the playbook.
    pub fn default_inventory(&self) -> PathBuf {
        self.playbook_dir.join("hosts")
    }

    pub fn playbook_path(&self) -> PathBuf {
        self.playbook_dir.join(&self.playbook)
    }
}

fn host_pair(section: Option<&Section>) -> Result<HostPair> {
    let lookup = |key: &str| {
        section
            .and_then(|section| section.get(key))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DeployerError::MissingKey {
                section: EXTERNAL_HOSTS_KIND.to_string(),
                key: key.to_string(),
            })
    };
    Ok(HostPair {
        master: lookup("master")?,
        node: lookup("node")?,
    })
}
