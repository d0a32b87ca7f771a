use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DeployerError, Result};

/// File name of the generated inventory inside the temporary directory.
pub const INVENTORY_FILE_NAME: &str = "autoinstaller-other-hosts";

/// The two pre-existing hosts of an `other` deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPair {
    pub master: String,
    pub node: String,
}

impl HostPair {
    /// Inventory text with a combined group plus one group per host.
    pub fn render(&self) -> String {
        format!(
            "[openshift]\n{master}\n{node}\n\n[master]\n{master}\n\n[node]\n{node}\n",
            master = self.master,
            node = self.node
        )
    }
}

/// Process-wide location of the generated inventory. Nothing removes it.
pub fn default_inventory_path() -> PathBuf {
    env::temp_dir().join(INVENTORY_FILE_NAME)
}

/// Write the inventory for `hosts` to `path`, replacing any existing file.
pub fn write_inventory(path: &Path, hosts: &HostPair) -> Result<PathBuf> {
    fs::write(path, hosts.render()).map_err(|source| DeployerError::InventoryWrite {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), master = %hosts.master, node = %hosts.node, "wrote inventory");
    Ok(path.to_path_buf())
}
