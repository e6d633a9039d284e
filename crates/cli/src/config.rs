//! Kubernetes connection settings for the CLI

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::PathBuf;
use tracing::debug;

/// Resolve the kubeconfig to use
///
/// An explicit path (flag or `KUBECONFIG`) wins; a `KUBECONFIG` list uses
/// its first entry. Falls back to `~/.kube/config` when that file exists.
pub fn kubeconfig_path(override_path: Option<&str>) -> Result<Option<PathBuf>> {
    if let Some(paths) = override_path.filter(|p| !p.is_empty()) {
        return Ok(std::env::split_paths(paths).next());
    }

    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    let default = home.join(".kube").join("config");
    Ok(default.exists().then_some(default))
}

/// Build a client from the resolved kubeconfig, or the in-cluster environment
pub async fn kube_client(override_path: Option<&str>) -> Result<Client> {
    let config = match kubeconfig_path(override_path)? {
        Some(path) => {
            debug!(path = %path.display(), "Loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(&path)
                .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("Failed to load kubeconfig context")?
        }
        None => Config::infer()
            .await
            .context("No kubeconfig found and not running in a cluster")?,
    };

    Client::try_from(config).context("Failed to create Kubernetes client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = kubeconfig_path(Some("/tmp/custom-kubeconfig")).unwrap();
        assert_eq!(path, Some(PathBuf::from("/tmp/custom-kubeconfig")));
    }

    #[cfg(unix)]
    #[test]
    fn test_kubeconfig_list_uses_first_entry() {
        let path = kubeconfig_path(Some("/tmp/first:/tmp/second")).unwrap();
        assert_eq!(path, Some(PathBuf::from("/tmp/first")));
    }
}
