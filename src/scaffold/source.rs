use std::fs;
use std::path::Path;

use crate::common::command_utils::run_checked;
use crate::config::types::RepoConfig;
use crate::error::Result;

/// Makes a repository's sources available in a local directory.
pub trait SourceFetcher {
    fn fetch(&self, repo: &RepoConfig, dest: &Path) -> Result<()>;
}

/// Clones with the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl SourceFetcher for GitCli {
    fn fetch(&self, repo: &RepoConfig, dest: &Path) -> Result<()> {
        if dest.exists() {
            log::debug!("Removing previous clone at {}", dest.display());
            fs::remove_dir_all(dest)?;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        log::info!("Cloning {} into {}", repo.github_ref, dest.display());
        let target = dest.to_string_lossy();
        run_checked("git", &["clone", &repo.github_ref, target.as_ref()], None)?;

        if let Some(branch) = &repo.branch {
            log::info!("Checking out branch {}", branch);
            run_checked("git", &["checkout", branch], Some(dest))?;
        }
        Ok(())
    }
}
