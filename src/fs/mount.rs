use std::path::Path;

use anyhow::{Context, Result};
use fuser::MountOption;
use tracing::{info, warn};

use crate::fs::filesystem::TagFs;

/// Mount settings gathered from the command line.
#[derive(Debug, Clone, Default)]
pub struct MountSettings {
    pub fs_name: String,
    /// Raw `-o` values, each possibly a comma-separated list.
    pub options: Vec<String>,
    pub allow_other: bool,
    pub auto_unmount: bool,
}

impl MountSettings {
    /// The tree is always mounted read-only; `rw` is ignored.
    pub fn mount_options(&self) -> Vec<MountOption> {
        let mut options = vec![MountOption::FSName(self.fs_name.clone()), MountOption::RO];

        for raw in self.options.iter().flat_map(|o| o.split(',')) {
            let raw = raw.trim();
            let option = match raw {
                "" | "ro" => continue,
                "rw" => {
                    warn!("Ignoring 'rw': the tag tree is read-only");
                    continue;
                }
                "allow_other" => MountOption::AllowOther,
                "allow_root" => MountOption::AllowRoot,
                "auto_unmount" => MountOption::AutoUnmount,
                "default_permissions" => MountOption::DefaultPermissions,
                "nodev" => MountOption::NoDev,
                "nosuid" => MountOption::NoSuid,
                "noexec" => MountOption::NoExec,
                "noatime" => MountOption::NoAtime,
                other => match other.split_once('=') {
                    Some(("fsname", name)) => MountOption::FSName(name.to_string()),
                    Some(("subtype", name)) => MountOption::Subtype(name.to_string()),
                    _ => MountOption::CUSTOM(other.to_string()),
                },
            };
            push_unique(&mut options, option);
        }

        if self.allow_other {
            push_unique(&mut options, MountOption::AllowOther);
        }
        if self.auto_unmount {
            push_unique(&mut options, MountOption::AutoUnmount);
        }
        options
    }
}

fn push_unique(options: &mut Vec<MountOption>, option: MountOption) {
    if let MountOption::FSName(_) = option {
        options.retain(|o| !matches!(o, MountOption::FSName(_)));
    }
    if !options.contains(&option) {
        options.push(option);
    }
}

/// Mounts `fs` and blocks until it is unmounted.
pub fn mount(fs: TagFs, mountpoint: &Path, settings: &MountSettings) -> Result<()> {
    let options = settings.mount_options();
    info!("Mounting at {:?} with {:?}", mountpoint, options);
    fuser::mount2(fs, mountpoint, &options)
        .with_context(|| format!("Failed to mount at {:?}", mountpoint))?;
    info!("Unmounted {:?}", mountpoint);
    Ok(())
}
