use std::io;
use std::path::Path;
use std::process::Command;

use tracing::info;

/// Starts the provisioned artifact. The process is not waited on.
pub trait Launcher: Send + Sync {
    fn launch(&self, artifact: &Path) -> io::Result<()>;
}

/// Spawns the artifact as a child process with the asset directory as its working
/// directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&self, artifact: &Path) -> io::Result<()> {
        let mut command = Command::new(artifact);
        if let Some(dir) = artifact.parent() {
            command.current_dir(dir);
        }
        let child = command.spawn()?;
        info!(artifact = %artifact.display(), pid = child.id(), "launched");
        Ok(())
    }
}
