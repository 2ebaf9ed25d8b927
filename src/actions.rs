use crate::classify::{ActionRunner, SystemAction};
use crate::config::ActionsConfig;
use anyhow::{Context, Result};
use std::process::Command;
use tracing::debug;

/// Runs actions by starting the configured systemd unit for each one.
/// Success is `systemctl start` exiting zero; there is no retry or timeout.
pub struct SystemctlRunner {
    wake_unit: String,
    logout_unit: String,
    screenoff_unit: String,
}

impl SystemctlRunner {
    pub fn new(config: &ActionsConfig) -> Self {
        Self {
            wake_unit: config.wake_unit.clone(),
            logout_unit: config.logout_unit.clone(),
            screenoff_unit: config.screenoff_unit.clone(),
        }
    }

    fn unit(&self, action: SystemAction) -> &str {
        match action {
            SystemAction::Wake => &self.wake_unit,
            SystemAction::LogoutPrompt => &self.logout_unit,
            SystemAction::ScreenOff => &self.screenoff_unit,
        }
    }
}

impl ActionRunner for SystemctlRunner {
    fn run(&self, action: SystemAction) -> Result<()> {
        let unit = self.unit(action);
        debug!(action = action.name(), unit = %unit, "starting unit");
        let status = Command::new("systemctl")
            .args(["start", unit])
            .status()
            .with_context(|| format!("spawning systemctl start {unit}"))?;
        anyhow::ensure!(status.success(), "systemctl start {unit} exited with {status}");
        Ok(())
    }
}
