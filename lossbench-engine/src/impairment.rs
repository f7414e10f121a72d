//! Control of the simulated packet loss on the test path.
//!
//! The loss percentage is a property of the host's network stack, shared by
//! every process on the machine. A [`LossController`] owns that state for the
//! duration of a run: it installs the rule, changes it once per loss level,
//! and puts it back to zero when the run ends.

use async_trait::async_trait;
use lossbench_core::{BenchError, LossLevel, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::BenchConfig;

#[async_trait]
pub trait LossController: Send {
    /// Installs the loss rule at 0%. Must tolerate an already installed rule.
    async fn initialize(&mut self) -> Result<()>;

    /// Changes the active loss percentage.
    async fn set_loss(&mut self, loss: LossLevel) -> Result<()>;

    /// Sets the loss back to 0%.
    async fn reset(&mut self) -> Result<()> {
        self.set_loss(LossLevel::ZERO).await
    }

    /// The last level successfully applied, if any.
    fn current_loss(&self) -> Option<LossLevel>;
}

/// Drives `tc qdisc ... netem loss` on a network device.
#[derive(Debug, Clone)]
pub struct NetemController {
    program: PathBuf,
    prefix: Vec<String>,
    device: String,
    active: Option<LossLevel>,
}

impl NetemController {
    /// Uses `program` directly, without `sudo`.
    pub fn new(program: impl Into<PathBuf>, device: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix: Vec::new(),
            device: device.into(),
            active: None,
        }
    }

    /// Runs `sudo <tc_program>` when the configuration asks for it.
    pub fn from_config(config: &BenchConfig) -> Self {
        if config.use_sudo {
            Self {
                program: PathBuf::from("sudo"),
                prefix: vec![config.tc_program.display().to_string()],
                device: config.device.clone(),
                active: None,
            }
        } else {
            Self::new(&config.tc_program, &config.device)
        }
    }

    fn qdisc_args(&self, verb: &str, loss: LossLevel) -> Vec<String> {
        let loss_arg = loss.as_netem_arg();
        let mut args = self.prefix.clone();
        args.extend(
            [
                "qdisc",
                verb,
                "dev",
                self.device.as_str(),
                "root",
                "netem",
                "loss",
                loss_arg.as_str(),
            ]
            .map(String::from),
        );
        args
    }

    async fn run_qdisc(&self, verb: &str, loss: LossLevel) -> Result<()> {
        let args = self.qdisc_args(verb, loss);
        debug!("{} {}", self.program.display(), args.join(" "));

        let status = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                BenchError::impairment(format!(
                    "failed to run `{}`: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !status.success() {
            return Err(BenchError::impairment(format!(
                "`{} {}` exited with {}",
                self.program.display(),
                args.join(" "),
                status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LossController for NetemController {
    async fn initialize(&mut self) -> Result<()> {
        match self.run_qdisc("add", LossLevel::ZERO).await {
            Ok(()) => {
                info!("Installed netem loss rule on {}", self.device);
                self.active = Some(LossLevel::ZERO);
            }
            // The rule usually survives from an earlier run; `change` will tell.
            Err(e) => warn!("Could not install netem rule on {}: {}", self.device, e),
        }
        Ok(())
    }

    async fn set_loss(&mut self, loss: LossLevel) -> Result<()> {
        self.run_qdisc("change", loss).await?;
        self.active = Some(loss);
        Ok(())
    }

    fn current_loss(&self) -> Option<LossLevel> {
        self.active
    }
}
