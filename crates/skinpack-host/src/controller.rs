use std::time::Duration;

use skinpack_core::Activation;

use crate::{HostCommand, HostControl, HostError};

/// Poll cadence and caps for the shutdown and launch loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub poll_interval: Duration,
    /// Polls after the quit request before quiesce gives up.
    pub quiesce_timeout_polls: u32,
    /// Polls after the quit request before the host is terminated forcibly.
    pub force_after_polls: u32,
    /// Polls granted to a de-elevated launch before falling back to an
    /// elevated one.
    pub unelevated_launch_polls: u32,
    /// Total polls granted to a launch, fallback included.
    pub launch_timeout_polls: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            quiesce_timeout_polls: 100,
            force_after_polls: 50,
            unelevated_launch_polls: 50,
            launch_timeout_polls: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuiesceOutcome {
    NotRunning,
    Stopped { polls: u32, forced: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaunchOutcome {
    pub polls: u32,
    /// The de-elevated launch never appeared and the host now runs with the
    /// installer's elevated rights.
    pub elevated_fallback: bool,
    pub activation: Option<HostCommand>,
}

pub struct HostController<C> {
    control: C,
    config: LifecycleConfig,
}

impl<C: HostControl> HostController<C> {
    pub fn new(control: C, config: LifecycleConfig) -> Self {
        Self { control, config }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn into_inner(self) -> C {
        self.control
    }

    pub fn detect_running(&mut self) -> bool {
        self.control.is_running()
    }

    /// Asks a running host to quit, terminating it once `force_after_polls`
    /// have elapsed. Fails after `quiesce_timeout_polls`.
    pub fn quiesce(&mut self) -> Result<QuiesceOutcome, HostError> {
        if !self.control.is_running() {
            return Ok(QuiesceOutcome::NotRunning);
        }

        tracing::debug!("requesting host shutdown");
        if let Err(err) = self.control.send_command(&HostCommand::Quit) {
            tracing::warn!(error = %err, "failed to send quit command");
        }

        let mut forced = false;
        for poll in 1..=self.config.quiesce_timeout_polls {
            self.control.sleep(self.config.poll_interval);
            if !self.control.is_running() {
                tracing::debug!(polls = poll, forced, "host stopped");
                return Ok(QuiesceOutcome::Stopped { polls: poll, forced });
            }
            if poll >= self.config.force_after_polls {
                if !forced {
                    tracing::warn!(polls = poll, "host is not closing; terminating it");
                }
                forced = true;
                if let Err(err) = self.control.terminate() {
                    tracing::warn!(error = %err, "forced termination failed");
                }
            }
        }

        Err(HostError::QuiesceTimeout {
            polls: self.config.quiesce_timeout_polls,
        })
    }

    /// Starts the host and sends the activation command once it is up.
    ///
    /// An elevated installer first tries a de-elevated launch and only falls
    /// back to an elevated one after `unelevated_launch_polls`.
    pub fn relaunch(
        &mut self,
        elevated: bool,
        activation: &Activation,
    ) -> Result<RelaunchOutcome, HostError> {
        let cap = self.config.launch_timeout_polls;
        let mut elevated_fallback = false;

        let polls = if elevated {
            let first_window = self.config.unelevated_launch_polls.min(cap);
            let unelevated = match self.control.start(false) {
                Ok(()) => self.wait_for_start(0, first_window),
                Err(err) => {
                    tracing::warn!(error = %err, "de-elevated launch failed");
                    None
                }
            };
            match unelevated {
                Some(polls) => polls,
                None => {
                    tracing::warn!("host did not start unelevated; starting it elevated");
                    elevated_fallback = true;
                    self.control.start(true)?;
                    self.wait_for_start(first_window, cap)
                        .ok_or(HostError::LaunchTimeout { polls: cap })?
                }
            }
        } else {
            self.control.start(false)?;
            self.wait_for_start(0, cap)
                .ok_or(HostError::LaunchTimeout { polls: cap })?
        };

        let activation = HostCommand::from_activation(activation);
        if let Some(command) = &activation {
            tracing::debug!(command = %command, "activating installed content");
            self.control.send_command(command)?;
        }

        Ok(RelaunchOutcome {
            polls,
            elevated_fallback,
            activation,
        })
    }

    fn wait_for_start(&mut self, from: u32, until: u32) -> Option<u32> {
        let mut poll = from;
        loop {
            if self.control.is_running() {
                return Some(poll);
            }
            if poll >= until {
                return None;
            }
            self.control.sleep(self.config.poll_interval);
            poll += 1;
        }
    }
}
