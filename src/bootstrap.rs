//! Bootstrap orchestration
//!
//! One run: gate (hotplug only) → locate → mount → plan → engine.
//! Everything about the config drive degrades toward DHCP; only the engine's
//! exit status is reported back to the init system.

use crate::config::BootConfig;
use crate::engine::{CommandEngine, EngineRunner, EngineStatus};
use crate::gate::{InterfaceGate, InterfaceLock, LockAttempt, Platform};
use crate::plan::{EngineInvocation, InvocationMode, Plan, PlanOptions, Purpose};
use crate::volume::{self, BlockProbe, Blkid, ConfigVolume, MountOutcome, Mounter, SystemMount};
use crate::{BootError, plan};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What started this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Boot-time unit
    Boot,
    /// An interface appeared (udev)
    Hotplug,
}

/// Input for one run
#[derive(Debug, Clone)]
pub struct BootRequest {
    pub interface: Option<String>,
    pub trigger: Trigger,
    /// Pass the engine's dry-run flag
    pub noop: bool,
}

impl BootRequest {
    /// Configure everything
    pub fn boot() -> Self {
        Self {
            interface: None,
            trigger: Trigger::Boot,
            noop: false,
        }
    }

    /// Configure one interface that just appeared
    pub fn hotplug(interface: impl Into<String>) -> Self {
        Self {
            interface: Some(interface.into()),
            trigger: Trigger::Hotplug,
            noop: false,
        }
    }

    /// Configure one interface unconditionally (no idempotency gate)
    pub fn interface(interface: impl Into<String>) -> Self {
        Self {
            interface: Some(interface.into()),
            trigger: Trigger::Boot,
            noop: false,
        }
    }

    pub fn with_noop(mut self, noop: bool) -> Self {
        self.noop = noop;
        self
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The plan ran
    Completed,
    /// Hotplug for an interface that already has configuration
    AlreadyConfigured,
    /// Another process is configuring the same interface
    InProgress,
}

/// One engine run and its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRun {
    pub invocation: EngineInvocation,
    pub status: EngineStatus,
}

/// Everything a run decided and did
#[derive(Debug, Clone)]
pub struct RunReport {
    pub volume: ConfigVolume,
    pub mount: MountOutcome,
    pub mode: Option<InvocationMode>,
    pub runs: Vec<EngineRun>,
    pub outcome: Outcome,
}

impl RunReport {
    fn short_circuit(outcome: Outcome) -> Self {
        Self {
            volume: ConfigVolume::Absent,
            mount: MountOutcome::NotAttempted,
            mode: None,
            runs: Vec::new(),
            outcome,
        }
    }

    fn status_of(&self, purpose: Purpose) -> Option<EngineStatus> {
        self.runs
            .iter()
            .find(|run| run.invocation.purpose == purpose)
            .map(|run| run.status)
    }

    /// Process exit code
    ///
    /// The network pass's status wins; a failed identity pass is reported
    /// only when the network pass succeeded.
    pub fn exit_code(&self) -> u8 {
        match self.status_of(Purpose::Network) {
            Some(status) if !status.success() => status.code(),
            _ => self
                .status_of(Purpose::Identity)
                .map(|status| status.code())
                .unwrap_or(0),
        }
    }
}

/// The orchestrator
pub struct Bootstrap {
    config: BootConfig,
    gate: InterfaceGate,
    probe: Arc<dyn BlockProbe>,
    mounter: Arc<dyn Mounter>,
    engine: Arc<dyn EngineRunner>,
}

impl Bootstrap {
    /// Build with the system probe, mounter and engine
    pub fn new(config: BootConfig, gate: InterfaceGate) -> Self {
        let probe = Arc::new(Blkid::new(config.search_path.clone()));
        let mounter = Arc::new(SystemMount::new(config.search_path.clone()));
        let engine = Arc::new(CommandEngine::new(&config.engine, config.search_path.clone()));
        Self {
            config,
            gate,
            probe,
            mounter,
            engine,
        }
    }

    /// Build for the running system, detecting the platform unless configured
    pub async fn for_system(config: BootConfig) -> Self {
        let paths = config.paths();
        let platform = match config.platform {
            Some(platform) => platform,
            None => Platform::detect(&paths).await,
        };
        let gate = InterfaceGate::new(platform, paths);
        info!("Using {} network layout", gate.platform());
        Self::new(config, gate)
    }

    pub fn with_probe(mut self, probe: Arc<dyn BlockProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_mounter(mut self, mounter: Arc<dyn Mounter>) -> Self {
        self.mounter = mounter;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn EngineRunner>) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Run once
    pub async fn run(&self, request: &BootRequest) -> Result<RunReport, BootError> {
        let interface = request.interface.as_deref();
        if let Some(name) = interface {
            plan::validate_interface_name(name)?;
        }

        // Held until the engine has finished
        let _lock = match (interface, request.trigger) {
            (Some(name), Trigger::Hotplug) => match self.gate_hotplug(name).await {
                Ok(lock) => lock,
                Err(outcome) => return Ok(RunReport::short_circuit(outcome)),
            },
            _ => None,
        };

        let paths = self.config.paths();
        let volume =
            volume::locate(self.probe.as_ref(), &self.config.labels, &paths.config_drive()).await;

        let mount = match volume.handle() {
            Some(handle) => {
                volume::mount_volume(
                    self.mounter.as_ref(),
                    handle,
                    &self.config.mount,
                    &paths.mounts_table(),
                )
                .await
            }
            None => MountOutcome::NotAttempted,
        };
        debug!("Config drive mount: {}", mount);

        let options = PlanOptions {
            root: self.config.engine_root().map(Path::to_path_buf),
            extra_args: self.config.engine.extra_args.clone(),
            noop: request.noop,
        };
        let plan = Plan::build(&mount, interface, &options);
        info!("Invocation mode: {}", plan.mode);

        let mut runs = Vec::with_capacity(plan.invocations.len());
        for invocation in &plan.invocations {
            let status = self.engine.run(invocation).await?;
            runs.push(EngineRun {
                invocation: invocation.clone(),
                status,
            });
        }

        Ok(RunReport {
            volume,
            mount,
            mode: Some(plan.mode),
            runs,
            outcome: Outcome::Completed,
        })
    }

    /// Lock and gate a hotplug run
    ///
    /// `Err` carries the outcome that ends the run early. Lock and gate
    /// failures are logged and the run proceeds.
    async fn gate_hotplug(&self, name: &str) -> Result<Option<InterfaceLock>, Outcome> {
        let lock = match &self.config.lock_dir {
            Some(dir) => match InterfaceLock::acquire(dir, name).await {
                Ok(LockAttempt::Acquired(lock)) => Some(lock),
                Ok(LockAttempt::Held { owner }) => {
                    info!(
                        "{} is being configured by another process (pid {:?}), nothing to do",
                        name, owner
                    );
                    return Err(Outcome::InProgress);
                }
                Err(e) => {
                    warn!("{}; continuing without lock", e);
                    None
                }
            },
            None => None,
        };

        match self.gate.is_configured(name).await {
            Ok(true) => {
                info!("{} already configured, nothing to do", name);
                Err(Outcome::AlreadyConfigured)
            }
            Ok(false) => Ok(lock),
            Err(e) => {
                warn!("Cannot check existing configuration for {}: {}", name, e);
                Ok(lock)
            }
        }
    }
}
