use crate::{
    helpe::*,
    snapshot::Snapshot,
};

/// Owner of the one live [Simulation].
///
/// Every operation takes `&self` and holds the lock for its whole
/// duration, so a controller can sit behind an `Arc` and be driven by a
/// concurrent transport: no step ever interleaves with another step or
/// with a snapshot read.
///
/// Operations either fully succeed or leave the live simulation exactly
/// as it was: stepping works on a copy that replaces the original only
/// on success.
#[derive(Debug)]
pub struct SimulationController {
    slot:           Mutex<Option<Simulation>>,
    log_capacity:   usize,
}

impl Default for SimulationController {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationController {
    pub fn new() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Simulations built by this controller keep the last `log_capacity`
    /// event-log lines.
    pub fn with_log_capacity(log_capacity: usize) -> Self {
        Self {
            slot: Mutex::new(None),
            log_capacity,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Simulation>>, StateError> {
        self.slot.lock().map_err(|_| StateError::Poisoned)
    }

    /// For operations that throw the live simulation away: whatever a
    /// panicking holder left behind is about to be dropped, so the poison
    /// is cleared instead of reported.
    fn lock_for_replace(&self) -> MutexGuard<'_, Option<Simulation>> {
        self.slot.lock().unwrap_or_else(|poisoned| {
            warn!("discarding a simulation left behind by a panic");
            self.slot.clear_poison();
            PoisonError::into_inner(poisoned)
        })
    }

    /// Runs `f` against a copy of the live simulation and commits the
    /// copy only if `f` succeeds.
    fn transact<T>(
        &self,
        f: impl FnOnce(&mut Simulation) -> Result<T, StateError>,
    ) -> Result<T, SimError> {
        let mut guard = self.lock()?;
        let live = guard.as_mut().ok_or(StateError::NotInitialized)?;
        let mut next = live.clone();
        let res = f(&mut next)?;
        *live = next;

        Ok(res)
    }

    /// Replaces whatever was loaded with a new simulation built from
    /// `config`. A bad configuration leaves the previous one in place.
    /// Also recovers a controller whose lock was poisoned by a panic.
    pub fn initialize(&self, config: SimConfig) -> Result<Snapshot, SimError> {
        config.validate()?;
        let sim = Simulation::with_log_capacity(&config, self.log_capacity)?;
        let snap = Snapshot::capture(&sim);
        let replaced = self.lock_for_replace().replace(sim).is_some();
        info!(replaced, "controller loaded a new simulation");

        Ok(snap)
    }

    /// Advances one tick. A finished simulation is left as is.
    pub fn step(&self) -> Result<Snapshot, SimError> {
        self.transact(|sim| {
            sim.step()?;
            Ok(Snapshot::capture(sim))
        })
    }

    /// Steps until done.
    pub fn run_complete(&self) -> Result<Snapshot, SimError> {
        self.transact(|sim| {
            sim.run_to_completion()?;
            Ok(Snapshot::capture(sim))
        })
    }

    /// Discards the live simulation, if any. Returns whether there was
    /// one. Nothing can be stepped until the next [`initialize`](Self::initialize).
    /// Like `initialize`, clears a poisoned lock.
    pub fn reset(&self) -> Result<bool, SimError> {
        let discarded = self.lock_for_replace().take().is_some();
        info!(discarded, "controller reset");

        Ok(discarded)
    }

    /// Starts over with the configuration of the live simulation.
    pub fn restart(&self) -> Result<Snapshot, SimError> {
        let mut guard = self.lock()?;
        let config = guard.as_ref()
            .ok_or(StateError::NotInitialized)?
            .config()
            .clone();
        let fresh = Simulation::with_log_capacity(&config, self.log_capacity)?;
        let snap = Snapshot::capture(&fresh);
        *guard = Some(fresh);
        info!("controller restarted the simulation");

        Ok(snap)
    }

    pub fn snapshot(&self) -> Result<Snapshot, SimError> {
        let guard = self.lock()?;
        let sim = guard.as_ref().ok_or(StateError::NotInitialized)?;

        Ok(Snapshot::capture(sim))
    }

    /// `true` if a simulation is loaded.
    pub fn is_active(&self) -> bool {
        self.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Executes one protocol [Command]. Errors become [`Reply::Error`].
    pub fn dispatch(&self, cmd: Command) -> Reply {
        let res: Result<Reply, SimError> = match cmd {
            Command::Init(config)   => {
                let (strategy, total_jobs, total_partitions) =
                    (config.strategy, config.jobs.len(), config.partitions.len());
                self.initialize(config).map(|_| Reply::Initialized {
                    message: String::from("Simulation initialized successfully"),
                    strategy,
                    total_jobs,
                    total_partitions,
                })
            },
            Command::Step           => self.step().map(Reply::from),
            Command::Run            => self.run_complete().map(Reply::from),
            Command::Snapshot       => self.snapshot().map(Reply::from),
            Command::Restart        => self.restart().map(Reply::from),
            Command::Reset          => self.reset().map(|discarded| Reply::Message {
                message: String::from(if discarded {
                    "Simulation reset successfully"
                } else { "No simulation to reset" }),
            }),
            Command::Health         => Ok(Reply::Health {
                status:             "healthy",
                simulation_active:  self.is_active(),
            }),
        };

        res.unwrap_or_else(|e| {
            warn!(error = %e, "command failed");
            Reply::Error { error: e.to_string() }
        })
    }

    /// Parses and executes one protocol line.
    pub fn handle_line(&self, line: &str) -> Reply {
        match line.parse::<Command>() {
            Ok(cmd) => self.dispatch(cmd),
            Err(e)  => Reply::Error { error: e.to_string() },
        }
    }
}

//---START LINE PROTOCOL
// A transport-neutral rendition of the original HTTP endpoints: one
// command per line in, one JSON object per line out.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `init {"jobs": [[id, size, runTime], ...], "partitions": [...], "strategy": "..."}`
    Init(SimConfig),
    Step,
    /// `run` or `run-complete`
    Run,
    Reset,
    Restart,
    Snapshot,
    Health,
}

impl FromStr for Command {
    type Err = ConfigError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let cmd = match verb.to_ascii_lowercase().as_str() {
            "init"                  => return Ok(Command::Init(SimConfig::from_json(rest)?)),
            "step"                  => Command::Step,
            "run" | "run-complete"  => Command::Run,
            "reset"                 => Command::Reset,
            "restart"               => Command::Restart,
            "snapshot"              => Command::Snapshot,
            "health"                => Command::Health,
            ""                      => return Err(ConfigError::Malformed(String::from("empty command"))),
            other                   => return Err(ConfigError::Malformed(format!("unknown command `{other}`"))),
        };
        if !rest.is_empty() {
            return Err(ConfigError::Malformed(format!("`{verb}` takes no arguments")));
        }

        Ok(cmd)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Snapshot(Box<Snapshot>),
    #[serde(rename_all = "camelCase")]
    Initialized {
        message:            String,
        strategy:           Strategy,
        total_jobs:         usize,
        total_partitions:   usize,
    },
    Message {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Health {
        status:             &'static str,
        simulation_active:  bool,
    },
    Error {
        error: String,
    },
}

impl From<Snapshot> for Reply {
    fn from(s: Snapshot) -> Self {
        Reply::Snapshot(Box::new(s))
    }
}

impl Reply {
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"unserializable reply: {e}"}}"#))
    }
}
//---END LINE PROTOCOL
