use o3sim_core::config::{BranchPredictor, Config};
use o3sim_core::core::units::cache::CacheIf;
use o3sim_core::emu::Emulator;
use o3sim_core::{Hooks, ProgramEmulator, RunSummary, SimResult, Simulator, SystemIf};
use tracing_subscriber::EnvFilter;

use crate::common::mocks::system::quiet_system;

/// Cycle guard applied when a test does not set its own limit.
pub const DEFAULT_MAX_CYCLES: u64 = 50_000;

/// Installs a test-friendly subscriber once. `RUST_LOG` selects what is printed.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The small core used by the end-to-end scenarios: two-wide, an eight-entry window and a
/// data cache that always answers in one cycle.
pub fn small_core() -> Config {
    let mut config = Config::default();
    let p = &mut config.pipeline;
    p.fetch_width = 2;
    p.rename_width = 2;
    p.dispatch_width = 2;
    p.commit_width = 2;
    p.inorder_list_capacity = 8;
    for s in &mut config.schedulers {
        s.window_capacity = 8;
    }
    config.cache.l1_d.enabled = false;
    config
}

/// Builds and runs a simulator for one test.
pub struct TestContext {
    pub config: Config,
    emulator: Box<dyn Emulator>,
    system: Box<dyn SystemIf>,
    hooks: Hooks,
    cache: Option<Box<dyn CacheIf>>,
}

impl TestContext {
    /// Assembles `source` as a single process on the default core.
    pub fn new(source: &str) -> Self {
        let emulator = ProgramEmulator::from_asm(source).expect("test program assembles");
        Self::with_emulator(emulator)
    }

    /// Wraps an already configured emulator.
    pub fn with_emulator(emulator: impl Emulator + 'static) -> Self {
        init_tracing();
        let mut config = Config::default();
        config.general.max_cycles = Some(DEFAULT_MAX_CYCLES);
        Self {
            config,
            emulator: Box::new(emulator),
            system: Box::new(quiet_system()),
            hooks: Hooks::new(),
            cache: None,
        }
    }

    /// Replaces the configuration, keeping the cycle guard unless `config` sets one.
    pub fn with_config(mut self, mut config: Config) -> Self {
        if config.general.max_cycles.is_none() {
            config.general.max_cycles = Some(DEFAULT_MAX_CYCLES);
        }
        self.config = config;
        self
    }

    /// Adjusts the configuration in place.
    pub fn configure(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self
    }

    /// Shorthand for selecting the branch predictor.
    pub fn predictor(self, predictor: BranchPredictor) -> Self {
        self.configure(|c| c.pipeline.branch_predictor = predictor)
    }

    pub fn with_system(mut self, system: impl SystemIf + 'static) -> Self {
        self.system = Box::new(system);
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_cache(mut self, cache: impl CacheIf + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    /// Builds the simulator without running it.
    pub fn try_build(self) -> SimResult<Simulator> {
        let mut sim = Simulator::with_hooks(self.config, self.emulator, self.system, self.hooks)?;
        if let Some(cache) = self.cache {
            sim.core_mut().set_caches(cache);
        }
        Ok(sim)
    }

    pub fn build(self) -> Simulator {
        self.try_build().expect("simulator builds")
    }

    /// Runs to completion and returns the simulator together with its summary.
    pub fn try_run(self) -> (Simulator, SimResult<RunSummary>) {
        let mut sim = self.build();
        let summary = sim.run();
        (sim, summary)
    }

    /// Runs to completion, failing the test on any simulation error.
    pub fn run(self) -> (Simulator, RunSummary) {
        let (sim, summary) = self.try_run();
        let summary = summary.unwrap_or_else(|e| panic!("simulation failed: {e}"));
        (sim, summary)
    }
}
