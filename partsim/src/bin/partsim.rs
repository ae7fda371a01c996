use anyhow::{bail, Context};
use partsim::{
    *,
    algo::compare_strategies,
    controller::SimulationController,
    snapshot::Snapshot,
    workload::{demo_config, random_config, RandomWorkload},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A fixed-partition memory allocation simulator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to input
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    input:          Option<PathBuf>,

    /// Input format
    #[arg(short, long, value_enum, default_value_t = InputType::Json)]
    format:         InputType,

    /// Partition sizes in KB, comma-separated (overrides the input's)
    #[arg(short, long, value_delimiter = ',')]
    partitions:     Vec<Kilobytes>,

    /// Placement strategy (overrides the input's)
    #[arg(short, long, value_enum)]
    strategy:       Option<Strategy>,

    /// Use the built-in demonstration workload
    #[arg(long, default_value_t = false)]
    demo:           bool,

    /// Generate a random workload with this many jobs
    #[arg(short, long)]
    random:         Option<usize>,

    /// Seed of the random workload
    #[arg(long, default_value_t = 0)]
    seed:           u64,

    /// Run every strategy on the same workload and compare
    #[arg(short, long, default_value_t = false)]
    compare:        bool,

    /// Print job and memory tables after every step
    #[arg(short, long, default_value_t = false)]
    trace:          bool,

    /// Print the final snapshot as JSON instead of a report
    #[arg(short, long, default_value_t = false)]
    json:           bool,

    /// Answer line-protocol commands on stdin
    #[arg(long, default_value_t = false)]
    serve:          bool,

    /// Number of event-log lines kept per simulation
    #[arg(short, long, default_value_t = DEFAULT_LOG_CAPACITY)]
    log_capacity:   usize,
}

impl Args {
    /// The workload picked on the command line, if any.
    fn config(&self) -> anyhow::Result<Option<SimConfig>> {
        let strategy = self.strategy.unwrap_or_default();
        let mut config = if let Some(path) = &self.input {
            if !(path.exists() && path.is_file()) {
                bail!("Invalid input path: {}", path.display());
            }
            return read_from_path(self.format, path.clone(), &self.partitions, self.strategy)
                .with_context(|| format!("reading {}", path.display()))
                .map(Some);
        } else if self.demo {
            demo_config(strategy)
        } else if let Some(jobs) = self.random {
            random_config(self.seed, RandomWorkload { jobs, ..Default::default() }, strategy)
        } else {
            return Ok(None);
        };
        if !self.partitions.is_empty() {
            config.partitions = self.partitions.clone();
        }
        config.validate()?;

        Ok(Some(config))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "partsim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Args::parse();
    let config = cli.config()?;
    if cli.serve {
        return serve(config, cli.log_capacity);
    }
    let Some(config) = config else {
        bail!("Nothing to simulate: give --input, --demo or --random");
    };

    if cli.compare {
        let all = compare_strategies(&config)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&all)?);
        } else {
            for stats in &all {
                println!("{stats}\n");
            }
        }
        return Ok(());
    }

    let mut sim = Simulation::with_log_capacity(&config, cli.log_capacity)?;
    if cli.trace {
        println!("{}", Snapshot::capture(&sim).render());
        for _ in 0..sim.jobs().step_bound() {
            if sim.is_done() { break; }
            sim.step()?;
            println!("{}", Snapshot::capture(&sim).render());
        }
    }
    sim.run_to_completion()?;

    let snap = Snapshot::capture(&sim);
    if cli.json {
        println!("{}", snap.to_json()?);
    } else {
        println!("{}", sim.statistics());
    }

    Ok(())
}

/// One command per stdin line, one JSON reply per stdout line.
fn serve(preload: Option<SimConfig>, log_capacity: usize) -> anyhow::Result<()> {
    let controller = SimulationController::with_log_capacity(log_capacity);
    if let Some(config) = preload {
        controller.initialize(config)?;
    }
    info!("serving line protocol on stdin");
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        println!("{}", controller.handle_line(&line).to_json());
    }

    Ok(())
}
