//! rcbf: train and test safety-filtered RL agents.
//!
//! - `train` -- run the training loop, writing checkpoints to a fresh run folder
//! - `test`  -- load a checkpoint and run deterministic validation episodes

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rcbf_orchestrator::agent::{Agent, AnyAgent, MockAgent, MockAgentConfig, RemoteAgent};
use rcbf_orchestrator::checkpoint::{next_run_folder, resolve_resume, write_json};
use rcbf_orchestrator::client::LearnerClient;
use rcbf_orchestrator::config::TrainConfig;
use rcbf_orchestrator::dynamics::{AnyDynamics, DynamicsModel, MockDynamics, RemoteDynamics};
use rcbf_orchestrator::env::{AnyEnv, Environment, PointMassConfig, PointMassEnv, RemoteEnv};
use rcbf_orchestrator::metrics::{JsonlSink, MultiSink, TracingSink};
use rcbf_orchestrator::safety::{ActionComposer, SafetyMode};
use rcbf_orchestrator::training::{evaluate_policy, ModelRolloutAugmentor, TrainingLoop};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// rcbf: safety-filtered RL training orchestrator
#[derive(Parser)]
#[command(name = "rcbf", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Which environment to use.
    #[arg(long, global = true, default_value = "point-mass")]
    env: EnvChoice,

    /// Simulator URL for `--env remote`.
    #[arg(long, global = true)]
    env_url: Option<String>,

    /// Learner server URL; without it the in-process mock learner is used.
    #[arg(long, global = true)]
    learner_url: Option<String>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum EnvChoice {
    PointMass,
    Remote,
}

/// Command-line overrides applied on top of the config file.
#[derive(Args, Debug, Default)]
struct Overrides {
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[arg(long, global = true)]
    max_episodes: Option<u64>,

    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[arg(long, global = true)]
    updates_per_step: Option<usize>,

    #[arg(long, global = true)]
    cbf_mode: Option<SafetyMode>,

    /// Enable model-based augmentation.
    #[arg(long, global = true)]
    model_based: bool,

    /// Enable the learned compensator.
    #[arg(long, global = true)]
    use_comp: bool,

    /// Disable evaluation passes during training.
    #[arg(long, global = true)]
    no_eval: bool,

    /// Parent directory for run folders.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// "default", a run number, or a checkpoint directory.
    #[arg(long, global = true)]
    resume: Option<String>,

    /// Also append metrics as JSON lines to this file.
    #[arg(long, global = true)]
    metrics_log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent.
    Train,

    /// Validate a saved agent with deterministic episodes.
    Test {
        /// Number of validation episodes (defaults to the config value).
        #[arg(long)]
        episodes: Option<usize>,
    },
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TrainConfig::load(path)?,
        None => TrainConfig::default(),
    };
    apply_overrides(&mut config, &cli.overrides);
    if let Some(url) = &cli.env_url {
        config.env.remote_url = Some(url.clone());
    }
    if let Some(url) = &cli.learner_url {
        config.learner.url = Some(url.clone());
    }
    config.validate().context("invalid configuration")?;

    match cli.command {
        Commands::Train => cmd_train(config, &cli.env, cli.overrides.metrics_log).await,
        Commands::Test { episodes } => cmd_test(config, &cli.env, episodes).await,
    }
}

fn apply_overrides(config: &mut TrainConfig, o: &Overrides) {
    if let Some(seed) = o.seed {
        config.training.seed = seed;
    }
    if let Some(n) = o.max_episodes {
        config.training.max_episodes = n;
    }
    if let Some(b) = o.batch_size {
        config.training.batch_size = b;
    }
    if let Some(u) = o.updates_per_step {
        config.training.updates_per_step = u;
    }
    if let Some(mode) = o.cbf_mode {
        config.safety.cbf_mode = mode;
    }
    if o.model_based {
        config.model_based.enabled = true;
    }
    if o.use_comp {
        config.compensator.enabled = true;
    }
    if o.no_eval {
        config.evaluation.enabled = false;
    }
    if let Some(output) = &o.output {
        config.training.output = output.clone();
    }
    if let Some(resume) = &o.resume {
        config.training.resume = resume.clone();
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_train(
    config: TrainConfig,
    env_choice: &EnvChoice,
    metrics_log: Option<PathBuf>,
) -> Result<()> {
    let env = create_env(&config, env_choice).await?;
    let env_name = env.spec().name.clone();
    let (agent, dynamics) = create_learner(&config, &env).await?;

    let output_dir = next_run_folder(&config.training.output, &env_name)?;
    let resume = resolve_resume(&config.training.output, &env_name, &config.training.resume);
    write_json(&output_dir.join("config.json"), &config)?;

    let mut metrics = MultiSink::new().with(TracingSink);
    if let Some(path) = metrics_log {
        metrics = metrics.with(JsonlSink::create(&path)?);
    }

    let augmentor = ModelRolloutAugmentor::new(ActionComposer::new(
        config.safety.cbf_mode,
        config.compensator.enabled,
    ));

    tracing::info!(output = %output_dir.display(), "Starting training");
    let mut training = TrainingLoop::new(
        config,
        output_dir,
        env,
        agent,
        dynamics,
        augmentor,
        metrics,
    )?;
    training.prepare(Some(&resume)).await?;
    let report = training.run().await?;

    tracing::info!(
        episodes = report.episodes,
        total_steps = report.total_steps,
        updates = report.updates,
        "Training finished"
    );
    Ok(())
}

async fn cmd_test(config: TrainConfig, env_choice: &EnvChoice, episodes: Option<usize>) -> Result<()> {
    let mut env = create_env(&config, env_choice).await?;
    let env_name = env.spec().name.clone();
    let (mut agent, mut dynamics) = create_learner(&config, &env).await?;

    let resume = resolve_resume(&config.training.output, &env_name, &config.training.resume);
    agent
        .load_weights(&resume.dir)
        .await
        .with_context(|| format!("failed to load agent from {}", resume.dir.display()))?;
    dynamics
        .load_disturbance_models(&resume.dir)
        .await
        .with_context(|| format!("failed to load disturbance models from {}", resume.dir.display()))?;

    let seed = config.training.seed;
    if seed > 0 {
        env.seed(seed).await?;
        dynamics.seed(seed).await?;
        agent.seed(seed).await?;
    }

    let composer = ActionComposer::new(config.safety.cbf_mode, config.compensator.enabled);
    let episodes = episodes.unwrap_or(config.evaluation.validate_episodes);
    let summary = evaluate_policy(&mut env, &mut agent, &dynamics, composer, episodes).await?;

    println!("Validation: {} ({} episodes)", resume.dir.display(), episodes);
    for (i, ep) in summary.episodes.iter().enumerate() {
        println!(
            "  Episode {i}: reward {:.2}, cost {:.2}, steps {}",
            ep.reward, ep.cost, ep.steps
        );
    }
    println!(
        "  Reward: mean {:.2}, std {:.2}",
        summary.avg_reward(),
        summary.std_reward()
    );
    println!("  Completion rate: {:.1}%", summary.completion_rate() * 100.0);
    println!(
        "  Mean policy time: {:.3} ms",
        summary.mean_policy_time().as_secs_f64() * 1e3
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Collaborator construction
// ---------------------------------------------------------------------------

async fn create_env(config: &TrainConfig, choice: &EnvChoice) -> Result<AnyEnv> {
    match choice {
        EnvChoice::PointMass => {
            tracing::info!("Using built-in point-mass environment");
            Ok(AnyEnv::PointMass(PointMassEnv::new(PointMassConfig {
                max_episode_steps: config.env.max_episode_steps,
                dt: config.env.dt,
                rand_init: config.env.rand_init,
                ..PointMassConfig::default()
            })))
        }
        EnvChoice::Remote => {
            let url = config
                .env
                .remote_url
                .as_deref()
                .context("--env remote requires --env-url or env.remote_url")?;
            tracing::info!(url, "Using remote environment");
            Ok(AnyEnv::Remote(RemoteEnv::connect(url).await?))
        }
    }
}

async fn create_learner(config: &TrainConfig, env: &AnyEnv) -> Result<(AnyAgent, AnyDynamics)> {
    match &config.learner.url {
        Some(url) => {
            tracing::info!(url = %url, "Using remote learner");
            let client = LearnerClient::new(url)?;
            let dynamics = RemoteDynamics::connect(client.clone()).await?;
            let agent = RemoteAgent::connect(client, &config.learner).await?;
            Ok((AnyAgent::Remote(agent), AnyDynamics::Remote(dynamics)))
        }
        None => {
            tracing::info!("Using in-process mock learner");
            let spec = env.spec();
            let agent_config = MockAgentConfig {
                action_bound: spec.action_bound,
                gamma: config.learner.gamma,
                learning_rate: config.learner.learning_rate,
                comp_rate: config.compensator.comp_rate,
                alpha: config.learner.alpha,
                ..MockAgentConfig::default()
            };
            agent_config
                .validate()
                .with_context(|| format!("environment {} reports unusable bounds", spec.name))?;
            let agent = MockAgent::new(agent_config, spec.action_dim, config.compensator.enabled);
            let dynamics = MockDynamics::new(spec.dt, config.dynamics.gp_model_size);
            Ok((AnyAgent::Mock(agent), AnyDynamics::Mock(dynamics)))
        }
    }
}
