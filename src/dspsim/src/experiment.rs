use structopt::StructOpt;

use dspsim::config::{read_config, ExperimentConfig};
use dspsim::{AssignOutcome, Cluster, Error};

#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "DSP Placement Experiment", about = "DSP Placement Experiment")]
pub struct Opt {
    /// The configure file
    #[structopt(short = "c", long = "config")]
    pub config: Option<std::path::PathBuf>,
}

fn set_env_vars(config: &ExperimentConfig) -> anyhow::Result<()> {
    for (k, v) in config.envs.iter() {
        let v = v
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("environment {} expects a String", k))?;
        log::debug!("setting environment {}={}", k, v);
        std::env::set_var(k, v);
    }
    Ok(())
}

fn report(cluster: &Cluster, topology_id: &str, outcome: &AssignOutcome) -> anyhow::Result<()> {
    if let AssignOutcome::Partial { skipped } = outcome {
        log::warn!("{} is partially assigned, skipped: {:?}", topology_id, skipped);
    }
    let score = cluster.score(topology_id)?;
    log::info!(
        "{}: availability {:.4}, response time {:.4}",
        topology_id,
        score.availability,
        score.response_time
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    logging::init_log();

    let opt = Opt::from_args();
    log::info!("Opts: {:#?}", opt);

    let path = opt
        .config
        .ok_or_else(|| anyhow::anyhow!("config file is not specified"))?;
    log::info!("parsing experiment configuration from file: {:?}", path);
    let config = read_config(path)?;
    log::info!("config: {:#?}", config);

    set_env_vars(&config)?;

    let mut cluster = Cluster::generate(&config.cluster)?;
    log::debug!("{}", cluster);

    let mut topology = config.topology.build()?;
    topology.instantiate(config.topology.max_num_operators)?;
    log::info!("{}", topology);

    let mut scheduler = config.scheduler.build();
    let outcome = match scheduler.schedule(&topology, &mut cluster) {
        Ok((_, outcome)) => outcome,
        Err(e @ Error::NoCapacity { .. }) => {
            log::warn!("{} cannot be scheduled: {}", topology.id(), e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    report(&cluster, topology.id(), &outcome)?;

    for round in 0..config.reschedule_rounds {
        log::info!("reschedule round {}", round);
        let (_, outcome) = cluster.reschedule(&topology, scheduler.as_mut())?;
        report(&cluster, topology.id(), &outcome)?;
    }

    log::info!("{}", cluster);
    Ok(())
}
