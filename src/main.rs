use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};

use coolerpp_fuzzer::candidate::CandidateExecutor;
use coolerpp_fuzzer::chromosomes::ChromosomeTable;
use coolerpp_fuzzer::config::Config;
use coolerpp_fuzzer::orchestrator::Orchestrator;
use coolerpp_fuzzer::reference::PixelStore;
use coolerpp_fuzzer::Result;

fn main() -> ExitCode {
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) => {
            // --help and --version are not errors
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };
    init_logging(&config.verbosity);

    match run(config) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: &str) {
    use std::io::IsTerminal;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(verbosity))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn run(config: Config) -> Result<u8> {
    let start = Instant::now();
    let config = config.validate()?;

    let table = ChromosomeTable::from_chrom_sizes(&config.chrom_sizes)?;
    info!(
        "read {} chromosomes from {}",
        table.len(),
        config.chrom_sizes.display()
    );

    let reference = PixelStore::from_dump(table.clone(), &config.reference_pixels)?;
    info!(
        "loaded {} reference pixels from {}",
        reference.len(),
        config.reference_pixels.display()
    );

    let candidate = CandidateExecutor::new(config.path_to_coolerpp_dump.clone(), config.cooler.clone());
    let orchestrator = Orchestrator::new(config.run_params())?;
    info!(
        "testing {} against the reference with {} workers for {}s (seed {})",
        candidate.binary().display(),
        orchestrator.params().nproc,
        config.duration,
        config.seed
    );

    let outcome = orchestrator.run(&table, &reference, &candidate)?;
    outcome.report();
    info!("completed in {:.2}s", start.elapsed().as_secs_f64());

    Ok(outcome.exit_code())
}
