use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use thermalign_cli::{
    AppConfig, BatchEvent, BatchJob, BatchOrchestrator, BatchState, CliOptions, PairOutcome, USAGE, channel_observer,
    init_logging,
};
use thermalign_core::init_thread_pool;

fn main() -> ExitCode {
    init_logging();

    let opts = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return ExitCode::FAILURE;
        }
    };
    if opts.help {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    let mut cfg = match &opts.config {
        Some(path) => match AppConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };
    opts.apply(&mut cfg);

    if opts.dump_config {
        return match cfg.to_toml() {
            Ok(toml) => {
                print!("{}", toml);
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let job = match BatchJob::from_config(&cfg) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_thread_pool(cfg.features.n_threads) {
        log::warn!("Using existing thread pool: {}", e);
    }

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let mut orchestrator = BatchOrchestrator::new(job);
        let mut observer = channel_observer(tx);
        orchestrator.run(&mut observer)
    });

    let mut total = 0;
    for event in rx {
        match event {
            BatchEvent::Started { total: n } => total = n,
            BatchEvent::PairFinished {
                index,
                sequence_id,
                outcome,
            } => match outcome {
                PairOutcome::Processed { output, .. } => {
                    println!("[{}/{}] {} -> {}", index + 1, total, sequence_id, output.display())
                }
                PairOutcome::Skipped(reason) => println!("[{}/{}] {} skipped: {}", index + 1, total, sequence_id, reason),
            },
            BatchEvent::PairStarted { .. } | BatchEvent::Finished { .. } => {}
        }
    }

    let result = match worker.join() {
        Ok(result) => result,
        Err(_) => {
            log::error!("Batch worker panicked");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(report) => {
            print!("{}", report);
            match report.state {
                BatchState::Completed | BatchState::Cancelled => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            }
        }
        Err(e) => {
            log::error!("Batch failed to start: {}", e);
            ExitCode::FAILURE
        }
    }
}
