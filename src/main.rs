use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};
use log::{error, info, warn};
use semoos::param;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::env;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn start_logger(general: &param::General) -> Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    let logger = Logger::try_with_env_or_str(&general.log_level)?;
    if general.log_base.is_empty() {
        logger.start()
    } else {
        logger
            .log_to_file(FileSpec::default().basename(&general.log_base).suffix(&general.log_suffix))
            .duplicate_to_stderr(Duplicate::Info)
            .start()
    }
}

fn main() {
    let param_file = env::args().nth(1).unwrap_or_else(|| "param.yaml".to_string());

    let param = match param::get(param_file.clone()) {
        Ok(param) => param,
        Err(e) => {
            eprintln!("Cannot load parameters from {}: {}", param_file, e);
            process::exit(1);
        }
    };

    let _logger = match start_logger(&param.general) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Cannot start logger: {}", e);
            process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            let running = Arc::clone(&running);
            thread::spawn(move || {
                for signal in signals.forever() {
                    warn!("Received signal {}, finishing the current generation...", signal);
                    running.store(false, Ordering::Relaxed);
                }
            });
        }
        Err(e) => warn!("Signal handlers not installed: {}", e),
    }

    info!("semoos v{} with parameters from {}", env!("CARGO_PKG_VERSION"), param_file);

    match semoos::run(&param, running) {
        Ok(experiment) => info!("{}", experiment.display_results()),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
