use dotenvy::dotenv;
use common::utils::logging::LogFormat;
use tracing::{error, info, warn};
use uuid::Uuid;

fn main() -> std::process::ExitCode {
    // load .env first so RUST_LOG and KV_* overrides apply
    dotenv().ok();

    let cfg = match server::startup::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            common::utils::logging::init_logging_default();
            error!(service = "server", event = "config_invalid", error = %e, "failed to load configuration");
            return std::process::ExitCode::FAILURE;
        }
    };
    let parsed = cfg.server.log_format.as_deref().map(str::parse::<LogFormat>).transpose();
    common::utils::logging::init_logging(parsed.clone().ok().flatten().unwrap_or_default());
    info!(service = "server", event = "logger_init", "tracing subscriber initialized");
    if let Err(e) = parsed {
        warn!(service = "server", event = "log_format_fallback", error = %e, "falling back to compact logs");
    }

    let service_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(
            service = "server",
            event = "panic",
            %service_id,
            pid,
            message = %info,
            "unhandled panic occurred"
        );
    }));

    let worker_threads = cfg.server.worker_threads;
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(w) = worker_threads { builder.worker_threads(w); }

    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "server", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(
        service = "server",
        event = "start",
        %service_id,
        pid,
        version,
        threads = worker_threads.unwrap_or_default(),
        "server service starting"
    );

    // run_with_config stops on Ctrl+C via graceful shutdown
    rt.block_on(async move {
        match server::startup::run_with_config(cfg).await {
            Ok(()) => {
                info!(service = "server", event = "stop", %service_id, pid, "server stopped normally");
                std::process::ExitCode::SUCCESS
            }
            Err(e) => {
                error!(service = "server", event = "run_failed", error = %e, "server returned error");
                std::process::ExitCode::FAILURE
            }
        }
    })
}
