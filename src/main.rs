mod cli;

use chime::adapters::LocalClock;
use chime::client::{ClientAlarmLoop, HttpAlarmApi, TerminalAlert, spawn_stdin_commands};
use chime::config::WatchConfig;

fn main() {
    // Offset lookup happens inside cli::run, before any runtime threads exist.
    let invocation = cli::run();
    chime::telemetry::init_subscriber(&invocation.log_level);

    let outcome = invocation.outcome;
    if let cli::RunOutcome::Exit(code) = outcome {
        std::process::exit(code);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    let code = runtime.block_on(async move {
        match outcome {
            cli::RunOutcome::Serve(config, addr) => match chime::serve(addr, config).await {
                Ok(()) => 0,
                Err(err) => {
                    tracing::error!(error = %err, "server error");
                    1
                }
            },
            cli::RunOutcome::Watch(config) => watch(config).await,
            cli::RunOutcome::Exit(code) => code,
        }
    });
    std::process::exit(code);
}

async fn watch(config: WatchConfig) -> i32 {
    let api = match HttpAlarmApi::new(config.server.as_str()) {
        Ok(api) => api,
        Err(err) => {
            eprintln!("failed to create http client: {err}");
            return 1;
        }
    };
    println!("Watching alarms on {}", config.server);
    let alarm_loop = ClientAlarmLoop::new(
        LocalClock::new(config.utc_offset),
        api,
        TerminalAlert::default(),
    );
    alarm_loop.run(spawn_stdin_commands()).await;
    0
}
