use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancellation token tripped by SIGINT or SIGTERM. The single batch run
/// this process drives checks it at stage boundaries, so an interrupted run
/// stops cleanly with the watermark untouched.
pub fn cancel_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let trip = token.clone();

    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install SIGINT handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, stopping after the current stage"),
            _ = terminate => info!("received SIGTERM, stopping after the current stage"),
        }

        trip.cancel();
    });

    token
}

/// Exit codes for the CLI application.
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    ShutdownRequested = 130, // Standard exit code for SIGINT
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
