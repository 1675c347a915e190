use std::process::ExitCode;

use engine::run_app_with_handles;
use tracing::error;

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    if let Err(err) = run_app_with_handles(app.config, app.scene, app.handles) {
        error!(error = %err, "runtime_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
