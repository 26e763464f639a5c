use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use pkasplit::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

#[derive(Debug, Default)]
struct PhaseState {
    phase: &'static str,
    emitted: usize,
}

/// Drives a stderr spinner from split progress events.
///
/// The spinner position counts input records; its message carries the
/// running number of conjugate records written.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: ProgressBar,
    state: Arc<Mutex<PhaseState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner()
            .with_style(Self::spinner_style())
            .with_message("Initializing...");
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.disable_steady_tick();
        pb.finish_and_clear();

        Self {
            pb,
            state: Arc::new(Mutex::new(PhaseState::default())),
        }
    }

    /// Handle to the underlying bar, used by the logger to suspend drawing.
    pub fn bar(&self) -> ProgressBar {
        self.pb.clone()
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb = self.pb.clone();
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress state mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => {
                    state.phase = name;
                    state.emitted = 0;
                    pb.reset();
                    pb.set_style(Self::spinner_style());
                    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    pb.set_message(name.to_string());
                }
                Progress::RecordDone { emitted } => {
                    state.emitted += emitted;
                    pb.inc(1);
                    pb.set_message(format!(
                        "{} ({} conjugates written)",
                        state.phase, state.emitted
                    ));
                }
                Progress::PhaseFinish => {
                    pb.disable_steady_tick();
                    pb.finish_with_message(format!(
                        "✓ Done ({} records, {} conjugates)",
                        pb.position(),
                        state.emitted
                    ));
                }
                Progress::Message(msg) => {
                    if !pb.is_finished() {
                        pb.println(format!("  {}", msg));
                    } else {
                        pb.set_message(msg);
                    }
                }
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} records {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
