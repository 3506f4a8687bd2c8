// ABOUTME: Interactive watch loop: keeps polling, renders every change and applies typed commands
// ABOUTME: Commands arrive over a channel so the loop never blocks on a terminal read

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::reconciler::{JobRecord, Phase, Reconciler};
use crate::scheduler::PollingScheduler;

pub const USAGE: &str = "commands: r | s <target> | q";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Stop(String),
    Quit,
}

/// Blank lines parse to `Ok(None)`; anything unrecognised is an error
/// carrying the offending line.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (None, _) => Ok(None),
        (Some("r"), None) | (Some("refresh"), None) => Ok(Some(Command::Refresh)),
        (Some("q"), None) | (Some("quit"), None) => Ok(Some(Command::Quit)),
        (Some("s"), Some(target)) | (Some("stop"), Some(target)) if words.next().is_none() => {
            Ok(Some(Command::Stop(target.to_string())))
        }
        _ => Err(line.trim().to_string()),
    }
}

/// Wording for a stop that the worker accepted. Only a snapshot without the
/// target confirms it is gone.
pub fn stop_outcome_message(target: &str, phase: Option<Phase>) -> String {
    match phase {
        None => format!("Diagnostic job for {} has been terminated", target),
        Some(_) => format!(
            "Stop requested for {}; waiting for the worker to confirm",
            target
        ),
    }
}

/// Activates polling and runs until `shutdown` resolves or a `q` command
/// arrives. A closed command channel only stops command handling; polling
/// and rendering carry on.
pub async fn run_console<F, R>(
    reconciler: Reconciler,
    scheduler: PollingScheduler,
    mut commands: mpsc::Receiver<String>,
    shutdown: F,
    mut render: R,
) where
    F: Future<Output = ()>,
    R: FnMut(&[JobRecord]),
{
    let mut updates = reconciler.subscribe();
    let handle = scheduler.activate(reconciler.clone());
    let mut input_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let records = updates.borrow_and_update().records().to_vec();
                render(&records);
            }
            line = commands.recv(), if input_open => {
                let Some(line) = line else {
                    debug!("Command input closed, still polling");
                    input_open = false;
                    continue;
                };
                match parse_command(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Refresh)) => {
                        if let Err(e) = handle.refresh_now().await {
                            warn!("Refresh failed: {}", e);
                        }
                    }
                    Ok(Some(Command::Stop(target))) => {
                        // Awaited in the background so rendering keeps up.
                        let stop = reconciler.request_stop(&target);
                        tokio::spawn(async move {
                            if let Err(e) = stop.await {
                                warn!("Failed to stop job for {}: {}", target, e);
                            }
                        });
                    }
                    Ok(None) => {}
                    Err(bad) => warn!("Unknown command {:?}; {}", bad, USAGE),
                }
            }
        }
    }

    handle.deactivate();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::testing::FakeApi;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    type Frames = Arc<Mutex<Vec<Vec<JobRecord>>>>;

    fn spawn_console(
        api: &Arc<FakeApi>,
    ) -> (
        Reconciler,
        mpsc::Sender<String>,
        oneshot::Sender<()>,
        Frames,
        tokio::task::JoinHandle<()>,
    ) {
        let reconciler = Reconciler::new(api.clone());
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let frames: Frames = Arc::default();

        let sink = frames.clone();
        let task = tokio::spawn(run_console(
            reconciler.clone(),
            PollingScheduler::new(Duration::from_secs(10)),
            cmd_rx,
            async move {
                let _ = stop_rx.await;
            },
            move |records: &[JobRecord]| sink.lock().unwrap().push(records.to_vec()),
        ));
        (reconciler, cmd_tx, stop_tx, frames, task)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn last_frame(frames: &Frames) -> Vec<JobRecord> {
        frames.lock().unwrap().last().cloned().unwrap_or_default()
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("  "), Ok(None));
        assert_eq!(parse_command("r"), Ok(Some(Command::Refresh)));
        assert_eq!(parse_command("refresh"), Ok(Some(Command::Refresh)));
        assert_eq!(parse_command("q"), Ok(Some(Command::Quit)));
        assert_eq!(
            parse_command("s example.com"),
            Ok(Some(Command::Stop("example.com".to_string())))
        );
        assert_eq!(
            parse_command(" stop  10.0.0.1 "),
            Ok(Some(Command::Stop("10.0.0.1".to_string())))
        );
        assert_eq!(parse_command("s"), Err("s".to_string()));
        assert_eq!(parse_command("s a b"), Err("s a b".to_string()));
        assert_eq!(parse_command("start x"), Err("start x".to_string()));
    }

    #[tokio::test]
    async fn test_stop_message_waits_for_snapshot_confirmation() {
        let api = Arc::new(FakeApi::default());
        let reconciler = Reconciler::new(api.clone());
        api.push_status(&["a"]);
        reconciler.refresh().await.unwrap();

        // Worker accepted the stop but still lists the target.
        api.push_status(&["a"]);
        reconciler.request_stop("a").await.unwrap();
        let message = stop_outcome_message("a", reconciler.phase_of("a"));
        assert_eq!(message, "Stop requested for a; waiting for the worker to confirm");
        assert!(!message.contains("terminated"));

        api.push_status(&[]);
        reconciler.refresh().await.unwrap();
        assert_eq!(
            stop_outcome_message("a", reconciler.phase_of("a")),
            "Diagnostic job for a has been terminated"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_drive_refresh_and_stop() {
        let api = Arc::new(FakeApi::default());
        api.push_status(&["a"]);
        let (reconciler, cmd_tx, stop_tx, frames, task) = spawn_console(&api);
        settle().await;
        assert_eq!(api.status_call_count(), 1);
        assert_eq!(last_frame(&frames)[0].phase, Phase::Active);

        api.push_status(&["a", "b"]);
        cmd_tx.send("r".to_string()).await.unwrap();
        settle().await;
        assert_eq!(api.status_call_count(), 2);
        assert_eq!(last_frame(&frames).len(), 2);

        api.push_status(&["a", "b"]);
        cmd_tx.send("s a".to_string()).await.unwrap();
        settle().await;
        assert_eq!(*api.stop_calls.lock().unwrap(), vec!["a"]);
        assert_eq!(reconciler.phase_of("a"), Some(Phase::Stopping));
        assert_eq!(last_frame(&frames)[0].phase, Phase::Stopping);

        // Input going away does not end the loop; the timer keeps polling.
        drop(cmd_tx);
        tokio::time::sleep(Duration::from_millis(25_000)).await;
        assert_eq!(api.status_call_count(), 5);
        assert!(!task.is_finished());

        stop_tx.send(()).unwrap();
        task.await.unwrap();
        assert!(!reconciler.session_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_input_keeps_polling_until_shutdown() {
        let api = Arc::new(FakeApi::default());
        let (reconciler, cmd_tx, stop_tx, _frames, task) = spawn_console(&api);
        drop(cmd_tx);
        settle().await;

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(api.status_call_count(), 2);
        assert!(!task.is_finished());
        assert!(reconciler.session_open());

        stop_tx.send(()).unwrap();
        task.await.unwrap();
        assert!(!reconciler.session_open());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.status_call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_command_ends_loop() {
        let api = Arc::new(FakeApi::default());
        let (reconciler, cmd_tx, _stop_tx, _frames, task) = spawn_console(&api);
        settle().await;

        cmd_tx.send("nonsense".to_string()).await.unwrap();
        cmd_tx.send("q".to_string()).await.unwrap();
        task.await.unwrap();
        assert!(!reconciler.session_open());
    }
}
