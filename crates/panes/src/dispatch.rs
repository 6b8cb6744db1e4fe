//! Forwards user actions to the engine.
//!
//! Rejections the user can act on (bad directory, spawn failure, capacity)
//! become a footer notice. Only a stopped engine is an error for the caller.

use std::path::PathBuf;

use panes_core::{NoticeLevel, SplitHandle};
use panes_engine::{CloseOutcome, OrchestratorError, OrchestratorHandle};
use tracing::{debug, warn};

use crate::app::App;
use crate::error::{Result, TuiError};
use crate::input::Action;

/// Sends one action to the engine.
///
/// # Errors
///
/// [`TuiError::Engine`] with `ChannelClosed` once the engine has stopped.
pub async fn dispatch(action: Action, handle: &OrchestratorHandle, app: &mut App) -> Result<()> {
    let result = match action {
        Action::None | Action::Quit => Ok(()),
        Action::AddSession => handle.add_session().await.map(|id| {
            debug!(session_id = %id, "Added session");
        }),
        Action::OpenSlot(id) => handle.open_slot(id).await,
        Action::CancelDirectory(id) => handle.cancel_directory(id).await,
        Action::Start {
            session_id,
            directory,
            mode,
        } => {
            handle
                .start(session_id, PathBuf::from(directory), mode, None)
                .await
        }
        Action::BeginDangerHold {
            session_id,
            directory,
            mode,
        } => {
            handle
                .begin_danger_hold(session_id, PathBuf::from(directory), mode, None)
                .await
        }
        Action::CancelDangerHold(id) => handle.cancel_danger_hold(id).await,
        Action::SendInput(id, bytes) => {
            handle.send_input(id, bytes).await;
            Ok(())
        }
        Action::UserScroll {
            session_id,
            at_bottom,
        } => {
            handle.user_scroll(session_id, at_bottom).await;
            Ok(())
        }
        Action::Focus(id) => handle.focus(id).await,
        Action::SelectTab(id) => handle.select_tab(id).await,
        Action::RequestClose(id) => handle.request_close(id).await.map(log_close),
        Action::ConfirmClose(id) => handle.confirm_close(id).await.map(log_close),
        Action::SetMode(mode) => handle.set_mode(mode).await,
        Action::CycleArrangement => handle.cycle_arrangement().await.map(|arrangement| {
            debug!(%arrangement, "Arrangement cycled");
        }),
        Action::Move {
            position,
            direction,
        } => handle
            .move_by_position(position, direction)
            .await
            .map(|_| ()),
        Action::Swap(a, b) => handle.swap(a, b).await,
        Action::SetMainSplit(percent) => handle
            .set_split_ratio(SplitHandle::Main, percent)
            .await
            .map(|_| ()),
        Action::ClearAllAttention => handle.clear_all_attention().await,
        Action::SetTitle(id, title) => handle.set_title(id, title).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(OrchestratorError::ChannelClosed) => {
            Err(TuiError::Engine(OrchestratorError::ChannelClosed))
        }
        // The engine already asked for confirmation through an event.
        Err(OrchestratorError::NeedsConfirmation { .. }) => Ok(()),
        Err(e) if e.is_stale() => {
            debug!(error = %e, "Ignoring stale request");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Engine rejected request");
            app.notice = Some((NoticeLevel::Warning, e.to_string()));
            Ok(())
        }
    }
}

fn log_close(outcome: CloseOutcome) {
    debug!(?outcome, "Close requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use panes_core::{DomainError, SessionId};
    use panes_engine::orchestrator::OrchestratorCommand;
    use tokio::sync::{broadcast, mpsc};

    fn test_handle() -> (OrchestratorHandle, mpsc::Receiver<OrchestratorCommand>) {
        let (tx, rx) = mpsc::channel(8);
        let (event_tx, _) = broadcast::channel(8);
        (OrchestratorHandle::new(tx, event_tx), rx)
    }

    #[tokio::test]
    async fn test_split_keys_target_main_handle() {
        let (handle, mut rx) = test_handle();
        let responder = tokio::spawn(async move {
            match rx.recv().await {
                Some(OrchestratorCommand::SetSplitRatio {
                    handle,
                    percent,
                    respond_to,
                }) => {
                    assert_eq!(handle, SplitHandle::Main);
                    let _ = respond_to.send(Ok(panes_core::SplitRatio::new(percent)));
                }
                other => panic!("unexpected command: {other:?}"),
            }
        });

        let mut app = App::default();
        dispatch(Action::SetMainSplit(55.0), &handle, &mut app)
            .await
            .unwrap();
        responder.await.unwrap();
        assert!(app.notice.is_none());
    }

    #[tokio::test]
    async fn test_rejection_becomes_notice() {
        let (handle, mut rx) = test_handle();
        tokio::spawn(async move {
            if let Some(OrchestratorCommand::AddSession { respond_to }) = rx.recv().await {
                let _ = respond_to.send(Err(DomainError::CapacityExceeded { max: 6 }.into()));
            }
        });

        let mut app = App::default();
        dispatch(Action::AddSession, &handle, &mut app).await.unwrap();
        let (level, message) = app.notice.unwrap();
        assert_eq!(level, NoticeLevel::Warning);
        assert!(message.contains('6'));
    }

    #[tokio::test]
    async fn test_stale_reference_is_silent() {
        let (handle, mut rx) = test_handle();
        let id = SessionId::new(4).unwrap();
        tokio::spawn(async move {
            if let Some(OrchestratorCommand::Focus { respond_to, .. }) = rx.recv().await {
                let _ = respond_to.send(Err(DomainError::StaleReference { session_id: id }.into()));
            }
        });

        let mut app = App::default();
        dispatch(Action::Focus(id), &handle, &mut app).await.unwrap();
        assert!(app.notice.is_none());
    }

    #[tokio::test]
    async fn test_stopped_engine_is_error() {
        let (handle, rx) = test_handle();
        drop(rx);

        let mut app = App::default();
        let result = dispatch(Action::AddSession, &handle, &mut app).await;
        assert!(matches!(
            result,
            Err(TuiError::Engine(OrchestratorError::ChannelClosed))
        ));

        // Fire-and-forget actions never fail.
        let input = Action::SendInput(SessionId::new(0).unwrap(), b"x".to_vec());
        dispatch(input, &handle, &mut app).await.unwrap();
    }
}
