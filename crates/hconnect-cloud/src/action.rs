//! Waiting for provider actions to complete

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{CloudError, ErrorCode, Result};
use crate::model::{Action, ActionStatus};
use crate::provider::{ActionWatch, CloudApi};

/// Block until the provider reports a terminal status for `action`.
///
/// Returns the provider's failure as [`CloudError::ActionFailed`], or
/// [`CloudError::Cancelled`] as soon as `cancel` fires.
pub async fn wait_for_action(
    api: &dyn CloudApi,
    action: &Action,
    cancel: &CancellationToken,
) -> Result<()> {
    if action.is_finished() {
        return action_outcome(action);
    }

    let ActionWatch {
        action_id,
        mut progress,
        done,
    } = api.watch_action(action);
    tokio::pin!(done);

    let mut progress_open = true;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CloudError::Cancelled),
            result = &mut done => {
                return result.unwrap_or_else(|_| Err(CloudError::ActionWatchClosed(action_id)));
            }
            changed = progress.changed(), if progress_open => match changed {
                Ok(()) => {
                    let percent = *progress.borrow_and_update();
                    debug!(
                        action = action_id,
                        command = %action.command,
                        progress = percent,
                        "action progress"
                    );
                }
                Err(_) => progress_open = false,
            },
        }
    }
}

/// Wait for each action in turn, stopping at the first failure.
pub async fn wait_for_actions(
    api: &dyn CloudApi,
    actions: &[Action],
    cancel: &CancellationToken,
) -> Result<()> {
    for action in actions {
        wait_for_action(api, action, cancel).await?;
    }
    Ok(())
}

/// Translate a finished action into a result
pub fn action_outcome(action: &Action) -> Result<()> {
    match action.status {
        ActionStatus::Success | ActionStatus::Running => Ok(()),
        ActionStatus::Error => {
            let (code, message) = match &action.error {
                Some(e) => (ErrorCode::from_code(&e.code), e.message.clone()),
                None => (
                    ErrorCode::Other("unknown".to_string()),
                    "action failed".to_string(),
                ),
            };
            Err(CloudError::ActionFailed {
                id: action.id,
                code,
                message,
            })
        }
    }
}
