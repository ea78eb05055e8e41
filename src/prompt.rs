//! The prompt completion protocol.
//!
//! Operations the daemon gates behind user interaction (unlock, create,
//! delete) do not return their result directly. Instead the method reply
//! carries the path of a Prompt object; the client must call `Prompt()` on
//! it and wait for the `Completed` signal, whose body carries the real
//! result (for create operations, the corrected object path).
//!
//! A [`Prompt`] moves through exactly two states: issued (the `Prompt()`
//! acknowledgement has been sent) and resolved (its correlated `Completed`
//! signal was observed, or the wait failed). The signal subscription is
//! established *before* the acknowledgement call is sent: the daemon may
//! emit `Completed` immediately, and a subscription installed afterwards
//! could miss it. zbus installs the bus match rule before the stream is
//! handed back, so no additional grace-period polling is needed to close
//! that window.
//!
//! The upstream protocol specifies no timeout; the wait here is bounded
//! anyway so a daemon that dies (or a dialog dismissed without a signal)
//! cannot block the caller forever.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};
use zbus::Connection;
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::check::{check_conn_and_path, is_prompt_path};
use crate::error::Error;
use crate::proxy::PromptProxy;

/// How long [`Prompt::run`] waits for the completion signal by default.
/// Generous, because a human is on the other end of the dialog.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(300);

/// A handle on one Prompt object. Ephemeral: built immediately before a
/// gated call is acknowledged and discarded once its signal is observed.
#[derive(Debug)]
pub struct Prompt {
    conn: Connection,
    path: OwnedObjectPath,
    timeout: Duration,
}

/// A `Completed` signal reduced to the fields the wait cares about.
#[derive(Debug)]
pub(crate) struct CompletionEvent {
    pub path: OwnedObjectPath,
    pub dismissed: bool,
    pub result: OwnedValue,
}

impl Prompt {
    /// Builds a prompt handle for `path`, validating the connection and the
    /// path together.
    pub fn new(conn: &Connection, path: OwnedObjectPath) -> Result<Self, Error> {
        check_conn_and_path(conn, path.as_str())?;
        Ok(Self {
            conn: conn.clone(),
            path,
            timeout: DEFAULT_PROMPT_TIMEOUT,
        })
    }

    /// Replaces the default completion-wait bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the prompt object on the bus.
    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    /// Acknowledges the prompt and blocks the calling task until the
    /// daemon's `Completed` signal for this prompt arrives, yielding the
    /// signal's result payload.
    ///
    /// `window_id` is a hint for parenting the daemon's dialog to a caller
    /// window; pass `""` when there is none.
    pub async fn run(&self, window_id: &str) -> Result<OwnedValue, Error> {
        let proxy = PromptProxy::builder(&self.conn)
            .path(self.path.clone())
            .map_err(Error::from)?
            .build()
            .await
            .map_err(Error::from)?;

        // Subscribe first; the acknowledgement below may complete the
        // prompt before this task is polled again.
        let signals = proxy
            .inner()
            .receive_signal("Completed")
            .await
            .map_err(Error::from)?;

        debug!(path = %self.path, "acknowledging prompt");
        proxy.prompt(window_id).await.map_err(Error::from)?;

        let events = signals.filter_map(|msg| std::future::ready(completion_event(&msg)));
        futures_util::pin_mut!(events);
        wait_for_completion(&self.path, events, self.timeout).await
    }
}

/// Decodes a `Completed` signal message. Malformed bodies are dropped (the
/// wait keeps listening) rather than aborting the prompt.
fn completion_event(msg: &zbus::message::Message) -> Option<CompletionEvent> {
    let header = msg.header();
    let path = header.path()?.to_owned().into();
    let body = msg.body();
    let (dismissed, result): (bool, Value<'_>) = match body.deserialize() {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "discarding malformed Completed signal");
            return None;
        }
    };
    let result = result.try_to_owned().ok()?;
    Some(CompletionEvent {
        path,
        dismissed,
        result,
    })
}

/// The resolved half of the protocol: discards events for other prompts
/// and returns the first one whose path equals `prompt_path`.
///
/// Factored over an injectable stream so the correlation, dismissal, and
/// closed-stream behavior are testable without bus signal delivery.
pub(crate) async fn wait_for_completion<S>(
    prompt_path: &ObjectPath<'_>,
    mut events: S,
    timeout: Duration,
) -> Result<OwnedValue, Error>
where
    S: Stream<Item = CompletionEvent> + Unpin,
{
    let wait = async {
        while let Some(event) = events.next().await {
            if event.path.as_str() != prompt_path.as_str() {
                debug!(
                    expected = %prompt_path,
                    received = %event.path,
                    "ignoring completion for a different prompt"
                );
                continue;
            }
            if event.dismissed {
                return Err(Error::PromptDismissed);
            }
            return Ok(event.result);
        }
        Err(Error::PromptClosed)
    };

    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| Error::PromptTimeout(timeout))?
}

/// Runs the prompt protocol for a path returned from a gated call.
///
/// Returns `Ok(None)` when `path` is not a prompt path (the operation
/// completed directly), otherwise the prompt's result payload.
pub(crate) async fn complete_if_prompt(
    conn: &Connection,
    path: &OwnedObjectPath,
) -> Result<Option<OwnedValue>, Error> {
    if !is_prompt_path(path) {
        return Ok(None);
    }
    let prompt = Prompt::new(conn, path.clone())?;
    prompt.run("").await.map(Some)
}

/// Extracts the corrected object path that create-style prompts carry in
/// their result payload.
pub(crate) fn path_from_result(result: OwnedValue) -> Result<OwnedObjectPath, Error> {
    OwnedObjectPath::try_from(result).map_err(|_| Error::PromptResult)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn path(raw: &str) -> OwnedObjectPath {
        ObjectPath::try_from(raw).unwrap().into()
    }

    fn event(raw: &str, dismissed: bool, result: &str) -> CompletionEvent {
        CompletionEvent {
            path: path(raw),
            dismissed,
            result: Value::from(result).try_to_owned().unwrap(),
        }
    }

    const PROMPT: &str = "/org/freedesktop/secrets/prompt/p0";

    #[tokio::test]
    async fn matching_completion_resolves_with_its_payload() {
        let events = stream::iter(vec![event(PROMPT, false, "done")]);
        futures_util::pin_mut!(events);
        let prompt_path = path(PROMPT);
        let value = wait_for_completion(&prompt_path, events, Duration::from_secs(1))
            .await
            .unwrap();
        let s: &str = (&value).downcast_ref().unwrap();
        assert_eq!(s, "done");
    }

    #[tokio::test]
    async fn completions_for_other_prompts_are_discarded() {
        let events = stream::iter(vec![
            event("/org/freedesktop/secrets/prompt/p9", false, "stranger"),
            event("/org/freedesktop/secrets/prompt/p8", true, ""),
            event(PROMPT, false, "mine"),
        ]);
        futures_util::pin_mut!(events);
        let prompt_path = path(PROMPT);
        let value = wait_for_completion(&prompt_path, events, Duration::from_secs(1))
            .await
            .unwrap();
        let s: &str = (&value).downcast_ref().unwrap();
        assert_eq!(s, "mine");
    }

    #[tokio::test]
    async fn dismissal_is_an_error() {
        let events = stream::iter(vec![event(PROMPT, true, "")]);
        futures_util::pin_mut!(events);
        let prompt_path = path(PROMPT);
        let err = wait_for_completion(&prompt_path, events, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PromptDismissed));
    }

    #[tokio::test]
    async fn closed_stream_does_not_hang() {
        let events = stream::iter(Vec::<CompletionEvent>::new());
        futures_util::pin_mut!(events);
        let prompt_path = path(PROMPT);
        let err = wait_for_completion(&prompt_path, events, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PromptClosed));
    }

    #[tokio::test]
    async fn silent_stream_times_out() {
        let events = stream::pending::<CompletionEvent>();
        futures_util::pin_mut!(events);
        let prompt_path = path(PROMPT);
        let err = wait_for_completion(&prompt_path, events, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PromptTimeout(_)));
    }

    #[test]
    fn create_result_payload_decodes_to_a_path() {
        let made = ObjectPath::try_from("/org/freedesktop/secrets/collection/made").unwrap();
        let value = Value::from(made).try_to_owned().unwrap();
        let decoded = path_from_result(value).unwrap();
        assert_eq!(decoded.as_str(), "/org/freedesktop/secrets/collection/made");

        let not_a_path = Value::from("just a string").try_to_owned().unwrap();
        assert!(matches!(
            path_from_result(not_a_path),
            Err(Error::PromptResult)
        ));
    }
}
