//! Select → prompt → generate workflow.

use super::state::WorkflowState;
use crate::error::{EditError, Result, MISSING_INPUT_MESSAGE};
use crate::image::{encode, EditClient, EditedImage, ImageSource};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Inputs collected from the user plus the latest issued sequence number.
#[derive(Debug, Default)]
struct Session {
    image: Option<Arc<dyn ImageSource>>,
    prompt: String,
    seq: u64,
}

/// Drives one edit session and publishes every state change.
///
/// Events arrive through [`select_image`](Self::select_image),
/// [`set_prompt`](Self::set_prompt) and [`generate`](Self::generate). At most
/// one generation is tracked at a time; an outcome whose sequence number is
/// no longer the latest is dropped instead of overwriting newer state.
pub struct WorkflowController<C> {
    client: C,
    session: Mutex<Session>,
    state: watch::Sender<WorkflowState>,
}

impl<C: EditClient> WorkflowController<C> {
    /// Creates an idle controller around an edit client.
    pub fn new(client: C) -> Self {
        let (state, _) = watch::channel(WorkflowState::default());
        Self {
            client,
            session: Mutex::new(Session::default()),
            state,
        }
    }

    /// Receives every state transition.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the selected image and clears the previous outcome.
    ///
    /// A generation still in flight is superseded: its result will be discarded.
    pub fn select_image(&self, image: impl ImageSource + 'static) {
        let image: Arc<dyn ImageSource> = Arc::new(image);
        let name = image.file_name().to_string();

        let mut session = self.session();
        session.image = Some(image);
        session.seq += 1;
        self.state.send_modify(|s| {
            if s.is_loading {
                tracing::info!(seq = session.seq, "new image selected, superseding pending edit");
            }
            s.is_loading = false;
            s.clear_outcome();
            s.has_image = true;
            s.image_name = Some(name);
        });
    }

    /// Updates the edit instruction.
    pub fn set_prompt(&self, text: impl Into<String>) {
        let text = text.into();
        let has_prompt = !text.trim().is_empty();
        self.session().prompt = text;
        self.state.send_if_modified(|s| {
            let changed = s.has_prompt != has_prompt;
            s.has_prompt = has_prompt;
            changed
        });
    }

    /// Encodes the selected image and asks the client to edit it.
    ///
    /// Returns [`EditError::Busy`] without touching state while another
    /// generation is loading, and [`EditError::Superseded`] when a newer
    /// selection replaced this one before it finished.
    pub async fn generate(&self) -> Result<EditedImage> {
        let (image, prompt, seq) = {
            let mut session = self.session();
            if self.state.borrow().is_loading {
                tracing::debug!("generate ignored, a request is already in flight");
                return Err(EditError::Busy);
            }

            let image = match (&session.image, session.prompt.trim().is_empty()) {
                (Some(image), false) => Arc::clone(image),
                _ => {
                    self.state.send_modify(|s| {
                        s.finish_with(Err(MISSING_INPUT_MESSAGE.to_string()));
                    });
                    return Err(EditError::Validation(MISSING_INPUT_MESSAGE.into()));
                }
            };

            session.seq += 1;
            self.state.send_modify(WorkflowState::start_loading);
            (image, session.prompt.clone(), session.seq)
        };

        tracing::debug!(seq, file = image.file_name(), "starting edit");
        let in_flight = InFlight {
            controller: self,
            seq,
            settled: false,
        };
        let outcome = self.run(image.as_ref(), &prompt).await;
        in_flight.settle(outcome)
    }

    async fn run(&self, image: &dyn ImageSource, prompt: &str) -> Result<EditedImage> {
        let payload = encode(image).await?;
        match self.client.submit(&payload, prompt).await? {
            Some(data) => Ok(EditedImage::new(data)),
            None => Err(EditError::EmptyResult),
        }
    }
}

/// Clears the loading flag on every exit from `generate`, including the
/// future being dropped before completion.
struct InFlight<'a, C> {
    controller: &'a WorkflowController<C>,
    seq: u64,
    settled: bool,
}

impl<C: EditClient> InFlight<'_, C> {
    fn settle(mut self, outcome: Result<EditedImage>) -> Result<EditedImage> {
        self.settled = true;

        let session = self.controller.session();
        if session.seq != self.seq {
            tracing::debug!(
                seq = self.seq,
                latest = session.seq,
                "discarding stale edit outcome"
            );
            return Err(EditError::Superseded);
        }

        let shown = match &outcome {
            Ok(image) => Ok(image.clone()),
            Err(e) => {
                tracing::warn!(seq = self.seq, error = %e, "edit failed");
                Err(e.user_message())
            }
        };
        self.controller.state.send_modify(|s| s.finish_with(shown));
        outcome
    }
}

impl<C> Drop for InFlight<'_, C> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let session = self
            .controller
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if session.seq == self.seq {
            tracing::debug!(seq = self.seq, "edit abandoned before completion");
            self.controller.state.send_modify(|s| s.is_loading = false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EMPTY_RESULT_MESSAGE, SERVICE_FAILURE_MESSAGE};
    use crate::image::{EncodedPayload, UploadedImage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    type Reply = Result<Option<String>>;

    /// Client whose replies are released by the test, one gate per call.
    #[derive(Default)]
    struct GatedClient {
        gates: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl GatedClient {
        fn gate(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().push_back(rx);
            tx
        }

        fn replying(reply: Reply) -> Arc<Self> {
            let client = Arc::new(Self::default());
            client.gate().send(reply).unwrap();
            client
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EditClient for GatedClient {
        async fn submit(&self, payload: &EncodedPayload, prompt: &str) -> Result<Option<String>> {
            assert!(!payload.base64_data.is_empty());
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self
                .gates
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected submit");
            gate.await.expect("gate dropped")
        }

        fn name(&self) -> &str {
            "gated"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn jpeg() -> UploadedImage {
        UploadedImage::new(vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3], "image/jpeg", "me.jpg")
    }

    fn service_failure() -> EditError {
        EditError::ServiceCallFailed(SERVICE_FAILURE_MESSAGE.into())
    }

    async fn wait_for_calls(client: &GatedClient, n: usize) {
        for _ in 0..1000 {
            if client.calls() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("client never reached {n} calls");
    }

    #[tokio::test]
    async fn generate_success_populates_result() {
        let client = GatedClient::replying(Ok(Some("Zm9vYmFy".into())));
        let controller = WorkflowController::new(Arc::clone(&client));
        controller.select_image(jpeg());
        controller.set_prompt("add sunglasses");

        let image = controller.generate().await.unwrap();
        assert_eq!(image.base64_data, "Zm9vYmFy");

        let state = controller.state();
        assert_eq!(state.last_result, Some(EditedImage::new("Zm9vYmFy")));
        assert!(state.last_error.is_none());
        assert!(!state.is_loading);
        assert_eq!(client.prompts.lock().unwrap().as_slice(), ["add sunglasses"]);
    }

    #[tokio::test]
    async fn generate_without_image_sets_validation_error() {
        let client = Arc::new(GatedClient::default());
        let controller = WorkflowController::new(Arc::clone(&client));
        controller.set_prompt("add sunglasses");

        let err = controller.generate().await.unwrap_err();
        assert!(matches!(err, EditError::Validation(_)));

        let state = controller.state();
        assert_eq!(state.last_error.as_deref(), Some(MISSING_INPUT_MESSAGE));
        assert!(!state.is_loading);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn generate_without_prompt_sets_validation_error() {
        let client = Arc::new(GatedClient::default());
        let controller = WorkflowController::new(Arc::clone(&client));
        controller.select_image(jpeg());
        controller.set_prompt("");

        assert!(matches!(
            controller.generate().await,
            Err(EditError::Validation(_))
        ));
        assert_eq!(
            controller.state().last_error.as_deref(),
            Some(MISSING_INPUT_MESSAGE)
        );
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn whitespace_prompt_is_rejected_before_encoding() {
        let client = Arc::new(GatedClient::default());
        let controller = WorkflowController::new(Arc::clone(&client));
        // Unreadable on purpose: reaching the encoder would surface a read error.
        controller.select_image(crate::image::ImageFile::new("/nonexistent/cat.png"));
        controller.set_prompt("   \n\t");
        assert!(!controller.state().has_prompt);

        assert!(matches!(
            controller.generate().await,
            Err(EditError::Validation(_))
        ));
        assert_eq!(
            controller.state().last_error.as_deref(),
            Some(MISSING_INPUT_MESSAGE)
        );
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn repeated_validation_failure_is_published_each_time() {
        let client = Arc::new(GatedClient::default());
        let controller = WorkflowController::new(Arc::clone(&client));
        let mut rx = controller.subscribe();
        controller.select_image(jpeg());
        let _ = rx.borrow_and_update();

        let _ = controller.generate().await;
        assert!(rx.has_changed().unwrap());
        let first = rx.borrow_and_update().clone();

        let _ = controller.generate().await;
        assert!(rx.has_changed().unwrap());
        let second = rx.borrow_and_update().clone();

        assert_eq!(first.last_error, second.last_error);
        assert_eq!(second.outcomes, first.outcomes + 1);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn empty_result_becomes_error() {
        let client = GatedClient::replying(Ok(None));
        let controller = WorkflowController::new(client);
        controller.select_image(jpeg());
        controller.set_prompt("add sunglasses");

        assert!(matches!(
            controller.generate().await,
            Err(EditError::EmptyResult)
        ));
        let state = controller.state();
        assert_eq!(state.last_error.as_deref(), Some(EMPTY_RESULT_MESSAGE));
        assert!(state.last_result.is_none());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn service_failure_becomes_error() {
        let client = GatedClient::replying(Err(service_failure()));
        let controller = WorkflowController::new(client);
        controller.select_image(jpeg());
        controller.set_prompt("make it pop-art");

        assert!(matches!(
            controller.generate().await,
            Err(EditError::ServiceCallFailed(_))
        ));
        let state = controller.state();
        let error = state.last_error.unwrap();
        assert!(error.contains("Failed to communicate with the Gemini API."));
        assert!(state.last_result.is_none());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn read_failure_becomes_error_without_call() {
        let client = Arc::new(GatedClient::default());
        let controller = WorkflowController::new(Arc::clone(&client));
        controller.select_image(crate::image::ImageFile::new("/nonexistent/cat.png"));
        controller.set_prompt("add a hat");

        assert!(matches!(
            controller.generate().await,
            Err(EditError::Read { .. })
        ));
        let error = controller.state().last_error.unwrap();
        assert!(error.starts_with("An error occurred: could not read cat.png"));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn new_generate_clears_previous_outcome() {
        let client = Arc::new(GatedClient::default());
        client.gate().send(Ok(None)).unwrap();
        let controller = Arc::new(WorkflowController::new(Arc::clone(&client)));
        controller.select_image(jpeg());
        controller.set_prompt("add sunglasses");
        let _ = controller.generate().await;
        assert!(controller.state().last_error.is_some());

        let second = client.gate();
        let task = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.generate().await }
        });
        wait_for_calls(&client, 2).await;

        let loading = controller.state();
        assert!(loading.is_loading);
        assert!(loading.last_error.is_none());
        assert!(loading.last_result.is_none());

        second.send(Ok(Some("eA==".into()))).unwrap();
        let _ = task.await.unwrap().unwrap();
        assert!(controller.state().last_error.is_none());
    }

    #[tokio::test]
    async fn generate_while_loading_is_rejected() {
        let client = Arc::new(GatedClient::default());
        let gate = client.gate();
        let controller = Arc::new(WorkflowController::new(Arc::clone(&client)));
        controller.select_image(jpeg());
        controller.set_prompt("add sunglasses");

        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.generate().await }
        });
        wait_for_calls(&client, 1).await;

        assert!(matches!(controller.generate().await, Err(EditError::Busy)));
        assert!(controller.state().is_loading);
        assert!(controller.state().last_error.is_none());
        assert_eq!(client.calls(), 1);

        gate.send(Ok(Some("Zmlyc3Q=".into()))).unwrap();
        let _ = first.await.unwrap().unwrap();
        assert_eq!(
            controller.state().last_result,
            Some(EditedImage::new("Zmlyc3Q="))
        );
    }

    #[tokio::test]
    async fn stale_outcome_is_discarded() {
        let client = Arc::new(GatedClient::default());
        let first_gate = client.gate();
        let second_gate = client.gate();
        let controller = Arc::new(WorkflowController::new(Arc::clone(&client)));
        controller.select_image(jpeg());
        controller.set_prompt("add sunglasses");

        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.generate().await }
        });
        wait_for_calls(&client, 1).await;

        // Re-selecting supersedes the pending request.
        controller.select_image(jpeg());
        assert!(!controller.state().is_loading);

        let second = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.generate().await }
        });
        wait_for_calls(&client, 2).await;

        second_gate.send(Ok(Some("c2Vjb25k".into()))).unwrap();
        assert_eq!(
            second.await.unwrap().unwrap(),
            EditedImage::new("c2Vjb25k")
        );

        first_gate.send(Ok(Some("Zmlyc3Q=".into()))).unwrap();
        assert!(matches!(
            first.await.unwrap(),
            Err(EditError::Superseded)
        ));

        let state = controller.state();
        assert_eq!(state.last_result, Some(EditedImage::new("c2Vjb25k")));
        assert!(state.last_error.is_none());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn dropped_generate_clears_loading() {
        let client = Arc::new(GatedClient::default());
        let _gate = client.gate();
        let controller = Arc::new(WorkflowController::new(Arc::clone(&client)));
        controller.select_image(jpeg());
        controller.set_prompt("add sunglasses");

        let task = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.generate().await }
        });
        wait_for_calls(&client, 1).await;
        assert!(controller.state().is_loading);

        task.abort();
        let _ = task.await;
        assert!(!controller.state().is_loading);
    }

    #[tokio::test]
    async fn observers_see_each_transition() {
        let client = GatedClient::replying(Ok(Some("Zm9vYmFy".into())));
        let controller = WorkflowController::new(client);
        let mut rx = controller.subscribe();

        controller.select_image(jpeg());
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().has_image);

        controller.set_prompt("add sunglasses");
        assert!(rx.borrow_and_update().has_prompt);

        // Same emptiness, no notification.
        controller.set_prompt("add sunglasses and a hat");
        assert!(!rx.has_changed().unwrap());

        let _ = controller.generate().await.unwrap();
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(state.last_result.is_some());
        assert_eq!(state.image_name.as_deref(), Some("me.jpg"));
    }

    #[tokio::test]
    async fn selecting_image_clears_outcome() {
        let client = GatedClient::replying(Ok(None));
        let controller = WorkflowController::new(client);
        controller.select_image(jpeg());
        controller.set_prompt("x");
        let _ = controller.generate().await;
        assert!(controller.state().last_error.is_some());

        controller.select_image(jpeg());
        let state = controller.state();
        assert!(state.last_error.is_none());
        assert!(state.last_result.is_none());
        assert!(state.has_prompt);
    }
}
