//! Event-loop executor for the chat state machine

use super::traits::StateSink;
use super::RuntimeError;
use crate::features::FeatureId;
use crate::llm::{GenRequest, LlmService};
use crate::profile::UserProfile;
use crate::prompt;
use crate::state_machine::{
    transition, ChatMessage, ChatState, Effect, Event, ImageData, Notice, TransitionError,
    TransitionResult,
};
use crate::title;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

const COMMAND_CHANNEL_CAPACITY: usize = 64;
const NOTICE_CHANNEL_CAPACITY: usize = 256;

/// An event submission, with an optional reply for caller-initiated events
pub struct Command {
    pub event: Event,
    pub reply: Option<oneshot::Sender<Result<(), TransitionError>>>,
}

/// Handle used by the API layer to read state and submit events
#[derive(Clone)]
pub struct ChatHandle {
    tx: mpsc::Sender<Command>,
    state: Arc<RwLock<ChatState>>,
    notices: broadcast::Sender<Notice>,
}

impl ChatHandle {
    /// Submit an event and wait for the transition outcome
    pub async fn apply(&self, event: Event) -> Result<(), RuntimeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command {
                event,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        reply_rx
            .await
            .map_err(|_| RuntimeError::Stopped)?
            .map_err(RuntimeError::from)
    }

    /// Clone the current chat state
    pub async fn snapshot(&self) -> ChatState {
        self.state.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}

/// Owns the chat state and executes transition effects
pub struct ChatRuntime<S> {
    state: Arc<RwLock<ChatState>>,
    sink: S,
    llm: Arc<dyn LlmService>,
    profile: Arc<RwLock<Option<UserProfile>>>,
    commands: mpsc::Receiver<Command>,
    self_tx: mpsc::Sender<Command>,
    notices: broadcast::Sender<Notice>,
}

impl<S: StateSink + 'static> ChatRuntime<S> {
    /// Spawn the runtime task and return a handle to it
    pub fn spawn(
        initial: ChatState,
        sink: S,
        llm: Arc<dyn LlmService>,
        profile: Arc<RwLock<Option<UserProfile>>>,
    ) -> ChatHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        let state = Arc::new(RwLock::new(initial));

        let handle = ChatHandle {
            tx: tx.clone(),
            state: Arc::clone(&state),
            notices: notices.clone(),
        };

        let runtime = Self {
            state,
            sink,
            llm,
            profile,
            commands: rx,
            self_tx: tx,
            notices,
        };
        tokio::spawn(runtime.run());

        handle
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            let result = self.handle(command.event).await;
            if let Some(reply) = command.reply {
                // The caller may have given up waiting; that is fine
                let _ = reply.send(result);
            }
        }
        tracing::debug!("chat runtime stopped");
    }

    async fn handle(&mut self, event: Event) -> Result<(), TransitionError> {
        let current = self.state.read().await.clone();
        match transition(&current, event) {
            Ok(TransitionResult { new_state, effects }) => {
                *self.state.write().await = new_state.clone();
                for effect in effects {
                    self.execute(&new_state, effect);
                }
                Ok(())
            }
            Err(e) => {
                match &e {
                    TransitionError::UnknownSession(id) => {
                        tracing::warn!(session_id = %id, "event targeted a session that does not exist");
                    }
                    TransitionError::SessionBusy => {
                        tracing::debug!("rejected send while a response is pending");
                    }
                }
                Err(e)
            }
        }
    }

    fn execute(&self, state: &ChatState, effect: Effect) {
        match effect {
            Effect::SaveSessions => {
                if let Err(e) = self.sink.save_sessions(&state.sessions) {
                    tracing::error!(error = %e, "failed to persist sessions");
                }
            }
            Effect::Notify(notice) => {
                // Send fails only when nobody is listening
                let _ = self.notices.send(notice);
            }
            Effect::RequestCompletion {
                session_id,
                text,
                image,
                history,
                feature,
            } => self.spawn_completion(session_id, text, image, history, feature),
            Effect::RequestTitle { session_id, text } => self.spawn_title(session_id, text),
        }
    }

    fn spawn_completion(
        &self,
        session_id: String,
        text: String,
        image: Option<ImageData>,
        history: Vec<ChatMessage>,
        feature: Option<FeatureId>,
    ) {
        let llm = Arc::clone(&self.llm);
        let profile = Arc::clone(&self.profile);
        let tx = self.self_tx.clone();

        tokio::spawn(async move {
            let profile_snapshot = profile.read().await.clone();
            let request = GenRequest {
                system_instruction: prompt::system_instruction(
                    profile_snapshot.as_ref(),
                    feature.map(FeatureId::descriptor),
                ),
                turns: prompt::conversation_turns(&history, &text, image.as_ref()),
                temperature: None,
                max_output_tokens: None,
            };

            let outcome = llm
                .generate(&request)
                .await
                .map(|response| response.text)
                .map_err(|e| e.message);

            let delivered = tx
                .send(Command {
                    event: Event::CompletionFinished {
                        session_id,
                        outcome,
                    },
                    reply: None,
                })
                .await;
            if delivered.is_err() {
                tracing::debug!("runtime stopped before completion could be delivered");
            }
        });
    }

    fn spawn_title(&self, session_id: String, text: String) {
        let llm = Arc::clone(&self.llm);
        let tx = self.self_tx.clone();

        tokio::spawn(async move {
            // Failures keep the default title; no event is sent
            if let Some(title) = title::generate_chat_title(&text, llm).await {
                let delivered = tx
                    .send(Command {
                        event: Event::TitleReady { session_id, title },
                        reply: None,
                    })
                    .await;
                if delivered.is_err() {
                    tracing::debug!("runtime stopped before title could be delivered");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{MemorySink, MockLlm};
    use crate::state_machine::Role;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn spawn_runtime(mock: MockLlm) -> ChatHandle {
        ChatRuntime::spawn(
            ChatState::default(),
            MemorySink::default(),
            Arc::new(mock),
            Arc::new(RwLock::new(None)),
        )
    }

    async fn new_chat(handle: &ChatHandle, id: &str) {
        handle
            .apply(Event::NewChat {
                id: id.to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    async fn send(handle: &ChatHandle, text: &str) -> Result<(), RuntimeError> {
        handle
            .apply(Event::UserMessage {
                text: text.to_string(),
                image: None,
            })
            .await
    }

    async fn wait_for_notice(
        notices: &mut broadcast::Receiver<Notice>,
        pred: impl Fn(&Notice) -> bool,
    ) -> Notice {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match notices.recv().await {
                    Ok(notice) if pred(&notice) => return notice,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        panic!("notice channel closed")
                    }
                }
            }
        })
        .await
        .expect("timed out waiting for notice")
    }

    #[tokio::test]
    async fn send_message_round_trip_appends_model_reply() {
        let handle = spawn_runtime(MockLlm::scripted("Here is a plan.", "Meal Planning Help"));
        new_chat(&handle, "a").await;
        handle
            .apply(Event::FeatureChosen {
                session_id: "a".to_string(),
                feature: crate::features::FeatureId::MealPlan,
            })
            .await
            .unwrap();

        let mut notices = handle.subscribe();
        send(&handle, "plan my meals").await.unwrap();
        wait_for_notice(&mut notices, |n| {
            matches!(n, Notice::BusyChanged { busy: false, .. })
        })
        .await;

        let state = handle.snapshot().await;
        let session = state.session("a").unwrap();
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[1].role, Role::User);
        assert_eq!(session.messages[2].role, Role::Model);
        assert_eq!(session.messages[2].text, "Here is a plan.");
        assert!(!state.is_busy("a"));
    }

    #[tokio::test]
    async fn first_message_generates_title() {
        let handle = spawn_runtime(MockLlm::scripted("reply", "Quick Nutrition Question"));
        new_chat(&handle, "a").await;

        let mut notices = handle.subscribe();
        send(&handle, "is honey vegan?").await.unwrap();
        wait_for_notice(&mut notices, |n| matches!(n, Notice::TitleUpdated { .. })).await;

        let state = handle.snapshot().await;
        assert_eq!(
            state.session("a").unwrap().title,
            "Quick Nutrition Question"
        );
    }

    #[tokio::test]
    async fn generation_failure_is_surfaced_inline() {
        let handle = spawn_runtime(MockLlm::failing("Rate limit exceeded: slow down"));
        new_chat(&handle, "a").await;

        let mut notices = handle.subscribe();
        send(&handle, "hello").await.unwrap();
        wait_for_notice(&mut notices, |n| matches!(n, Notice::ErrorRaised { .. })).await;
        wait_for_notice(&mut notices, |n| {
            matches!(n, Notice::BusyChanged { busy: false, .. })
        })
        .await;

        let state = handle.snapshot().await;
        let session = state.session("a").unwrap();
        let last = session.messages.last().unwrap();
        assert_eq!(last.role, Role::Model);
        assert!(last.text.contains("Rate limit exceeded"));
        assert!(!state.is_busy("a"));
    }

    #[tokio::test]
    async fn second_send_while_pending_is_rejected() {
        let gate = Arc::new(Semaphore::new(0));
        let handle = spawn_runtime(
            MockLlm::scripted("slow reply", "Title").gated(Arc::clone(&gate)),
        );
        new_chat(&handle, "a").await;

        let mut notices = handle.subscribe();
        send(&handle, "first").await.unwrap();
        let rejected = send(&handle, "second").await;
        assert!(matches!(
            rejected,
            Err(RuntimeError::Transition(TransitionError::SessionBusy))
        ));

        // Release the completion and the title request
        gate.add_permits(2);
        wait_for_notice(&mut notices, |n| {
            matches!(n, Notice::BusyChanged { busy: false, .. })
        })
        .await;

        send(&handle, "third").await.unwrap();
    }

    #[tokio::test]
    async fn completion_for_deleted_session_is_absorbed() {
        let gate = Arc::new(Semaphore::new(0));
        let handle = spawn_runtime(
            MockLlm::scripted("late reply", "Title").gated(Arc::clone(&gate)),
        );
        new_chat(&handle, "a").await;
        send(&handle, "hello").await.unwrap();

        handle
            .apply(Event::DeleteChat {
                id: "a".to_string(),
            })
            .await
            .unwrap();
        gate.add_permits(2);

        // The late completion must clear the in-flight marker without
        // resurrecting the session.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let state = handle.snapshot().await;
                if state.in_flight.is_empty() {
                    assert!(state.sessions.is_empty());
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("in-flight marker was never cleared");
    }

    #[tokio::test]
    async fn sessions_are_persisted_on_mutation() {
        let sink = MemorySink::default();
        let saves = Arc::clone(&sink.saves);
        let handle = ChatRuntime::spawn(
            ChatState::default(),
            sink,
            Arc::new(MockLlm::scripted("reply", "Title")),
            Arc::new(RwLock::new(None)),
        );

        new_chat(&handle, "a").await;
        let saved = saves.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].len(), 1);
        assert_eq!(saved[0][0].id, "a");
    }
}
