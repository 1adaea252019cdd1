//! Per-session actor.
//!
//! Every live session runs as one Tokio task that owns its [`QuizSession`],
//! roster, state machine, answer bus and deadline timer. Callers only hold a
//! [`SessionHandle`] and talk to the task through a bounded command queue, so
//! concurrent submissions are serialised and a question resolves exactly once
//! whether the timer or the last answer gets there first.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::future::join_all;
use indexmap::IndexMap;
use tokio::{
    sync::{mpsc, oneshot},
    time::{Instant, sleep_until, timeout},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::SessionSettings,
    dao::{models::PersistOutcome, recorder::AttemptRecorder},
    dto::{
        events::{QuestionStartedEvent, ResolveReason, SessionEndedEvent},
        format_system_time,
    },
    error::ServiceError,
    state::{
        bus::{AnswerBus, BusEvent, SessionSubscription},
        pin::Pin,
        quiz::{AnswerEvent, QuestionSnapshot, QuizSession},
        roster::{LeaderboardEntry, PlayerRoster},
        scoring,
        state_machine::{FinishReason, SessionEvent, SessionStateMachine, SessionStatus},
    },
};

type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

/// Messages accepted by a session actor.
enum SessionCommand {
    Join {
        nickname: String,
        user_id: Option<String>,
        reply: Reply<JoinedSession>,
    },
    Start {
        host_user_id: String,
        reply: Reply<SessionInfo>,
    },
    Submit {
        question_id: Uuid,
        nickname: String,
        selected_option_id: Option<Uuid>,
        submitted_at: Instant,
        reply: Reply<AnswerAck>,
    },
    End {
        host_user_id: String,
        reply: Reply<SessionInfo>,
    },
    Status {
        reply: oneshot::Sender<SessionInfo>,
    },
    Subscribe {
        reply: oneshot::Sender<SessionSubscription>,
    },
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedSession {
    /// Identifier of the live run.
    pub session_id: Uuid,
    /// Session PIN.
    pub pin: Pin,
    /// Quiz being played.
    pub quiz_id: Uuid,
    /// Course the quiz belongs to.
    pub course_id: Uuid,
    /// Nickname as registered.
    pub nickname: String,
    /// Players after this join.
    pub player_count: usize,
}

/// Acknowledgement of an accepted answer. Correctness is only revealed on resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerAck {
    /// Question the answer was recorded for.
    pub question_id: Uuid,
    /// Players who answered so far.
    pub answered_count: usize,
    /// Players in the session.
    pub player_count: usize,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    /// Identifier of the live run.
    pub session_id: Uuid,
    /// Session PIN.
    pub pin: Pin,
    /// Quiz being played.
    pub quiz_id: Uuid,
    /// Course the quiz belongs to.
    pub course_id: Uuid,
    /// Quiz title.
    pub quiz_title: String,
    /// Host allowed to control the session.
    pub host_user_id: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Question in progress, or the last one played.
    pub current_question_index: Option<usize>,
    /// Number of questions in the quiz.
    pub total_questions: usize,
    /// Nicknames in join order.
    pub players: Vec<String>,
    /// Deadline of the open question.
    pub question_deadline: Option<SystemTime>,
    /// Question currently accepting answers.
    pub current_question_id: Option<Uuid>,
    /// Live per-option counts of the open question.
    pub answer_counts: Option<IndexMap<Uuid, u32>>,
    /// Set once finished.
    pub finish_reason: Option<FinishReason>,
    /// Final ranking, set once the session is finished.
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
    /// Number of state transitions applied so far.
    pub version: usize,
}

/// Cloneable address of a running session actor.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    session_id: Uuid,
    pin: Pin,
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Identifier of the session behind this handle.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// PIN the session is registered under.
    pub fn pin(&self) -> Pin {
        self.pin
    }

    /// Whether the actor behind this handle has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ServiceError::SessionClosed)?;
        response.await.map_err(|_| ServiceError::SessionClosed)
    }

    /// Add a player to the lobby.
    pub async fn join(
        &self,
        nickname: String,
        user_id: Option<String>,
    ) -> Result<JoinedSession, ServiceError> {
        self.request(|reply| SessionCommand::Join {
            nickname,
            user_id,
            reply,
        })
        .await?
    }

    /// Leave the lobby and open the first question. Host only.
    pub async fn start(&self, host_user_id: String) -> Result<SessionInfo, ServiceError> {
        self.request(|reply| SessionCommand::Start {
            host_user_id,
            reply,
        })
        .await?
    }

    /// Submit an answer; the arrival time is stamped here, before queueing.
    pub async fn submit(
        &self,
        question_id: Uuid,
        nickname: String,
        selected_option_id: Option<Uuid>,
    ) -> Result<AnswerAck, ServiceError> {
        let submitted_at = Instant::now();
        self.request(|reply| SessionCommand::Submit {
            question_id,
            nickname,
            selected_option_id,
            submitted_at,
            reply,
        })
        .await?
    }

    /// Finish early and persist attempts. Host only.
    pub async fn end(&self, host_user_id: String) -> Result<SessionInfo, ServiceError> {
        self.request(|reply| SessionCommand::End {
            host_user_id,
            reply,
        })
        .await?
    }

    /// Current snapshot.
    pub async fn status(&self) -> Result<SessionInfo, ServiceError> {
        self.request(|reply| SessionCommand::Status { reply }).await
    }

    /// Follow session events from now on.
    pub async fn subscribe(&self) -> Result<SessionSubscription, ServiceError> {
        self.request(|reply| SessionCommand::Subscribe { reply }).await
    }
}

/// Spawn the actor for `session`; the returned receiver fires once it finishes.
pub fn spawn_session(
    session: QuizSession,
    snapshot: QuestionSnapshot,
    recorder: Arc<dyn AttemptRecorder>,
    settings: &SessionSettings,
) -> (SessionHandle, oneshot::Receiver<()>) {
    let (commands, inbox) = mpsc::channel(settings.command_channel_capacity.max(1));
    let (finished_tx, finished_rx) = oneshot::channel();

    let handle = SessionHandle {
        session_id: session.session_id,
        pin: session.pin,
        commands,
    };

    let actor = SessionActor {
        roster: PlayerRoster::new(session.pin),
        bus: AnswerBus::new(session.pin, settings.event_channel_capacity),
        machine: SessionStateMachine::new(),
        deadline: None,
        lobby_deadline: (!settings.lobby_idle.is_zero())
            .then(|| Instant::now() + settings.lobby_idle),
        final_event: None,
        finished: Some(finished_tx),
        persist_timeout: settings.persist_timeout,
        session,
        snapshot,
        recorder,
    };
    tokio::spawn(actor.run(inbox));

    (handle, finished_rx)
}

struct SessionActor {
    session: QuizSession,
    snapshot: QuestionSnapshot,
    machine: SessionStateMachine,
    roster: PlayerRoster,
    bus: AnswerBus,
    recorder: Arc<dyn AttemptRecorder>,
    persist_timeout: Duration,
    /// Authoritative deadline of the open question.
    deadline: Option<Instant>,
    /// When an unstarted lobby gives up waiting for its host.
    lobby_deadline: Option<Instant>,
    final_event: Option<BusEvent>,
    finished: Option<oneshot::Sender<()>>,
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl SessionActor {
    async fn run(mut self, mut inbox: mpsc::Receiver<SessionCommand>) {
        info!(pin = %self.session.pin, quiz_id = %self.session.quiz_id, "session opened");

        loop {
            tokio::select! {
                biased;
                command = inbox.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = wait_for(self.deadline) => self.resolve(ResolveReason::Deadline).await,
                _ = wait_for(self.lobby_deadline) => self.expire_lobby().await,
            }
        }

        debug!(pin = %self.session.pin, "session actor stopped");
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Join {
                nickname,
                user_id,
                reply,
            } => {
                let _ = reply.send(self.join(&nickname, user_id));
            }
            SessionCommand::Start {
                host_user_id,
                reply,
            } => {
                let _ = reply.send(self.start(&host_user_id));
            }
            SessionCommand::Submit {
                question_id,
                nickname,
                selected_option_id,
                submitted_at,
                reply,
            } => {
                let event = AnswerEvent {
                    session_pin: self.session.pin,
                    question_id,
                    player_nickname: nickname,
                    selected_option_id,
                    submitted_at,
                };
                let _ = reply.send(self.submit(event));

                if self.machine.status() == SessionStatus::Active && self.roster.all_answered() {
                    self.resolve(ResolveReason::AllAnswered).await;
                }
            }
            SessionCommand::End {
                host_user_id,
                reply,
            } => {
                let result = self.end(&host_user_id).await;
                let _ = reply.send(result);
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.info());
            }
            SessionCommand::Subscribe { reply } => {
                let subscription = SessionSubscription::new(
                    self.session.pin,
                    self.bus.subscribe(),
                    self.final_event.clone(),
                );
                debug!(
                    pin = %self.session.pin,
                    subscribers = self.bus.subscriber_count(),
                    "subscriber attached"
                );
                let _ = reply.send(subscription);
            }
        }
    }

    fn join(
        &mut self,
        nickname: &str,
        user_id: Option<String>,
    ) -> Result<JoinedSession, ServiceError> {
        if self.machine.status() != SessionStatus::Waiting {
            return Err(ServiceError::SessionNotJoinable);
        }

        let player = self.roster.join(nickname, user_id)?;
        info!(pin = %self.session.pin, nickname = %player.nickname, "player joined");
        self.bus.player_joined(&player.nickname, self.roster.len());

        Ok(JoinedSession {
            session_id: self.session.session_id,
            pin: self.session.pin,
            quiz_id: self.session.quiz_id,
            course_id: self.session.course_id,
            nickname: player.nickname,
            player_count: self.roster.len(),
        })
    }

    fn ensure_host(&self, host_user_id: &str, action: &str) -> Result<(), ServiceError> {
        if host_user_id != self.session.host_user_id {
            return Err(ServiceError::Forbidden(format!(
                "only the host can {action} this session"
            )));
        }
        Ok(())
    }

    fn start(&mut self, host_user_id: &str) -> Result<SessionInfo, ServiceError> {
        self.ensure_host(host_user_id, "start")?;
        self.session.status = self.machine.apply(SessionEvent::Start)?;
        self.lobby_deadline = None;
        info!(pin = %self.session.pin, players = self.roster.len(), "session started");

        self.open_question(0);
        Ok(self.info())
    }

    fn submit(&mut self, event: AnswerEvent) -> Result<AnswerAck, ServiceError> {
        if self.machine.status() != SessionStatus::Active {
            return Err(ServiceError::QuestionClosed);
        }

        let (Some(index), Some(deadline)) = (self.session.current_question_index, self.deadline)
        else {
            return Err(ServiceError::QuestionClosed);
        };
        let Some(question) = self.snapshot.get(index) else {
            return Err(ServiceError::QuestionClosed);
        };
        if question.question_id != event.question_id {
            return Err(ServiceError::QuestionClosed);
        }
        if let Some(option) = event.selected_option_id {
            if !question.has_option(option) {
                return Err(ServiceError::InvalidInput(format!(
                    "option {option} does not belong to question {}",
                    question.question_id
                )));
            }
        }

        if !self.roster.mark_answered(&event.player_nickname)? {
            debug!(
                pin = %self.session.pin,
                nickname = %event.player_nickname,
                question_id = %event.question_id,
                "duplicate answer dropped"
            );
            return Err(ServiceError::AlreadyAnswered);
        }

        let points = scoring::score(&self.snapshot, &mut self.roster, &event, deadline);
        let answered_count = self.roster.answered_count();
        let player_count = self.roster.len();
        debug!(
            pin = %self.session.pin,
            nickname = %event.player_nickname,
            points,
            "answer accepted"
        );

        self.bus.publish_answer(
            event.question_id,
            &event.player_nickname,
            event.selected_option_id,
            answered_count,
            player_count,
        );

        Ok(AnswerAck {
            question_id: event.question_id,
            answered_count,
            player_count,
        })
    }

    async fn end(&mut self, host_user_id: &str) -> Result<SessionInfo, ServiceError> {
        self.ensure_host(host_user_id, "end")?;
        self.session.status = self.machine.apply(SessionEvent::End)?;
        self.deadline = None;
        self.session.question_deadline = None;
        info!(pin = %self.session.pin, "session ended by host");

        self.finish().await;
        Ok(self.info())
    }

    fn open_question(&mut self, index: usize) {
        let Some(question) = self.snapshot.get(index) else {
            return;
        };

        let duration = Duration::from_secs(u64::from(question.duration_seconds));
        let wall_deadline = SystemTime::now() + duration;
        self.deadline = Some(Instant::now() + duration);
        self.session.current_question_index = Some(index);
        self.session.question_deadline = Some(wall_deadline);

        let event = QuestionStartedEvent {
            question_id: question.question_id,
            question_index: index,
            total_questions: self.snapshot.len(),
            text: question.text.clone(),
            options: question.option_summaries(),
            duration_seconds: question.duration_seconds,
            deadline: format_system_time(wall_deadline),
        };
        debug!(pin = %self.session.pin, index, "question opened");
        self.bus.question_started(event);
    }

    /// Close the open question, then advance or finish.
    async fn resolve(&mut self, reason: ResolveReason) {
        if self.machine.status() != SessionStatus::Active || self.deadline.is_none() {
            return;
        }
        let Some(index) = self.session.current_question_index else {
            return;
        };
        let Some(question) = self.snapshot.get(index).cloned() else {
            return;
        };

        self.deadline = None;
        self.session.question_deadline = None;
        self.bus.question_resolved(&question, reason);
        self.roster.reset_answers();
        debug!(pin = %self.session.pin, index, ?reason, "question resolved");

        let last = index + 1 >= self.snapshot.len();
        match self.machine.apply(SessionEvent::Resolve { last }) {
            Ok(status) => {
                self.session.status = status;
                if status == SessionStatus::Active {
                    self.open_question(index + 1);
                } else {
                    info!(pin = %self.session.pin, "session completed");
                    self.finish().await;
                }
            }
            Err(err) => warn!(pin = %self.session.pin, error = %err, "resolve rejected"),
        }
    }

    /// Close a lobby the host never started.
    async fn expire_lobby(&mut self) {
        self.lobby_deadline = None;
        match self.machine.apply(SessionEvent::Expire) {
            Ok(status) => {
                self.session.status = status;
                info!(
                    pin = %self.session.pin,
                    players = self.roster.len(),
                    "lobby expired before start"
                );
                self.finish().await;
            }
            Err(err) => debug!(pin = %self.session.pin, error = %err, "lobby expiry ignored"),
        }
    }

    async fn finish(&mut self) {
        self.lobby_deadline = None;
        if self.session.current_question_index.is_some() {
            self.persist_results().await;
        }

        let event = SessionEndedEvent {
            reason: self
                .machine
                .finish_reason()
                .unwrap_or(FinishReason::EndedByHost),
            total_questions: self.snapshot.len(),
            leaderboard: self.roster.leaderboard(),
        };
        self.bus.session_ended(event.clone());
        self.final_event = Some(BusEvent::SessionEnded(event));

        if let Some(finished) = self.finished.take() {
            let _ = finished.send(());
        }
    }

    async fn persist_results(&self) {
        let attempts = scoring::finalize(
            &self.session,
            &self.snapshot,
            &self.roster,
            SystemTime::now(),
        );
        if attempts.is_empty() {
            return;
        }

        let pin = self.session.pin;
        let writes = attempts.into_iter().map(|attempt| {
            let identity = attempt.player_identity.key();
            async move { (identity, self.recorder.persist(attempt).await) }
        });

        match timeout(self.persist_timeout, join_all(writes)).await {
            Ok(results) => {
                for (identity, result) in results {
                    match result {
                        Ok(PersistOutcome::Inserted) => {
                            debug!(%pin, player = %identity, "attempt recorded");
                        }
                        Ok(PersistOutcome::AlreadyRecorded) => {
                            info!(%pin, player = %identity, "attempt already recorded");
                        }
                        Err(err) => {
                            warn!(%pin, player = %identity, error = %err, "failed to record attempt");
                        }
                    }
                }
            }
            Err(_) => warn!(%pin, "recording attempts timed out"),
        }
    }

    fn info(&self) -> SessionInfo {
        let snapshot = self.machine.snapshot();
        let open_tally = self
            .bus
            .current_tally()
            .filter(|_| snapshot.status == SessionStatus::Active);
        SessionInfo {
            session_id: self.session.session_id,
            pin: self.session.pin,
            quiz_id: self.session.quiz_id,
            course_id: self.session.course_id,
            quiz_title: self.session.quiz_title.clone(),
            host_user_id: self.session.host_user_id.clone(),
            status: snapshot.status,
            current_question_index: self.session.current_question_index,
            total_questions: self.snapshot.len(),
            players: self.roster.iter().map(|player| player.nickname.clone()).collect(),
            question_deadline: self.session.question_deadline,
            current_question_id: open_tally.map(|(question_id, _)| question_id),
            answer_counts: open_tally.map(|(_, counts)| counts.clone()),
            finish_reason: snapshot.finish_reason,
            leaderboard: (snapshot.status == SessionStatus::Finished)
                .then(|| self.roster.leaderboard()),
            version: snapshot.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::{
        dao::{quiz_store::memory::MemoryQuizStore, recorder::StorageSlot},
        state::quiz::fixtures,
    };

    const HOST: &str = "host-1";

    fn launch(question_count: usize) -> (SessionHandle, QuestionSnapshot, MemoryQuizStore) {
        launch_with(question_count, &SessionSettings::default())
    }

    fn launch_with(
        question_count: usize,
        settings: &SessionSettings,
    ) -> (SessionHandle, QuestionSnapshot, MemoryQuizStore) {
        let snapshot = fixtures::snapshot(question_count);
        let store = MemoryQuizStore::default();
        let recorder: Arc<dyn AttemptRecorder> =
            Arc::new(StorageSlot::with_store(Arc::new(store.clone())));
        let session = QuizSession::new("ABC234".parse().unwrap(), &snapshot, HOST.into());
        let (handle, _finished) =
            spawn_session(session, snapshot.clone(), recorder, settings);
        (handle, snapshot, store)
    }

    async fn next_matching<S>(stream: &mut S, kind: &str) -> BusEvent
    where
        S: futures::Stream<Item = BusEvent> + Unpin,
    {
        loop {
            let event = stream.next().await.expect("stream ended early");
            if event.kind() == kind {
                return event;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_question_game_scores_and_persists() {
        let (handle, snapshot, store) = launch(2);
        let q1 = snapshot.get(0).unwrap().clone();
        let q2 = snapshot.get(1).unwrap().clone();
        let mut events = Box::pin(handle.subscribe().await.unwrap().into_stream());

        handle.join("Ana".into(), None).await.unwrap();
        handle.join("Ben".into(), Some("user-ben".into())).await.unwrap();
        handle.start(HOST.into()).await.unwrap();

        handle
            .submit(q1.question_id, "Ana".into(), Some(q1.correct_option_id))
            .await
            .unwrap();

        // Ben never answers: the deadline closes the first question.
        match next_matching(&mut events, "question_resolved").await {
            BusEvent::QuestionResolved(resolved) => {
                assert_eq!(resolved.question_id, q1.question_id);
                assert_eq!(resolved.reason, ResolveReason::Deadline);
                assert_eq!(resolved.counts[&q1.correct_option_id], 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        next_matching(&mut events, "question_started").await;

        let wrong = q2.options[1].option_id;
        handle.submit(q2.question_id, "Ana".into(), Some(wrong)).await.unwrap();
        handle.submit(q2.question_id, "Ben".into(), Some(wrong)).await.unwrap();

        match next_matching(&mut events, "session_ended").await {
            BusEvent::SessionEnded(ended) => {
                assert_eq!(ended.reason, FinishReason::Completed);
                assert_eq!(ended.leaderboard[0].nickname, "Ana");
                assert_eq!(ended.leaderboard[0].score, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let mut attempts = store.attempts_for_session("ABC234");
        attempts.sort_by(|a, b| b.score.cmp(&a.score));
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].score, 1);
        assert_eq!(attempts[0].percentage, 50.0);
        assert_eq!(attempts[1].score, 0);
        assert_eq!(attempts[1].percentage, 0.0);

        let info = handle.status().await.unwrap();
        assert_eq!(info.status, SessionStatus::Finished);
        assert!(info.leaderboard.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn join_after_start_is_rejected() {
        let (handle, _, _) = launch(1);
        handle.join("Ana".into(), None).await.unwrap();
        handle.start(HOST.into()).await.unwrap();

        assert!(matches!(
            handle.join("Dana".into(), None).await,
            Err(ServiceError::SessionNotJoinable)
        ));
        assert_eq!(handle.status().await.unwrap().players, vec!["Ana".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_nickname_is_rejected() {
        let (handle, _, _) = launch(1);
        handle.join("Ana".into(), None).await.unwrap();

        assert!(matches!(
            handle.join("ana".into(), None).await,
            Err(ServiceError::NicknameTaken(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_duplicate_submissions_score_once() {
        let (handle, snapshot, _) = launch(1);
        let question = snapshot.get(0).unwrap().clone();
        handle.join("Ana".into(), None).await.unwrap();
        handle.join("Ben".into(), None).await.unwrap();
        handle.start(HOST.into()).await.unwrap();

        let wrong = question.options[2].option_id;
        let (first, second) = tokio::join!(
            handle.submit(question.question_id, "Ana".into(), Some(question.correct_option_id)),
            handle.submit(question.question_id, "Ana".into(), Some(wrong)),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|result| matches!(result, Err(ServiceError::AlreadyAnswered)))
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn answers_for_other_questions_or_options_are_rejected() {
        let (handle, snapshot, _) = launch(2);
        let q1 = snapshot.get(0).unwrap().clone();
        let q2 = snapshot.get(1).unwrap().clone();
        handle.join("Ana".into(), None).await.unwrap();

        assert!(matches!(
            handle.submit(q1.question_id, "Ana".into(), None).await,
            Err(ServiceError::QuestionClosed)
        ));

        handle.start(HOST.into()).await.unwrap();
        assert!(matches!(
            handle.submit(q2.question_id, "Ana".into(), None).await,
            Err(ServiceError::QuestionClosed)
        ));
        assert!(matches!(
            handle
                .submit(q1.question_id, "Ana".into(), Some(q2.correct_option_id))
                .await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            handle.submit(q1.question_id, "Zed".into(), None).await,
            Err(ServiceError::PlayerNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_host_controls_the_session() {
        let (handle, _, _) = launch(1);

        assert!(matches!(
            handle.start("intruder".into()).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            handle.end("intruder".into()).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert_eq!(handle.status().await.unwrap().status, SessionStatus::Waiting);
    }

    #[tokio::test(start_paused = true)]
    async fn host_end_notifies_subscribers_and_late_subscribers() {
        let (handle, _, store) = launch(3);
        let mut events = Box::pin(handle.subscribe().await.unwrap().into_stream());
        handle.join("Ana".into(), None).await.unwrap();
        handle.start(HOST.into()).await.unwrap();

        let info = handle.end(HOST.into()).await.unwrap();
        assert_eq!(info.status, SessionStatus::Finished);
        assert_eq!(info.finish_reason, Some(FinishReason::EndedByHost));

        match next_matching(&mut events, "session_ended").await {
            BusEvent::SessionEnded(ended) => assert_eq!(ended.reason, FinishReason::EndedByHost),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(events.next().await.is_none());
        assert_eq!(store.attempts().len(), 1);

        let late: Vec<BusEvent> = handle.subscribe().await.unwrap().into_stream().collect().await;
        assert_eq!(late.len(), 1);
        assert!(late[0].is_terminal());

        assert!(matches!(
            handle.end(HOST.into()).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn ending_from_lobby_records_nothing() {
        let (handle, _, store) = launch(1);
        handle.join("Ana".into(), None).await.unwrap();
        handle.end(HOST.into()).await.unwrap();

        assert!(store.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_lobby_advances_on_timer_only() {
        let (handle, snapshot, _) = launch(2);
        let mut events = Box::pin(handle.subscribe().await.unwrap().into_stream());
        handle.start(HOST.into()).await.unwrap();

        next_matching(&mut events, "question_started").await;
        let started = Instant::now();
        next_matching(&mut events, "question_resolved").await;
        let limit = u64::from(snapshot.get(0).unwrap().duration_seconds);
        assert!(started.elapsed() >= Duration::from_secs(limit));

        match next_matching(&mut events, "session_ended").await {
            BusEvent::SessionEnded(ended) => {
                assert_eq!(ended.reason, FinishReason::Completed);
                assert!(ended.leaderboard.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_joins_with_one_nickname_admit_one_player() {
        let (handle, _, _) = launch(1);

        let attempts = (0..16).map(|_| handle.join("Ana".into(), None));
        let results = join_all(attempts).await;

        let admitted = results.iter().filter(|result| result.is_ok()).count();
        let taken = results
            .iter()
            .filter(|result| matches!(result, Err(ServiceError::NicknameTaken(_))))
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(taken, 15);
        assert_eq!(handle.status().await.unwrap().players, vec!["Ana".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_lobby_expires_and_notifies_subscribers() {
        let settings = SessionSettings {
            lobby_idle: Duration::from_secs(600),
            ..SessionSettings::default()
        };
        let (handle, _, store) = launch_with(1, &settings);
        let mut events = Box::pin(handle.subscribe().await.unwrap().into_stream());
        handle.join("Ana".into(), None).await.unwrap();

        let opened = Instant::now();
        match next_matching(&mut events, "session_ended").await {
            BusEvent::SessionEnded(ended) => {
                assert_eq!(ended.reason, FinishReason::LobbyExpired);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(opened.elapsed() >= Duration::from_secs(600));

        let info = handle.status().await.unwrap();
        assert_eq!(info.status, SessionStatus::Finished);
        assert_eq!(info.finish_reason, Some(FinishReason::LobbyExpired));
        assert!(matches!(
            handle.join("Ben".into(), None).await,
            Err(ServiceError::SessionNotJoinable)
        ));
        assert!(store.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn started_session_ignores_lobby_limit() {
        let settings = SessionSettings {
            lobby_idle: Duration::from_secs(5),
            ..SessionSettings::default()
        };
        let (handle, snapshot, _) = launch_with(1, &settings);
        handle.join("Ana".into(), None).await.unwrap();
        handle.start(HOST.into()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        let info = handle.status().await.unwrap();
        assert_eq!(info.status, SessionStatus::Active);
        assert!(u64::from(snapshot.get(0).unwrap().duration_seconds) > 6);
    }

    #[tokio::test(start_paused = true)]
    async fn status_exposes_open_question_and_live_counts() {
        let (handle, snapshot, _) = launch(2);
        let q1 = snapshot.get(0).unwrap().clone();
        handle.join("Ana".into(), None).await.unwrap();
        handle.join("Ben".into(), None).await.unwrap();

        let lobby = handle.status().await.unwrap();
        assert_eq!(lobby.current_question_id, None);
        assert_eq!(lobby.answer_counts, None);

        handle.start(HOST.into()).await.unwrap();
        handle
            .submit(q1.question_id, "Ana".into(), Some(q1.correct_option_id))
            .await
            .unwrap();

        let live = handle.status().await.unwrap();
        assert_eq!(live.current_question_id, Some(q1.question_id));
        let counts = live.answer_counts.unwrap();
        assert_eq!(counts[&q1.correct_option_id], 1);
        assert_eq!(counts.len(), q1.options.len());

        let ended = handle.end(HOST.into()).await.unwrap();
        assert_eq!(ended.current_question_id, None);
        assert_eq!(ended.answer_counts, None);
    }
}

