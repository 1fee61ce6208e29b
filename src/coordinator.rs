use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ApiError, CompletionReport, ReportedWrongAnswer};
use crate::db::Storage;
use crate::domain::{extract_domain, is_tracked};
use crate::messages::{ContentRequest, ContentResponse, FeedbackType, TabMessage};
use crate::models::{DomainTimeRecord, Question, TimeTrackingMap};
use crate::quiz::{fallback_questions, AnswerOutcome, QuizSession, SessionManager, REQUIRED_CORRECT};
use crate::tabs::{broadcast_to_domain, send_message_safe, TabHost, TabId, TabInfo};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
const QUESTION_FETCH_COUNT: usize = 5;

/// Which tab/domain currently receives accrued time, plus the previous
/// accrual timestamp.
#[derive(Debug)]
struct FocusState {
    current_tab: Option<TabId>,
    current_domain: Option<String>,
    last_tick: DateTime<Utc>,
}

struct Heartbeat {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

#[derive(Debug, Clone)]
struct Feedback {
    text: String,
    kind: FeedbackType,
}

impl Feedback {
    fn correct(remaining: u32) -> Self {
        Self {
            text: format!("Correct - {remaining} more to go"),
            kind: FeedbackType::Correct,
        }
    }

    fn repeat_wrong() -> Self {
        Self {
            text: "Pick a different answer for this question.".to_string(),
            kind: FeedbackType::Wrong,
        }
    }

    fn wrong(explanation: Option<&str>) -> Self {
        let text = match explanation.map(str::trim).filter(|e| !e.is_empty()) {
            Some(explanation) => format!("Wrong answer.\n\nWhy this is correct:\n{explanation}"),
            None => "Wrong answer.".to_string(),
        };
        Self {
            text,
            kind: FeedbackType::Wrong,
        }
    }
}

/// The background coordinator: accrues dwell time against the focused
/// tracked domain, flips domains into the blocked state at the limit, runs
/// the per-domain quiz sessions and keeps every open tab in sync.
///
/// All collaborators are injected; host events (tab activation, navigation,
/// focus changes, the heartbeat alarm) re-enter through the `handle_*`
/// methods.
#[derive(Clone)]
pub struct Coordinator {
    storage: Storage,
    api: ApiClient,
    tabs: Arc<dyn TabHost>,
    sessions: Arc<Mutex<SessionManager>>,
    focus: Arc<Mutex<FocusState>>,
    heartbeat: Arc<Mutex<Option<Heartbeat>>>,
}

impl Coordinator {
    pub fn new(storage: Storage, api: ApiClient, tabs: Arc<dyn TabHost>) -> Self {
        Self {
            storage,
            api,
            tabs,
            sessions: Arc::new(Mutex::new(SessionManager::new(REQUIRED_CORRECT))),
            focus: Arc::new(Mutex::new(FocusState {
                current_tab: None,
                current_domain: None,
                last_tick: Utc::now(),
            })),
            heartbeat: Arc::new(Mutex::new(None)),
        }
    }

    // ---- Host events ----

    pub async fn handle_tab_activated(&self) -> Result<()> {
        self.tick().await?;
        self.refresh_active_tab().await;

        let (tab, domain) = self.focus_snapshot().await;
        if let (Some(tab), Some(domain)) = (tab, domain) {
            self.sync_blocked_tab(tab, &domain).await?;
        }
        Ok(())
    }

    /// Tab navigation or load completion. `url` is the tab's best-known URL
    /// at the time of the event.
    pub async fn handle_tab_updated(
        &self,
        tab_id: TabId,
        url: Option<&str>,
        load_complete: bool,
    ) -> Result<()> {
        if url.is_none() && !load_complete {
            return Ok(());
        }

        self.tick().await?;
        self.refresh_active_tab().await;

        if let Some(domain) = url.and_then(extract_domain) {
            self.sync_blocked_tab(tab_id, &domain).await?;
        }
        Ok(())
    }

    /// Window focus change. Losing focus flushes one tick, then clears the
    /// current domain so no time accrues to a backgrounded tab.
    pub async fn handle_window_focus_changed(&self, focused: bool) -> Result<()> {
        if !focused {
            self.tick().await?;
            let mut focus = self.focus.lock().await;
            focus.current_tab = None;
            focus.current_domain = None;
            return Ok(());
        }

        self.refresh_active_tab().await;
        let (tab, domain) = self.focus_snapshot().await;
        if let (Some(tab), Some(domain)) = (tab, domain) {
            self.sync_blocked_tab(tab, &domain).await?;
        }
        Ok(())
    }

    /// Request from a content script, with the sender tab if the host
    /// supplied one. Failures never surface into the overlay; they come
    /// back as `success: false`.
    pub async fn handle_request(
        &self,
        sender: Option<&TabInfo>,
        request: ContentRequest,
    ) -> ContentResponse {
        match request {
            ContentRequest::QuizAnswer { selected_index } => {
                ack(self.handle_quiz_answer(sender, selected_index).await, "quiz answer")
            }
            ContentRequest::QuizNext => {
                ack(self.handle_next_question(sender).await, "next question")
            }
            ContentRequest::QuizReveal => ack(self.handle_reveal(sender).await, "reveal"),
            ContentRequest::GetStatus => match self.status().await {
                Ok(response) => response,
                Err(err) => {
                    error!("Failed to read status: {err:#}");
                    ContentResponse::Ack { success: false }
                }
            },
        }
    }

    // ---- Time accumulation ----

    pub async fn tick(&self) -> Result<()> {
        self.tick_at(Utc::now()).await
    }

    /// One accrual step. `last_tick` advances unconditionally so idle
    /// periods never bleed into the next tracked one.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<()> {
        let (domain, elapsed) = {
            let mut focus = self.focus.lock().await;
            let elapsed =
                (now - focus.last_tick).num_milliseconds().max(0) as f64 / 1000.0;
            focus.last_tick = now;
            (focus.current_domain.clone(), elapsed)
        };

        let Some(domain) = domain else {
            return Ok(());
        };

        let settings = self.storage.get_settings().await?;
        if !is_tracked(&domain, &settings) {
            return Ok(());
        }

        let mut data = self.storage.get_time_tracking().await?;
        let record = data
            .entry(domain.clone())
            .or_insert_with(|| DomainTimeRecord::new(now));

        // No accrual while blocked; the debt never grows past the threshold.
        if record.blocked {
            return Ok(());
        }

        record.total_seconds += elapsed;
        record.last_active = now;
        let crossed = record.total_seconds >= settings.limit_seconds();
        self.storage.save_time_tracking(&data).await?;

        if crossed {
            self.trigger_block(&domain, data).await?;
        }
        Ok(())
    }

    /// Threshold crossing: flip the domain into the blocked state, stand up
    /// its quiz session and push the initial snapshot to every tab on it.
    async fn trigger_block(&self, domain: &str, mut data: TimeTrackingMap) -> Result<()> {
        if let Some(record) = data.get_mut(domain) {
            record.blocked = true;
        }
        self.storage.save_time_tracking(&data).await?;
        info!("Time limit reached for {domain}; blocking");

        self.ensure_quiz_session(domain).await?;
        self.broadcast_quiz_state(domain, None).await;
        Ok(())
    }

    // ---- Quiz sessions ----

    /// Make sure a session exists for `domain`, fetching questions from the
    /// backend or degrading to the built-in fallback set. The resulting
    /// session always has at least one question.
    async fn ensure_quiz_session(&self, domain: &str) -> Result<()> {
        if self.sessions.lock().await.contains(domain) {
            return Ok(());
        }

        let questions = self.load_questions().await;

        // The fetch suspended; a racing handler may have built the session
        // in the meantime. `ensure` keeps the first one.
        let mut sessions = self.sessions.lock().await;
        sessions.ensure(domain, questions);
        Ok(())
    }

    async fn load_questions(&self) -> Vec<Question> {
        match self.fetch_room_questions().await {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => {
                warn!("Backend returned an empty question set; using fallback questions");
                fallback_questions()
            }
            Err(err) => {
                warn!("Question fetch failed ({err:#}); using fallback questions");
                fallback_questions()
            }
        }
    }

    /// Without an active room and a stored token this short-circuits before
    /// any network call.
    async fn fetch_room_questions(&self) -> Result<Vec<Question>> {
        let settings = self.storage.get_settings().await?;
        let user = self.storage.get_user().await?;

        let (room_id, token) = match (settings.active_room_id, user) {
            (Some(room_id), Some(user)) => (room_id, user.token),
            _ => return Err(ApiError::MissingCredentials.into()),
        };

        Ok(self
            .api
            .fetch_questions(&room_id, &token, QUESTION_FETCH_COUNT)
            .await?)
    }

    async fn handle_quiz_answer(
        &self,
        sender: Option<&TabInfo>,
        selected_index: usize,
    ) -> Result<()> {
        let Some(domain) = sender_domain(sender) else {
            return Ok(());
        };

        // Stale answers for an already-unblocked domain are silent no-ops.
        if !self.is_blocked(&domain).await? {
            return Ok(());
        }

        self.ensure_quiz_session(&domain).await?;

        let (outcome, completed) = {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(&domain) else {
                return Ok(());
            };
            let outcome = session.submit_answer(selected_index);
            let completed = match outcome {
                AnswerOutcome::Completed => sessions.complete(&domain),
                _ => None,
            };
            (outcome, completed)
        };

        match outcome {
            AnswerOutcome::Completed => {
                if let Some(session) = completed {
                    self.finish_completion(&domain, session).await?;
                }
            }
            AnswerOutcome::Correct { remaining } => {
                self.broadcast_quiz_state(&domain, Some(Feedback::correct(remaining)))
                    .await;
            }
            AnswerOutcome::Wrong { ref explanation } => {
                self.broadcast_quiz_state(&domain, Some(Feedback::wrong(explanation.as_deref())))
                    .await;
            }
            AnswerOutcome::RepeatWrong => {
                self.broadcast_quiz_state(&domain, Some(Feedback::repeat_wrong()))
                    .await;
            }
            AnswerOutcome::AlreadyComplete => {}
        }
        Ok(())
    }

    async fn handle_next_question(&self, sender: Option<&TabInfo>) -> Result<()> {
        let Some(domain) = sender_domain(sender) else {
            return Ok(());
        };
        if !self.is_blocked(&domain).await? {
            return Ok(());
        }

        let advanced = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .get_mut(&domain)
                .map(|session| session.advance())
                .unwrap_or(false)
        };

        if advanced {
            self.broadcast_quiz_state(&domain, None).await;
        }
        Ok(())
    }

    async fn handle_reveal(&self, sender: Option<&TabInfo>) -> Result<()> {
        let Some(domain) = sender_domain(sender) else {
            return Ok(());
        };
        if !self.is_blocked(&domain).await? {
            return Ok(());
        }

        let revealed = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .get_mut(&domain)
                .map(|session| session.reveal())
                .unwrap_or(false)
        };

        if revealed {
            self.broadcast_quiz_state(&domain, None).await;
        }
        Ok(())
    }

    // ---- Completion ----

    async fn finish_completion(&self, domain: &str, session: QuizSession) -> Result<()> {
        let usage_seconds = self.consume_usage_and_unblock(domain).await?;
        info!("Quiz completed for {domain}; consumed {usage_seconds}s of usage");

        self.report_completion(domain, &session, usage_seconds).await;
        self.broadcast_unblock(domain).await;
        Ok(())
    }

    /// Capture the accumulated time, then zero it and clear the block flag
    /// in one whole-map write.
    async fn consume_usage_and_unblock(&self, domain: &str) -> Result<u64> {
        let mut data = self.storage.get_time_tracking().await?;
        let mut usage_seconds = 0;

        if let Some(record) = data.get_mut(domain) {
            usage_seconds = record.total_seconds.max(0.0).floor() as u64;
            record.total_seconds = 0.0;
            record.blocked = false;
            self.storage.save_time_tracking(&data).await?;
        }

        Ok(usage_seconds)
    }

    /// Fire-and-forget result report. Unblocking never waits on, or fails
    /// with, this call.
    async fn report_completion(&self, domain: &str, session: &QuizSession, usage_seconds: u64) {
        let (settings, user) = match (
            self.storage.get_settings().await,
            self.storage.get_user().await,
        ) {
            (Ok(settings), Ok(user)) => (settings, user),
            (Err(err), _) | (_, Err(err)) => {
                warn!("Skipping completion report for {domain}: {err:#}");
                return;
            }
        };

        let (Some(room_id), Some(user)) = (settings.active_room_id, user) else {
            return;
        };

        let report = CompletionReport {
            room_id: room_id.clone(),
            score: session.required_correct(),
            total_questions: session.required_correct(),
            usage_seconds,
            wrong_answers: session
                .wrong_answers()
                .iter()
                .cloned()
                .map(|answer| ReportedWrongAnswer {
                    answer,
                    room_id: room_id.clone(),
                })
                .collect(),
        };

        let api = self.api.clone();
        let domain = domain.to_string();
        tokio::spawn(async move {
            if let Err(err) = api.submit_completion(&user.token, &report).await {
                warn!("Completion report for {domain} failed: {err}");
            }
        });
    }

    // ---- Broadcast / sync ----

    async fn broadcast_quiz_state(&self, domain: &str, feedback: Option<Feedback>) {
        let message = {
            let sessions = self.sessions.lock().await;
            match sessions.get(domain) {
                Some(session) => build_block_message(session, feedback),
                None => return,
            }
        };
        broadcast_to_domain(self.tabs.as_ref(), domain, &message).await;
    }

    async fn broadcast_unblock(&self, domain: &str) {
        broadcast_to_domain(self.tabs.as_ref(), domain, &TabMessage::Unblock).await;
    }

    /// Re-send the current snapshot to a single tab that just became active
    /// or finished navigating on a blocked domain. This is what makes the
    /// in-memory session survive tab reloads and new tabs.
    async fn sync_blocked_tab(&self, tab: TabId, domain: &str) -> Result<()> {
        if !self.is_blocked(domain).await? {
            return Ok(());
        }

        self.ensure_quiz_session(domain).await?;

        let message = {
            let sessions = self.sessions.lock().await;
            match sessions.get(domain) {
                Some(session) => build_block_message(session, None),
                None => return Ok(()),
            }
        };
        send_message_safe(self.tabs.as_ref(), tab, &message).await;
        Ok(())
    }

    // ---- Status / reset ----

    async fn status(&self) -> Result<ContentResponse> {
        let data = self.storage.get_time_tracking().await?;
        let settings = self.storage.get_settings().await?;
        let domain = self
            .focus
            .lock()
            .await
            .current_domain
            .clone()
            .unwrap_or_default();

        let record = data.get(&domain);
        Ok(ContentResponse::Status {
            is_blocked: record.map(|r| r.blocked).unwrap_or(false),
            time_spent: record.map(|r| r.total_seconds).unwrap_or(0.0),
            time_limit: settings.limit_seconds(),
        })
    }

    /// Explicit user reset: drop the accumulated time and the quiz session
    /// for `domain` and release any blocked tabs.
    pub async fn reset_domain(&self, domain: &str) -> Result<()> {
        self.storage.reset_domain(domain).await?;
        self.sessions.lock().await.discard(domain);
        self.broadcast_unblock(domain).await;
        Ok(())
    }

    // ---- Heartbeat ----

    pub async fn start_heartbeat(&self) {
        let mut guard = self.heartbeat.lock().await;
        if guard.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let coordinator = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(HEARTBEAT_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = coordinator.tick().await {
                            error!("Time tracking tick failed: {err:#}");
                        }
                    }
                    _ = token.cancelled() => {
                        info!("Heartbeat shutting down");
                        break;
                    }
                }
            }
        });

        *guard = Some(Heartbeat { handle, cancel });
    }

    pub async fn stop_heartbeat(&self) {
        if let Some(heartbeat) = self.heartbeat.lock().await.take() {
            heartbeat.cancel.cancel();
            let _ = heartbeat.handle.await;
        }
    }

    // ---- Internals ----

    async fn refresh_active_tab(&self) {
        let active = self.tabs.active_tab().await;
        let mut focus = self.focus.lock().await;
        match active {
            Some(tab) => {
                focus.current_domain = extract_domain(&tab.url);
                focus.current_tab = Some(tab.id);
            }
            None => {
                focus.current_tab = None;
                focus.current_domain = None;
            }
        }
    }

    async fn focus_snapshot(&self) -> (Option<TabId>, Option<String>) {
        let focus = self.focus.lock().await;
        (focus.current_tab, focus.current_domain.clone())
    }

    async fn is_blocked(&self, domain: &str) -> Result<bool> {
        let data = self.storage.get_time_tracking().await?;
        Ok(data.get(domain).map(|record| record.blocked).unwrap_or(false))
    }
}

fn sender_domain(sender: Option<&TabInfo>) -> Option<String> {
    sender.and_then(|tab| extract_domain(&tab.url))
}

fn ack(result: Result<()>, action: &str) -> ContentResponse {
    match result {
        Ok(()) => ContentResponse::Ack { success: true },
        Err(err) => {
            error!("Failed handling {action}: {err:#}");
            ContentResponse::Ack { success: false }
        }
    }
}

fn build_block_message(session: &QuizSession, feedback: Option<Feedback>) -> TabMessage {
    let (feedback_text, feedback_type) = match feedback {
        Some(feedback) => (Some(feedback.text), Some(feedback.kind)),
        None => (None, None),
    };

    TabMessage::BlockPage {
        questions: session.questions().to_vec(),
        current_question_index: session.current_question_index(),
        consecutive_correct: session.consecutive_correct(),
        required_correct: session.required_correct(),
        last_wrong_selected_index: session.last_wrong_selected_index(),
        phase: session.phase(),
        feedback_text,
        feedback_type,
    }
}
