//! In-memory SQLite database, capability fakes and seed data for job tests.

use super::context::{JobContext, JobSettings};
use super::queue::DatabaseEventBus;
use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use crate::gateway::{
    Billing, BillingSubscription, DeleteFilesResult, Mailer, MeetingReminderEmail, ObjectStorage,
};
use crate::Id;
use async_trait::async_trait;
use chrono::Utc;
use entity::meeting_status::MeetingStatus;
use entity::recording_status::RecordingStatus;
use entity::subscription_plan::SubscriptionPlan;
use entity::subscription_status::SubscriptionStatus;
use entity_api::{job_events, meetings, recordings, subscriptions, users};
use events::{
    Dispatcher, Event, EventSender, EventsErrorKind, InMemoryEventBus, InMemoryStepStore,
    RecordingPayload, RunReport,
};
use meeting_ai::traits::{analysis, transcription};
use meeting_ai::types::transcription::{Config, Segment, Status};
use meeting_ai::Transcription;
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::{Set, Unchanged},
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SCHEMA: &str = include_str!("test_schema.sql");

pub(crate) async fn connect() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    // A single connection: every pooled connection would get its own database.
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(opt).await.expect("open in-memory sqlite");
    for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        db.execute_unprepared(statement)
            .await
            .unwrap_or_else(|err| panic!("apply test schema `{statement}`: {err}"));
    }
    db
}

fn network_error() -> Error {
    Error {
        source: None,
        error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
    }
}

#[derive(Clone)]
enum TranscriptionBehavior {
    Succeed(Transcription),
    ProviderError(String),
    Hang,
}

const FAKE_JOB_ID: &str = "fake-transcript";

pub(crate) struct FakeTranscription {
    behavior: Mutex<TranscriptionBehavior>,
    requests: Mutex<Vec<(String, Option<String>)>>,
    processing_polls: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeTranscription {
    fn new() -> Self {
        let fake = Self {
            behavior: Mutex::new(TranscriptionBehavior::Hang),
            requests: Mutex::new(Vec::new()),
            processing_polls: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        };
        fake.succeed_with_text("Добрый день, начнём встречу");
        fake
    }

    fn transcription(status: Status, text: Option<&str>, segments: Vec<Segment>) -> Transcription {
        Transcription {
            id: FAKE_JOB_ID.to_string(),
            status,
            text: text.map(str::to_string),
            segments,
            language_code: None,
            duration_seconds: Some(60),
            error_message: None,
        }
    }

    pub fn succeed_with_text(&self, text: &str) {
        *self.behavior.lock().unwrap() = TranscriptionBehavior::Succeed(Self::transcription(
            Status::Completed,
            Some(text),
            Vec::new(),
        ));
    }

    pub fn succeed_with_segments(&self, segments: &[(&str, &str)]) {
        let segments: Vec<Segment> = segments
            .iter()
            .enumerate()
            .map(|(i, (speaker, text))| Segment {
                text: text.to_string(),
                speaker: speaker.to_string(),
                start_ms: i as i64 * 1000,
                end_ms: i as i64 * 1000 + 900,
            })
            .collect();
        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        *self.behavior.lock().unwrap() = TranscriptionBehavior::Succeed(Self::transcription(
            Status::Completed,
            Some(&text),
            segments,
        ));
    }

    /// The submitted job ends in the provider's failed state.
    pub fn fail_with_provider_error(&self, message: &str) {
        *self.behavior.lock().unwrap() = TranscriptionBehavior::ProviderError(message.to_string());
    }

    /// Every status check never returns.
    pub fn hang(&self) {
        *self.behavior.lock().unwrap() = TranscriptionBehavior::Hang;
    }

    /// The next `polls` status checks report the job as still processing.
    pub fn processing_for(&self, polls: usize) {
        self.processing_polls.store(polls, Ordering::SeqCst);
    }

    /// `(media url, language hint)` of every submitted job
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of submitted jobs
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl transcription::Provider for FakeTranscription {
    async fn submit(&self, config: Config) -> Result<String, meeting_ai::Error> {
        self.requests
            .lock()
            .unwrap()
            .push((config.media_url, config.language_code));
        Ok(FAKE_JOB_ID.to_string())
    }

    async fn fetch(&self, job_id: &str) -> Result<Transcription, meeting_ai::Error> {
        assert_eq!(job_id, FAKE_JOB_ID);
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap().clone();

        if let TranscriptionBehavior::Hang = behavior {
            return std::future::pending().await;
        }

        let still_processing = self
            .processing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if still_processing {
            return Ok(Self::transcription(Status::Processing, None, Vec::new()));
        }

        match behavior {
            TranscriptionBehavior::Succeed(transcription) => Ok(transcription),
            TranscriptionBehavior::ProviderError(message) => {
                let mut failed = Self::transcription(Status::Failed, None, Vec::new());
                failed.error_message = Some(message);
                Ok(failed)
            }
            TranscriptionBehavior::Hang => std::future::pending().await,
        }
    }

    fn provider_id(&self) -> &str {
        "fake"
    }
}

pub(crate) struct FakeAnalysis {
    response: Mutex<(String, Vec<String>, Vec<String>)>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeAnalysis {
    fn new() -> Self {
        let fake = Self {
            response: Mutex::new(Default::default()),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        };
        fake.respond_with("Итоги встречи", &["Релиз"], &["Подготовить демо"]);
        fake
    }

    pub fn respond_with(&self, summary: &str, key_points: &[&str], action_items: &[&str]) {
        let to_vec = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        *self.response.lock().unwrap() =
            (summary.to_string(), to_vec(key_points), to_vec(action_items));
    }

    pub fn fail_with_network_error(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Calls across all three analysis operations
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn call(&self) -> Result<(String, Vec<String>, Vec<String>), meeting_ai::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(meeting_ai::Error::Network("connection reset".to_string()));
        }
        Ok(self.response.lock().unwrap().clone())
    }
}

#[async_trait]
impl analysis::Provider for FakeAnalysis {
    async fn summarize(&self, _transcript: &str) -> Result<String, meeting_ai::Error> {
        Ok(self.call()?.0)
    }

    async fn extract_key_points(&self, _transcript: &str) -> Result<Vec<String>, meeting_ai::Error> {
        Ok(self.call()?.1)
    }

    async fn extract_action_items(
        &self,
        _transcript: &str,
    ) -> Result<Vec<String>, meeting_ai::Error> {
        Ok(self.call()?.2)
    }

    fn provider_id(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
pub(crate) struct FakeStorage {
    batches: Mutex<Vec<Vec<String>>>,
    report_failure: AtomicBool,
    fail_next: AtomicBool,
}

impl FakeStorage {
    /// Every later batch is answered with `success: false`.
    pub fn report_failure(&self) {
        self.report_failure.store(true, Ordering::SeqCst);
    }

    /// The next batch fails with a network error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn delete_files(&self, file_urls: &[String]) -> Result<DeleteFilesResult, Error> {
        self.batches.lock().unwrap().push(file_urls.to_vec());

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(network_error());
        }
        if self.report_failure.load(Ordering::SeqCst) {
            return Ok(DeleteFilesResult {
                success: false,
                deleted_count: 0,
            });
        }
        Ok(DeleteFilesResult {
            success: true,
            deleted_count: file_urls.len(),
        })
    }
}

pub(crate) struct FakeBilling {
    response: Mutex<BillingSubscription>,
    failing: AtomicBool,
}

impl FakeBilling {
    fn new() -> Self {
        Self {
            response: Mutex::new(BillingSubscription {
                status: "active".to_string(),
                current_period_start: None,
                current_period_end: None,
            }),
            failing: AtomicBool::new(false),
        }
    }

    pub fn respond_with(&self, status: &str, start: Option<i64>, end: Option<i64>) {
        *self.response.lock().unwrap() = BillingSubscription {
            status: status.to_string(),
            current_period_start: start,
            current_period_end: end,
        };
    }

    pub fn fail_with_network_error(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Billing for FakeBilling {
    async fn get_subscription(&self, _subscription_id: &str) -> Result<BillingSubscription, Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(network_error());
        }
        Ok(self.response.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeMailer {
    sent: Mutex<Vec<MeetingReminderEmail>>,
    fail_next: AtomicBool,
}

impl FakeMailer {
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<MeetingReminderEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send_meeting_reminder(&self, email: MeetingReminderEmail) -> Result<(), Error> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(network_error());
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// A sender whose first send never completes, standing in for a worker that
/// crashed mid-step. Later sends are recorded.
pub(crate) struct HangingOnceSender {
    hung: AtomicBool,
    delivered: tokio::sync::Mutex<Vec<Event>>,
}

impl HangingOnceSender {
    pub fn new() -> Self {
        Self {
            hung: AtomicBool::new(false),
            delivered: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub async fn delivered(&self, name: &str) -> usize {
        self.delivered
            .lock()
            .await
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }
}

#[async_trait]
impl EventSender for HangingOnceSender {
    async fn send(&self, event: Event) -> Result<Id, events::Error> {
        if !self.hung.swap(true, Ordering::SeqCst) {
            return std::future::pending().await;
        }
        self.delivered.lock().await.push(event);
        Ok(Id::new_v4())
    }
}

struct FailingSender;

#[async_trait]
impl EventSender for FailingSender {
    async fn send(&self, _event: Event) -> Result<Id, events::Error> {
        Err(events::Error {
            source: None,
            error_kind: EventsErrorKind::Store,
        })
    }
}

/// Default settings with transcription jobs polled without delay.
pub(crate) fn test_settings() -> JobSettings {
    JobSettings {
        transcription_poll_interval: Duration::from_millis(1),
        ..JobSettings::default()
    }
}

fn in_memory_sender(
    _db: &Arc<DatabaseConnection>,
    bus: &Arc<InMemoryEventBus>,
) -> Arc<dyn EventSender> {
    bus.clone()
}

/// Ids of a seeded user, their meeting and its recording.
#[derive(Debug, Clone)]
pub(crate) struct RecordingFixture {
    pub user_id: Id,
    pub meeting_id: Id,
    pub recording_id: Id,
    pub file_url: String,
}

impl RecordingFixture {
    pub fn payload(&self) -> RecordingPayload {
        RecordingPayload {
            recording_id: self.recording_id,
            meeting_id: self.meeting_id,
            file_url: self.file_url.clone(),
        }
    }
}

/// Every step-function wired to fakes over a fresh database.
pub(crate) struct Harness {
    pub db: Arc<DatabaseConnection>,
    pub bus: Arc<InMemoryEventBus>,
    pub store: Arc<InMemoryStepStore>,
    pub transcription: Arc<FakeTranscription>,
    pub analysis: Arc<FakeAnalysis>,
    pub storage: Arc<FakeStorage>,
    pub billing: Arc<FakeBilling>,
    pub mailer: Arc<FakeMailer>,
    pub ctx: Arc<JobContext>,
    dispatcher: Dispatcher,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(test_settings()).await
    }

    pub async fn with_settings(settings: JobSettings) -> Self {
        Self::build(settings, in_memory_sender).await
    }

    /// Events are sent through `sender` instead of the in-memory bus.
    pub async fn with_sender(sender: Arc<dyn EventSender>) -> Self {
        Self::build(test_settings(), move |_, _| sender).await
    }

    pub async fn with_failing_sender() -> Self {
        Self::with_sender(Arc::new(FailingSender)).await
    }

    /// Events are sent as `job_events` rows, for runs driven by a worker.
    pub async fn with_database_bus() -> Self {
        Self::build(test_settings(), |db, _| -> Arc<dyn EventSender> {
            Arc::new(DatabaseEventBus::new(Arc::clone(db)))
        })
        .await
    }

    pub async fn with_external_timeout(timeout: Duration) -> Self {
        Self::with_settings(JobSettings {
            external_call_timeout: timeout,
            ..test_settings()
        })
        .await
    }

    async fn build<F>(settings: JobSettings, sender: F) -> Self
    where
        F: FnOnce(&Arc<DatabaseConnection>, &Arc<InMemoryEventBus>) -> Arc<dyn EventSender>,
    {
        let db = Arc::new(connect().await);
        let bus = Arc::new(InMemoryEventBus::new());
        let transcription = Arc::new(FakeTranscription::new());
        let analysis = Arc::new(FakeAnalysis::new());
        let storage = Arc::new(FakeStorage::default());
        let billing = Arc::new(FakeBilling::new());
        let mailer = Arc::new(FakeMailer::default());

        let ctx = Arc::new(JobContext {
            db: Arc::clone(&db),
            transcription: transcription.clone(),
            analysis: analysis.clone(),
            storage: storage.clone(),
            billing: billing.clone(),
            mailer: mailer.clone(),
            events: sender(&db, &bus),
            settings,
        });

        Self {
            dispatcher: super::dispatcher(Arc::clone(&ctx)),
            db,
            bus,
            store: Arc::new(InMemoryStepStore::new()),
            transcription,
            analysis,
            storage,
            billing,
            mailer,
            ctx,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Dispatches `event` as a new run and returns its function's output.
    pub async fn run(&self, event: Event) -> Result<Value, events::Error> {
        self.run_with_id(Id::new_v4(), event).await
    }

    /// Dispatches `event` under `run_id`; reusing a run id resumes that run
    /// from its checkpoints.
    pub async fn run_with_id(&self, run_id: Id, event: Event) -> Result<Value, events::Error> {
        let output = self
            .dispatcher
            .dispatch(run_id, &event, self.store.clone())
            .await?;

        Ok(match output {
            Value::Object(outputs) => outputs
                .into_iter()
                .next()
                .map(|(_, output)| output)
                .unwrap_or(Value::Null),
            other => other,
        })
    }

    /// Delivers everything queued on the in-memory bus, including the events
    /// the runs themselves send.
    pub async fn drain(&self) -> Vec<RunReport> {
        self.bus
            .run_until_idle(&self.dispatcher, self.store.clone())
            .await
    }

    pub async fn seed_user(&self, email: Option<&str>, name: Option<&str>) -> Id {
        let user = users::ActiveModel {
            id: Set(Id::new_v4()),
            email: Set(email.map(str::to_string)),
            name: Set(name.map(str::to_string)),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.db())
        .await
        .unwrap();
        user.id
    }

    /// A user named Anna with an email, her "Weekly sync" meeting and a fresh
    /// recording of it.
    pub async fn seed_recording(&self) -> RecordingFixture {
        let user_id = self
            .seed_user(Some("anna@example.com"), Some("Anna"))
            .await;
        let now = Utc::now();

        let meeting = meetings::ActiveModel {
            id: Set(Id::new_v4()),
            user_id: Set(user_id),
            title: Set("Weekly sync".to_string()),
            status: Set(MeetingStatus::Completed),
            scheduled_at: Set(Some(now.into())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(self.db())
        .await
        .unwrap();

        let file_url = format!("https://utfs.io/f/{}.webm", Id::new_v4());
        let recording = entity_api::recording::create(self.db(), meeting.id, Some(file_url.clone()))
            .await
            .unwrap();

        RecordingFixture {
            user_id,
            meeting_id: meeting.id,
            recording_id: recording.id,
            file_url,
        }
    }

    /// A ready recording created `days_old` days ago.
    pub async fn seed_recording_aged(
        &self,
        meeting_id: Id,
        file_url: Option<&str>,
        days_old: i64,
    ) -> Id {
        let created_at = Utc::now() - chrono::Duration::days(days_old);
        let recording = recordings::ActiveModel {
            id: Set(Id::new_v4()),
            meeting_id: Set(meeting_id),
            file_url: Set(file_url.map(str::to_string)),
            file_size: Set(None),
            duration_seconds: Set(None),
            format: Set(None),
            status: Set(RecordingStatus::Ready),
            created_at: Set(created_at.into()),
            updated_at: Set(created_at.into()),
        }
        .insert(self.db())
        .await
        .unwrap();
        recording.id
    }

    pub async fn seed_subscription(&self, user_id: Id, external_id: &str, plan: SubscriptionPlan) {
        let now = Utc::now();
        subscriptions::ActiveModel {
            id: Set(Id::new_v4()),
            user_id: Set(user_id),
            external_subscription_id: Set(Some(external_id.to_string())),
            plan: Set(plan),
            status: Set(SubscriptionStatus::Active),
            current_period_start: Set(None),
            current_period_end: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(self.db())
        .await
        .unwrap();
    }

    /// Moves a queued run's `run_after` into the past so a worker picks it up
    /// without waiting out its backoff.
    pub async fn make_due(&self, run_id: Id) {
        job_events::ActiveModel {
            id: Unchanged(run_id),
            run_after: Set((Utc::now() - chrono::Duration::hours(2)).into()),
            ..Default::default()
        }
        .update(self.db())
        .await
        .unwrap();
    }
}
