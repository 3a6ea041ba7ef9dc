#![allow(dead_code)]

//! In-memory store and scripted provider fakes shared by the engine
//! integration tests. No database or network required.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use replyflow_core::events::EventType;
use replyflow_core::types::{DbId, Timestamp};
use replyflow_core::workflow::WorkflowStatus;
use replyflow_db::models::event::{Event, NewEvent};
use replyflow_db::models::workflow::{StatisticsDelta, Workflow};
use replyflow_engine::{
    Credential, DispatchService, DuplicateGuard, EngineConfig, EngineError, EngineStore,
    MonitorScheduler, RateLimiter,
};
use replyflow_events::EventBus;
use replyflow_instagram::{Comment, CommentPage, ProviderApi, ProviderError, SentMessage};

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

/// [`EngineStore`] fake holding everything in mutex-guarded maps.
#[derive(Default)]
pub struct InMemoryStore {
    pub workflows: Mutex<HashMap<DbId, Workflow>>,
    pub events: Mutex<Vec<NewEvent>>,
    pub credentials: Mutex<HashMap<DbId, Credential>>,
    /// When set, `find_dm_event` fails -- exercises the guard's fail-open path.
    pub fail_dm_lookup: AtomicBool,
}

impl InMemoryStore {
    pub async fn insert_workflow(&self, workflow: Workflow) {
        self.workflows.lock().await.insert(workflow.id, workflow);
    }

    pub async fn insert_credential(&self, credential: Credential) {
        self.credentials
            .lock()
            .await
            .insert(credential.account_id, credential);
    }

    pub async fn workflow(&self, id: DbId) -> Workflow {
        self.workflows.lock().await.get(&id).cloned().expect("workflow")
    }

    pub async fn events_of_type(&self, event_type: EventType) -> Vec<NewEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

fn event_row(id: DbId, input: &NewEvent) -> Event {
    Event {
        id,
        workflow_id: input.workflow_id,
        event_type: input.event_type,
        comment_id: input.comment_id.clone(),
        commenter_username: input.commenter_username.clone(),
        commenter_user_id: input.commenter_user_id.clone(),
        comment_text: input.comment_text.clone(),
        matched_keyword: input.matched_keyword.clone(),
        dm_status: input.dm_status.map(|s| s.as_str().to_string()),
        dm_id: input.dm_id.clone(),
        error_message: input.error_message.clone(),
        metadata: input.metadata.clone(),
        created_at: Utc::now(),
    }
}

#[async_trait]
impl EngineStore for InMemoryStore {
    async fn find_workflow(&self, id: DbId) -> Result<Option<Workflow>, EngineError> {
        Ok(self.workflows.lock().await.get(&id).cloned())
    }

    async fn find_active_workflows(&self) -> Result<Vec<Workflow>, EngineError> {
        let mut active: Vec<Workflow> = self
            .workflows
            .lock()
            .await
            .values()
            .filter(|w| w.status == WorkflowStatus::Active)
            .cloned()
            .collect();
        active.sort_by_key(|w| w.id);
        Ok(active)
    }

    async fn update_workflow_status(
        &self,
        id: DbId,
        status: WorkflowStatus,
    ) -> Result<(), EngineError> {
        let mut workflows = self.workflows.lock().await;
        let workflow = workflows
            .get_mut(&id)
            .ok_or(EngineError::WorkflowNotFound(id))?;
        workflow.status = status;
        Ok(())
    }

    async fn increment_statistics(
        &self,
        id: DbId,
        delta: &StatisticsDelta,
    ) -> Result<(), EngineError> {
        let mut workflows = self.workflows.lock().await;
        let workflow = workflows
            .get_mut(&id)
            .ok_or(EngineError::WorkflowNotFound(id))?;
        workflow.total_triggers += delta.total_triggers;
        workflow.dms_sent += delta.dms_sent;
        workflow.dms_delivered += delta.dms_delivered;
        if delta.total_triggers > 0 {
            workflow.last_triggered_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn append_event(&self, event: &NewEvent) -> Result<(), EngineError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    async fn find_dm_event(
        &self,
        workflow_id: DbId,
        recipient_id: &str,
        types: &[EventType],
    ) -> Result<Option<Event>, EngineError> {
        if self.fail_dm_lookup.load(Ordering::SeqCst) {
            return Err(EngineError::Store("connection refused".into()));
        }
        let events = self.events.lock().await;
        let found = events
            .iter()
            .enumerate()
            .rev()
            .find(|(_, e)| {
                e.workflow_id == workflow_id
                    && e.commenter_user_id.as_deref() == Some(recipient_id)
                    && types.contains(&e.event_type)
            })
            .map(|(i, e)| event_row(i as DbId + 1, e));
        Ok(found)
    }

    async fn account_credential(
        &self,
        account_id: DbId,
    ) -> Result<Option<Credential>, EngineError> {
        Ok(self.credentials.lock().await.get(&account_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// ScriptedProvider
// ---------------------------------------------------------------------------

/// [`ProviderApi`] fake driven by queues of scripted responses.
///
/// `fetch_comments` pops from `fetch_results` (empty page once drained);
/// `send_direct_message` pops from `send_results` (success with a generated
/// id once drained). Call counters and captured arguments back assertions.
pub struct ScriptedProvider {
    pub fetch_results: Mutex<VecDeque<Result<CommentPage, ProviderError>>>,
    pub fetch_calls: AtomicUsize,
    pub last_since: Mutex<Option<Timestamp>>,
    pub reachable: AtomicBool,
    pub send_results: Mutex<VecDeque<Result<SentMessage, ProviderError>>>,
    pub send_calls: AtomicUsize,
    /// (recipient_id, text) per send attempt.
    pub sent: Mutex<Vec<(String, String)>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            fetch_results: Mutex::new(VecDeque::new()),
            fetch_calls: AtomicUsize::new(0),
            last_since: Mutex::new(None),
            reachable: AtomicBool::new(true),
            send_results: Mutex::new(VecDeque::new()),
            send_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedProvider {
    pub async fn queue_fetch(&self, result: Result<CommentPage, ProviderError>) {
        self.fetch_results.lock().await.push_back(result);
    }

    pub async fn queue_send(&self, result: Result<SentMessage, ProviderError>) {
        self.send_results.lock().await.push_back(result);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn send_count(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderApi for ScriptedProvider {
    async fn fetch_comments(
        &self,
        _post_id: &str,
        _access_token: &str,
        since: Option<Timestamp>,
        _limit: u32,
    ) -> Result<CommentPage, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_since.lock().await = since;
        match self.fetch_results.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(CommentPage::default()),
        }
    }

    async fn can_receive_message(
        &self,
        _recipient_id: &str,
        _access_token: &str,
    ) -> Result<bool, ProviderError> {
        Ok(self.reachable.load(Ordering::SeqCst))
    }

    async fn send_direct_message(
        &self,
        _account_id: &str,
        recipient_id: &str,
        text: &str,
        _access_token: &str,
    ) -> Result<SentMessage, ProviderError> {
        let n = self.send_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent
            .lock()
            .await
            .push((recipient_id.to_string(), text.to_string()));
        match self.send_results.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(SentMessage {
                message_id: format!("dm_{n}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const ACCOUNT_ID: DbId = 10;
pub const USER_ID: DbId = 7;

pub fn test_workflow(id: DbId) -> Workflow {
    let now = Utc::now();
    Workflow {
        id,
        user_id: USER_ID,
        account_id: ACCOUNT_ID,
        name: format!("Workflow {id}"),
        post_id: "post_1".into(),
        keywords: vec!["price".into(), "cost".into()],
        message_template: "Hey {username}!".into(),
        link_url: None,
        case_sensitive: false,
        exact_match: false,
        max_dms_per_day: 100,
        status: WorkflowStatus::Active,
        total_triggers: 0,
        dms_sent: 0,
        dms_delivered: 0,
        last_triggered_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_comment(id: &str, text: &str, username: &str) -> Comment {
    Comment {
        id: id.into(),
        text: text.into(),
        username: username.into(),
        user_id: format!("u_{username}"),
        timestamp: Utc::now(),
    }
}

pub fn test_credential() -> Credential {
    Credential {
        account_id: ACCOUNT_ID,
        provider_account_id: "17840001".into(),
        access_token: "tok".into(),
        expires_at: Some(Utc::now() + chrono::Duration::days(30)),
    }
}

pub fn expired_credential() -> Credential {
    Credential {
        expires_at: Some(Utc::now() - chrono::Duration::hours(1)),
        ..test_credential()
    }
}

// ---------------------------------------------------------------------------
// Assembled engine
// ---------------------------------------------------------------------------

/// The full engine stack wired over the fakes.
pub struct TestEngine {
    pub store: Arc<InMemoryStore>,
    pub provider: Arc<ScriptedProvider>,
    pub limiter: Arc<RateLimiter>,
    pub guard: Arc<DuplicateGuard>,
    pub dispatch: Arc<DispatchService>,
    pub bus: Arc<EventBus>,
    pub config: EngineConfig,
}

impl TestEngine {
    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(InMemoryStore::default());
        let provider = Arc::new(ScriptedProvider::default());
        let limiter = Arc::new(RateLimiter::new(
            config.hourly_dm_limit,
            config.daily_dm_limit,
        ));
        let guard = Arc::new(DuplicateGuard::new(
            Arc::clone(&store) as Arc<dyn EngineStore>,
            config.dedupe_ttl,
        ));
        let bus = Arc::new(EventBus::default());
        let dispatch = Arc::new(DispatchService::new(
            Arc::clone(&store) as Arc<dyn EngineStore>,
            Arc::clone(&provider) as Arc<dyn ProviderApi>,
            Arc::clone(&limiter),
            Arc::clone(&guard),
            Arc::clone(&bus),
        ));
        Self {
            store,
            provider,
            limiter,
            guard,
            dispatch,
            bus,
            config,
        }
    }

    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn scheduler(&self) -> Arc<MonitorScheduler> {
        MonitorScheduler::new(
            Arc::clone(&self.store) as Arc<dyn EngineStore>,
            Arc::clone(&self.provider) as Arc<dyn ProviderApi>,
            Arc::clone(&self.dispatch),
            Arc::clone(&self.guard),
            Arc::clone(&self.bus),
            self.config.clone(),
        )
    }
}
