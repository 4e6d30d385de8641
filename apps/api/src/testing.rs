//! In-memory stand-ins for the browser, the database and the auth service.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::applications::store::{ApplicationStore, StoreError};
use crate::config::Config;
use crate::ingest::extractor::ExtractionPlan;
use crate::ingest::identity::{IdentityPolicy, IdentityVerifier, VerifyError};
use crate::ingest::models::ExtractedListing;
use crate::ingest::parser::{CompiledSelectors, ListingSelectors};
use crate::ingest::source::{
    BrowserSettings, ListingSource, PageSnapshot, SourceError, SourceLauncher,
};
use crate::ingest::wait::WaitPolicy;
use crate::models::application::{ApplicationRecord, NewApplication};
use crate::state::AppState;

const SEARCH_URL: &str = "https://www.linkedin.com/jobs/search/?keywords=Rust";

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

/// A results page titled "Jobs page {start}" with `count` cards numbered from
/// `start`.
pub fn results_page(start: usize, count: usize) -> String {
    let cards: String = (start..start + count)
        .map(|i| {
            format!(
                r#"<li><div class="base-card">
                    <a class="base-card__full-link" href="/jobs/view/{i}"></a>
                    <h3 class="base-search-card__title">Job {i}</h3>
                    <h4 class="base-search-card__subtitle"><a href="/company/{i}">Company {i}</a></h4>
                    <span class="job-search-card__location">Remote</span>
                </div></li>"#
            )
        })
        .collect();
    format!(
        r#"<html><head><title>Jobs page {start}</title></head><body>
           <ul class="jobs-search__results-list">{cards}</ul>
           <button aria-label="Next">Next</button></body></html>"#
    )
}

pub fn listing(i: usize) -> ExtractedListing {
    ExtractedListing {
        title: format!("Job {i}"),
        organization: format!("Company {i}"),
        location: "Remote".to_string(),
        source_url: format!("https://www.linkedin.com/jobs/view/{i}"),
        ..ExtractedListing::default()
    }
}

pub fn record(status: &str, applied_at: DateTime<Utc>) -> ApplicationRecord {
    ApplicationRecord {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        job_title: "Engineer".to_string(),
        company: "Acme".to_string(),
        job_url: String::new(),
        status: status.to_string(),
        platform: "LinkedIn".to_string(),
        job_description: String::new(),
        location: "Remote".to_string(),
        salary: String::new(),
        application_date: applied_at,
        created_at: applied_at,
    }
}

pub fn test_plan(max_pages: u32) -> ExtractionPlan {
    ExtractionPlan {
        target_url: SEARCH_URL.to_string(),
        max_pages,
        listings_per_page: 25,
        navigation_timeout: Duration::from_secs(60),
        selector_wait: WaitPolicy::new(
            Duration::from_secs(20),
            Duration::from_millis(250),
            Duration::from_secs(2),
        ),
        settle_wait: WaitPolicy::new(
            Duration::from_secs(5),
            Duration::from_millis(250),
            Duration::from_secs(1),
        ),
        selectors: CompiledSelectors::compile(&ListingSelectors::default())
            .expect("default selectors compile"),
    }
}

pub fn test_state(
    launcher: FakeLauncher,
    store: MemoryStore,
    verifier: StaticVerifier,
    identity_policy: IdentityPolicy,
) -> AppState {
    AppState {
        config: Arc::new(Config {
            database_url: "postgres://localhost/jobtrack_test".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_role_key: "service-role".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            identity_policy,
            dedupe_source_urls: true,
            extraction: test_plan(3),
            browser: BrowserSettings::default(),
        }),
        store: Arc::new(store),
        verifier: Arc::new(verifier),
        launcher: Arc::new(launcher),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted browser
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FakePage {
    status: Option<u16>,
    html: String,
    has_next: bool,
    fail_click: bool,
    stale_polls: usize,
}

impl FakePage {
    pub fn ok(html: String) -> Self {
        Self::with_status(200, html)
    }

    pub fn with_status(status: u16, html: String) -> Self {
        Self {
            status: Some(status),
            html,
            has_next: true,
            fail_click: false,
            stale_polls: 0,
        }
    }

    pub fn without_next(mut self) -> Self {
        self.has_next = false;
        self
    }

    /// After clicking into this page, the first `polls` snapshots still show
    /// the previous page.
    pub fn stale_for(mut self, polls: usize) -> Self {
        self.stale_polls = polls;
        self
    }

    /// Clicking into this page never replaces the previous page's content.
    pub fn never_loads(self) -> Self {
        self.stale_for(usize::MAX)
    }

    /// Clicking "next" on this page fails as if the browser target died.
    pub fn failing_click(mut self) -> Self {
        self.fail_click = true;
        self
    }
}

/// Observations shared between a launcher and the sessions it opened.
#[derive(Debug, Default)]
pub struct FakeState {
    closed: AtomicBool,
    launches: AtomicUsize,
    clicks: AtomicUsize,
}

impl FakeState {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Clicks that moved to another page.
    pub fn clicks(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }
}

pub struct FakeLauncher {
    pages: Vec<FakePage>,
    state: Arc<FakeState>,
    fail_launch: bool,
    fail_open: bool,
    panic_on_snapshot: bool,
}

impl FakeLauncher {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            state: Arc::new(FakeState::default()),
            fail_launch: false,
            fail_open: false,
            panic_on_snapshot: false,
        }
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn panicking_snapshot(mut self) -> Self {
        self.panic_on_snapshot = true;
        self
    }

    pub fn state(&self) -> Arc<FakeState> {
        Arc::clone(&self.state)
    }
}

#[async_trait]
impl SourceLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn ListingSource>, SourceError> {
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            return Err(SourceError::Launch("no browser binary".to_string()));
        }
        Ok(Box::new(FakeSource {
            pages: self.pages.clone(),
            index: 0,
            stale_polls: 0,
            state: Arc::clone(&self.state),
            fail_open: self.fail_open,
            panic_on_snapshot: self.panic_on_snapshot,
        }))
    }
}

struct FakeSource {
    pages: Vec<FakePage>,
    index: usize,
    /// Snapshots left that still render the page before `index`.
    stale_polls: usize,
    state: Arc<FakeState>,
    fail_open: bool,
    panic_on_snapshot: bool,
}

fn title_of(html: &str) -> String {
    html.split_once("<title>")
        .and_then(|(_, rest)| rest.split_once("</title>"))
        .map(|(title, _)| title.to_string())
        .unwrap_or_default()
}

#[async_trait]
impl ListingSource for FakeSource {
    async fn open(&mut self, _url: &str, timeout: Duration) -> Result<(), SourceError> {
        if self.fail_open {
            return Err(SourceError::Timeout(timeout));
        }
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, SourceError> {
        if self.panic_on_snapshot {
            panic!("renderer crashed");
        }
        let shown = if self.stale_polls > 0 && self.index > 0 {
            self.stale_polls -= 1;
            self.index - 1
        } else {
            self.index
        };
        let Some(page) = self.pages.get(shown) else {
            return Ok(PageSnapshot::default());
        };
        Ok(PageSnapshot {
            status: page.status,
            title: title_of(&page.html),
            url: SEARCH_URL.to_string(),
            html: page.html.clone(),
        })
    }

    async fn click(&mut self, _selector: &str) -> Result<bool, SourceError> {
        let Some(page) = self.pages.get(self.index) else {
            return Ok(false);
        };
        if !page.has_next || self.index + 1 >= self.pages.len() {
            return Ok(false);
        }
        if page.fail_click {
            return Err(SourceError::Closed);
        }
        self.index += 1;
        self.stale_polls = self.pages[self.index].stale_polls;
        self.state.clicks.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Store and verifier
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
    rows: Vec<ApplicationRecord>,
    insert_calls: usize,
    fail_every: usize,
}

/// Clones share the same rows.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    /// Every `n`th insert fails (1-based). `0` never fails.
    pub fn failing_every(n: usize) -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().fail_every = n;
        store
    }

    pub fn rows(&self) -> Vec<ApplicationRecord> {
        self.inner.lock().unwrap().rows.clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.inner.lock().unwrap().insert_calls
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn insert(&self, application: &NewApplication) -> Result<ApplicationRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.insert_calls += 1;
        let call = inner.insert_calls;
        if inner.fail_every > 0 && call % inner.fail_every == 0 {
            return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                "simulated failure on insert {call}"
            ))));
        }
        let now = Utc::now();
        let row = ApplicationRecord {
            id: Uuid::new_v4(),
            user_id: application.user_id,
            job_title: application.job_title.clone(),
            company: application.company.clone(),
            job_url: application.job_url.clone(),
            status: application.status.clone(),
            platform: application.platform.clone(),
            job_description: application.job_description.clone(),
            location: application.location.clone(),
            salary: application.salary.clone(),
            application_date: now,
            created_at: now,
        };
        inner.rows.push(row.clone());
        Ok(row)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ApplicationRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Accepts exactly one token.
pub struct StaticVerifier {
    token: Option<String>,
    user: Uuid,
    calls: AtomicUsize,
}

impl StaticVerifier {
    pub fn accepting(token: &str, user: Uuid) -> Self {
        Self {
            token: Some(token.to_string()),
            user,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            token: None,
            user: Uuid::nil(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Uuid, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.token {
            Some(accepted) if accepted == token => Ok(self.user),
            _ => Err(VerifyError::Rejected {
                status: 401,
                message: "invalid JWT".to_string(),
            }),
        }
    }
}
