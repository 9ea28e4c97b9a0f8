use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::Result;
use shared::{
    domain::{Category, TestId},
    protocol::{CreateTestRequest, TeacherPairing, TermTests},
};
use tokio::sync::RwLock;
use tracing::debug;

pub mod aggregate;
pub mod gateway;

pub use aggregate::{LookupError, TestDraft, ValidationError};
pub use gateway::{ExamArchiveApi, GatewayError, HttpGateway};

/// Bearer token handle. The token itself is issued by the backend at
/// sign-in; this only stores and hands it out. Absence of a token puts the
/// coordinator into its signed-out no-op mode.
#[derive(Clone, Default)]
pub struct AuthSession {
    token: Arc<RwLock<Option<String>>>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    pub async fn store(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }
}

struct SliceState<T> {
    applied_seq: u64,
    items: Vec<T>,
}

/// A view-state slice: created and owned by one page, replaced wholesale by
/// the coordinator, snapshotted by the renderer. Every replacement carries
/// the sequence number drawn when its fetch was issued, so overlapping
/// fetches resolve last-issued-wins rather than last-completed-wins.
#[derive(Clone)]
pub struct ViewSlice<T> {
    state: Arc<RwLock<SliceState<T>>>,
}

impl<T: Clone> ViewSlice<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SliceState {
                applied_seq: 0,
                items: Vec::new(),
            })),
        }
    }

    pub async fn snapshot(&self) -> Vec<T> {
        self.state.read().await.items.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.items.is_empty()
    }

    /// Replaces the contents iff `seq` is newer than the last applied
    /// fetch. Returns false when the response was stale and discarded.
    pub(crate) async fn replace_if_newer(&self, seq: u64, items: Vec<T>) -> bool {
        let mut state = self.state.write().await;
        if seq <= state.applied_seq {
            return false;
        }
        state.applied_seq = seq;
        state.items = items;
        true
    }
}

impl<T: Clone> Default for ViewSlice<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The slice handles one page passes to the coordinator. Grouped-test
/// slices are opt-in per page; the categories slice is refreshed on every
/// coordinated reload.
#[derive(Clone)]
pub struct PageTargets {
    pub terms: Option<ViewSlice<TermTests>>,
    pub teacher_pairings: Option<ViewSlice<TeacherPairing>>,
    pub categories: ViewSlice<Category>,
}

impl PageTargets {
    pub fn disciplines_page(terms: ViewSlice<TermTests>, categories: ViewSlice<Category>) -> Self {
        Self {
            terms: Some(terms),
            teacher_pairings: None,
            categories,
        }
    }

    pub fn instructors_page(
        teacher_pairings: ViewSlice<TeacherPairing>,
        categories: ViewSlice<Category>,
    ) -> Self {
        Self {
            terms: None,
            teacher_pairings: Some(teacher_pairings),
            categories,
        }
    }

    pub fn categories_only(categories: ViewSlice<Category>) -> Self {
        Self {
            terms: None,
            teacher_pairings: None,
            categories,
        }
    }
}

/// Decides which collections to re-fetch and which slices to replace after
/// navigation, search, or a mutation. Constructed once at composition time
/// and passed down explicitly; holds no page state of its own.
pub struct ReloadCoordinator<A: ExamArchiveApi> {
    api: Arc<A>,
    auth: AuthSession,
    next_seq: AtomicU64,
}

impl<A: ExamArchiveApi> ReloadCoordinator<A> {
    pub fn new(api: Arc<A>, auth: AuthSession) -> Self {
        Self {
            api,
            auth,
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    fn issue_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Full page reload: grouped tests for whichever slices the page
    /// passed, then categories. Without a token this is a silent no-op so
    /// signed-out views render empty instead of failing.
    pub async fn load_page(&self, targets: &PageTargets) -> Result<(), GatewayError> {
        let Some(token) = self.auth.token().await else {
            debug!("reload skipped: no auth token");
            return Ok(());
        };

        if let Some(terms) = &targets.terms {
            let seq = self.issue_seq();
            let fetched = self.api.tests_by_discipline(&token, None).await?;
            if !terms.replace_if_newer(seq, fetched).await {
                debug!(seq, "discarded stale by-discipline reload");
            }
        }

        if let Some(pairings) = &targets.teacher_pairings {
            let seq = self.issue_seq();
            let fetched = self.api.tests_by_teacher(&token, None).await?;
            if !pairings.replace_if_newer(seq, fetched).await {
                debug!(seq, "discarded stale by-teacher reload");
            }
        }

        let seq = self.issue_seq();
        let fetched = self.api.categories(&token).await?;
        targets.categories.replace_if_newer(seq, fetched).await;
        Ok(())
    }

    /// Search-as-filter for the by-discipline page. An empty query takes
    /// the same path as the initial page load; a non-empty query replaces
    /// only the primary grouped slice, leaving categories alone.
    pub async fn search_disciplines(
        &self,
        query: &str,
        targets: &PageTargets,
    ) -> Result<(), GatewayError> {
        if query.is_empty() {
            return self.load_page(targets).await;
        }
        let Some(token) = self.auth.token().await else {
            return Ok(());
        };
        let Some(terms) = &targets.terms else {
            debug!("discipline search without a terms slice; nothing to refresh");
            return Ok(());
        };

        let seq = self.issue_seq();
        let fetched = self.api.tests_by_discipline(&token, Some(query)).await?;
        if !terms.replace_if_newer(seq, fetched).await {
            debug!(seq, query, "discarded stale discipline search response");
        }
        Ok(())
    }

    /// By-teacher counterpart of [`Self::search_disciplines`].
    pub async fn search_teachers(
        &self,
        query: &str,
        targets: &PageTargets,
    ) -> Result<(), GatewayError> {
        if query.is_empty() {
            return self.load_page(targets).await;
        }
        let Some(token) = self.auth.token().await else {
            return Ok(());
        };
        let Some(pairings) = &targets.teacher_pairings else {
            debug!("teacher search without a pairings slice; nothing to refresh");
            return Ok(());
        };

        let seq = self.issue_seq();
        let fetched = self.api.tests_by_teacher(&token, Some(query)).await?;
        if !pairings.replace_if_newer(seq, fetched).await {
            debug!(seq, query, "discarded stale teacher search response");
        }
        Ok(())
    }

    /// Optimistic view-count bump: PATCH the counter, then rerun the owning
    /// page's reload so the authoritative count lands in the slices. A
    /// failure propagates; callers surface a retry-or-relogin message.
    pub async fn register_test_view(
        &self,
        test_id: TestId,
        targets: &PageTargets,
    ) -> Result<(), GatewayError> {
        let Some(token) = self.auth.token().await else {
            return Ok(());
        };
        self.api.increment_views(&token, test_id).await?;
        self.load_page(targets).await
    }

    /// Validates the draft, resolves its names against the loaded reference
    /// lists, and posts the creation request. No network call is made for
    /// an invalid draft.
    pub async fn submit_test(
        &self,
        draft: &TestDraft,
        categories: &[Category],
        pairings: &[TeacherPairing],
    ) -> Result<()> {
        draft.validate()?;
        let (category_id, discipline_id, teacher_id) =
            aggregate::resolve_submission_ids(draft, categories, pairings)?;

        let Some(token) = self.auth.token().await else {
            anyhow::bail!("cannot submit a test while signed out");
        };
        let request = CreateTestRequest {
            name: draft.name.clone(),
            pdf_url: draft.pdf_url.clone(),
            category_id,
            discipline_id,
            teacher_id,
        };
        self.api.create_test(&token, &request).await?;
        debug!(name = %draft.name, "test submitted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
