use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{Category, TestId},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateTestRequest, Credentials, GroupBy, TeacherPairing, TermTests, TestsByDisciplineResponse,
        TestsByTeacherResponse, TokenResponse,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid base url: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("api rejected the request: {0}")]
    Api(ApiError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl GatewayError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            GatewayError::Api(err) => err.code,
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code() == Some(ErrorCode::Unauthorized)
    }
}

/// Seam over the REST backend. Production uses [`HttpGateway`]; tests swap
/// in recording fakes.
#[async_trait]
pub trait ExamArchiveApi: Send + Sync {
    async fn sign_up(&self, credentials: &Credentials) -> Result<(), GatewayError>;
    async fn sign_in(&self, credentials: &Credentials) -> Result<TokenResponse, GatewayError>;
    async fn tests_by_discipline(
        &self,
        token: &str,
        discipline_name: Option<&str>,
    ) -> Result<Vec<TermTests>, GatewayError>;
    async fn tests_by_teacher(
        &self,
        token: &str,
        teacher_name: Option<&str>,
    ) -> Result<Vec<TeacherPairing>, GatewayError>;
    async fn categories(&self, token: &str) -> Result<Vec<Category>, GatewayError>;
    async fn create_test(
        &self,
        token: &str,
        request: &CreateTestRequest,
    ) -> Result<(), GatewayError>;
    async fn increment_views(&self, token: &str, test_id: TestId) -> Result<(), GatewayError>;
}

pub struct HttpGateway {
    http: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Maps a non-success response into [`GatewayError::Api`], keeping the
    /// server's JSON error body when it sends one.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let fallback_code = ErrorCode::from_status(status.as_u16());
        let body = response.text().await.unwrap_or_default();
        let api_error = match serde_json::from_str::<ApiError>(&body) {
            Ok(parsed) => ApiError {
                code: parsed.code.or(Some(fallback_code)),
                message: parsed.message,
            },
            Err(_) if body.is_empty() => ApiError::new(fallback_code, status.to_string()),
            Err(_) => ApiError::new(fallback_code, body),
        };
        Err(GatewayError::Api(api_error))
    }
}

#[async_trait]
impl ExamArchiveApi for HttpGateway {
    async fn sign_up(&self, credentials: &Credentials) -> Result<(), GatewayError> {
        let response = self
            .http
            .post(self.endpoint("/sign-up"))
            .json(credentials)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<TokenResponse, GatewayError> {
        let response = self
            .http
            .post(self.endpoint("/sign-in"))
            .json(credentials)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn tests_by_discipline(
        &self,
        token: &str,
        discipline_name: Option<&str>,
    ) -> Result<Vec<TermTests>, GatewayError> {
        let mut params = vec![("groupBy", GroupBy::Disciplines.as_str())];
        if let Some(name) = discipline_name {
            params.push(("disciplineName", name));
        }
        debug!(filter = ?discipline_name, "fetching tests grouped by discipline");

        let response = self
            .http
            .get(self.endpoint("/tests"))
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;
        let body: TestsByDisciplineResponse = Self::check(response).await?.json().await?;
        Ok(body.tests)
    }

    async fn tests_by_teacher(
        &self,
        token: &str,
        teacher_name: Option<&str>,
    ) -> Result<Vec<TeacherPairing>, GatewayError> {
        let mut params = vec![("groupBy", GroupBy::Teachers.as_str())];
        if let Some(name) = teacher_name {
            params.push(("teacherName", name));
        }
        debug!(filter = ?teacher_name, "fetching tests grouped by teacher");

        let response = self
            .http
            .get(self.endpoint("/tests"))
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;
        let body: TestsByTeacherResponse = Self::check(response).await?.json().await?;
        Ok(body.tests)
    }

    async fn categories(&self, token: &str) -> Result<Vec<Category>, GatewayError> {
        let response = self
            .http
            .get(self.endpoint("/categories"))
            .bearer_auth(token)
            .send()
            .await?;
        let body: shared::protocol::CategoriesResponse = Self::check(response).await?.json().await?;
        Ok(body.categories)
    }

    async fn create_test(
        &self,
        token: &str,
        request: &CreateTestRequest,
    ) -> Result<(), GatewayError> {
        let response = self
            .http
            .post(self.endpoint("/tests"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        // Server echoes the created resource; the client reloads instead of
        // merging, so the body is discarded.
        Self::check(response).await?;
        Ok(())
    }

    async fn increment_views(&self, token: &str, test_id: TestId) -> Result<(), GatewayError> {
        let response = self
            .http
            .patch(self.endpoint(&format!("/tests/{}/views", test_id.0)))
            .bearer_auth(token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
