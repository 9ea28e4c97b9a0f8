use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use shared::domain::{
    Category, CategoryId, Discipline, DisciplineId, PairingId, Teacher, TeacherId, Term, TermId,
    Test,
};
use shared::protocol::{
    CategoriesResponse, DisciplinePairing, DisciplineTests, TestsByDisciplineResponse,
    TestsByTeacherResponse,
};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;

#[derive(Clone, Debug)]
struct CapturedRequest {
    method: &'static str,
    path: String,
    bearer: Option<String>,
    params: HashMap<String, String>,
    body: serde_json::Value,
}

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl Captured {
    async fn push(
        &self,
        method: &'static str,
        path: impl Into<String>,
        headers: &HeaderMap,
        params: HashMap<String, String>,
        body: serde_json::Value,
    ) {
        self.requests.lock().await.push(CapturedRequest {
            method,
            path: path.into(),
            bearer: bearer_of(headers),
            params,
            body,
        });
    }

    async fn single(&self) -> CapturedRequest {
        let requests = self.requests.lock().await;
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests[0].clone()
    }
}

fn bearer_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn sample_test(id: i64, category_id: i64) -> Test {
    Test {
        id: TestId(id),
        name: format!("test-{id}"),
        pdf_url: format!("https://files.example/{id}.pdf"),
        category: Category {
            id: CategoryId(category_id),
            name: "Midterm".into(),
        },
        views: 4,
    }
}

fn sample_discipline_listing() -> serde_json::Value {
    let response = TestsByDisciplineResponse {
        tests: vec![TermTests {
            id: TermId(1),
            number: 1,
            disciplines: vec![DisciplineTests {
                id: DisciplineId(4),
                name: "Compilers".into(),
                teacher_disciplines: vec![DisciplinePairing {
                    id: PairingId(9),
                    teacher: Teacher {
                        id: TeacherId(2),
                        name: "Ada".into(),
                    },
                    tests: vec![sample_test(7, 10)],
                }],
            }],
        }],
    };
    serde_json::to_value(response).expect("serialize listing")
}

fn sample_teacher_listing() -> serde_json::Value {
    let response = TestsByTeacherResponse {
        tests: vec![TeacherPairing {
            id: PairingId(9),
            teacher: Teacher {
                id: TeacherId(2),
                name: "Ada".into(),
            },
            discipline: Discipline {
                id: DisciplineId(4),
                name: "Compilers".into(),
                term: Term {
                    id: TermId(1),
                    number: 1,
                },
            },
            tests: vec![sample_test(7, 10)],
        }],
    };
    serde_json::to_value(response).expect("serialize listing")
}

async fn handle_sign_up(
    State(state): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    state
        .push("POST", "/sign-up", &headers, HashMap::new(), body)
        .await;
    StatusCode::OK
}

async fn handle_sign_in(
    State(state): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    state
        .push("POST", "/sign-in", &headers, HashMap::new(), body)
        .await;
    Json(serde_json::json!({ "token": "issued-token" }))
}

async fn handle_list_tests(
    State(state): State<Captured>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    let grouped_by_teachers = params.get("groupBy").map(String::as_str) == Some("teachers");
    state
        .push("GET", "/tests", &headers, params, serde_json::Value::Null)
        .await;
    if grouped_by_teachers {
        Json(sample_teacher_listing())
    } else {
        Json(sample_discipline_listing())
    }
}

async fn handle_list_categories(
    State(state): State<Captured>,
    headers: HeaderMap,
) -> Json<CategoriesResponse> {
    state
        .push(
            "GET",
            "/categories",
            &headers,
            HashMap::new(),
            serde_json::Value::Null,
        )
        .await;
    Json(CategoriesResponse {
        categories: vec![Category {
            id: CategoryId(10),
            name: "Midterm".into(),
        }],
    })
}

async fn handle_create_test(
    State(state): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    state
        .push("POST", "/tests", &headers, HashMap::new(), body)
        .await;
    StatusCode::CREATED
}

async fn handle_increment_views(
    State(state): State<Captured>,
    Path(test_id): Path<i64>,
    headers: HeaderMap,
) -> StatusCode {
    state
        .push(
            "PATCH",
            format!("/tests/{test_id}/views"),
            &headers,
            HashMap::new(),
            serde_json::Value::Null,
        )
        .await;
    StatusCode::OK
}

fn archive_router(state: Captured) -> Router {
    Router::new()
        .route("/sign-up", post(handle_sign_up))
        .route("/sign-in", post(handle_sign_in))
        .route("/tests", get(handle_list_tests).post(handle_create_test))
        .route("/categories", get(handle_list_categories))
        .route("/tests/:id/views", patch(handle_increment_views))
        .with_state(state)
}

async fn spawn_server(router: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

async fn spawn_archive_server() -> (String, Captured) {
    let state = Captured::default();
    let url = spawn_server(archive_router(state.clone())).await;
    (url, state)
}

#[tokio::test]
async fn sign_in_posts_credentials_and_returns_the_token() {
    let (url, state) = spawn_archive_server().await;
    let gateway = HttpGateway::new(&url).expect("gateway");

    let response = gateway
        .sign_in(&Credentials {
            email: "ada@example.edu".into(),
            password: "hunter2".into(),
        })
        .await
        .expect("sign in");

    assert_eq!(response.token, "issued-token");
    let request = state.single().await;
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/sign-in");
    assert_eq!(request.body["email"], "ada@example.edu");
    assert_eq!(request.bearer, None);
}

#[tokio::test]
async fn sign_up_succeeds_without_reading_a_body() {
    let (url, state) = spawn_archive_server().await;
    let gateway = HttpGateway::new(&url).expect("gateway");

    gateway
        .sign_up(&Credentials {
            email: "ada@example.edu".into(),
            password: "hunter2".into(),
        })
        .await
        .expect("sign up");

    assert_eq!(state.single().await.path, "/sign-up");
}

#[tokio::test]
async fn discipline_listing_sends_bearer_and_grouping_params() {
    let (url, state) = spawn_archive_server().await;
    let gateway = HttpGateway::new(&url).expect("gateway");

    let terms = gateway
        .tests_by_discipline("secret-token", Some("Compilers"))
        .await
        .expect("listing");

    assert_eq!(terms.len(), 1);
    assert_eq!(terms[0].disciplines[0].teacher_disciplines[0].teacher.name, "Ada");

    let request = state.single().await;
    assert_eq!(request.bearer.as_deref(), Some("secret-token"));
    assert_eq!(request.params.get("groupBy").map(String::as_str), Some("disciplines"));
    assert_eq!(
        request.params.get("disciplineName").map(String::as_str),
        Some("Compilers")
    );
}

#[tokio::test]
async fn unfiltered_teacher_listing_omits_the_name_param() {
    let (url, state) = spawn_archive_server().await;
    let gateway = HttpGateway::new(&url).expect("gateway");

    let pairings = gateway
        .tests_by_teacher("secret-token", None)
        .await
        .expect("listing");

    assert_eq!(pairings[0].discipline.name, "Compilers");

    let request = state.single().await;
    assert_eq!(request.params.get("groupBy").map(String::as_str), Some("teachers"));
    assert!(!request.params.contains_key("teacherName"));
}

#[tokio::test]
async fn categories_request_carries_the_bearer_token() {
    let (url, state) = spawn_archive_server().await;
    let gateway = HttpGateway::new(&url).expect("gateway");

    let categories = gateway.categories("secret-token").await.expect("categories");

    assert_eq!(categories.len(), 1);
    assert_eq!(state.single().await.bearer.as_deref(), Some("secret-token"));
}

#[tokio::test]
async fn create_test_posts_the_camel_case_payload() {
    let (url, state) = spawn_archive_server().await;
    let gateway = HttpGateway::new(&url).expect("gateway");

    gateway
        .create_test(
            "secret-token",
            &CreateTestRequest {
                name: "Final 2022".into(),
                pdf_url: "https://files.example/final.pdf".into(),
                category_id: CategoryId(10),
                discipline_id: DisciplineId(4),
                teacher_id: TeacherId(2),
            },
        )
        .await
        .expect("create");

    let request = state.single().await;
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/tests");
    assert_eq!(request.body["pdfUrl"], "https://files.example/final.pdf");
    assert_eq!(request.body["categoryId"], 10);
    assert_eq!(request.body["disciplineId"], 4);
    assert_eq!(request.body["teacherId"], 2);
}

#[tokio::test]
async fn increment_views_patches_the_views_path() {
    let (url, state) = spawn_archive_server().await;
    let gateway = HttpGateway::new(&url).expect("gateway");

    gateway
        .increment_views("secret-token", TestId(42))
        .await
        .expect("increment");

    let request = state.single().await;
    assert_eq!(request.method, "PATCH");
    assert_eq!(request.path, "/tests/42/views");
    assert_eq!(request.bearer.as_deref(), Some("secret-token"));
}

#[tokio::test]
async fn unauthorized_response_maps_to_a_typed_api_error() {
    let router = Router::new().route(
        "/categories",
        get(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "code": "unauthorized",
                    "message": "invalid token"
                })),
            )
        }),
    );
    let url = spawn_server(router).await;
    let gateway = HttpGateway::new(&url).expect("gateway");

    let err = gateway
        .categories("expired-token")
        .await
        .expect_err("must fail");

    assert!(err.is_unauthorized());
    assert!(err.to_string().contains("invalid token"));
}

#[tokio::test]
async fn plain_text_error_body_is_kept_as_the_message() {
    let router = Router::new().route(
        "/tests",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let url = spawn_server(router).await;
    let gateway = HttpGateway::new(&url).expect("gateway");

    let err = gateway
        .tests_by_discipline("secret-token", None)
        .await
        .expect_err("must fail");

    assert_eq!(err.code(), Some(ErrorCode::Internal));
    assert!(err.to_string().contains("boom"));
}
