use serde::{Deserialize, Serialize};

use crate::domain::{
    Category, CategoryId, Discipline, DisciplineId, PairingId, Teacher, TeacherId, TermId, Test,
};

/// Server-side grouping mode for the `/tests` listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Disciplines,
    Teachers,
}

impl GroupBy {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupBy::Disciplines => "disciplines",
            GroupBy::Teachers => "teachers",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// One row of the grouped-by-discipline listing: a term carrying every
/// discipline that has pairings, each pairing scoping its own test list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermTests {
    pub id: TermId,
    pub number: i32,
    pub disciplines: Vec<DisciplineTests>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplineTests {
    pub id: DisciplineId,
    pub name: String,
    pub teacher_disciplines: Vec<DisciplinePairing>,
}

/// Pairing as it appears nested below a discipline: the discipline is
/// implied by position, only the teacher and tests are carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisciplinePairing {
    pub id: PairingId,
    pub teacher: Teacher,
    pub tests: Vec<Test>,
}

/// One row of the grouped-by-teacher listing. The same teacher name repeats
/// once per discipline they teach; the same discipline name repeats once per
/// teacher pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherPairing {
    pub id: PairingId,
    pub teacher: Teacher,
    pub discipline: Discipline,
    pub tests: Vec<Test>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestsByDisciplineResponse {
    pub tests: Vec<TermTests>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestsByTeacherResponse {
    pub tests: Vec<TeacherPairing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestRequest {
    pub name: String,
    pub pdf_url: String,
    pub category_id: CategoryId,
    pub discipline_id: DisciplineId,
    pub teacher_id: TeacherId,
}
