//! Pure queries over fetched collections. Nothing here touches the network
//! or the view slices; callers pass snapshots in and get derived views back.

use std::collections::HashSet;

use shared::{
    domain::{Category, CategoryId, DisciplineId, TeacherId, Test},
    protocol::{DisciplinePairing, TeacherPairing},
};
use thiserror::Error;

/// Distinct teacher names across pairings, first-seen order. The per-pairing
/// test lists stay reachable through [`pairings_for_teacher`].
pub fn unique_teacher_names(pairings: &[TeacherPairing]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for pairing in pairings {
        if seen.insert(pairing.teacher.name.as_str()) {
            names.push(pairing.teacher.name.clone());
        }
    }
    names
}

/// One pairing per distinct discipline name, first occurrence wins. The
/// by-teacher listing repeats a discipline once per teacher; a discipline
/// picker must not.
pub fn distinct_disciplines(pairings: &[TeacherPairing]) -> Vec<&TeacherPairing> {
    let mut seen = HashSet::new();
    pairings
        .iter()
        .filter(|pairing| seen.insert(pairing.discipline.name.as_str()))
        .collect()
}

/// Pairings whose discipline matches `discipline_name`, original order.
pub fn pairings_for_discipline<'a>(
    discipline_name: &str,
    pairings: &'a [TeacherPairing],
) -> Vec<&'a TeacherPairing> {
    pairings
        .iter()
        .filter(|pairing| pairing.discipline.name == discipline_name)
        .collect()
}

/// Pairings taught by `teacher_name`, original order, test lists intact.
pub fn pairings_for_teacher<'a>(
    teacher_name: &str,
    pairings: &'a [TeacherPairing],
) -> Vec<&'a TeacherPairing> {
    pairings
        .iter()
        .filter(|pairing| pairing.teacher.name == teacher_name)
        .collect()
}

/// True iff any pairing under a discipline holds at least one test of the
/// category. Category headers with zero matching tests are not rendered.
pub fn category_has_tests(category: &Category, pairings: &[DisciplinePairing]) -> bool {
    pairings
        .iter()
        .any(|pairing| some_test_of_category(&pairing.tests, category.id))
}

/// By-teacher variant of [`category_has_tests`], restricted to one teacher.
pub fn teacher_category_has_tests(
    category: &Category,
    teacher_name: &str,
    pairings: &[TeacherPairing],
) -> bool {
    pairings
        .iter()
        .filter(|pairing| pairing.teacher.name == teacher_name)
        .any(|pairing| some_test_of_category(&pairing.tests, category.id))
}

pub fn some_test_of_category(tests: &[Test], category_id: CategoryId) -> bool {
    tests.iter().any(|test| test.category.id == category_id)
}

/// Tests carrying `category_id`, stable original order, no dedup (tests are
/// already unique within a pairing).
pub fn tests_of_category(category_id: CategoryId, tests: &[Test]) -> Vec<&Test> {
    tests
        .iter()
        .filter(|test| test.category.id == category_id)
        .collect()
}

/// A test submission as entered, names not yet resolved against the loaded
/// reference lists.
#[derive(Debug, Clone, Default)]
pub struct TestDraft {
    pub name: String,
    pub pdf_url: String,
    pub category_name: String,
    pub discipline_name: String,
    pub teacher_name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),
}

impl TestDraft {
    /// Client-side check run before any network call.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("name", &self.name),
            ("pdfUrl", &self.pdf_url),
            ("category", &self.category_name),
            ("discipline", &self.discipline_name),
            ("teacher", &self.teacher_name),
        ];
        for (field, value) in fields {
            if value.is_empty() {
                return Err(ValidationError::EmptyField(field));
            }
        }
        Ok(())
    }
}

/// A name missing from the loaded reference lists is stale or inconsistent
/// local state, not user input error; resolution fails fast instead of
/// defaulting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no categories loaded; reference data is empty")]
    NoCategoriesLoaded,
    #[error("category '{0}' is not in the loaded reference data")]
    UnknownCategory(String),
    #[error("discipline '{0}' is not in the loaded reference data")]
    UnknownDiscipline(String),
    #[error("teacher '{0}' is not in the loaded reference data")]
    UnknownTeacher(String),
}

/// Name→id mapping for test creation against the reference lists the
/// coordinator loaded moments earlier.
pub fn resolve_submission_ids(
    draft: &TestDraft,
    categories: &[Category],
    pairings: &[TeacherPairing],
) -> Result<(CategoryId, DisciplineId, TeacherId), LookupError> {
    if categories.is_empty() {
        return Err(LookupError::NoCategoriesLoaded);
    }

    let category_id = categories
        .iter()
        .find(|category| category.name == draft.category_name)
        .map(|category| category.id)
        .ok_or_else(|| LookupError::UnknownCategory(draft.category_name.clone()))?;

    let discipline_id = pairings
        .iter()
        .find(|pairing| pairing.discipline.name == draft.discipline_name)
        .map(|pairing| pairing.discipline.id)
        .ok_or_else(|| LookupError::UnknownDiscipline(draft.discipline_name.clone()))?;

    let teacher_id = pairings
        .iter()
        .find(|pairing| pairing.teacher.name == draft.teacher_name)
        .map(|pairing| pairing.teacher.id)
        .ok_or_else(|| LookupError::UnknownTeacher(draft.teacher_name.clone()))?;

    Ok((category_id, discipline_id, teacher_id))
}
