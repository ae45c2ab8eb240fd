use crate::types::CategoryId;

/// Keyword stems per category, in tie-break order.
const CATEGORY_TABLE: &[(CategoryId, &[&str])] = &[
    (
        CategoryId::Food,
        &["food", "hunger", "meal", "pantry", "kitchen", "nutrition"],
    ),
    (
        CategoryId::Animals,
        &["animal", "pet", "shelter", "dog", "cat", "rescue", "wildlife"],
    ),
    (
        CategoryId::Education,
        &["education", "tutor", "literacy", "school", "mentor", "teach", "student"],
    ),
    (
        CategoryId::Environment,
        &["environment", "green", "garden", "park", "clean", "recycle", "conservation"],
    ),
    (
        CategoryId::Seniors,
        &["senior", "elderly", "elder", "aging", "retirement"],
    ),
    (
        CategoryId::Homeless,
        &["homeless", "housing", "shelter", "outreach"],
    ),
    (
        CategoryId::Health,
        &["health", "medical", "hospital", "clinic", "care", "wellness"],
    ),
    (
        CategoryId::Children,
        &["child", "youth", "kid", "young", "daycare"],
    ),
    (
        CategoryId::Community,
        &["community", "neighborhood", "civic", "festival", "volunteer fair"],
    ),
    (
        CategoryId::Technology,
        &["technology", "computer", "coding", "software", "digital", "website"],
    ),
];

/// Weighted keyword categorizer. Pure and deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct Categorizer;

impl Categorizer {
    pub fn new() -> Self {
        Self
    }

    /// Highest keyword-occurrence total wins; ties go to the earlier table entry.
    pub fn categorize(&self, title: &str, description: &str) -> CategoryId {
        let text = format!("{} {}", title, description).to_lowercase();
        let mut best = CategoryId::General;
        let mut best_score = 0usize;
        for (category, keywords) in CATEGORY_TABLE {
            let score: usize = keywords.iter().map(|k| text.matches(k).count()).sum();
            // strictly greater keeps the first-declared category on ties
            if score > best_score {
                best = *category;
                best_score = score;
            }
        }
        best
    }
}
