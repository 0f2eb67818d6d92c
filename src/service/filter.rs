use std::collections::HashSet;

use crate::models::{RecipeIngredientRow, NO_SECTION};

/// Restricts recipe rows to selected menu spaces and sections.
///
/// Selection is by whole row; ingredient lists are never trimmed.
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    spaces: HashSet<String>,
    sections: HashSet<String>,
}

impl RowFilter {
    /// Empty sets disable the corresponding filter.
    pub fn new<S, T>(spaces: S, sections: T) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            spaces: collect_labels(spaces),
            sections: collect_labels(sections),
        }
    }

    pub fn is_pass_through(&self) -> bool {
        self.spaces.is_empty() && self.sections.is_empty()
    }

    pub fn matches(&self, row: &RecipeIngredientRow) -> bool {
        if !self.spaces.is_empty() && !self.spaces.contains(row.space.as_str()) {
            return false;
        }
        if self.sections.is_empty() {
            return true;
        }

        let effective = row.effective_sections();
        if effective.is_empty() {
            return self.sections.contains(NO_SECTION);
        }
        effective.iter().any(|section| self.sections.contains(*section))
    }

    pub fn apply(&self, rows: &[RecipeIngredientRow]) -> Vec<RecipeIngredientRow> {
        rows.iter().filter(|row| self.matches(row)).cloned().collect()
    }
}

fn collect_labels<I>(labels: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    labels
        .into_iter()
        .map(|label| label.as_ref().trim().to_string())
        .filter(|label| !label.is_empty())
        .collect()
}
