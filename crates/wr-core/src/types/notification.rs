//! Digest page types.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One renderable line of a digest page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationField {
    /// Field heading, e.g. `Create File`.
    pub label: String,

    /// Field body, the changed path.
    pub value: String,
}

impl NotificationField {
    /// Creates a new field.
    #[inline]
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// Number of characters this field contributes to a page.
    #[inline]
    #[must_use]
    pub fn rendered_len(&self) -> usize {
        self.label.chars().count() + self.value.chars().count()
    }
}

/// An ordered group of fields sent as a single chat message.
///
/// # Examples
///
/// ```
/// use wr_core::{NotificationField, NotificationPage};
///
/// let mut page = NotificationPage::new();
/// page.push(NotificationField::new("Create File", "/d/a.txt"));
/// assert_eq!(page.len(), 1);
/// assert_eq!(page.rendered_len(), "Create File".len() + "/d/a.txt".len());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPage {
    fields: SmallVec<[NotificationField; 8]>,
    rendered_len: usize,
}

impl NotificationPage {
    /// Creates an empty page.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, keeping the running rendered length in sync.
    pub fn push(&mut self, field: NotificationField) {
        self.rendered_len += field.rendered_len();
        self.fields.push(field);
    }

    /// Total rendered characters of all fields on this page.
    #[inline]
    #[must_use]
    pub const fn rendered_len(&self) -> usize {
        self.rendered_len
    }

    /// Number of fields on this page.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the page has no fields.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The fields in insertion order.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[NotificationField] {
        &self.fields
    }
}

impl IntoIterator for NotificationPage {
    type Item = NotificationField;
    type IntoIter = smallvec::IntoIter<[NotificationField; 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_len_counts_chars_not_bytes() {
        let field = NotificationField::new("Create File", "/d/é.txt");
        assert_eq!(field.rendered_len(), 11 + 8);
    }

    #[test]
    fn test_page_tracks_running_total() {
        let mut page = NotificationPage::new();
        assert!(page.is_empty());
        page.push(NotificationField::new("ab", "cd"));
        page.push(NotificationField::new("e", "f"));
        assert_eq!(page.len(), 2);
        assert_eq!(page.rendered_len(), 6);
        assert_eq!(page.fields()[1].label, "e");
    }
}
