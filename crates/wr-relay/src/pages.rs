//! Digest pagination.
//!
//! Chat platforms cap how much text one message may carry. [`PageBuilder`]
//! splits a batch of changes into pages that each stay under a character
//! ceiling and a field-count ceiling.

use wr_core::{ChangeEvent, DigestConfig, NotificationField, NotificationPage};

/// Turns change events into size-bounded digest pages.
///
/// Writes are dropped as noise and directories are not listed. Every other
/// event becomes one field labelled `<Kind> File`, in input order.
///
/// # Examples
///
/// ```
/// use wr_core::{ChangeEvent, ChangeKind};
/// use wr_relay::PageBuilder;
///
/// let events = [
///     ChangeEvent::file("/d/a.txt", ChangeKind::Create),
///     ChangeEvent::file("/d/b.txt", ChangeKind::Write),
///     ChangeEvent::file("/d/c.txt", ChangeKind::Remove),
/// ];
///
/// let pages = PageBuilder::new(2000, 25).build(&events);
/// assert_eq!(pages.len(), 1);
/// assert_eq!(pages[0].fields()[0].label, "Create File");
/// assert_eq!(pages[0].fields()[1].value, "/d/c.txt");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBuilder {
    max_chars: usize,
    max_fields: usize,
}

impl PageBuilder {
    /// Creates a builder with explicit ceilings.
    ///
    /// A page's rendered length stays strictly below `max_chars` unless it
    /// holds a single field that is oversized on its own.
    #[must_use]
    pub const fn new(max_chars: usize, max_fields: usize) -> Self {
        Self {
            max_chars,
            max_fields,
        }
    }

    /// Creates a builder from the digest configuration.
    #[must_use]
    pub const fn from_config(config: &DigestConfig) -> Self {
        Self::new(config.max_page_chars, config.max_fields)
    }

    /// Returns `true` if the event belongs in a digest.
    #[inline]
    #[must_use]
    pub fn qualifies(event: &ChangeEvent) -> bool {
        !event.kind.is_noise() && !event.is_directory
    }

    /// Builds the pages for one flush.
    ///
    /// Returns no pages when no event qualifies.
    #[must_use]
    pub fn build<'a, I>(&self, events: I) -> Vec<NotificationPage>
    where
        I: IntoIterator<Item = &'a ChangeEvent>,
    {
        let mut pages = Vec::new();
        let mut current = NotificationPage::new();

        for event in events.into_iter().filter(|e| Self::qualifies(e)) {
            let field = NotificationField::new(event.label(), event.path.as_str());

            if !current.is_empty() && self.would_overflow(&current, &field) {
                pages.push(std::mem::take(&mut current));
            }
            current.push(field);
        }

        if !current.is_empty() {
            pages.push(current);
        }

        pages
    }

    fn would_overflow(&self, page: &NotificationPage, field: &NotificationField) -> bool {
        page.len() >= self.max_fields || page.rendered_len() + field.rendered_len() >= self.max_chars
    }
}

impl Default for PageBuilder {
    fn default() -> Self {
        Self::from_config(&DigestConfig::default())
    }
}
