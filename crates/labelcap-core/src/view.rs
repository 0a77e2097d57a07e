//! Client-side view of the active dataset/label
//!
//! [`ViewState`] reconciles what the store has confirmed with what this
//! session has uploaded but not yet seen in a listing:
//!
//! - `confirmed`: keys returned by the last authoritative listing
//! - `pending`: key → payload for uploads made by this client
//! - displayed set = `confirmed ∪ keys(pending)`
//!
//! Listings are split into `begin_selection` / `complete_selection`. Every
//! begin bumps a selection token; a completion carrying an older token is
//! discarded, so a slow response for a label the user has already left can
//! never overwrite the newer selection.

use crate::error::{LabelcapError, Result};
use labelcap_keys::{label_prefix, ImageKey, InlinePayload};
use std::collections::{BTreeMap, BTreeSet};

/// Active (dataset, label) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selection {
    /// Dataset name (may be empty)
    pub dataset: String,
    /// Label name
    pub label: String,
}

impl Selection {
    /// Create new selection
    #[inline]
    #[must_use]
    pub fn new(dataset: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            label: label.into(),
        }
    }

    /// Key prefix of the selected label partition
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> String {
        label_prefix(&self.dataset, &self.label)
    }
}

/// Proof of an issued listing, handed back on completion
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct SelectionTicket {
    token: u64,
    selection: Selection,
}

impl SelectionTicket {
    /// Monotonic token of this selection
    #[inline]
    #[must_use]
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Selection this listing was issued for
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }
}

/// Proof of an issued label discovery
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct LabelsTicket {
    token: u64,
    dataset: String,
}

/// What happened to a completed listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Listing became the confirmed set
    Applied {
        /// Number of confirmed keys
        confirmed: usize,
    },
    /// A newer selection was issued meanwhile; result dropped
    Discarded,
}

/// Source for the external thumbnail renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thumbnail<'a> {
    /// Pending upload, rendered from its own bytes
    Inline(&'a InlinePayload),
    /// Confirmed image, resolved relative to the public root
    Remote(&'a str),
}

/// Reconciled view of the active label
#[derive(Debug, Default)]
pub struct ViewState {
    selection: Option<Selection>,
    confirmed: BTreeSet<ImageKey>,
    pending: BTreeMap<ImageKey, InlinePayload>,
    labels: BTreeSet<String>,
    labels_dataset: Option<String>,
    fetching: bool,
    stale: bool,
    selection_token: u64,
    labels_token: u64,
}

impl ViewState {
    /// Create empty view
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a listing for a newly confirmed label
    ///
    /// Pending uploads belong to the previous label and are dropped. The
    /// confirmed set is kept until the listing resolves.
    pub fn begin_selection(
        &mut self,
        dataset: impl Into<String>,
        label: impl Into<String>,
    ) -> SelectionTicket {
        self.selection_token += 1;
        let selection = Selection::new(dataset, label);
        self.selection = Some(selection.clone());
        self.pending.clear();
        self.fetching = true;

        tracing::debug!(
            dataset = %selection.dataset,
            label = %selection.label,
            token = self.selection_token,
            "selection started"
        );
        SelectionTicket {
            token: self.selection_token,
            selection,
        }
    }

    /// Re-list the active label, keeping pending uploads
    ///
    /// Returns `None` when nothing is selected.
    pub fn begin_refresh(&mut self) -> Option<SelectionTicket> {
        let selection = self.selection.clone()?;
        self.selection_token += 1;
        self.fetching = true;
        Some(SelectionTicket {
            token: self.selection_token,
            selection,
        })
    }

    /// Apply the result of a listing started with `ticket`
    ///
    /// A ticket older than the latest selection is discarded without touching
    /// any state. A failed listing keeps the previous confirmed set and marks
    /// the view stale.
    ///
    /// # Errors
    /// Returns the listing error when the ticket is current.
    pub fn complete_selection(
        &mut self,
        ticket: SelectionTicket,
        result: Result<BTreeSet<ImageKey>>,
    ) -> Result<SelectionOutcome> {
        if ticket.token != self.selection_token {
            tracing::warn!(
                dataset = %ticket.selection.dataset,
                label = %ticket.selection.label,
                token = ticket.token,
                current = self.selection_token,
                "discarding listing for superseded selection"
            );
            return Ok(SelectionOutcome::Discarded);
        }

        self.fetching = false;
        match result {
            Ok(keys) => {
                let confirmed = keys.len();
                self.confirmed = keys;
                self.stale = false;
                Ok(SelectionOutcome::Applied { confirmed })
            }
            Err(err) => {
                self.stale = true;
                Err(err)
            }
        }
    }

    /// Label text changed but is not confirmed yet
    #[inline]
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Record an upload made by this client
    ///
    /// Returns `false` (and records nothing) when the key is not under the
    /// active label, e.g. an upload that finished after the user moved on.
    pub fn record_upload(&mut self, key: ImageKey, payload: InlinePayload) -> bool {
        let in_scope = self
            .selection
            .as_ref()
            .is_some_and(|s| key.is_directly_under(&s.prefix()));
        if !in_scope {
            tracing::debug!(key = %key, "ignoring upload outside active label");
            return false;
        }
        self.pending.insert(key, payload);
        true
    }

    /// Drop a key after the store confirmed its deletion
    ///
    /// Returns `true` if the key was visible.
    pub fn apply_removal(&mut self, key: &ImageKey) -> bool {
        let was_confirmed = self.confirmed.remove(key);
        let was_pending = self.pending.remove(key).is_some();
        was_confirmed || was_pending
    }

    /// Start a label discovery for `dataset`
    pub fn begin_labels(&mut self, dataset: impl Into<String>) -> LabelsTicket {
        self.labels_token += 1;
        LabelsTicket {
            token: self.labels_token,
            dataset: dataset.into(),
        }
    }

    /// Apply a label discovery result
    ///
    /// Failures and superseded results leave the previous labels in place.
    ///
    /// # Errors
    /// Returns the discovery error when the ticket is current.
    pub fn complete_labels(
        &mut self,
        ticket: LabelsTicket,
        result: Result<BTreeSet<String>>,
    ) -> Result<bool> {
        if ticket.token != self.labels_token {
            return Ok(false);
        }
        self.labels = result?;
        self.labels_dataset = Some(ticket.dataset);
        Ok(true)
    }

    /// Keys to display: confirmed plus pending
    #[must_use]
    pub fn displayed(&self) -> BTreeSet<ImageKey> {
        self.confirmed
            .iter()
            .chain(self.pending.keys())
            .cloned()
            .collect()
    }

    /// Number of displayed images, suppressed while stale
    #[must_use]
    pub fn displayed_count(&self) -> Option<usize> {
        if self.stale {
            return None;
        }
        let extra = self
            .pending
            .keys()
            .filter(|k| !self.confirmed.contains(*k))
            .count();
        Some(self.confirmed.len() + extra)
    }

    /// Rendering source for a displayed key
    #[must_use]
    pub fn thumbnail(&self, key: &ImageKey) -> Option<Thumbnail<'_>> {
        if let Some(payload) = self.pending.get(key) {
            return Some(Thumbnail::Inline(payload));
        }
        self.confirmed
            .get(key)
            .map(|k| Thumbnail::Remote(k.relative()))
    }

    /// Active selection
    #[inline]
    #[must_use]
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Confirmed keys
    #[inline]
    #[must_use]
    pub fn confirmed(&self) -> &BTreeSet<ImageKey> {
        &self.confirmed
    }

    /// Pending uploads
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &BTreeMap<ImageKey, InlinePayload> {
        &self.pending
    }

    /// Labels last discovered and the dataset they belong to
    #[inline]
    #[must_use]
    pub fn labels(&self) -> (&BTreeSet<String>, Option<&str>) {
        (&self.labels, self.labels_dataset.as_deref())
    }

    /// Listing in flight
    #[inline]
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    /// Label edited since the last successful listing
    #[inline]
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Latest selection token
    #[inline]
    #[must_use]
    pub fn selection_token(&self) -> u64 {
        self.selection_token
    }

    /// Require an active selection with a label
    ///
    /// # Errors
    /// Returns `LabelcapError::MissingLabel` when nothing is selected.
    pub fn require_selection(&self) -> Result<&Selection> {
        self.selection
            .as_ref()
            .filter(|s| !s.label.is_empty())
            .ok_or(LabelcapError::MissingLabel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> BTreeSet<ImageKey> {
        items.iter().map(|k| ImageKey::from(*k)).collect()
    }

    fn payload() -> InlinePayload {
        InlinePayload::new("png", vec![1, 2]).unwrap()
    }

    #[test]
    fn selection_lifecycle() {
        let mut view = ViewState::new();
        let ticket = view.begin_selection("ds", "cat");
        assert!(view.is_fetching());

        let outcome = view
            .complete_selection(ticket, Ok(keys(&["public/ds/cat/1.png"])))
            .unwrap();
        assert_eq!(outcome, SelectionOutcome::Applied { confirmed: 1 });
        assert!(!view.is_fetching());
        assert!(!view.is_stale());
        assert_eq!(view.displayed_count(), Some(1));
    }

    #[test]
    fn superseded_listing_is_discarded() {
        let mut view = ViewState::new();
        let cat = view.begin_selection("ds", "cat");
        let dog = view.begin_selection("ds", "dog");

        view.complete_selection(dog, Ok(keys(&["public/ds/dog/d.png"])))
            .unwrap();
        let outcome = view
            .complete_selection(cat, Ok(keys(&["public/ds/cat/c.png"])))
            .unwrap();

        assert_eq!(outcome, SelectionOutcome::Discarded);
        assert_eq!(view.confirmed(), &keys(&["public/ds/dog/d.png"]));
        assert_eq!(view.selection().unwrap().label, "dog");
    }

    #[test]
    fn discarded_listing_keeps_fetching_flag_of_newer() {
        let mut view = ViewState::new();
        let cat = view.begin_selection("ds", "cat");
        let _dog = view.begin_selection("ds", "dog");

        view.complete_selection(cat, Ok(BTreeSet::new())).unwrap();
        assert!(view.is_fetching());
    }

    #[test]
    fn failed_listing_keeps_previous_confirmed() {
        let mut view = ViewState::new();
        let first = view.begin_selection("ds", "cat");
        view.complete_selection(first, Ok(keys(&["public/ds/cat/1.png"])))
            .unwrap();

        let second = view.begin_selection("ds", "cat");
        let result = view.complete_selection(
            second,
            Err(LabelcapError::StoreUnavailable("offline".to_string())),
        );

        assert!(result.is_err());
        assert_eq!(view.confirmed(), &keys(&["public/ds/cat/1.png"]));
        assert!(view.is_stale());
        assert!(!view.is_fetching());
        assert_eq!(view.displayed_count(), None);
    }

    #[test]
    fn refresh_keeps_pending() {
        let mut view = ViewState::new();
        assert!(view.begin_refresh().is_none());

        let t = view.begin_selection("ds", "cat");
        view.complete_selection(t, Ok(BTreeSet::new())).unwrap();
        let pending = ImageKey::from("public/ds/cat/p.png");
        view.record_upload(pending.clone(), payload());

        let t = view.begin_refresh().unwrap();
        assert_eq!(t.selection().label, "cat");
        view.complete_selection(t, Ok(BTreeSet::new())).unwrap();
        assert!(view.displayed().contains(&pending));
    }

    #[test]
    fn selection_supersedes_refresh() {
        let mut view = ViewState::new();
        let t = view.begin_selection("ds", "cat");
        view.complete_selection(t, Ok(BTreeSet::new())).unwrap();

        let refresh = view.begin_refresh().unwrap();
        let dog = view.begin_selection("ds", "dog");
        assert!(dog.token() > refresh.token());
        assert_eq!(
            view.complete_selection(refresh, Ok(keys(&["public/ds/cat/1.png"])))
                .unwrap(),
            SelectionOutcome::Discarded
        );
    }

    #[test]
    fn new_selection_clears_pending() {
        let mut view = ViewState::new();
        let t = view.begin_selection("ds", "cat");
        view.complete_selection(t, Ok(BTreeSet::new())).unwrap();
        assert!(view.record_upload(ImageKey::from("public/ds/cat/p.png"), payload()));

        let _ = view.begin_selection("ds", "dog");
        assert!(view.pending().is_empty());
    }

    #[test]
    fn record_upload_outside_selection_is_ignored() {
        let mut view = ViewState::new();
        assert!(!view.record_upload(ImageKey::from("public/ds/cat/p.png"), payload()));

        let t = view.begin_selection("ds", "dog");
        view.complete_selection(t, Ok(BTreeSet::new())).unwrap();
        assert!(!view.record_upload(ImageKey::from("public/ds/cat/p.png"), payload()));
        assert!(view.displayed().is_empty());
    }

    #[test]
    fn record_upload_from_nested_partition_is_ignored() {
        let mut view = ViewState::new();
        let t = view.begin_selection("", "plants");
        view.complete_selection(t, Ok(BTreeSet::new())).unwrap();

        assert!(!view.record_upload(ImageKey::from("public/plants/rose/p.png"), payload()));
        assert!(view.record_upload(ImageKey::from("public/plants/p.png"), payload()));
        assert_eq!(view.displayed_count(), Some(1));
    }

    #[test]
    fn stale_suppresses_count() {
        let mut view = ViewState::new();
        let t = view.begin_selection("ds", "cat");
        view.complete_selection(t, Ok(keys(&["public/ds/cat/1.png"])))
            .unwrap();

        view.mark_stale();
        assert_eq!(view.displayed_count(), None);
        assert_eq!(view.displayed().len(), 1);

        let t = view.begin_selection("ds", "cats");
        view.complete_selection(t, Ok(BTreeSet::new())).unwrap();
        assert_eq!(view.displayed_count(), Some(0));
    }

    #[test]
    fn count_does_not_double_count_listed_pending() {
        let mut view = ViewState::new();
        let t = view.begin_selection("ds", "cat");
        view.complete_selection(t, Ok(keys(&["public/ds/cat/1.png"])))
            .unwrap();
        view.record_upload(ImageKey::from("public/ds/cat/1.png"), payload());
        assert_eq!(view.displayed_count(), Some(1));
    }

    #[test]
    fn thumbnails() {
        let mut view = ViewState::new();
        let t = view.begin_selection("ds", "cat");
        view.complete_selection(t, Ok(keys(&["public/ds/cat/1.png"])))
            .unwrap();
        let pending = ImageKey::from("public/ds/cat/2.png");
        view.record_upload(pending.clone(), payload());

        assert_eq!(
            view.thumbnail(&ImageKey::from("public/ds/cat/1.png")),
            Some(Thumbnail::Remote("ds/cat/1.png"))
        );
        assert!(matches!(view.thumbnail(&pending), Some(Thumbnail::Inline(_))));
        assert_eq!(view.thumbnail(&ImageKey::from("public/ds/cat/3.png")), None);
    }

    #[test]
    fn apply_removal_from_both_sets() {
        let mut view = ViewState::new();
        let t = view.begin_selection("ds", "cat");
        view.complete_selection(t, Ok(keys(&["public/ds/cat/1.png"])))
            .unwrap();
        let pending = ImageKey::from("public/ds/cat/2.png");
        view.record_upload(pending.clone(), payload());

        assert!(view.apply_removal(&ImageKey::from("public/ds/cat/1.png")));
        assert!(view.apply_removal(&pending));
        assert!(!view.apply_removal(&pending));
        assert!(view.displayed().is_empty());
    }

    #[test]
    fn labels_failure_keeps_previous() {
        let mut view = ViewState::new();
        let t = view.begin_labels("plants");
        let mut found = BTreeSet::new();
        found.insert("rose".to_string());
        assert!(view.complete_labels(t, Ok(found.clone())).unwrap());

        let t = view.begin_labels("plants");
        let result =
            view.complete_labels(t, Err(LabelcapError::AuthExpired("token".to_string())));
        assert!(result.is_err());
        assert_eq!(view.labels(), (&found, Some("plants")));
    }

    #[test]
    fn superseded_labels_ignored() {
        let mut view = ViewState::new();
        let old = view.begin_labels("plants");
        let new = view.begin_labels("animals");

        let mut animals = BTreeSet::new();
        animals.insert("cat".to_string());
        view.complete_labels(new, Ok(animals.clone())).unwrap();
        assert!(!view.complete_labels(old, Ok(BTreeSet::new())).unwrap());
        assert_eq!(view.labels().0, &animals);
    }

    #[test]
    fn require_selection() {
        let mut view = ViewState::new();
        assert_eq!(view.require_selection(), Err(LabelcapError::MissingLabel));
        let _ = view.begin_selection("ds", "");
        assert!(view.require_selection().is_err());
        let _ = view.begin_selection("ds", "cat");
        assert_eq!(view.require_selection().unwrap().label, "cat");
    }
}
