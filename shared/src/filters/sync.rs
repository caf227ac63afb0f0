//! Keeps the address bar, the shared store and the free-text drafts in step.
//!
//! Every method here is a plain synchronous transition. The tokio plumbing
//! that feeds change notifications and debounce timers into it lives in
//! [`super::driver`].
//!
//! Two direction flags stop a change from bouncing back to where it came
//! from: `from_address` is raised while the store is being written from the
//! address bar, `to_address` while the address bar is being written from the
//! store. Both stay up until [`FilterSynchronizer::settle`], which the driver
//! calls once every notification caused by the write has been observed.

use std::sync::Arc;

use tracing::{debug, info};

use super::address::{self, ParsedAddress};
use super::draft::{DraftBook, DraftCommit, EditOutcome};
use super::validate::{check_range, normalize_query, parse_amount, AmountInput, FieldError};
use super::{AppliedFilters, DraftField, FilterChange, FilterPatch, FilterSnapshot, ResetScope};
use crate::capabilities::{AddressBar, FilterStore};
use crate::config::FilterConfig;
use crate::FIRST_PAGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass wrote to the store or the address bar.
    Applied,
    /// Everything already agreed.
    Unchanged,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotInitialized,
    AlreadyInitialized,
    /// The change is the echo of this synchronizer's own address write.
    OwnWrite,
    /// The store change came from the address bar.
    FromAddress,
    /// The wanted address is already the last one written.
    AddressPending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DirectionFlags {
    from_address: bool,
    to_address: bool,
}

pub struct FilterSynchronizer {
    address: Arc<dyn AddressBar>,
    store: Arc<dyn FilterStore>,
    config: FilterConfig,
    drafts: DraftBook,
    flags: DirectionFlags,
    last_known: Option<String>,
}

impl std::fmt::Debug for FilterSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterSynchronizer")
            .field("drafts", &self.drafts)
            .field("flags", &self.flags)
            .field("last_known", &self.last_known)
            .finish_non_exhaustive()
    }
}

impl FilterSynchronizer {
    pub fn new(
        address: Arc<dyn AddressBar>,
        store: Arc<dyn FilterStore>,
        config: FilterConfig,
    ) -> Self {
        Self {
            address,
            store,
            config,
            drafts: DraftBook::default(),
            flags: DirectionFlags::default(),
            last_known: None,
        }
    }

    // ----- passes -----

    /// Runs once. A recognized address wins over the store; otherwise the
    /// address is written from the store.
    pub fn initialize(&mut self) -> PassOutcome {
        if self.last_known.is_some() {
            return PassOutcome::Skipped(SkipReason::AlreadyInitialized);
        }

        let displayed = self.address.read();
        let parsed = address::parse(&displayed);

        if parsed.recognized {
            let current = self.store.read();
            let changed = current != parsed.snapshot;
            if changed {
                self.flags.from_address = true;
                self.store.write(FilterPatch::full(parsed.snapshot.clone()));
            }
            self.drafts.seed(&parsed.snapshot.applied);
            info!(address = %displayed, "filters initialized from address");
            self.last_known = Some(displayed);
            return if changed {
                PassOutcome::Applied
            } else {
                PassOutcome::Unchanged
            };
        }

        let current = self.store.read();
        self.drafts.seed(&current.applied);
        if address::encode(&current) == address::canonicalize(&displayed) {
            self.last_known = Some(displayed);
            return PassOutcome::Unchanged;
        }

        let next = address::encode_with_extra(&current, &parsed.extra);
        self.flags.to_address = true;
        self.address.replace(&next);
        info!(address = %next, "address initialized from store");
        self.last_known = Some(next);
        PassOutcome::Applied
    }

    /// Address bar changed (history navigation, manual edit, or the echo of
    /// our own replace).
    pub fn on_address_changed(&mut self) -> PassOutcome {
        if self.last_known.is_none() {
            return PassOutcome::Skipped(SkipReason::NotInitialized);
        }
        let displayed = self.address.read();
        if self.flags.to_address || self.last_known.as_deref() == Some(displayed.as_str()) {
            debug!(address = %displayed, "address change is our own write");
            return PassOutcome::Skipped(SkipReason::OwnWrite);
        }

        let ParsedAddress { snapshot, .. } = address::parse(&displayed);
        let current = self.store.read();
        if current == snapshot {
            self.last_known = Some(displayed);
            return PassOutcome::Unchanged;
        }

        self.flags.from_address = true;
        self.store.write(FilterPatch::full(snapshot.clone()));
        self.drafts.refresh(&snapshot.applied);
        info!(address = %displayed, page = snapshot.page, "store updated from address");
        self.last_known = Some(displayed);
        PassOutcome::Applied
    }

    /// Store changed. Pulls new values into idle drafts, then mirrors the
    /// store into the address bar unless the change came from there.
    pub fn on_store_changed(&mut self) -> PassOutcome {
        if self.last_known.is_none() {
            return PassOutcome::Skipped(SkipReason::NotInitialized);
        }
        if self.flags.from_address {
            debug!("store change originated from address");
            return PassOutcome::Skipped(SkipReason::FromAddress);
        }
        let current = self.store.read();
        self.drafts.refresh(&current.applied);
        self.sync_address(&current)
    }

    /// Deferred clear point for the direction flags, followed by one
    /// convergence check so the address matches the store at rest.
    pub fn settle(&mut self) -> PassOutcome {
        self.flags = DirectionFlags::default();
        if self.last_known.is_none() {
            return PassOutcome::Skipped(SkipReason::NotInitialized);
        }
        let displayed = self.address.read();
        if self.last_known.as_deref() == Some(displayed.as_str()) {
            let current = self.store.read();
            self.sync_address(&current)
        } else {
            self.on_address_changed()
        }
    }

    fn sync_address(&mut self, current: &FilterSnapshot) -> PassOutcome {
        let displayed = self.address.read();
        let wanted = address::encode(current);
        if wanted == address::canonicalize(&displayed) {
            return PassOutcome::Unchanged;
        }
        if self
            .last_known
            .as_deref()
            .is_some_and(|last| address::canonicalize(last) == wanted)
        {
            debug!(address = %wanted, "address write already pending");
            return PassOutcome::Skipped(SkipReason::AddressPending);
        }

        let extra = address::parse(&displayed).extra;
        let next = address::encode_with_extra(current, &extra);
        self.flags.to_address = true;
        self.address.replace(&next);
        debug!(address = %next, "address replaced from store");
        self.last_known = Some(next);
        PassOutcome::Applied
    }

    // ----- user input -----

    /// One keystroke in a free-text field. Emptying the field clears the
    /// applied value immediately; anything else waits for the debounce.
    pub fn edit(&mut self, field: DraftField, text: &str) -> EditOutcome {
        if text.trim().is_empty() {
            let held = self.held_price_bound(field);
            self.drafts.clear_field(field);
            let mut next = self.store.read().applied;
            next.clear(field);
            if let Some((other, value)) = held {
                match other {
                    DraftField::PriceMin => next.price_min = Some(value),
                    _ => next.price_max = Some(value),
                }
                debug!(field = %other, value, "held price bound released");
            }
            self.write_applied(next);
            return EditOutcome::Cleared;
        }
        let generation = self.drafts.set_text(field, text);
        EditOutcome::Scheduled {
            generation,
            delay: self.config.debounce(),
        }
    }

    pub fn on_debounce_elapsed(&mut self, field: DraftField, generation: u64) -> DraftCommit {
        if !self.drafts.take_pending(field, generation) {
            return DraftCommit::Stale;
        }
        self.commit(field)
    }

    /// Focus left the field. Commits now unless the debounce already did.
    pub fn blur(&mut self, field: DraftField) -> DraftCommit {
        if !self.drafts.is_editing(field) {
            return DraftCommit::Stale;
        }
        self.commit(field)
    }

    fn commit(&mut self, field: DraftField) -> DraftCommit {
        self.drafts.cancel_pending(field);
        self.drafts.finish_editing(field);

        let current = self.store.read().applied;
        let text = self.drafts.text(field).to_string();
        let mut next = current.clone();

        match field {
            DraftField::Query => {
                next.query = normalize_query(&text, self.config.max_query_len);
            }
            DraftField::AreaMin => match parse_amount(&text) {
                AmountInput::Empty => next.area_min = None,
                AmountInput::Value(v) => next.area_min = Some(v),
                AmountInput::Negative => return self.reject(field, FieldError::Negative),
                AmountInput::NotNumeric => return DraftCommit::Ignored,
            },
            DraftField::PriceMin | DraftField::PriceMax => {
                if let Err(outcome) = self.resolve_price(field, &current, &mut next) {
                    return outcome;
                }
            }
        }

        self.drafts.clear_error(field);
        if self.write_applied(next) {
            info!(field = %field, "draft promoted");
            DraftCommit::Promoted
        } else {
            DraftCommit::Unchanged
        }
    }

    /// Validates one price bound against the other and fills `next`.
    /// The other bound is read from its draft, so two bounds typed in quick
    /// succession are checked against each other before either is applied.
    fn resolve_price(
        &mut self,
        field: DraftField,
        current: &AppliedFilters,
        next: &mut AppliedFilters,
    ) -> Result<(), DraftCommit> {
        let own = match parse_amount(self.drafts.text(field)) {
            AmountInput::Empty => None,
            AmountInput::Value(v) => Some(v),
            AmountInput::Negative => return Err(self.reject(field, FieldError::Negative)),
            AmountInput::NotNumeric => return Err(DraftCommit::Ignored),
        };

        let other_field = other_bound(field);
        let other_applied = match other_field {
            DraftField::PriceMin => current.price_min,
            _ => current.price_max,
        };
        let other = match parse_amount(self.drafts.text(other_field)) {
            AmountInput::Empty => None,
            AmountInput::Value(v) => Some(v),
            AmountInput::Negative | AmountInput::NotNumeric => other_applied,
        };

        let (min, max) = match field {
            DraftField::PriceMin => (own, other),
            _ => (other, own),
        };
        if let Err(err) = check_range(min, max) {
            self.drafts.set_error(DraftField::PriceMin, err.clone());
            self.drafts.set_error(DraftField::PriceMax, err.clone());
            debug!(?min, ?max, "price range rejected");
            return Err(DraftCommit::Rejected(err));
        }

        // A bound held back only by the range error goes through with this one.
        let other_blocked = matches!(
            self.drafts.error(other_field),
            Some(FieldError::MinExceedsMax { .. })
        ) && !self.drafts.is_editing(other_field);
        self.drafts.clear_range_error();

        if other_blocked {
            next.price_min = min;
            next.price_max = max;
        } else if field == DraftField::PriceMin {
            next.price_min = own;
        } else {
            next.price_max = own;
        }
        Ok(())
    }

    /// The opposite price bound, if it is only waiting on a range error
    /// that emptying `field` resolves.
    fn held_price_bound(&self, field: DraftField) -> Option<(DraftField, u64)> {
        if !field.is_price() {
            return None;
        }
        let other = other_bound(field);
        if self.drafts.is_editing(other)
            || !matches!(
                self.drafts.error(other),
                Some(FieldError::MinExceedsMax { .. })
            )
        {
            return None;
        }
        match parse_amount(self.drafts.text(other)) {
            AmountInput::Value(v) => Some((other, v)),
            _ => None,
        }
    }

    fn reject(&mut self, field: DraftField, error: FieldError) -> DraftCommit {
        debug!(field = %field, %error, "draft rejected");
        self.drafts.set_error(field, error.clone());
        DraftCommit::Rejected(error)
    }

    /// Select-style change, applied without debounce.
    pub fn apply(&mut self, change: FilterChange) -> bool {
        let mut next = self.store.read().applied;
        change.apply(&mut next);
        self.write_applied(next)
    }

    pub fn set_page(&mut self, page: u32) -> bool {
        let page = page.max(FIRST_PAGE);
        if self.store.read().page == page {
            return false;
        }
        self.store.write(FilterPatch::page(page));
        true
    }

    /// Clears drafts and applied values in `scope` and returns to the first
    /// page, bypassing debounce.
    pub fn reset(&mut self, scope: ResetScope) -> bool {
        let current = self.store.read();
        let mut next = if scope == ResetScope::All {
            AppliedFilters::default()
        } else {
            current.applied.clone()
        };
        for field in scope.fields() {
            self.drafts.clear_field(*field);
            next.clear(*field);
        }

        let snapshot = FilterSnapshot {
            applied: next,
            page: FIRST_PAGE,
        };
        if snapshot == current {
            return false;
        }
        self.drafts.mark_synced(&snapshot.applied);
        self.store.write(FilterPatch::full(snapshot));
        info!(?scope, "filters reset");
        true
    }

    /// Writes new applied filters, returning to the first page when the
    /// change can alter which results exist.
    fn write_applied(&mut self, next: AppliedFilters) -> bool {
        let current = self.store.read();
        if next == current.applied {
            return false;
        }
        let page = if next.resets_page_from(&current.applied) {
            FIRST_PAGE
        } else {
            current.page
        };
        self.drafts.mark_synced(&next);
        self.store.write(FilterPatch::full(FilterSnapshot {
            applied: next,
            page,
        }));
        true
    }

    // ----- accessors -----

    #[must_use]
    pub fn draft(&self, field: DraftField) -> &str {
        self.drafts.text(field)
    }

    #[must_use]
    pub fn field_error(&self, field: DraftField) -> Option<&FieldError> {
        self.drafts.error(field)
    }

    #[must_use]
    pub fn is_user_editing(&self) -> bool {
        self.drafts.any_editing()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.last_known.is_some()
    }

    #[must_use]
    pub fn last_known_address(&self) -> Option<&str> {
        self.last_known.as_deref()
    }

    #[must_use]
    pub fn snapshot(&self) -> FilterSnapshot {
        self.store.read()
    }

    #[must_use]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
}

fn other_bound(field: DraftField) -> DraftField {
    match field {
        DraftField::PriceMin => DraftField::PriceMax,
        _ => DraftField::PriceMin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{MemoryAddressBar, MemoryFilterStore};
    use crate::filters::{PropertyType, SortOrder};
    use assert_matches::assert_matches;

    struct Fixture {
        address: Arc<MemoryAddressBar>,
        store: Arc<MemoryFilterStore>,
        sync: FilterSynchronizer,
    }

    fn fixture(search: &str, initial: FilterSnapshot) -> Fixture {
        let address = Arc::new(MemoryAddressBar::new(search));
        let store = Arc::new(MemoryFilterStore::new(initial));
        let sync = FilterSynchronizer::new(
            address.clone(),
            store.clone(),
            FilterConfig::default(),
        );
        Fixture {
            address,
            store,
            sync,
        }
    }

    /// What the driver does after a store write: deliver the change, settle.
    fn after_store_write(sync: &mut FilterSynchronizer) {
        sync.on_store_changed();
        sync.settle();
    }

    fn commit_now(sync: &mut FilterSynchronizer, field: DraftField, text: &str) -> DraftCommit {
        match sync.edit(field, text) {
            EditOutcome::Scheduled { generation, .. } => sync.on_debounce_elapsed(field, generation),
            EditOutcome::Cleared => DraftCommit::Promoted,
        }
    }

    mod init_tests {
        use super::*;

        #[test]
        fn test_recognized_address_wins() {
            let mut f = fixture(
                "?type=apartment&priceMin=1000000&page=2",
                FilterSnapshot::default(),
            );
            assert_eq!(f.sync.initialize(), PassOutcome::Applied);

            let snapshot = f.store.read();
            assert_eq!(snapshot.applied.property_type, Some(PropertyType::Apartment));
            assert_eq!(snapshot.applied.price_min, Some(1_000_000));
            assert_eq!(snapshot.page, 2);
            assert_eq!(f.sync.draft(DraftField::PriceMin), "1000000");

            // The resulting store notification must not rewrite the address.
            assert_matches!(
                f.sync.on_store_changed(),
                PassOutcome::Skipped(SkipReason::FromAddress)
            );
            assert_eq!(f.sync.settle(), PassOutcome::Unchanged);
            assert_eq!(f.address.replace_count(), 0);
        }

        #[test]
        fn test_empty_address_is_written_from_store() {
            let mut initial = FilterSnapshot::default();
            initial.applied.rooms = Some(2);
            let mut f = fixture("?utm_source=mail", initial);

            assert_eq!(f.sync.initialize(), PassOutcome::Applied);
            assert_eq!(f.address.read(), "?rooms=2&utm_source=mail");
            assert_eq!(f.address.history_len(), 1);
            assert_eq!(f.sync.last_known_address(), Some("?rooms=2&utm_source=mail"));

            assert_matches!(
                f.sync.on_address_changed(),
                PassOutcome::Skipped(SkipReason::OwnWrite)
            );
        }

        #[test]
        fn test_default_everywhere_writes_nothing() {
            let mut f = fixture("", FilterSnapshot::default());
            assert_eq!(f.sync.initialize(), PassOutcome::Unchanged);
            assert_eq!(f.address.replace_count(), 0);
            assert_matches!(
                f.sync.initialize(),
                PassOutcome::Skipped(SkipReason::AlreadyInitialized)
            );
        }

        #[test]
        fn test_passes_wait_for_initialization() {
            let mut f = fixture("", FilterSnapshot::default());
            assert_matches!(
                f.sync.on_store_changed(),
                PassOutcome::Skipped(SkipReason::NotInitialized)
            );
            assert_matches!(
                f.sync.on_address_changed(),
                PassOutcome::Skipped(SkipReason::NotInitialized)
            );
        }
    }

    mod direction_tests {
        use super::*;

        #[test]
        fn test_history_navigation_updates_store() {
            let mut f = fixture("", FilterSnapshot::default());
            f.sync.initialize();

            f.address.navigate("?q=loft&page=3");
            assert_eq!(f.sync.on_address_changed(), PassOutcome::Applied);
            assert_eq!(f.store.read().applied.query.as_deref(), Some("loft"));
            assert_eq!(f.store.read().page, 3);
            assert_eq!(f.sync.draft(DraftField::Query), "loft");

            assert_matches!(
                f.sync.on_store_changed(),
                PassOutcome::Skipped(SkipReason::FromAddress)
            );
            f.sync.settle();

            assert!(f.address.back());
            assert_eq!(f.sync.on_address_changed(), PassOutcome::Applied);
            assert_eq!(f.store.read(), FilterSnapshot::default());
            assert_eq!(f.sync.draft(DraftField::Query), "");
            f.sync.settle();
            assert_eq!(f.address.replace_count(), 0);
        }

        #[test]
        fn test_reordered_address_is_not_rewritten() {
            let mut f = fixture("?page=2&type=house", FilterSnapshot::default());
            f.sync.initialize();
            f.sync.settle();
            assert_eq!(f.address.read(), "?page=2&type=house");
            assert_eq!(f.address.replace_count(), 0);
        }

        #[test]
        fn test_store_change_replaces_address_once() {
            let mut f = fixture("", FilterSnapshot::default());
            f.sync.initialize();

            assert!(f.sync.apply(FilterChange::Sort(SortOrder::PriceDesc)));
            assert_eq!(f.sync.on_store_changed(), PassOutcome::Applied);
            assert_eq!(f.address.read(), "?sort=price_desc");

            // The echo of our own replace is ignored, and a repeat is pending.
            assert_matches!(
                f.sync.on_address_changed(),
                PassOutcome::Skipped(SkipReason::OwnWrite)
            );
            assert_eq!(f.sync.settle(), PassOutcome::Unchanged);
            assert_eq!(f.address.replace_count(), 1);
            assert_eq!(f.address.history_len(), 1);
        }

        #[test]
        fn test_drafts_being_typed_survive_external_change() {
            let mut f = fixture("", FilterSnapshot::default());
            f.sync.initialize();
            f.sync.edit(DraftField::PriceMin, "25");

            f.address.navigate("?priceMin=100&areaMin=30");
            f.sync.on_address_changed();
            assert_eq!(f.sync.draft(DraftField::PriceMin), "25");
            assert_eq!(f.sync.draft(DraftField::AreaMin), "30");
            assert!(f.sync.is_user_editing());
        }
    }

    mod draft_tests {
        use super::*;

        #[test]
        fn test_valid_draft_is_promoted_with_page_reset() {
            let mut initial = FilterSnapshot::default();
            initial.page = 4;
            let mut f = fixture("", initial);
            f.sync.initialize();

            assert_eq!(
                commit_now(&mut f.sync, DraftField::PriceMin, "1 500 000"),
                DraftCommit::Promoted
            );
            assert_eq!(f.store.read().applied.price_min, Some(1_500_000));
            assert_eq!(f.store.read().page, FIRST_PAGE);

            after_store_write(&mut f.sync);
            assert_eq!(f.address.read(), "?priceMin=1500000");
            assert_eq!(f.sync.draft(DraftField::PriceMin), "1 500 000");
        }

        #[test]
        fn test_stale_generation_is_ignored() {
            let mut f = fixture("", FilterSnapshot::default());
            f.sync.initialize();
            let EditOutcome::Scheduled { generation: old, .. } =
                f.sync.edit(DraftField::AreaMin, "4")
            else {
                panic!("expected a scheduled commit");
            };
            f.sync.edit(DraftField::AreaMin, "45");

            assert_eq!(f.sync.on_debounce_elapsed(DraftField::AreaMin, old), DraftCommit::Stale);
            assert_eq!(f.store.read().applied.area_min, None);
        }

        #[test]
        fn test_blur_commits_first_and_timer_is_stale() {
            let mut f = fixture("", FilterSnapshot::default());
            f.sync.initialize();
            let EditOutcome::Scheduled { generation, .. } = f.sync.edit(DraftField::Query, " loft ")
            else {
                panic!("expected a scheduled commit");
            };

            assert_eq!(f.sync.blur(DraftField::Query), DraftCommit::Promoted);
            assert_eq!(f.store.read().applied.query.as_deref(), Some("loft"));
            assert_eq!(
                f.sync.on_debounce_elapsed(DraftField::Query, generation),
                DraftCommit::Stale
            );
            assert_eq!(f.sync.blur(DraftField::Query), DraftCommit::Stale);
        }

        #[test]
        fn test_negative_is_rejected_and_non_numeric_ignored() {
            let mut f = fixture("", FilterSnapshot::default());
            f.sync.initialize();

            assert_eq!(
                commit_now(&mut f.sync, DraftField::AreaMin, "-3"),
                DraftCommit::Rejected(FieldError::Negative)
            );
            assert_eq!(f.sync.field_error(DraftField::AreaMin), Some(&FieldError::Negative));

            assert_eq!(
                commit_now(&mut f.sync, DraftField::PriceMax, "12abc"),
                DraftCommit::Ignored
            );
            assert!(f.sync.field_error(DraftField::PriceMax).is_none());
            assert!(f.store.read().applied.is_default());
        }

        #[test]
        fn test_price_range_blocks_both_bounds_until_corrected() {
            let mut f = fixture("", FilterSnapshot::default());
            f.sync.initialize();

            let EditOutcome::Scheduled { generation: min_gen, .. } =
                f.sync.edit(DraftField::PriceMin, "3000000")
            else {
                panic!("expected a scheduled commit");
            };
            let EditOutcome::Scheduled { generation: max_gen, .. } =
                f.sync.edit(DraftField::PriceMax, "1000000")
            else {
                panic!("expected a scheduled commit");
            };

            assert_matches!(
                f.sync.on_debounce_elapsed(DraftField::PriceMin, min_gen),
                DraftCommit::Rejected(FieldError::MinExceedsMax { .. })
            );
            assert_matches!(
                f.sync.on_debounce_elapsed(DraftField::PriceMax, max_gen),
                DraftCommit::Rejected(FieldError::MinExceedsMax { .. })
            );
            assert!(f.sync.field_error(DraftField::PriceMin).is_some());
            assert!(f.sync.field_error(DraftField::PriceMax).is_some());
            assert_eq!(f.store.read().applied.price_min, None);
            assert_eq!(f.store.read().applied.price_max, None);

            assert_eq!(
                commit_now(&mut f.sync, DraftField::PriceMax, "5000000"),
                DraftCommit::Promoted
            );
            let applied = f.store.read().applied;
            assert_eq!(applied.price_min, Some(3_000_000));
            assert_eq!(applied.price_max, Some(5_000_000));
            assert!(f.sync.field_error(DraftField::PriceMin).is_none());
            assert!(f.sync.field_error(DraftField::PriceMax).is_none());
        }

        #[test]
        fn test_emptying_the_other_bound_releases_a_held_one() {
            let mut f = fixture("", FilterSnapshot::default());
            f.sync.initialize();

            let EditOutcome::Scheduled { generation: min_gen, .. } =
                f.sync.edit(DraftField::PriceMin, "3000000")
            else {
                panic!("expected a scheduled commit");
            };
            let EditOutcome::Scheduled { generation: max_gen, .. } =
                f.sync.edit(DraftField::PriceMax, "1000000")
            else {
                panic!("expected a scheduled commit");
            };
            f.sync.on_debounce_elapsed(DraftField::PriceMin, min_gen);
            f.sync.on_debounce_elapsed(DraftField::PriceMax, max_gen);
            assert_eq!(f.store.read().applied.price_min, None);

            assert_eq!(f.sync.edit(DraftField::PriceMax, ""), EditOutcome::Cleared);
            let applied = f.store.read().applied;
            assert_eq!(applied.price_min, Some(3_000_000));
            assert_eq!(applied.price_max, None);
            assert_eq!(f.sync.draft(DraftField::PriceMin), "3000000");
            assert!(f.sync.field_error(DraftField::PriceMin).is_none());
            assert!(f.sync.field_error(DraftField::PriceMax).is_none());
            assert_eq!(f.sync.blur(DraftField::PriceMin), DraftCommit::Stale);
        }

        #[test]
        fn test_emptying_clears_immediately_and_keeps_page() {
            let mut initial = FilterSnapshot::default();
            initial.applied.price_max = Some(9_000_000);
            initial.page = 3;
            let mut f = fixture("", initial);
            f.sync.initialize();

            assert_eq!(f.sync.edit(DraftField::PriceMax, "  "), EditOutcome::Cleared);
            assert_eq!(f.store.read().applied.price_max, None);
            assert_eq!(f.store.read().page, 3);
        }

        #[test]
        fn test_sort_keeps_page_and_type_resets_it() {
            let mut initial = FilterSnapshot::default();
            initial.page = 5;
            let mut f = fixture("", initial);
            f.sync.initialize();

            f.sync.apply(FilterChange::Sort(SortOrder::PriceAsc));
            assert_eq!(f.store.read().page, 5);
            f.sync.apply(FilterChange::PropertyType(Some(PropertyType::Land)));
            assert_eq!(f.store.read().page, FIRST_PAGE);
        }
    }

    mod reset_tests {
        use super::*;

        #[test]
        fn test_scoped_reset() {
            let mut initial = FilterSnapshot::default();
            initial.applied.price_min = Some(10);
            initial.applied.query = Some("loft".into());
            initial.page = 6;
            let mut f = fixture("", initial);
            f.sync.initialize();
            f.sync.edit(DraftField::PriceMax, "99");

            assert!(f.sync.reset(ResetScope::Price));
            let snapshot = f.store.read();
            assert_eq!(snapshot.applied.price_min, None);
            assert_eq!(snapshot.applied.query.as_deref(), Some("loft"));
            assert_eq!(snapshot.page, FIRST_PAGE);
            assert_eq!(f.sync.draft(DraftField::PriceMax), "");
            assert!(!f.sync.is_user_editing());
        }

        #[test]
        fn test_full_reset_clears_selects() {
            let mut initial = FilterSnapshot::default();
            initial.applied.rooms = Some(3);
            initial.applied.sort = SortOrder::AreaDesc;
            let mut f = fixture("", initial);
            f.sync.initialize();

            assert!(f.sync.reset(ResetScope::All));
            assert_eq!(f.store.read(), FilterSnapshot::default());
            assert!(!f.sync.reset(ResetScope::All));
        }

        #[test]
        fn test_page_changes() {
            let mut f = fixture("", FilterSnapshot::default());
            f.sync.initialize();
            assert!(f.sync.set_page(2));
            assert!(!f.sync.set_page(2));
            after_store_write(&mut f.sync);
            assert_eq!(f.address.read(), "?page=2");
            assert!(f.sync.set_page(0));
            assert_eq!(f.store.read().page, FIRST_PAGE);
        }
    }
}
