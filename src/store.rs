use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

use crate::{
    error::AppError,
    models::{
        category::{Category, CategoryPatch},
        expense::{Expense, ExpensePatch, NewExpense},
        member::{Member, MemberPatch},
        timeline::{EventPatch, NewEvent, TimelineEvent},
        trip::Trip,
    },
    prefs::{PrefsStore, SortColumn, SortDirection, UiPrefs},
    repo::TripRepository,
    seed,
    sync::{Change, ChangeEvent},
};

const ALERT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Loading,
    Ready,
}

/// Raised when an optimistic local mutation could not be persisted. The
/// local state is kept as-is; the divergence heals on the next successful
/// reconciliation or reload.
#[derive(Debug, Clone)]
pub struct SyncAlert {
    pub table: &'static str,
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Default)]
struct StoreState {
    phase: Phase,
    trips: Vec<Trip>,
    trip_id: Option<String>,
    members: Vec<Member>,
    categories: Vec<Category>,
    expenses: Vec<Expense>,
    timeline: Vec<TimelineEvent>,
    sort_column: Option<SortColumn>,
    sort_direction: SortDirection,
    hydrated: bool,
}

/// The state container. Owns the in-memory view of the active trip and
/// mediates every mutation: validate, mutate locally, then write remotely
/// best-effort. Cloning shares the same state; the composition root hands
/// the handle to whoever needs it.
#[derive(Clone)]
pub struct TripStore {
    repo: TripRepository,
    prefs: PrefsStore,
    alerts: broadcast::Sender<SyncAlert>,
    inner: Arc<RwLock<StoreState>>,
}

impl TripStore {
    pub fn new(repo: TripRepository, prefs: PrefsStore) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_BUFFER);
        Self {
            repo,
            prefs,
            alerts,
            inner: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    pub fn repository(&self) -> &TripRepository {
        &self.repo
    }

    pub fn alerts(&self) -> broadcast::Receiver<SyncAlert> {
        self.alerts.subscribe()
    }

    fn report_write_failure(&self, table: &'static str, id: &str, err: AppError) {
        warn!("remote write to {table} failed for {id}: {err}; keeping local state until the next sync");
        let _ = self.alerts.send(SyncAlert {
            table,
            id: id.to_string(),
            reason: err.to_string(),
        });
    }

    // ----- bootstrap & trip selection -----

    /// Hydrates UI prefs, loads the trip list and selects a trip. A fresh
    /// install gets the default trip with seeded members and categories.
    pub async fn bootstrap(&self) -> Result<(), AppError> {
        let prefs = self.prefs.load().await?;
        {
            let mut s = self.inner.write().await;
            s.phase = Phase::Loading;
            s.sort_column = prefs.sort_column;
            s.sort_direction = prefs.sort_direction;
        }

        self.fetch_trips().await?;

        let target = {
            let s = self.inner.read().await;
            let remembered = prefs
                .trip_id
                .as_deref()
                .filter(|id| s.trips.iter().any(|t| t.id == *id))
                .map(str::to_string);
            remembered.or_else(|| s.trips.first().map(|t| t.id.clone()))
        };

        match target {
            Some(trip_id) => self.set_current_trip(&trip_id).await?,
            None => self.seed_first_run().await?,
        }

        {
            let mut s = self.inner.write().await;
            s.phase = Phase::Ready;
            s.hydrated = true;
        }
        self.persist_prefs().await
    }

    async fn seed_first_run(&self) -> Result<(), AppError> {
        let trip = seed::default_trip();
        self.repo.insert_trip(&trip).await?;
        for member in seed::default_members(&trip.id) {
            self.repo.insert_member(&member).await?;
        }
        for category in seed::default_categories(&trip.id) {
            self.repo.insert_category(&category).await?;
        }
        self.fetch_trips().await?;
        self.set_current_trip(&trip.id).await
    }

    /// Replaces the trip list from the remote store, newest first.
    pub async fn fetch_trips(&self) -> Result<(), AppError> {
        let trips = self.repo.list_trips().await?;
        let mut s = self.inner.write().await;
        s.trips = trips;
        Ok(())
    }

    /// Switches the active trip and replaces the in-memory collections
    /// wholesale; nothing from the previous trip survives.
    pub async fn set_current_trip(&self, trip_id: &str) -> Result<(), AppError> {
        {
            let s = self.inner.read().await;
            if !s.trips.iter().any(|t| t.id == trip_id) {
                return Err(AppError::NotFound);
            }
        }

        let members = self.repo.members_for_trip(trip_id).await?;
        let categories = self.repo.categories_for_trip(trip_id).await?;
        let expenses = self.repo.expenses_for_trip(trip_id).await?;

        {
            let mut s = self.inner.write().await;
            s.trip_id = Some(trip_id.to_string());
            s.members = members;
            s.categories = categories;
            s.expenses = expenses;
        }
        self.persist_prefs().await
    }

    pub async fn create_trip(
        &self,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Trip, AppError> {
        require_text(name, "trip name")?;
        let trip = Trip::new(name, start_date, end_date);
        // Unlike the child entities, a trip is only added locally once the
        // remote insert went through; everything else hangs off its id.
        self.repo.insert_trip(&trip).await?;
        {
            let mut s = self.inner.write().await;
            s.trips.insert(0, trip.clone());
        }
        for category in seed::starter_categories(&trip.id) {
            if let Err(err) = self.repo.insert_category(&category).await {
                self.report_write_failure("categories", &category.id, err);
            }
        }
        self.set_current_trip(&trip.id).await?;
        Ok(trip)
    }

    pub async fn delete_trip(&self, trip_id: &str) -> Result<(), AppError> {
        self.repo.delete_trip(trip_id).await?;
        let (was_active, fallback) = {
            let mut s = self.inner.write().await;
            s.trips.retain(|t| t.id != trip_id);
            let was_active = s.trip_id.as_deref() == Some(trip_id);
            (was_active, s.trips.first().map(|t| t.id.clone()))
        };
        if !was_active {
            return Ok(());
        }
        match fallback {
            Some(next) => self.set_current_trip(&next).await,
            None => {
                let mut s = self.inner.write().await;
                s.trip_id = None;
                s.members.clear();
                s.categories.clear();
                s.expenses.clear();
                drop(s);
                self.persist_prefs().await
            }
        }
    }

    pub async fn set_trip_dates(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(), AppError> {
        let trip = {
            let mut s = self.inner.write().await;
            let trip_id = s.trip_id.clone().ok_or_else(no_active_trip)?;
            let trip = s
                .trips
                .iter_mut()
                .find(|t| t.id == trip_id)
                .ok_or(AppError::NotFound)?;
            trip.start_date = start_date;
            trip.end_date = end_date;
            trip.clone()
        };
        if let Err(err) = self.repo.update_trip_dates(&trip, start_date, end_date).await {
            self.report_write_failure("trips", &trip.id, err);
        }
        Ok(())
    }

    // ----- members -----

    pub async fn add_member(&self, name: &str) -> Result<Member, AppError> {
        require_text(name, "member name")?;
        let member = {
            let mut s = self.inner.write().await;
            let trip_id = s.trip_id.clone().ok_or_else(no_active_trip)?;
            let member = Member::new(name, trip_id);
            s.members.push(member.clone());
            member
        };
        if let Err(err) = self.repo.insert_member(&member).await {
            self.report_write_failure("members", &member.id, err);
        }
        Ok(member)
    }

    pub async fn update_member(
        &self,
        member_id: &str,
        patch: MemberPatch,
    ) -> Result<Member, AppError> {
        if let Some(name) = patch.name.as_deref() {
            require_text(name, "member name")?;
        }
        if let Some(planned) = patch.planned {
            require_non_negative(planned, "planned amount")?;
        }
        if let Some(given) = patch.given {
            require_non_negative(given, "given amount")?;
        }

        let updated = {
            let mut s = self.inner.write().await;
            let member = s
                .members
                .iter_mut()
                .find(|m| m.id == member_id)
                .ok_or(AppError::NotFound)?;
            if let Some(name) = patch.name {
                member.name = name;
            }
            if let Some(planned) = patch.planned {
                member.planned = planned;
            }
            if let Some(given) = patch.given {
                member.given = given;
            }
            member.clone()
        };
        if let Err(err) = self.repo.update_member(&updated).await {
            self.report_write_failure("members", member_id, err);
        }
        Ok(updated)
    }

    pub async fn delete_member(&self, member_id: &str) -> Result<(), AppError> {
        {
            let mut s = self.inner.write().await;
            s.members.retain(|m| m.id != member_id);
        }
        if let Err(err) = self.repo.delete_member(member_id).await {
            self.report_write_failure("members", member_id, err);
        }
        Ok(())
    }

    // ----- categories -----

    pub async fn add_category(
        &self,
        name: &str,
        planned: f64,
        color: &str,
        icon: &str,
    ) -> Result<Category, AppError> {
        require_text(name, "category name")?;
        require_non_negative(planned, "planned amount")?;
        let category = {
            let mut s = self.inner.write().await;
            let trip_id = s.trip_id.clone().ok_or_else(no_active_trip)?;
            let category = Category::new(name, planned, color, icon, trip_id);
            s.categories.push(category.clone());
            category
        };
        if let Err(err) = self.repo.insert_category(&category).await {
            self.report_write_failure("categories", &category.id, err);
        }
        Ok(category)
    }

    pub async fn update_category(
        &self,
        category_id: &str,
        patch: CategoryPatch,
    ) -> Result<Category, AppError> {
        if let Some(name) = patch.name.as_deref() {
            require_text(name, "category name")?;
        }
        if let Some(planned) = patch.planned {
            require_non_negative(planned, "planned amount")?;
        }
        if let Some(actual) = patch.actual {
            require_non_negative(actual, "actual amount")?;
        }

        let updated = {
            let mut s = self.inner.write().await;
            let category = s
                .categories
                .iter_mut()
                .find(|c| c.id == category_id)
                .ok_or(AppError::NotFound)?;
            if let Some(name) = patch.name {
                category.name = name;
            }
            if let Some(planned) = patch.planned {
                category.planned = planned;
            }
            if let Some(actual) = patch.actual {
                category.actual = actual;
            }
            if let Some(color) = patch.color {
                category.color = color;
            }
            if let Some(icon) = patch.icon {
                category.icon = icon;
            }
            category.clone()
        };
        if let Err(err) = self.repo.update_category(&updated).await {
            self.report_write_failure("categories", category_id, err);
        }
        Ok(updated)
    }

    pub async fn delete_category(&self, category_id: &str) -> Result<(), AppError> {
        {
            let mut s = self.inner.write().await;
            s.categories.retain(|c| c.id != category_id);
        }
        if let Err(err) = self.repo.delete_category(category_id).await {
            self.report_write_failure("categories", category_id, err);
        }
        Ok(())
    }

    // ----- expenses -----

    /// Adds an expense and bumps its category's running `actual` total by
    /// the expense amount, locally and on the category row.
    pub async fn add_expense(&self, new: NewExpense) -> Result<Expense, AppError> {
        require_text(&new.title, "expense title")?;
        require_non_negative(new.amount, "expense amount")?;

        let (expense, category) = {
            let mut s = self.inner.write().await;
            let trip_id = s.trip_id.clone().ok_or_else(no_active_trip)?;
            let category = s
                .categories
                .iter_mut()
                .find(|c| c.id == new.category_id)
                .ok_or_else(|| {
                    AppError::Validation("expense category does not exist in this trip".into())
                })?;
            category.actual += new.amount;
            let category = category.clone();
            let expense = Expense::from_new(new, trip_id);
            s.expenses.insert(0, expense.clone());
            (expense, category)
        };

        if let Err(err) = self.repo.insert_expense(&expense).await {
            self.report_write_failure("expenses", &expense.id, err);
        }
        if let Err(err) = self.repo.update_category(&category).await {
            self.report_write_failure("categories", &category.id, err);
        }
        Ok(expense)
    }

    /// Edits an expense. An amount change moves the delta on the expense's
    /// previous category; reassigning the category does not move totals.
    pub async fn update_expense(
        &self,
        expense_id: &str,
        patch: ExpensePatch,
    ) -> Result<Expense, AppError> {
        if let Some(title) = patch.title.as_deref() {
            require_text(title, "expense title")?;
        }
        if let Some(amount) = patch.amount {
            require_non_negative(amount, "expense amount")?;
        }

        let (updated, touched_category) = {
            let mut s = self.inner.write().await;
            let idx = s
                .expenses
                .iter()
                .position(|e| e.id == expense_id)
                .ok_or(AppError::NotFound)?;
            let old_amount = s.expenses[idx].amount;
            let old_category_id = s.expenses[idx].category_id.clone();
            {
                let expense = &mut s.expenses[idx];
                if let Some(title) = patch.title {
                    expense.title = title;
                }
                if let Some(amount) = patch.amount {
                    expense.amount = amount;
                }
                if let Some(category_id) = patch.category_id {
                    expense.category_id = category_id;
                }
                if let Some(paid_by) = patch.paid_by {
                    expense.paid_by = paid_by;
                }
            }
            let updated = s.expenses[idx].clone();

            let delta = updated.amount - old_amount;
            let mut touched = None;
            if delta != 0.0 {
                if let Some(category) = s.categories.iter_mut().find(|c| c.id == old_category_id) {
                    category.actual += delta;
                    touched = Some(category.clone());
                }
            }
            (updated, touched)
        };

        if let Err(err) = self.repo.update_expense(&updated).await {
            self.report_write_failure("expenses", expense_id, err);
        }
        if let Some(category) = touched_category {
            if let Err(err) = self.repo.update_category(&category).await {
                self.report_write_failure("categories", &category.id, err);
            }
        }
        Ok(updated)
    }

    pub async fn delete_expense(&self, expense_id: &str) -> Result<(), AppError> {
        let removed = {
            let mut s = self.inner.write().await;
            match s.expenses.iter().position(|e| e.id == expense_id) {
                Some(idx) => {
                    let expense = s.expenses.remove(idx);
                    let mut touched = None;
                    if let Some(category) =
                        s.categories.iter_mut().find(|c| c.id == expense.category_id)
                    {
                        category.actual -= expense.amount;
                        touched = Some(category.clone());
                    }
                    Some((expense, touched))
                }
                None => None,
            }
        };

        match removed {
            Some((expense, touched_category)) => {
                if let Err(err) = self.repo.delete_expense(&expense.id).await {
                    self.report_write_failure("expenses", &expense.id, err);
                }
                if let Some(category) = touched_category {
                    if let Err(err) = self.repo.update_category(&category).await {
                        self.report_write_failure("categories", &category.id, err);
                    }
                }
                Ok(())
            }
            None => {
                // Not in memory; delete remotely and reload the active trip
                // to get back in step.
                self.repo.delete_expense(expense_id).await?;
                let trip_id = self.inner.read().await.trip_id.clone();
                if let Some(trip_id) = trip_id {
                    self.set_current_trip(&trip_id).await?;
                }
                Ok(())
            }
        }
    }

    // ----- timeline (memory only) -----

    pub async fn add_event(&self, new: NewEvent) -> Result<TimelineEvent, AppError> {
        require_text(&new.title, "event title")?;
        let event = TimelineEvent::from_new(new);
        self.inner.write().await.timeline.push(event.clone());
        Ok(event)
    }

    pub async fn update_event(
        &self,
        event_id: &str,
        patch: EventPatch,
    ) -> Result<TimelineEvent, AppError> {
        if let Some(title) = patch.title.as_deref() {
            require_text(title, "event title")?;
        }
        let mut s = self.inner.write().await;
        let event = s
            .timeline
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(AppError::NotFound)?;
        if let Some(title) = patch.title {
            event.title = title;
        }
        if let Some(description) = patch.description {
            event.description = description;
        }
        if let Some(date) = patch.date {
            event.date = date;
        }
        if let Some(time) = patch.time {
            event.time = time;
        }
        if let Some(location) = patch.location {
            event.location = location;
        }
        if let Some(kind) = patch.kind {
            event.kind = kind;
        }
        Ok(event.clone())
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<(), AppError> {
        self.inner.write().await.timeline.retain(|e| e.id != event_id);
        Ok(())
    }

    // ----- sort prefs -----

    pub async fn set_sort_column(&self, column: Option<SortColumn>) -> Result<(), AppError> {
        self.inner.write().await.sort_column = column;
        self.persist_prefs().await
    }

    pub async fn set_sort_direction(&self, direction: SortDirection) -> Result<(), AppError> {
        self.inner.write().await.sort_direction = direction;
        self.persist_prefs().await
    }

    async fn persist_prefs(&self) -> Result<(), AppError> {
        let prefs = {
            let s = self.inner.read().await;
            UiPrefs {
                trip_id: s.trip_id.clone(),
                sort_column: s.sort_column,
                sort_direction: s.sort_direction,
                hydrated: s.hydrated,
            }
        };
        self.prefs.save(&prefs).await
    }

    // ----- reconciliation -----

    /// Merges one server-pushed change into memory. Rows from other trips
    /// are ignored; inserts are idempotent by id so the echo of this
    /// store's own optimistic write is a no-op.
    pub async fn apply_change(&self, event: ChangeEvent) -> Result<(), AppError> {
        match event {
            // Trip rows get a coarse refetch instead of field-level merge.
            ChangeEvent::Trip(_) => self.fetch_trips().await,
            ChangeEvent::Member(change) => {
                self.reconcile(change, |s| &mut s.members, false).await;
                Ok(())
            }
            ChangeEvent::Category(change) => {
                self.reconcile(change, |s| &mut s.categories, false).await;
                Ok(())
            }
            ChangeEvent::Expense(change) => {
                self.reconcile(change, |s| &mut s.expenses, true).await;
                Ok(())
            }
        }
    }

    async fn reconcile<T: TripRow>(
        &self,
        change: Change<T>,
        rows_of: impl FnOnce(&mut StoreState) -> &mut Vec<T>,
        newest_first: bool,
    ) {
        let mut s = self.inner.write().await;
        let Some(active) = s.trip_id.clone() else {
            return;
        };
        if change.row().trip_id() != active {
            return;
        }
        let rows = rows_of(&mut *s);
        match change {
            Change::Inserted(row) => {
                if rows.iter().all(|existing| existing.id() != row.id()) {
                    if newest_first {
                        rows.insert(0, row);
                    } else {
                        rows.push(row);
                    }
                }
            }
            Change::Updated(row) => {
                if let Some(slot) = rows.iter_mut().find(|existing| existing.id() == row.id()) {
                    *slot = row;
                }
            }
            Change::Deleted(row) => rows.retain(|existing| existing.id() != row.id()),
        }
    }

    // ----- read access -----

    pub async fn phase(&self) -> Phase {
        self.inner.read().await.phase
    }

    pub async fn trip_id(&self) -> Option<String> {
        self.inner.read().await.trip_id.clone()
    }

    pub async fn active_trip(&self) -> Option<Trip> {
        let s = self.inner.read().await;
        let trip_id = s.trip_id.as_deref()?;
        s.trips.iter().find(|t| t.id == trip_id).cloned()
    }

    pub async fn trips(&self) -> Vec<Trip> {
        self.inner.read().await.trips.clone()
    }

    pub async fn members(&self) -> Vec<Member> {
        self.inner.read().await.members.clone()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.inner.read().await.categories.clone()
    }

    pub async fn expenses(&self) -> Vec<Expense> {
        self.inner.read().await.expenses.clone()
    }

    pub async fn timeline(&self) -> Vec<TimelineEvent> {
        self.inner.read().await.timeline.clone()
    }

    pub async fn sort_prefs(&self) -> (Option<SortColumn>, SortDirection) {
        let s = self.inner.read().await;
        (s.sort_column, s.sort_direction)
    }

    // ----- derived totals -----

    /// Total planned budget, category basis.
    pub async fn total_planned(&self) -> f64 {
        let s = self.inner.read().await;
        s.categories.iter().map(|c| c.planned).sum()
    }

    pub async fn total_member_planned(&self) -> f64 {
        let s = self.inner.read().await;
        s.members.iter().map(|m| m.planned).sum()
    }

    pub async fn total_actual(&self) -> f64 {
        let s = self.inner.read().await;
        s.categories.iter().map(|c| c.actual).sum()
    }

    pub async fn total_given(&self) -> f64 {
        let s = self.inner.read().await;
        s.members.iter().map(|m| m.given).sum()
    }

    /// What the member has contributed minus what they have paid out in
    /// expenses. Unknown members balance to zero.
    pub async fn member_balance(&self, member_id: &str) -> f64 {
        let s = self.inner.read().await;
        let given = s
            .members
            .iter()
            .find(|m| m.id == member_id)
            .map(|m| m.given)
            .unwrap_or(0.0);
        let paid: f64 = s
            .expenses
            .iter()
            .filter(|e| e.paid_by == member_id)
            .map(|e| e.amount)
            .sum();
        given - paid
    }
}

trait TripRow {
    fn id(&self) -> &str;
    fn trip_id(&self) -> &str;
}

impl TripRow for Member {
    fn id(&self) -> &str {
        &self.id
    }
    fn trip_id(&self) -> &str {
        &self.trip_id
    }
}

impl TripRow for Category {
    fn id(&self) -> &str {
        &self.id
    }
    fn trip_id(&self) -> &str {
        &self.trip_id
    }
}

impl TripRow for Expense {
    fn id(&self) -> &str {
        &self.id
    }
    fn trip_id(&self) -> &str {
        &self.trip_id
    }
}

fn no_active_trip() -> AppError {
    AppError::Validation("no trip is selected".into())
}

fn require_text(value: &str, what: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{what} cannot be empty")));
    }
    Ok(())
}

fn require_non_negative(value: f64, what: &str) -> Result<(), AppError> {
    if value < 0.0 {
        return Err(AppError::Validation(format!("{what} cannot be negative")));
    }
    Ok(())
}
