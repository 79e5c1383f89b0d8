use chrono::NaiveDate;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    db::DbPool,
    error::AppError,
    models::{category::Category, expense::Expense, member::Member, trip::Trip},
    sync::{Change, ChangeEvent},
};

/// Buffer for the change stream; reconciliation is cheap, so receivers
/// should never fall this far behind.
const CHANGE_BUFFER: usize = 256;

/// Row-level access to the relational store. Every successful write is
/// echoed on the change stream, so every subscriber (including the writer's
/// own store) observes it — the same shape a hosted backend's row-change
/// notifications have.
#[derive(Clone)]
pub struct TripRepository {
    db: DbPool,
    changes: broadcast::Sender<ChangeEvent>,
}

impl TripRepository {
    pub fn new(db: DbPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self { db, changes }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn publish(&self, event: ChangeEvent) {
        debug!("change event on {}", event.table());
        // No subscribers yet is fine (e.g. during bootstrap).
        let _ = self.changes.send(event);
    }

    // ----- trips -----

    pub async fn list_trips(&self) -> Result<Vec<Trip>, AppError> {
        let trips = sqlx::query_as::<_, Trip>(
            "SELECT id, name, start_date, end_date, created_at FROM trips ORDER BY created_at DESC",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(trips)
    }

    pub async fn insert_trip(&self, trip: &Trip) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO trips (id, name, start_date, end_date, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&trip.id)
        .bind(&trip.name)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(trip.created_at)
        .execute(&self.db)
        .await?;
        self.publish(ChangeEvent::Trip(Change::Inserted(trip.clone())));
        Ok(())
    }

    pub async fn update_trip_dates(
        &self,
        trip: &Trip,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE trips SET start_date = ?1, end_date = ?2 WHERE id = ?3")
            .bind(start_date)
            .bind(end_date)
            .bind(&trip.id)
            .execute(&self.db)
            .await?;
        let mut updated = trip.clone();
        updated.start_date = start_date;
        updated.end_date = end_date;
        self.publish(ChangeEvent::Trip(Change::Updated(updated)));
        Ok(())
    }

    /// Deletes the trip row; members, categories and expenses cascade
    /// server-side.
    pub async fn delete_trip(&self, trip_id: &str) -> Result<(), AppError> {
        let old = sqlx::query_as::<_, Trip>(
            "SELECT id, name, start_date, end_date, created_at FROM trips WHERE id = ?1",
        )
        .bind(trip_id)
        .fetch_optional(&self.db)
        .await?;
        sqlx::query("DELETE FROM trips WHERE id = ?1")
            .bind(trip_id)
            .execute(&self.db)
            .await?;
        if let Some(old) = old {
            self.publish(ChangeEvent::Trip(Change::Deleted(old)));
        }
        Ok(())
    }

    // ----- members -----

    pub async fn members_for_trip(&self, trip_id: &str) -> Result<Vec<Member>, AppError> {
        let members = sqlx::query_as::<_, Member>(
            "SELECT id, name, planned_amount, given_amount, trip_id FROM members WHERE trip_id = ?1",
        )
        .bind(trip_id)
        .fetch_all(&self.db)
        .await?;
        Ok(members)
    }

    pub async fn insert_member(&self, member: &Member) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO members (id, name, planned_amount, given_amount, trip_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&member.id)
        .bind(&member.name)
        .bind(member.planned)
        .bind(member.given)
        .bind(&member.trip_id)
        .execute(&self.db)
        .await?;
        self.publish(ChangeEvent::Member(Change::Inserted(member.clone())));
        Ok(())
    }

    pub async fn update_member(&self, member: &Member) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE members SET name = ?1, planned_amount = ?2, given_amount = ?3 WHERE id = ?4",
        )
        .bind(&member.name)
        .bind(member.planned)
        .bind(member.given)
        .bind(&member.id)
        .execute(&self.db)
        .await?;
        self.publish(ChangeEvent::Member(Change::Updated(member.clone())));
        Ok(())
    }

    pub async fn delete_member(&self, member_id: &str) -> Result<(), AppError> {
        let old = sqlx::query_as::<_, Member>(
            "SELECT id, name, planned_amount, given_amount, trip_id FROM members WHERE id = ?1",
        )
        .bind(member_id)
        .fetch_optional(&self.db)
        .await?;
        sqlx::query("DELETE FROM members WHERE id = ?1")
            .bind(member_id)
            .execute(&self.db)
            .await?;
        if let Some(old) = old {
            self.publish(ChangeEvent::Member(Change::Deleted(old)));
        }
        Ok(())
    }

    // ----- categories -----

    pub async fn categories_for_trip(&self, trip_id: &str) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, planned_amount, actual_amount, color, icon, trip_id FROM categories WHERE trip_id = ?1",
        )
        .bind(trip_id)
        .fetch_all(&self.db)
        .await?;
        Ok(categories)
    }

    pub async fn insert_category(&self, category: &Category) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO categories (id, name, planned_amount, actual_amount, color, icon, trip_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(category.planned)
        .bind(category.actual)
        .bind(&category.color)
        .bind(&category.icon)
        .bind(&category.trip_id)
        .execute(&self.db)
        .await?;
        self.publish(ChangeEvent::Category(Change::Inserted(category.clone())));
        Ok(())
    }

    pub async fn update_category(&self, category: &Category) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE categories SET name = ?1, planned_amount = ?2, actual_amount = ?3, color = ?4, icon = ?5 \
             WHERE id = ?6",
        )
        .bind(&category.name)
        .bind(category.planned)
        .bind(category.actual)
        .bind(&category.color)
        .bind(&category.icon)
        .bind(&category.id)
        .execute(&self.db)
        .await?;
        self.publish(ChangeEvent::Category(Change::Updated(category.clone())));
        Ok(())
    }

    pub async fn delete_category(&self, category_id: &str) -> Result<(), AppError> {
        let old = sqlx::query_as::<_, Category>(
            "SELECT id, name, planned_amount, actual_amount, color, icon, trip_id FROM categories WHERE id = ?1",
        )
        .bind(category_id)
        .fetch_optional(&self.db)
        .await?;
        sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(category_id)
            .execute(&self.db)
            .await?;
        if let Some(old) = old {
            self.publish(ChangeEvent::Category(Change::Deleted(old)));
        }
        Ok(())
    }

    // ----- expenses -----

    pub async fn expenses_for_trip(&self, trip_id: &str) -> Result<Vec<Expense>, AppError> {
        let expenses = sqlx::query_as::<_, Expense>(
            "SELECT id, title, amount, category_id, paid_by, trip_id, created_at FROM expenses \
             WHERE trip_id = ?1 ORDER BY created_at DESC",
        )
        .bind(trip_id)
        .fetch_all(&self.db)
        .await?;
        Ok(expenses)
    }

    pub async fn insert_expense(&self, expense: &Expense) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO expenses (id, title, amount, category_id, paid_by, trip_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&expense.id)
        .bind(&expense.title)
        .bind(expense.amount)
        .bind(&expense.category_id)
        .bind(&expense.paid_by)
        .bind(&expense.trip_id)
        .bind(expense.created_at)
        .execute(&self.db)
        .await?;
        self.publish(ChangeEvent::Expense(Change::Inserted(expense.clone())));
        Ok(())
    }

    pub async fn update_expense(&self, expense: &Expense) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE expenses SET title = ?1, amount = ?2, category_id = ?3, paid_by = ?4 WHERE id = ?5",
        )
        .bind(&expense.title)
        .bind(expense.amount)
        .bind(&expense.category_id)
        .bind(&expense.paid_by)
        .bind(&expense.id)
        .execute(&self.db)
        .await?;
        self.publish(ChangeEvent::Expense(Change::Updated(expense.clone())));
        Ok(())
    }

    pub async fn delete_expense(&self, expense_id: &str) -> Result<(), AppError> {
        let old = sqlx::query_as::<_, Expense>(
            "SELECT id, title, amount, category_id, paid_by, trip_id, created_at FROM expenses WHERE id = ?1",
        )
        .bind(expense_id)
        .fetch_optional(&self.db)
        .await?;
        sqlx::query("DELETE FROM expenses WHERE id = ?1")
            .bind(expense_id)
            .execute(&self.db)
            .await?;
        if let Some(old) = old {
            self.publish(ChangeEvent::Expense(Change::Deleted(old)));
        }
        Ok(())
    }
}
