use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    models::{category::Category, expense::Expense, member::Member, trip::Trip},
    store::TripStore,
};

/// Row-level change, tagged by what happened. Delete events carry the old
/// row so consumers can filter on its trip id.
#[derive(Debug, Clone)]
pub enum Change<T> {
    Inserted(T),
    Updated(T),
    Deleted(T),
}

impl<T> Change<T> {
    pub fn row(&self) -> &T {
        match self {
            Change::Inserted(row) | Change::Updated(row) | Change::Deleted(row) => row,
        }
    }
}

/// One event on the change stream, covering the four remote tables.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Trip(Change<Trip>),
    Member(Change<Member>),
    Category(Change<Category>),
    Expense(Change<Expense>),
}

impl ChangeEvent {
    pub fn table(&self) -> &'static str {
        match self {
            ChangeEvent::Trip(_) => "trips",
            ChangeEvent::Member(_) => "members",
            ChangeEvent::Category(_) => "categories",
            ChangeEvent::Expense(_) => "expenses",
        }
    }
}

/// Long-lived task that reconciles server-pushed changes into the store.
/// Established once after bootstrap; a lagged receiver skips the missed
/// events and keeps going.
pub async fn run_change_listener(store: TripStore, mut rx: broadcast::Receiver<ChangeEvent>) {
    info!("change-stream listener active");
    loop {
        match rx.recv().await {
            Ok(event) => {
                let table = event.table();
                if let Err(err) = store.apply_change(event).await {
                    warn!("reconciliation of {table} change failed: {err}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("change stream lagged, {skipped} events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    info!("change stream closed, listener exiting");
}
