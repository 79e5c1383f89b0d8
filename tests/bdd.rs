#![allow(dead_code)]

use std::{fmt, fs::File};

use anyhow::Context;
use chrono::NaiveDate;
use cucumber::{given, then, when, World as _};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tripbudget::{
    db::{init_pool, DbPool},
    models::{expense::NewExpense, member::MemberPatch},
    prefs::PrefsStore,
    repo::TripRepository,
    store::{SyncAlert, TripStore},
    sync::{Change, ChangeEvent},
};

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    second: Option<SecondStore>,
    last_error: Option<String>,
}

impl AppWorld {
    fn store(&self) -> &TripStore {
        &self
            .state
            .as_ref()
            .expect("state must be initialised first")
            .store
    }

    fn db(&self) -> &DbPool {
        &self
            .state
            .as_ref()
            .expect("state must be initialised first")
            .db
    }
}

struct TestState {
    store: TripStore,
    repo: TripRepository,
    db: DbPool,
    alerts: broadcast::Receiver<SyncAlert>,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;

        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let db = init_pool(&database_url).await?;
        sqlx::migrate!("./migrations").run(&db).await?;

        let prefs = PrefsStore::new(root.path().join("prefs"));
        prefs.ensure_structure().await?;

        let repo = TripRepository::new(db.clone());
        let store = TripStore::new(repo.clone(), prefs);
        let alerts = store.alerts();

        Ok(Self {
            store,
            repo,
            db,
            alerts,
            _root: root,
        })
    }
}

struct SecondStore {
    store: TripStore,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl fmt::Debug for SecondStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondStore").finish()
    }
}

fn sample_dates() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2026, 5, 1).expect("valid date"),
        NaiveDate::from_ymd_opt(2026, 5, 5).expect("valid date"),
    )
}

async fn member_id_by_name(store: &TripStore, name: &str) -> Option<String> {
    store
        .members()
        .await
        .into_iter()
        .find(|m| m.name == name)
        .map(|m| m.id)
}

async fn category_id_by_name(store: &TripStore, name: &str) -> Option<String> {
    store
        .categories()
        .await
        .into_iter()
        .find(|c| c.name == name)
        .map(|c| c.id)
}

async fn trip_id_by_name(store: &TripStore, name: &str) -> Option<String> {
    store
        .trips()
        .await
        .into_iter()
        .find(|t| t.name == name)
        .map(|t| t.id)
}

// ----- givens -----

async fn fresh_store(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.second = None;
    world.last_error = None;
}

#[given("a fresh store")]
async fn given_fresh_store(world: &mut AppWorld) {
    fresh_store(world).await;
}

#[given(regex = r#"^a fresh store with a trip "([^"]+)"$"#)]
async fn given_fresh_store_with_trip(world: &mut AppWorld, name: String) {
    fresh_store(world).await;
    let (start, end) = sample_dates();
    world
        .store()
        .create_trip(&name, start, end)
        .await
        .expect("create trip");
}

#[given(regex = r#"^a category "([^"]+)" with planned (\d+(?:\.\d+)?)$"#)]
async fn given_category(world: &mut AppWorld, name: String, planned: f64) {
    world
        .store()
        .add_category(&name, planned, "#3B82F6", "tag")
        .await
        .expect("add category");
}

#[given(regex = r#"^a member "([^"]+)" with given (\d+(?:\.\d+)?)$"#)]
async fn given_member(world: &mut AppWorld, name: String, given: f64) {
    let member = world.store().add_member(&name).await.expect("add member");
    world
        .store()
        .update_member(
            &member.id,
            MemberPatch {
                given: Some(given),
                ..MemberPatch::default()
            },
        )
        .await
        .expect("set member given");
}

#[given("a second store following the same backend")]
async fn given_second_store(world: &mut AppWorld) {
    let state = world.state.as_ref().expect("state must exist");
    let rx = state.repo.subscribe();
    let prefs = PrefsStore::new(state._root.path().join("prefs2"));
    prefs.ensure_structure().await.expect("prefs dir");
    let store = TripStore::new(state.repo.clone(), prefs);
    store.fetch_trips().await.expect("fetch trips");
    let active = state.store.trip_id().await.expect("active trip");
    store.set_current_trip(&active).await.expect("select trip");
    world.second = Some(SecondStore { store, rx });
}

#[given("the expenses table is broken")]
async fn given_broken_expenses_table(world: &mut AppWorld) {
    sqlx::query("DROP TABLE expenses")
        .execute(world.db())
        .await
        .expect("drop expenses table");
}

// ----- whens -----

#[when("the store bootstraps")]
async fn when_bootstrap(world: &mut AppWorld) {
    world.store().bootstrap().await.expect("bootstrap");
}

#[when(regex = r#"^I create a trip "([^"]+)"$"#)]
async fn when_create_trip(world: &mut AppWorld, name: String) {
    let (start, end) = sample_dates();
    world
        .store()
        .create_trip(&name, start, end)
        .await
        .expect("create trip");
}

#[when(regex = r#"^I try to create a trip named "([^"]*)"$"#)]
async fn when_try_create_trip(world: &mut AppWorld, name: String) {
    let (start, end) = sample_dates();
    let result = world.store().create_trip(&name, start, end).await;
    world.last_error = result.err().map(|err| err.to_string());
}

#[when(regex = r#"^I delete the trip "([^"]+)"$"#)]
async fn when_delete_trip(world: &mut AppWorld, name: String) {
    let trip_id = trip_id_by_name(world.store(), &name)
        .await
        .expect("trip exists");
    world.store().delete_trip(&trip_id).await.expect("delete trip");
}

#[when(regex = r#"^I select the trip "([^"]+)"$"#)]
async fn when_select_trip(world: &mut AppWorld, name: String) {
    let trip_id = trip_id_by_name(world.store(), &name)
        .await
        .expect("trip exists");
    world
        .store()
        .set_current_trip(&trip_id)
        .await
        .expect("select trip");
}

#[when(regex = r#"^I try to select the trip id "([^"]+)"$"#)]
async fn when_try_select_trip(world: &mut AppWorld, trip_id: String) {
    let result = world.store().set_current_trip(&trip_id).await;
    world.last_error = result.err().map(|err| err.to_string());
}

#[when(regex = r#"^I add a member "([^"]+)"$"#)]
async fn when_add_member(world: &mut AppWorld, name: String) {
    world.store().add_member(&name).await.expect("add member");
}

#[when(regex = r#"^I add an expense "([^"]+)" of (\d+(?:\.\d+)?) in category "([^"]+)" paid by "([^"]+)"$"#)]
async fn when_add_expense(
    world: &mut AppWorld,
    title: String,
    amount: f64,
    category: String,
    payer: String,
) {
    let store = world.store();
    let category_id = category_id_by_name(store, &category)
        .await
        .expect("category exists");
    let paid_by = member_id_by_name(store, &payer).await.unwrap_or(payer);
    store
        .add_expense(NewExpense {
            title,
            amount,
            category_id,
            paid_by,
        })
        .await
        .expect("add expense");
}

#[when(regex = r#"^I try to add an expense with an empty title in category "([^"]+)"$"#)]
async fn when_try_add_untitled_expense(world: &mut AppWorld, category: String) {
    let store = world.store();
    let category_id = category_id_by_name(store, &category)
        .await
        .expect("category exists");
    let result = store
        .add_expense(NewExpense {
            title: String::new(),
            amount: 10.0,
            category_id,
            paid_by: "someone".into(),
        })
        .await;
    world.last_error = result.err().map(|err| err.to_string());
}

#[when(regex = r#"^I try to add an expense "([^"]+)" of (\d+(?:\.\d+)?) in unknown category "([^"]+)"$"#)]
async fn when_try_add_expense_unknown_category(
    world: &mut AppWorld,
    title: String,
    amount: f64,
    category_id: String,
) {
    let result = world
        .store()
        .add_expense(NewExpense {
            title,
            amount,
            category_id,
            paid_by: "someone".into(),
        })
        .await;
    world.last_error = result.err().map(|err| err.to_string());
}

#[when(regex = r#"^I try to set the planned amount of member "([^"]+)" to (-?\d+(?:\.\d+)?)$"#)]
async fn when_try_set_member_planned(world: &mut AppWorld, name: String, planned: f64) {
    let member_id = member_id_by_name(world.store(), &name)
        .await
        .expect("member exists");
    let result = world
        .store()
        .update_member(
            &member_id,
            MemberPatch {
                planned: Some(planned),
                ..MemberPatch::default()
            },
        )
        .await;
    world.last_error = result.err().map(|err| err.to_string());
}

#[when(regex = r#"^I update the expense "([^"]+)" to amount (\d+(?:\.\d+)?)$"#)]
async fn when_update_expense_amount(world: &mut AppWorld, title: String, amount: f64) {
    let store = world.store();
    let expense = store
        .expenses()
        .await
        .into_iter()
        .find(|e| e.title == title)
        .expect("expense exists");
    store
        .update_expense(
            &expense.id,
            tripbudget::models::expense::ExpensePatch {
                amount: Some(amount),
                ..Default::default()
            },
        )
        .await
        .expect("update expense");
}

#[when(regex = r#"^I delete the expense "([^"]+)"$"#)]
async fn when_delete_expense(world: &mut AppWorld, title: String) {
    let store = world.store();
    let expense = store
        .expenses()
        .await
        .into_iter()
        .find(|e| e.title == title)
        .expect("expense exists");
    store.delete_expense(&expense.id).await.expect("delete expense");
}

#[when(regex = r#"^the change stream replays an insert for member "([^"]+)"$"#)]
async fn when_replay_member_insert(world: &mut AppWorld, name: String) {
    let store = world.store();
    let member = store
        .members()
        .await
        .into_iter()
        .find(|m| m.name == name)
        .expect("member exists");
    store
        .apply_change(ChangeEvent::Member(Change::Inserted(member)))
        .await
        .expect("apply change");
}

#[when(regex = r#"^the change stream delivers a member insert "([^"]+)" for another trip$"#)]
async fn when_foreign_member_insert(world: &mut AppWorld, name: String) {
    let member = tripbudget::models::member::Member::new(name, "some-other-trip");
    world
        .store()
        .apply_change(ChangeEvent::Member(Change::Inserted(member)))
        .await
        .expect("apply change");
}

#[when(regex = r#"^the change stream delivers an update renaming "([^"]+)" to "([^"]+)"$"#)]
async fn when_member_update_event(world: &mut AppWorld, from: String, to: String) {
    let store = world.store();
    let mut member = store
        .members()
        .await
        .into_iter()
        .find(|m| m.name == from)
        .expect("member exists");
    member.name = to;
    store
        .apply_change(ChangeEvent::Member(Change::Updated(member)))
        .await
        .expect("apply change");
}

#[when(regex = r#"^the change stream delivers a delete for member "([^"]+)"$"#)]
async fn when_member_delete_event(world: &mut AppWorld, name: String) {
    let store = world.store();
    let member = store
        .members()
        .await
        .into_iter()
        .find(|m| m.name == name)
        .expect("member exists");
    store
        .apply_change(ChangeEvent::Member(Change::Deleted(member)))
        .await
        .expect("apply change");
}

#[when("the second store catches up")]
async fn when_second_store_catches_up(world: &mut AppWorld) {
    let second = world.second.as_mut().expect("second store exists");
    while let Ok(event) = second.rx.try_recv() {
        second
            .store
            .apply_change(event)
            .await
            .expect("apply change");
    }
}

// ----- thens -----

#[then(regex = r#"^the category "([^"]+)" has actual (\d+(?:\.\d+)?)$"#)]
async fn then_category_actual(world: &mut AppWorld, name: String, expected: f64) {
    let category = world
        .store()
        .categories()
        .await
        .into_iter()
        .find(|c| c.name == name)
        .expect("category exists");
    assert_eq!(category.actual, expected);
}

#[then(regex = r#"^the remote category row "([^"]+)" has actual (\d+(?:\.\d+)?)$"#)]
async fn then_remote_category_actual(world: &mut AppWorld, name: String, expected: f64) {
    let actual: f64 = sqlx::query_scalar("SELECT actual_amount FROM categories WHERE name = ?1")
        .bind(&name)
        .fetch_one(world.db())
        .await
        .expect("category row");
    assert_eq!(actual, expected);
}

#[then(regex = r"^the total planned is (\d+(?:\.\d+)?)$")]
async fn then_total_planned(world: &mut AppWorld, expected: f64) {
    assert_eq!(world.store().total_planned().await, expected);
}

#[then(regex = r"^the total given is (\d+(?:\.\d+)?)$")]
async fn then_total_given(world: &mut AppWorld, expected: f64) {
    assert_eq!(world.store().total_given().await, expected);
}

#[then(regex = r#"^the member balance of "([^"]+)" is (-?\d+(?:\.\d+)?)$"#)]
async fn then_member_balance(world: &mut AppWorld, name: String, expected: f64) {
    let member_id = member_id_by_name(world.store(), &name)
        .await
        .expect("member exists");
    assert_eq!(world.store().member_balance(&member_id).await, expected);
}

#[then("the action is rejected")]
async fn then_action_rejected(world: &mut AppWorld) {
    assert!(
        world.last_error.is_some(),
        "expected the action to be rejected"
    );
}

#[then(regex = r"^there (?:is|are) (\d+) (member|members|category|categories|expense|expenses|trip|trips)$")]
async fn then_count(world: &mut AppWorld, expected: usize, kind: String) {
    let store = world.store();
    let count = match kind.as_str() {
        "member" | "members" => store.members().await.len(),
        "category" | "categories" => store.categories().await.len(),
        "expense" | "expenses" => store.expenses().await.len(),
        "trip" | "trips" => store.trips().await.len(),
        other => panic!("unknown collection {other}"),
    };
    assert_eq!(count, expected, "{kind} count mismatch");
}

#[then(regex = r"^the remote trips table has (\d+) rows?$")]
async fn then_remote_trip_count(world: &mut AppWorld, expected: i64) {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trips")
        .fetch_one(world.db())
        .await
        .expect("count trips");
    assert_eq!(count, expected);
}

#[then(regex = r#"^the active trip is named "([^"]+)"$"#)]
async fn then_active_trip_named(world: &mut AppWorld, name: String) {
    let trip = world.store().active_trip().await.expect("a trip is active");
    assert_eq!(trip.name, name);
}

#[then("no trip is active")]
async fn then_no_active_trip(world: &mut AppWorld) {
    assert!(world.store().trip_id().await.is_none());
}

#[then(regex = r#"^the member list is exactly "([^"]+)"$"#)]
async fn then_member_list_exactly(world: &mut AppWorld, name: String) {
    let members = world.store().members().await;
    let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec![name.as_str()]);
}

#[then(regex = r"^the second store has (\d+) members?$")]
async fn then_second_store_members(world: &mut AppWorld, expected: usize) {
    let second = world.second.as_ref().expect("second store exists");
    assert_eq!(second.store.members().await.len(), expected);
}

#[then(regex = r#"^a sync alert was raised for table "([^"]+)"$"#)]
async fn then_sync_alert(world: &mut AppWorld, table: String) {
    let state = world.state.as_mut().expect("state must exist");
    let mut seen = Vec::new();
    while let Ok(alert) = state.alerts.try_recv() {
        seen.push(alert.table);
    }
    assert!(
        seen.contains(&table.as_str()),
        "expected an alert for {table}, saw {seen:?}"
    );
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
