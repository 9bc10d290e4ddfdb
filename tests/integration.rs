//! Integration tests for taskdb
//!
//! Tests full flows from record types through generated SQL to the
//! in-memory database and its durable file.

use taskdb::records::{self, AccountStatus, Player, PlayerRole, Tag, Team, TeamMember};
use taskdb::{Error, Filter, Operator, OrderDirection, Session, StoreConfig, Value};
use taskql::{BuildError, ColumnSpec, ColumnType};
use tempfile::TempDir;

/// Helper to open a session in a fresh world directory
fn setup_session() -> (TempDir, Session) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let session = reopen(&tmp);
    (tmp, session)
}

fn reopen(tmp: &TempDir) -> Session {
    Session::open(StoreConfig::for_world(tmp.path()), records::registry().expect("registry"))
        .expect("Failed to open session")
}

fn insert_player(session: &Session, name: &str) -> Player {
    let player = Player::new(name);
    assert_eq!(session.insert(&player).unwrap().execute().unwrap(), 1);
    player
}

fn column_names(session: &Session, table: &str) -> Vec<String> {
    session
        .execute_raw(&format!("PRAGMA table_info({})", table))
        .unwrap()
        .into_rows()
        .rows()
        .filter_map(|row| row.get("name").and_then(Value::as_str).map(String::from))
        .collect()
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[test]
fn test_open_creates_file_and_tables() {
    let (tmp, session) = setup_session();
    assert!(tmp.path().join("task.db").exists());
    assert_eq!(session.table_names().unwrap(), vec!["players", "tags", "team_members", "teams"]);
}

#[test]
fn test_close_and_reopen_keeps_rows() {
    let (tmp, session) = setup_session();
    let alice = insert_player(&session, "alice");
    session.close().unwrap();

    let session = reopen(&tmp);
    let players = session.select_all::<Player>().unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].id, alice.id);
}

#[test]
fn test_discard_loses_unsaved_rows() {
    let (tmp, session) = setup_session();
    insert_player(&session, "alice");
    session.discard();

    let session = reopen(&tmp);
    assert!(session.select_all::<Player>().unwrap().is_empty());
}

#[test]
fn test_save_to_writes_a_usable_copy() {
    let (tmp, session) = setup_session();
    insert_player(&session, "alice");
    let copy = tmp.path().join("copy/task.db");
    std::fs::create_dir_all(copy.parent().unwrap()).unwrap();
    session.save_to(&copy).unwrap();

    let config = StoreConfig {
        path: copy,
        ..Default::default()
    };
    let restored = Session::open(config, records::registry().unwrap()).unwrap();
    assert_eq!(restored.select_all::<Player>().unwrap().len(), 1);
}

#[test]
fn test_transaction_rolls_back_on_error() {
    let (_tmp, session) = setup_session();
    let result: taskdb::Result<()> = session.transaction(|s| {
        s.insert(&Player::new("alice"))?.execute()?;
        Err(Error::Config {
            message: "abort".to_string(),
        })
    });
    assert!(result.is_err());
    assert!(session.select_all::<Player>().unwrap().is_empty());
}

// =============================================================================
// INSERT / SELECT
// =============================================================================

#[test]
fn test_insert_fills_column_defaults() {
    let (_tmp, session) = setup_session();
    insert_player(&session, "alice");

    let players = session.select_all::<Player>().unwrap();
    assert_eq!(players.len(), 1);
    let alice = &players[0];
    assert_eq!(alice.player_name.as_deref(), Some("alice"));
    assert_eq!(alice.role, Some(PlayerRole::Guest));
    assert_eq!(alice.status, Some(AccountStatus::Active));
    assert_eq!(alice.points, Some(0));
    assert!(alice.create_time.is_some());
    assert!(!alice.online);
}

#[test]
fn test_insert_all_is_atomic() {
    let (_tmp, session) = setup_session();
    let alice = Player::new("alice");
    let mut clash = Player::new("alice");
    clash.player_name = alice.player_name.clone();
    let batch = vec![Player::new("bob"), alice, clash];

    let err = session.insert_all(&batch).unwrap().execute().unwrap_err();
    assert!(matches!(err, Error::Execution { .. }));
    assert!(session.select_all::<Player>().unwrap().is_empty());
}

#[test]
fn test_check_constraint_violation_is_reported() {
    let (_tmp, session) = setup_session();
    let owner = insert_player(&session, "alice");
    let mut team = Team::new("Red", "RED1", owner.id.unwrap());
    team.level = Some(200);
    let err = session.insert(&team).unwrap().execute().unwrap_err();
    assert!(matches!(err, Error::Execution { .. }));
}

#[test]
fn test_inherited_columns_round_trip() {
    let (_tmp, session) = setup_session();
    let owner = insert_player(&session, "alice");
    let team = Team::new("Red", "RED1", owner.id.unwrap());
    session.insert(&team).unwrap().execute().unwrap();
    let member = TeamMember::new(team.id.unwrap(), owner.id.unwrap(), owner.id.unwrap());
    session.insert(&member).unwrap().execute().unwrap();

    let members = session.select_all::<TeamMember>().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].base.id, member.base.id);
    assert_eq!(members[0].base.operator_id, owner.id);
    assert!(members[0].base.create_time.is_some());
}

#[test]
fn test_select_with_conditions_and_paging() {
    let (_tmp, session) = setup_session();
    for (name, points) in [("alice", 30), ("bob", 10), ("carol", 20), ("dave", 5)] {
        let mut player = Player::new(name);
        player.points = Some(points);
        session.insert(&player).unwrap().execute().unwrap();
    }

    let names: Vec<String> = session
        .select::<Player>()
        .unwrap()
        .where_("points", Operator::Ge, 10)
        .order_by(OrderDirection::Desc, &["points"])
        .limit(2)
        .offset(1)
        .fetch_all()
        .unwrap()
        .into_iter()
        .filter_map(|p| p.player_name)
        .collect();
    assert_eq!(names, vec!["carol", "bob"]);

    let count = session
        .select::<Player>()
        .unwrap()
        .where_eq("points", 5)
        .group(true, |g| g.where_like("player_name", "a%"))
        .count()
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_select_by_example() {
    let (_tmp, session) = setup_session();
    let mut admin = Player::new("alice");
    admin.role = Some(PlayerRole::Admin);
    session.insert(&admin).unwrap().execute().unwrap();
    insert_player(&session, "bob");

    let example = Player {
        role: Some(PlayerRole::Admin),
        ..Default::default()
    };
    let found = session.select_by_compare(&example, None).unwrap().fetch_all().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, admin.id);
}

#[test]
fn test_join_fetches_own_columns() {
    let (_tmp, session) = setup_session();
    let alice = insert_player(&session, "alice");
    let bob = insert_player(&session, "bob");
    session.insert(&Team::new("Red", "RED1", alice.id.unwrap())).unwrap().execute().unwrap();
    session.insert(&Team::new("Blue", "BLUE1", bob.id.unwrap())).unwrap().execute().unwrap();

    let team = session
        .select::<Team>()
        .unwrap()
        .join::<Player>("owner_id", "id")
        .where_eq("players.player_name", "bob")
        .fetch_one()
        .unwrap()
        .expect("bob's team");
    assert_eq!(team.name.as_deref(), Some("Blue"));
    assert_eq!(team.owner_id, bob.id);
}

#[test]
fn test_select_by_id_ignores_other_conditions() {
    let (_tmp, session) = setup_session();
    let alice = insert_player(&session, "alice");
    let found = session
        .select_entity(&alice)
        .unwrap()
        .where_eq("player_name", "nobody")
        .by_id()
        .fetch_one()
        .unwrap();
    assert_eq!(found.map(|p| p.id), Some(alice.id));
}

// =============================================================================
// UPDATE
// =============================================================================

#[test]
fn test_update_by_compare_writes_changed_columns() {
    let (_tmp, session) = setup_session();
    let before = insert_player(&session, "alice");
    let mut after = before.clone();
    after.points = Some(42);
    after.online = true;

    let sql = session.update_by_compare(&after, &before).unwrap().by_id().build().unwrap().unwrap();
    assert_eq!(sql.text, "UPDATE players SET points = ? WHERE id = ?");

    assert_eq!(session.update_by_compare(&after, &before).unwrap().by_id().execute().unwrap(), 1);
    let stored = session.select_entity(&after).unwrap().by_id().fetch_one().unwrap().unwrap();
    assert_eq!(stored.points, Some(42));
}

#[test]
fn test_update_by_compare_without_changes_is_a_no_op() {
    let (_tmp, session) = setup_session();
    let player = insert_player(&session, "alice");
    let same = player.clone();
    assert_eq!(session.update_by_compare(&same, &player).unwrap().by_id().execute().unwrap(), 0);
}

#[test]
fn test_update_by_id_wins_over_conditions() {
    let (_tmp, session) = setup_session();
    let mut alice = insert_player(&session, "alice");
    alice.display_name = Some("Alice".to_string());

    let updated = session
        .update_entity(&alice)
        .unwrap()
        .where_eq("player_name", "nobody")
        .by_id()
        .execute()
        .unwrap();
    assert_eq!(updated, 1);
}

#[test]
fn test_update_by_id_requires_an_entity() {
    let (_tmp, session) = setup_session();
    let err = session.update::<Player>().unwrap().set("points", 1).by_id().execute().unwrap_err();
    assert!(matches!(err, Error::NoEntity { .. }));
}

#[test]
fn test_update_requires_where() {
    let (_tmp, session) = setup_session();
    let err = session.update::<Player>().unwrap().set("points", 1).execute().unwrap_err();
    assert!(matches!(
        err,
        Error::Build(BuildError::MissingWhere { operation: "UPDATE" })
    ));
}

#[test]
fn test_update_to_null() {
    let (_tmp, session) = setup_session();
    let mut before = Player::new("alice");
    before.display_name = Some("Alice".to_string());
    session.insert(&before).unwrap().execute().unwrap();

    let mut after = before.clone();
    after.display_name = None;
    session.update_by_compare(&after, &before).unwrap().by_id().execute().unwrap();

    let stored = session.select_entity(&after).unwrap().by_id().fetch_one().unwrap().unwrap();
    assert_eq!(stored.display_name, None);
}

// =============================================================================
// DELETE
// =============================================================================

#[test]
fn test_delete_by_id() {
    let (_tmp, session) = setup_session();
    let alice = insert_player(&session, "alice");
    insert_player(&session, "bob");

    assert_eq!(session.delete_by_id(&alice).unwrap().execute().unwrap(), 1);
    let left = session.select_all::<Player>().unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].player_name.as_deref(), Some("bob"));
}

#[test]
fn test_delete_with_grouped_conditions() {
    let (_tmp, session) = setup_session();
    let mut admin = Player::new("alice");
    admin.role = Some(PlayerRole::Admin);
    admin.level = Some(1);
    session.insert(&admin).unwrap().execute().unwrap();
    let mut suspended = Player::new("bob");
    suspended.status = Some(AccountStatus::Suspended);
    session.insert(&suspended).unwrap().execute().unwrap();
    insert_player(&session, "carol");

    let deleted = session
        .delete::<Player>()
        .unwrap()
        .where_eq("status", AccountStatus::Suspended.as_str())
        .group(true, |g| g.where_in("role", ["ADMIN", "MEMBER"]).where_("level", Operator::Lt, 5))
        .execute()
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(session.select_all::<Player>().unwrap().len(), 1);
}

#[test]
fn test_empty_in_list_is_rejected() {
    let (_tmp, session) = setup_session();
    let err = session
        .delete::<Player>()
        .unwrap()
        .where_in("role", Vec::<String>::new())
        .execute()
        .unwrap_err();
    assert!(matches!(err, Error::Build(BuildError::EmptyList { .. })));
}

#[test]
fn test_delete_without_where_is_rejected() {
    let (_tmp, session) = setup_session();
    insert_player(&session, "alice");
    assert!(session.delete::<Player>().unwrap().execute().is_err());
    assert_eq!(session.select_all::<Player>().unwrap().len(), 1);
}

#[test]
fn test_delete_cascades_to_owned_rows() {
    let (_tmp, session) = setup_session();
    let alice = insert_player(&session, "alice");
    session.insert(&Team::new("Red", "RED1", alice.id.unwrap())).unwrap().execute().unwrap();
    session.delete_by_id(&alice).unwrap().execute().unwrap();
    assert!(session.select_all::<Team>().unwrap().is_empty());
}

#[test]
fn test_missing_owner_is_rejected() {
    let (_tmp, session) = setup_session();
    let team = Team::new("Red", "RED1", uuid::Uuid::new_v4());
    let err = session.insert(&team).unwrap().execute().unwrap_err();
    assert!(matches!(err, Error::Execution { .. }));
}

// =============================================================================
// DDL
// =============================================================================

#[test]
fn test_drop_cascade_removes_dependents() {
    let (_tmp, session) = setup_session();
    session.drop_table().entity::<Player>().cascade(true).execute().unwrap();
    assert!(session.table_names().unwrap().is_empty());
}

#[test]
fn test_strict_drop_of_missing_table_fails() {
    let (_tmp, session) = setup_session();
    assert!(session.drop_table().table("scratch").execute().is_err());
    assert!(session.drop_table_if_exists().table("scratch").execute().is_ok());
}

#[test]
fn test_create_after_drop() {
    let (_tmp, session) = setup_session();
    session.drop_table().entity::<Tag>().execute().unwrap();
    assert!(!session.table_names().unwrap().contains(&"tags".to_string()));
    session.create_table::<Tag>().execute().unwrap();
    assert!(session.table_names().unwrap().contains(&"tags".to_string()));
}

#[test]
fn test_alter_add_column_in_place() {
    let (_tmp, session) = setup_session();
    session
        .alter_table::<Player>()
        .add_column(ColumnSpec::new("nickname", ColumnType::Text))
        .execute()
        .unwrap();
    assert!(column_names(&session, "players").contains(&"nickname".to_string()));
}

#[test]
fn test_alter_rebuild_preserves_rows() {
    let (_tmp, session) = setup_session();
    let mut alice = Player::new("alice");
    alice.points = Some(7);
    alice.display_name = Some("Alice".to_string());
    session.insert(&alice).unwrap().execute().unwrap();
    session.insert(&Team::new("Red", "RED1", alice.id.unwrap())).unwrap().execute().unwrap();

    let mut level = ColumnSpec::new("level", ColumnType::Integer);
    level.default = Some("1".to_string());
    session
        .alter_table::<Player>()
        .drop_column("display_name")
        .rename_column("points", "score")
        .modify_column(level)
        .execute()
        .unwrap();

    let columns = column_names(&session, "players");
    assert!(!columns.contains(&"display_name".to_string()));
    assert!(columns.contains(&"score".to_string()));

    let score = session
        .execute_raw("SELECT score FROM players")
        .unwrap()
        .into_rows()
        .scalar()
        .and_then(Value::as_i64);
    assert_eq!(score, Some(7));

    let indexes = session
        .execute_raw("SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'idx_players_player_name'")
        .unwrap()
        .into_rows();
    assert_eq!(indexes.len(), 1);
    assert_eq!(session.select_all::<Team>().unwrap().len(), 1);
}

#[test]
fn test_alter_rebuild_inside_transaction_is_rejected() {
    let (_tmp, session) = setup_session();
    let err = session
        .transaction(|s| s.alter_table::<Player>().drop_column("display_name").execute())
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedAlter { .. }));
}

#[test]
fn test_schema_survives_reopen_after_alter() {
    let (tmp, session) = setup_session();
    session
        .alter_table::<Player>()
        .add_column(ColumnSpec::new("nickname", ColumnType::Text))
        .execute()
        .unwrap();
    session.close().unwrap();

    let session = reopen(&tmp);
    assert!(column_names(&session, "players").contains(&"nickname".to_string()));
}
