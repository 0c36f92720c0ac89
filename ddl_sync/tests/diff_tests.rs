//! Differ and compiler behavior on whole schemas

use pretty_assertions::assert_eq;
use rstest::rstest;

use ddl_sync::schema::action::{Action, TableActionKind};
use ddl_sync::schema::types::{Column, Constraint, EnumType, Index, IndexKind, Schema, Table};
use ddl_sync::schema::{compile_all, diff, SchemaDiff};

fn schema(tables: Vec<Table>, enums: Vec<EnumType>) -> Schema {
    Schema { tables, enums }
}

fn users() -> Table {
    Table::new("users")
        .with_column(Column::new("id", "serial").primary_key().auto_increment())
        .with_column(Column::new("email", "text").constraint(Constraint::Unique))
}

fn sql(desired: &Schema, observed: &Schema) -> Vec<String> {
    compile_all(&diff(desired, observed)).unwrap()
}

fn summaries(actions: &[Action]) -> Vec<String> {
    actions.iter().map(Action::describe).collect()
}

#[test]
fn test_create_table_with_unique_column() {
    let desired = schema(vec![users()], vec![]);
    let observed = Schema::new();

    let actions = diff(&desired, &observed);
    assert_eq!(
        summaries(&actions),
        vec!["CreateTable users", "AddConstraint users.email"]
    );
    assert_eq!(
        sql(&desired, &observed),
        vec![
            "CREATE TABLE users (id SERIAL PRIMARY KEY, email text NOT NULL)",
            "ALTER TABLE users ADD CONSTRAINT uq_users_email UNIQUE (email)",
        ]
    );
}

#[test]
fn test_drop_removed_column() {
    let desired = schema(vec![users()], vec![]);
    let observed = schema(
        vec![users().with_column(Column::new("age", "int4").nullable(true))],
        vec![],
    );

    assert_eq!(
        sql(&desired, &observed),
        vec!["ALTER TABLE users DROP COLUMN age"]
    );
}

#[test]
fn test_add_enum_value() {
    let desired = schema(vec![], vec![EnumType::new("status", &["a", "b", "c"])]);
    let observed = schema(vec![], vec![EnumType::new("status", &["a", "b"])]);

    assert_eq!(
        sql(&desired, &observed),
        vec!["ALTER TYPE status ADD VALUE 'c'"]
    );
}

#[test]
fn test_enum_value_removal_is_not_diffed() {
    let desired = schema(vec![], vec![EnumType::new("status", &["a"])]);
    let observed = schema(vec![], vec![EnumType::new("status", &["a", "b"])]);

    assert!(diff(&desired, &observed).is_empty());
}

#[test]
fn test_foreign_key_change_is_drop_then_add() {
    let posts = |on_delete: Option<&str>| {
        Table::new("posts")
            .with_column(Column::new("id", "serial").primary_key().auto_increment())
            .with_column(Column::new("author_id", "int4").constraint(Constraint::ForeignKey {
                references: "users(id)".to_string(),
                on_delete: on_delete.map(str::to_string),
            }))
    };
    let desired = schema(vec![users(), posts(Some("CASCADE"))], vec![]);
    let observed = schema(vec![users(), posts(None)], vec![]);

    let actions = diff(&desired, &observed);
    assert_eq!(
        summaries(&actions),
        vec!["DropConstraint posts.author_id", "AddConstraint posts.author_id"]
    );
    assert_eq!(
        compile_all(&actions).unwrap(),
        vec![
            "ALTER TABLE posts DROP CONSTRAINT fk_posts_author_id",
            "ALTER TABLE posts ADD CONSTRAINT fk_posts_author_id FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE",
        ]
    );
}

#[test]
fn test_foreign_key_retarget_is_drop_then_add() {
    let memberships = |references: &str| {
        Table::new("memberships")
            .with_column(Column::new("id", "serial").primary_key().auto_increment())
            .with_column(Column::new("owner_id", "int4").constraint(Constraint::foreign_key(references)))
    };
    let teams = Table::new("teams").with_column(Column::new("id", "serial").primary_key().auto_increment());
    let desired = schema(vec![users(), teams.clone(), memberships("teams(id)")], vec![]);
    let observed = schema(vec![users(), teams, memberships("users(id)")], vec![]);

    let actions = diff(&desired, &observed);
    assert_eq!(
        summaries(&actions),
        vec!["DropConstraint memberships.owner_id", "AddConstraint memberships.owner_id"]
    );
    assert_eq!(
        compile_all(&actions).unwrap(),
        vec![
            "ALTER TABLE memberships DROP CONSTRAINT fk_memberships_owner_id",
            "ALTER TABLE memberships ADD CONSTRAINT fk_memberships_owner_id FOREIGN KEY (owner_id) REFERENCES teams(id)",
        ]
    );
}

#[test]
fn test_index_replacement_creates_before_dropping() {
    let table = |index: Index| users().with_index(index);
    let desired = schema(
        vec![table(Index::new("idx_users_unique_email", IndexKind::Unique, &["email"]))],
        vec![],
    );
    let observed = schema(
        vec![table(Index::new("idx_users_index_email", IndexKind::Plain, &["email"]))],
        vec![],
    );

    assert_eq!(
        sql(&desired, &observed),
        vec![
            "CREATE UNIQUE INDEX idx_users_unique_email ON users (email)",
            "DROP INDEX idx_users_index_email",
        ]
    );
}

#[rstest]
#[case::type_change(
    Column::new("score", "int8"),
    Column::new("score", "int4"),
    "ALTER TABLE users ALTER COLUMN score TYPE int8"
)]
#[case::uuid_cast(
    Column::new("token", "uuid"),
    Column::new("token", "text"),
    "ALTER TABLE users ALTER COLUMN token TYPE uuid USING token::uuid"
)]
#[case::drop_not_null(
    Column::new("bio", "text").nullable(true),
    Column::new("bio", "text"),
    "ALTER TABLE users ALTER COLUMN bio DROP NOT NULL"
)]
#[case::set_not_null(
    Column::new("bio", "text"),
    Column::new("bio", "text").nullable(true),
    "ALTER TABLE users ALTER COLUMN bio SET NOT NULL"
)]
#[case::set_default(
    Column::new("active", "bool").default("true"),
    Column::new("active", "bool"),
    "ALTER TABLE users ALTER COLUMN active SET DEFAULT true"
)]
#[case::drop_default(
    Column::new("active", "bool"),
    Column::new("active", "bool").default("true"),
    "ALTER TABLE users ALTER COLUMN active DROP DEFAULT"
)]
#[case::drop_unique(
    Column::new("handle", "text"),
    Column::new("handle", "text").constraint(Constraint::Unique),
    "ALTER TABLE users DROP CONSTRAINT uq_users_handle"
)]
fn test_single_column_change(
    #[case] desired_column: Column,
    #[case] observed_column: Column,
    #[case] expected: &str,
) {
    let desired = schema(vec![users().with_column(desired_column)], vec![]);
    let observed = schema(vec![users().with_column(observed_column)], vec![]);

    assert_eq!(sql(&desired, &observed), vec![expected]);
}

#[test]
fn test_new_column_carries_its_constraints() {
    let desired = schema(
        vec![users().with_column(
            Column::new("team_id", "int4")
                .nullable(true)
                .constraint(Constraint::foreign_key("teams(id)")),
        )],
        vec![],
    );
    let observed = schema(vec![users()], vec![]);

    assert_eq!(
        sql(&desired, &observed),
        vec![
            "ALTER TABLE users ADD COLUMN team_id int4",
            "ALTER TABLE users ADD CONSTRAINT fk_users_team_id FOREIGN KEY (team_id) REFERENCES teams(id)",
        ]
    );
}

fn rich_desired() -> Schema {
    schema(
        vec![
            users()
                .with_column(Column::new("role", "role"))
                .with_index(Index::new("idx_users_index_role", IndexKind::Plain, &["role"])),
            Table::new("sessions")
                .with_column(Column::new("id", "serial").primary_key().auto_increment())
                .with_column(
                    Column::new("user_id", "int4").constraint(Constraint::foreign_key("users(id)")),
                ),
        ],
        vec![
            EnumType::new("role", &["admin", "member"]),
            EnumType::new("status", &["active", "banned", "deleted"]),
        ],
    )
}

fn rich_observed() -> Schema {
    schema(
        vec![
            users().with_column(Column::new("legacy", "text").nullable(true)),
            Table::new("audit_log").with_column(Column::new("id", "serial").primary_key()),
        ],
        vec![
            EnumType::new("status", &["active", "banned"]),
            EnumType::new("old_kind", &["x"]),
        ],
    )
}

#[test]
fn test_actions_follow_phase_order() {
    let actions = diff(&rich_desired(), &rich_observed());

    assert_eq!(
        summaries(&actions),
        vec![
            "CreateEnum role",
            "DropEnum old_kind",
            "AddEnumValue status 'deleted'",
            "CreateTable sessions",
            "AddConstraint sessions.user_id",
            "DropTable audit_log",
            "CreateIndex users.idx_users_index_role",
            "DropColumn users.legacy",
            "CreateColumn users.role",
        ]
    );

    let position = |kind: TableActionKind| {
        actions
            .iter()
            .position(|a| matches!(a, Action::Table(t) if t.kind == kind))
            .unwrap()
    };
    assert!(position(TableActionKind::CreateTable) < position(TableActionKind::DropTable));
    assert!(position(TableActionKind::DropColumn) < position(TableActionKind::CreateColumn));
}

#[test]
fn test_diff_is_deterministic() {
    let first = SchemaDiff::generate(&rich_desired(), &rich_observed());
    let second = SchemaDiff::generate(&rich_desired(), &rich_observed());

    assert_eq!(first, second);
    assert_eq!(first.to_sql().unwrap(), second.to_sql().unwrap());
}

#[test]
fn test_desired_schema_diffs_clean_against_itself() {
    let desired = rich_desired();
    let diff = SchemaDiff::generate(&desired, &desired);

    assert!(diff.is_empty());
    assert!(diff.to_sql().unwrap().is_empty());
}

#[test]
fn test_actions_serialize_for_json_output() {
    let actions = diff(&schema(vec![users()], vec![]), &Schema::new());
    let json = serde_json::to_value(&actions).unwrap();

    assert_eq!(json[0]["kind"], "CreateTable");
    assert_eq!(json[0]["table"]["name"], "users");
    assert_eq!(json[1]["constraint"]["type"], "unique");
}
