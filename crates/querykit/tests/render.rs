//! Rendering through the public API only.

use querykit::{
    BuildError, Dialect, Entity, Field, FromRow, Model, OrmResult, Relation, Row, Table,
    ValuesQuery, Value, args, select,
};

static USERS: Table = Table {
    name: "users",
    alias: "u",
    fields: &[
        Field::new("id").pk().sql_type("int8"),
        Field::new("email").column("email_address"),
        Field::new("team_id"),
    ],
    relations: &[
        Relation::belongs_to("Team", teams, &["team_id"], &["id"]),
        Relation::has_many("Posts", posts, &["id"], &["user_id"]),
    ],
};

static TEAMS: Table = Table {
    name: "teams",
    alias: "team",
    fields: &[Field::new("id").pk(), Field::new("name")],
    relations: &[],
};

static POSTS: Table = Table {
    name: "posts",
    alias: "post",
    fields: &[Field::new("id").pk(), Field::new("user_id"), Field::new("body")],
    relations: &[],
};

fn teams() -> &'static Table {
    &TEAMS
}

fn posts() -> &'static Table {
    &POSTS
}

#[derive(Debug, Clone)]
struct User {
    id: i64,
    email: String,
    team_id: Option<i64>,
}

impl FromRow for User {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email_address")?,
            team_id: row.get("team_id")?,
        })
    }
}

impl Entity for User {
    fn field_value(&self, field: &str) -> Value {
        match field {
            "id" => self.id.into(),
            "email" => self.email.clone().into(),
            "team_id" => self.team_id.into(),
            _ => Value::Null,
        }
    }
}

impl Model for User {
    fn table() -> &'static Table {
        &USERS
    }
}

#[test]
fn renders_literal_and_template_from_one_query() {
    let q = select()
        .model::<User>()
        .relation_with("Team", |s| s.column("name"))
        .where_expr("?TableAlias.email_address LIKE ?", args!["%@example.com"])
        .order(["id DESC"])
        .limit(20);

    assert_eq!(
        q.to_sql(Dialect::Postgres).unwrap(),
        "SELECT \"u\".\"id\", \"u\".\"email_address\", \"u\".\"team_id\", \
         \"team\".\"name\" AS \"team__name\" \
         FROM \"users\" AS \"u\" \
         LEFT JOIN \"teams\" AS \"team\" ON (\"team\".\"id\" = \"u\".\"team_id\") \
         WHERE (\"u\".email_address LIKE '%@example.com') \
         ORDER BY \"id\" DESC LIMIT 20"
    );
    assert_eq!(
        q.to_template_sql(Dialect::Postgres).unwrap(),
        "SELECT \"u\".\"id\", \"u\".\"email_address\", \"u\".\"team_id\", \
         \"team\".\"name\" AS \"team__name\" \
         FROM \"users\" AS \"u\" \
         LEFT JOIN \"teams\" AS \"team\" ON (\"team\".\"id\" = \"u\".\"team_id\") \
         WHERE (\"u\".email_address LIKE ?) \
         ORDER BY \"id\" DESC LIMIT 20"
    );
}

#[test]
fn mysql_quotes_with_backticks() {
    let q = select()
        .model::<User>()
        .column(["id", "email"])
        .where_expr("team_id IN (?)", args![vec![1, 2]]);

    assert_eq!(
        q.to_sql(Dialect::MySql).unwrap(),
        "SELECT `u`.`id`, `u`.`email_address` FROM `users` AS `u` WHERE (team_id IN (1, 2))"
    );

    let (sql, params) = q.to_sql_with_args(Dialect::MySql).unwrap();
    assert_eq!(
        sql,
        "SELECT `u`.`id`, `u`.`email_address` FROM `users` AS `u` WHERE (team_id IN (?, ?))"
    );
    assert_eq!(params, vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn bulk_update_from_values_cte() {
    let users = vec![
        User { id: 1, email: "a@x".into(), team_id: None },
        User { id: 2, email: "b@x".into(), team_id: Some(4) },
    ];

    let q = select()
        .with("_data", ValuesQuery::from_models(&users))
        .table(["_data"])
        .column(["id"]);

    assert_eq!(
        q.to_sql(Dialect::Postgres).unwrap(),
        "WITH \"_data\" (\"id\", \"email_address\", \"team_id\") AS \
         (VALUES (1::int8, 'a@x', NULL), (2::int8, 'b@x', 4)) \
         SELECT \"id\" FROM \"_data\""
    );
}

#[test]
fn count_of_paginated_query() {
    let q = select()
        .model::<User>()
        .where_expr("team_id = ?", args![4])
        .order(["id"])
        .limit(10)
        .offset(30);

    assert_eq!(
        q.to_count_sql(Dialect::Sqlite).unwrap(),
        "SELECT count(*) FROM \"users\" AS \"u\" WHERE (team_id = 4)"
    );
}

#[test]
fn first_build_error_wins() {
    let q = select()
        .model::<User>()
        .relation("Manager")
        .join_on("x", vec![]);

    assert_eq!(
        q.err(),
        Some(&BuildError::RelationNotFound {
            table: "users".into(),
            relation: "Manager".into(),
        })
    );
    assert!(q.to_sql(Dialect::Postgres).is_err());
}

#[test]
fn relation_paths_are_bounded() {
    let path = vec!["Team"; querykit::query::MAX_RELATION_DEPTH + 1].join(".");
    let q = select().model::<User>().relation(&path);
    assert!(matches!(
        q.err(),
        Some(BuildError::RelationDepthExceeded { .. })
    ));
}
