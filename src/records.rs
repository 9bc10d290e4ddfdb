//! Built-in record types
//!
//! Persisted shapes for players, teams, tags and team memberships. Fields
//! are `Option` so that a partially populated value can serve as a query
//! example or a diff snapshot.

use chrono::NaiveDateTime;
use std::time::Duration;
use taskql::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::query::SqlField;
use crate::schema::{Column, Columns, Entity, FieldCheck, FieldDef, FieldError, Reference, SchemaRegistry};

const HEX_COLOR: &str = "#[0-9A-F][0-9A-F][0-9A-F][0-9A-F][0-9A-F][0-9A-F]";

crate::text_enum! {
    pub enum PlayerRole {
        Admin => "ADMIN",
        Member => "MEMBER",
        Guest => "GUEST",
    }
}

crate::text_enum! {
    pub enum AccountStatus {
        Active => "ACTIVE",
        Suspended => "SUSPENDED",
        Deleted => "DELETED",
    }
}

crate::text_enum! {
    pub enum TeamRole {
        Admin => "ADMIN",
        Member => "MEMBER",
        Guest => "GUEST",
    }
}

crate::text_enum! {
    pub enum MemberStatus {
        Active => "ACTIVE",
        Suspended => "SUSPENDED",
        Left => "LEFT",
    }
}

crate::text_enum! {
    /// Visibility of a tag
    pub enum TagScope {
        System => "SYSTEM",
        Public => "PUBLIC",
        Team => "TEAM",
        Private => "PRIVATE",
    }
}

/// Registry holding every built-in record type
pub fn registry() -> Result<SchemaRegistry> {
    SchemaRegistry::new()
        .with::<Player>()?
        .with::<Team>()?
        .with::<Tag>()?
        .with::<TeamMember>()
}

fn uuid_key(field: &'static str) -> FieldDef {
    FieldDef::of::<Uuid>(field)
        .not_null()
        .check(FieldCheck::Uuid)
        .column(Column::new(field).primary_key())
}

fn timestamp(field: &'static str) -> FieldDef {
    FieldDef::of::<NaiveDateTime>(field).column(Column::new(field).default_value("CURRENT_TIMESTAMP"))
}

fn counter<T: SqlField>(field: &'static str) -> FieldDef {
    FieldDef::of::<T>(field)
        .not_null()
        .check(FieldCheck::Min(0.0))
        .column(Column::new(field).default_value("0"))
}

// ============================================================================
// Player
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Player {
    pub id: Option<Uuid>,
    pub player_name: Option<String>,
    pub display_name: Option<String>,
    pub points: Option<i64>,
    pub level: Option<i32>,
    pub role: Option<PlayerRole>,
    pub status: Option<AccountStatus>,
    pub create_time: Option<NaiveDateTime>,
    pub update_time: Option<NaiveDateTime>,
    pub total_task_duration: Option<Duration>,
    /// Runtime only
    pub online: bool,
}

impl Player {
    /// New player with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            player_name: Some(name.into()),
            ..Default::default()
        }
    }
}

impl Columns for Player {
    fn fields() -> Vec<FieldDef> {
        vec![
            uuid_key("id"),
            FieldDef::of::<String>("player_name")
                .not_null()
                .check(FieldCheck::Length { min: 1, max: 256 })
                .column(Column::new("player_name").unique().index("idx_players_player_name")),
            FieldDef::of::<String>("display_name")
                .check(FieldCheck::Length { min: 1, max: 256 })
                .column(Column::default().unique()),
            counter::<i64>("points"),
            counter::<i32>("level"),
            FieldDef::of::<PlayerRole>("role")
                .not_null()
                .column(Column::new("role").default_value("'GUEST'")),
            FieldDef::of::<AccountStatus>("status")
                .not_null()
                .column(Column::new("status").default_value("'ACTIVE'")),
            timestamp("create_time"),
            timestamp("update_time"),
            FieldDef::of::<Duration>("total_task_duration").column(Column::default().default_value("0")),
            FieldDef::of::<bool>("online"),
        ]
    }

    fn get(&self, column: &str) -> Value {
        match column {
            "id" => self.id.to_value(),
            "player_name" => self.player_name.to_value(),
            "display_name" => self.display_name.to_value(),
            "points" => self.points.to_value(),
            "level" => self.level.to_value(),
            "role" => self.role.to_value(),
            "status" => self.status.to_value(),
            "create_time" => self.create_time.to_value(),
            "update_time" => self.update_time.to_value(),
            "total_task_duration" => self.total_task_duration.to_value(),
            _ => Value::Null,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> std::result::Result<(), FieldError> {
        match column {
            "id" => self.id = SqlField::from_value(value)?,
            "player_name" => self.player_name = SqlField::from_value(value)?,
            "display_name" => self.display_name = SqlField::from_value(value)?,
            "points" => self.points = SqlField::from_value(value)?,
            "level" => self.level = SqlField::from_value(value)?,
            "role" => self.role = SqlField::from_value(value)?,
            "status" => self.status = SqlField::from_value(value)?,
            "create_time" => self.create_time = SqlField::from_value(value)?,
            "update_time" => self.update_time = SqlField::from_value(value)?,
            "total_task_duration" => self.total_task_duration = SqlField::from_value(value)?,
            other => return Err(FieldError::UnknownColumn(other.to_string())),
        }
        Ok(())
    }
}

impl Entity for Player {
    const TABLE: &'static str = "players";
}

// ============================================================================
// Team
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Team {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub team_code: Option<String>,
    pub owner_id: Option<Uuid>,
    pub total_members: Option<i32>,
    pub reward_points: Option<i64>,
    pub level: Option<i32>,
    pub create_time: Option<NaiveDateTime>,
    pub disband_time: Option<NaiveDateTime>,
}

impl Team {
    pub fn new(name: impl Into<String>, code: impl Into<String>, owner: Uuid) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            name: Some(name.into()),
            team_code: Some(code.into()),
            owner_id: Some(owner),
            ..Default::default()
        }
    }
}

impl Columns for Team {
    fn fields() -> Vec<FieldDef> {
        vec![
            uuid_key("id"),
            FieldDef::of::<String>("name")
                .not_null()
                .check(FieldCheck::Length { min: 1, max: 64 })
                .column(Column::default()),
            FieldDef::of::<String>("description").column(Column::default()),
            FieldDef::of::<String>("team_code")
                .not_null()
                .check(FieldCheck::Length { min: 4, max: 16 })
                .column(Column::default().unique()),
            FieldDef::of::<Uuid>("owner_id")
                .not_null()
                .check(FieldCheck::Uuid)
                .column(Column::default().index("idx_teams_owner"))
                .references(Reference::to::<Player>()),
            counter::<i32>("total_members"),
            counter::<i64>("reward_points"),
            FieldDef::of::<i32>("level")
                .not_null()
                .check(FieldCheck::Range { min: 0.0, max: 100.0 })
                .column(Column::default().default_value("0")),
            timestamp("create_time"),
            FieldDef::of::<NaiveDateTime>("disband_time").column(Column::default()),
        ]
    }

    fn get(&self, column: &str) -> Value {
        match column {
            "id" => self.id.to_value(),
            "name" => self.name.to_value(),
            "description" => self.description.to_value(),
            "team_code" => self.team_code.to_value(),
            "owner_id" => self.owner_id.to_value(),
            "total_members" => self.total_members.to_value(),
            "reward_points" => self.reward_points.to_value(),
            "level" => self.level.to_value(),
            "create_time" => self.create_time.to_value(),
            "disband_time" => self.disband_time.to_value(),
            _ => Value::Null,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> std::result::Result<(), FieldError> {
        match column {
            "id" => self.id = SqlField::from_value(value)?,
            "name" => self.name = SqlField::from_value(value)?,
            "description" => self.description = SqlField::from_value(value)?,
            "team_code" => self.team_code = SqlField::from_value(value)?,
            "owner_id" => self.owner_id = SqlField::from_value(value)?,
            "total_members" => self.total_members = SqlField::from_value(value)?,
            "reward_points" => self.reward_points = SqlField::from_value(value)?,
            "level" => self.level = SqlField::from_value(value)?,
            "create_time" => self.create_time = SqlField::from_value(value)?,
            "disband_time" => self.disband_time = SqlField::from_value(value)?,
            other => return Err(FieldError::UnknownColumn(other.to_string())),
        }
        Ok(())
    }
}

impl Entity for Team {
    const TABLE: &'static str = "teams";
}

// ============================================================================
// Tag
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub color_code: Option<String>,
    pub font_color_code: Option<String>,
    pub is_default: Option<bool>,
    pub scope: Option<TagScope>,
    pub owner_id: Option<Uuid>,
    pub create_time: Option<NaiveDateTime>,
    pub update_time: Option<NaiveDateTime>,
    /// Runtime only
    pub linked_task_count: i32,
}

impl Tag {
    /// New tag; an empty description is stored as NULL.
    pub fn new(name: impl Into<String>, description: &str) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            name: Some(name.into()),
            description: (!description.is_empty()).then(|| description.to_string()),
            ..Default::default()
        }
    }

    /// Set the background color and pick a readable font color for it.
    pub fn with_color(mut self, color_code: &str) -> Self {
        self.font_color_code = font_color_for(color_code).map(String::from);
        self.color_code = Some(color_code.to_ascii_uppercase());
        self
    }
}

/// Black text on bright backgrounds, white otherwise; `None` for malformed colors.
pub fn font_color_for(color_code: &str) -> Option<&'static str> {
    let hex = color_code.strip_prefix('#').filter(|h| h.len() == 6)?;
    let channel = |i: usize| u32::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    let (r, g, b) = (channel(0)?, channel(2)?, channel(4)?);
    let brightness = (r * 299 + g * 587 + b * 114) / 1000;
    Some(if brightness > 128 { "#000000" } else { "#FFFFFF" })
}

impl Columns for Tag {
    fn fields() -> Vec<FieldDef> {
        vec![
            uuid_key("id"),
            FieldDef::of::<String>("name")
                .not_null()
                .check(FieldCheck::Length { min: 1, max: 64 })
                .column(Column::default().index("idx_tags_name")),
            FieldDef::of::<String>("description").column(Column::default()),
            FieldDef::of::<String>("color_code")
                .not_null()
                .check(FieldCheck::Glob(HEX_COLOR.to_string()))
                .column(Column::default().default_value("'#FFFFFF'")),
            FieldDef::of::<String>("font_color_code")
                .not_null()
                .check(FieldCheck::Glob(HEX_COLOR.to_string()))
                .column(Column::default().default_value("'#000000'")),
            FieldDef::of::<bool>("is_default")
                .not_null()
                .column(Column::default().default_value("0")),
            FieldDef::of::<TagScope>("scope")
                .not_null()
                .column(Column::default().default_value("'PUBLIC'")),
            FieldDef::of::<Uuid>("owner_id")
                .check(FieldCheck::Uuid)
                .column(Column::default())
                .references(Reference::to::<Player>()),
            timestamp("create_time"),
            timestamp("update_time"),
            FieldDef::of::<i32>("linked_task_count"),
        ]
    }

    fn get(&self, column: &str) -> Value {
        match column {
            "id" => self.id.to_value(),
            "name" => self.name.to_value(),
            "description" => self.description.to_value(),
            "color_code" => self.color_code.to_value(),
            "font_color_code" => self.font_color_code.to_value(),
            "is_default" => self.is_default.to_value(),
            "scope" => self.scope.to_value(),
            "owner_id" => self.owner_id.to_value(),
            "create_time" => self.create_time.to_value(),
            "update_time" => self.update_time.to_value(),
            _ => Value::Null,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> std::result::Result<(), FieldError> {
        match column {
            "id" => self.id = SqlField::from_value(value)?,
            "name" => self.name = SqlField::from_value(value)?,
            "description" => self.description = SqlField::from_value(value)?,
            "color_code" => self.color_code = SqlField::from_value(value)?,
            "font_color_code" => self.font_color_code = SqlField::from_value(value)?,
            "is_default" => self.is_default = SqlField::from_value(value)?,
            "scope" => self.scope = SqlField::from_value(value)?,
            "owner_id" => self.owner_id = SqlField::from_value(value)?,
            "create_time" => self.create_time = SqlField::from_value(value)?,
            "update_time" => self.update_time = SqlField::from_value(value)?,
            other => return Err(FieldError::UnknownColumn(other.to_string())),
        }
        Ok(())
    }
}

impl Entity for Tag {
    const TABLE: &'static str = "tags";
}

// ============================================================================
// Records
// ============================================================================

/// Columns shared by every audit record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseRecord {
    pub id: Option<Uuid>,
    pub create_time: Option<NaiveDateTime>,
    pub operator_id: Option<Uuid>,
}

impl BaseRecord {
    pub fn new(operator: Uuid) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            create_time: None,
            operator_id: Some(operator),
        }
    }
}

impl Columns for BaseRecord {
    fn fields() -> Vec<FieldDef> {
        vec![
            uuid_key("id"),
            FieldDef::of::<NaiveDateTime>("create_time")
                .not_null()
                .column(Column::default().default_value("CURRENT_TIMESTAMP")),
            FieldDef::of::<Uuid>("operator_id")
                .not_null()
                .check(FieldCheck::Uuid)
                .column(Column::default())
                .references(Reference::to::<Player>()),
        ]
    }

    fn get(&self, column: &str) -> Value {
        match column {
            "id" => self.id.to_value(),
            "create_time" => self.create_time.to_value(),
            "operator_id" => self.operator_id.to_value(),
            _ => Value::Null,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> std::result::Result<(), FieldError> {
        match column {
            "id" => self.id = SqlField::from_value(value)?,
            "create_time" => self.create_time = SqlField::from_value(value)?,
            "operator_id" => self.operator_id = SqlField::from_value(value)?,
            other => return Err(FieldError::UnknownColumn(other.to_string())),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamMember {
    pub base: BaseRecord,
    pub team_id: Option<Uuid>,
    pub player_id: Option<Uuid>,
    pub join_time: Option<NaiveDateTime>,
    pub role: Option<TeamRole>,
    pub status: Option<MemberStatus>,
    pub completed_tasks: Option<i32>,
    pub contribution_points: Option<i64>,
    pub total_duration: Option<Duration>,
    pub last_operation_time: Option<NaiveDateTime>,
    pub last_operator_id: Option<Uuid>,
}

impl TeamMember {
    pub fn new(team: Uuid, player: Uuid, operator: Uuid) -> Self {
        Self {
            base: BaseRecord::new(operator),
            team_id: Some(team),
            player_id: Some(player),
            ..Default::default()
        }
    }
}

impl Columns for TeamMember {
    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::of::<Uuid>("team_id")
                .not_null()
                .column(Column::default().index("idx_team_members_pair"))
                .references(Reference::to::<Team>()),
            FieldDef::of::<Uuid>("player_id")
                .not_null()
                .column(Column::default().index("idx_team_members_pair"))
                .references(Reference::to::<Player>()),
            timestamp("join_time"),
            FieldDef::of::<TeamRole>("role")
                .not_null()
                .column(Column::default().default_value("'MEMBER'")),
            FieldDef::of::<MemberStatus>("status")
                .not_null()
                .column(Column::default().default_value("'ACTIVE'")),
            counter::<i32>("completed_tasks"),
            counter::<i64>("contribution_points"),
            FieldDef::of::<Duration>("total_duration").column(Column::default().default_value("0")),
            FieldDef::of::<NaiveDateTime>("last_operation_time").column(Column::default()),
            FieldDef::of::<Uuid>("last_operator_id")
                .column(Column::default())
                .references(Reference::to::<Player>()),
        ]
    }

    fn get(&self, column: &str) -> Value {
        match column {
            "team_id" => self.team_id.to_value(),
            "player_id" => self.player_id.to_value(),
            "join_time" => self.join_time.to_value(),
            "role" => self.role.to_value(),
            "status" => self.status.to_value(),
            "completed_tasks" => self.completed_tasks.to_value(),
            "contribution_points" => self.contribution_points.to_value(),
            "total_duration" => self.total_duration.to_value(),
            "last_operation_time" => self.last_operation_time.to_value(),
            "last_operator_id" => self.last_operator_id.to_value(),
            other => self.base.get(other),
        }
    }

    fn set(&mut self, column: &str, value: Value) -> std::result::Result<(), FieldError> {
        match column {
            "team_id" => self.team_id = SqlField::from_value(value)?,
            "player_id" => self.player_id = SqlField::from_value(value)?,
            "join_time" => self.join_time = SqlField::from_value(value)?,
            "role" => self.role = SqlField::from_value(value)?,
            "status" => self.status = SqlField::from_value(value)?,
            "completed_tasks" => self.completed_tasks = SqlField::from_value(value)?,
            "contribution_points" => self.contribution_points = SqlField::from_value(value)?,
            "total_duration" => self.total_duration = SqlField::from_value(value)?,
            "last_operation_time" => self.last_operation_time = SqlField::from_value(value)?,
            "last_operator_id" => self.last_operator_id = SqlField::from_value(value)?,
            other => return self.base.set(other, value),
        }
        Ok(())
    }
}

impl Entity for TeamMember {
    const TABLE: &'static str = "team_members";

    fn inherited() -> Vec<FieldDef> {
        BaseRecord::fields()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_color() {
        assert_eq!(font_color_for("#FFFFFF"), Some("#000000"));
        assert_eq!(font_color_for("#1a1a1a"), Some("#FFFFFF"));
        assert_eq!(font_color_for("FFFFFF"), None);
        assert_eq!(font_color_for("#GG0000"), None);
    }

    #[test]
    fn test_tag_constructor() {
        let tag = Tag::new("urgent", "").with_color("#ff0000");
        assert_eq!(tag.description, None);
        assert_eq!(tag.color_code.as_deref(), Some("#FF0000"));
        assert_eq!(tag.font_color_code.as_deref(), Some("#FFFFFF"));
    }

    #[test]
    fn test_member_delegates_to_base() {
        let operator = Uuid::new_v4();
        let mut member = TeamMember::new(Uuid::new_v4(), Uuid::new_v4(), operator);
        assert_eq!(member.get("operator_id"), Value::Text(operator.to_string()));

        member.set("completed_tasks", Value::Integer(3)).unwrap();
        member.set("create_time", Value::from("2024-01-02 03:04:05")).unwrap();
        assert_eq!(member.completed_tasks, Some(3));
        assert!(member.base.create_time.is_some());
        assert!(matches!(member.set("nope", Value::Null), Err(FieldError::UnknownColumn(_))));
    }

    #[test]
    fn test_registry_covers_all_records() {
        let registry = registry().unwrap();
        let tables: Vec<&str> = registry.tables().map(|d| d.table.as_str()).collect();
        assert_eq!(tables, vec!["players", "teams", "tags", "team_members"]);
    }
}
