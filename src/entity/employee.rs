//! Employee entity
//!
//! Table: employees. `email` is unique; `department_id` is nulled when the
//! department goes away.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

/// Employment status
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "on_leave")]
    OnLeave,
    #[sea_orm(string_value = "terminated")]
    Terminated,
}

impl EmployeeStatus {
    /// Stored value, also used in CSV output
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeStatus::Active => "active",
            EmployeeStatus::OnLeave => "on_leave",
            EmployeeStatus::Terminated => "terminated",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            EmployeeStatus::Active => "Active",
            EmployeeStatus::OnLeave => "On Leave",
            EmployeeStatus::Terminated => "Terminated",
        }
    }
}

impl Default for EmployeeStatus {
    fn default() -> Self {
        EmployeeStatus::Active
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "String(Some(100))")]
    pub first_name: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub last_name: String,

    /// Unique across all employees
    #[sea_orm(column_type = "String(Some(254))", unique)]
    pub email: String,

    #[sea_orm(nullable)]
    pub department_id: Option<i32>,

    #[sea_orm(column_type = "String(Some(100))")]
    pub position: String,

    pub hire_date: Date,

    pub status: EmployeeStatus,

    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub salary: Decimal,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,

    /// Only written by the report job
    #[sea_orm(nullable)]
    pub last_report_generated: Option<DateTimeUtc>,
}

impl Model {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Department,
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        if insert {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

/// Employee with its department name resolved
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmployeeResponse {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub department_id: Option<i32>,
    pub department: Option<String>,
    pub position: String,
    pub hire_date: Date,
    pub status: EmployeeStatus,
    pub salary: Decimal,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub last_report_generated: Option<DateTimeUtc>,
}

impl EmployeeResponse {
    pub fn new(model: Model, department: Option<super::department::Model>) -> Self {
        Self {
            id: model.id,
            full_name: model.full_name(),
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            department_id: model.department_id,
            department: department.map(|d| d.name),
            position: model.position,
            hire_date: model.hire_date,
            status: model.status,
            salary: model.salary,
            created_at: model.created_at,
            updated_at: model.updated_at,
            last_report_generated: model.last_report_generated,
        }
    }
}
