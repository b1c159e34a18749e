use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use super::icontains;
use crate::entity::department;
use crate::entity::employee::{self, EmployeeStatus};

/// Employee joined with its (optional) department
pub type EmployeeRow = (employee::Model, Option<department::Model>);

/// Filters for the employee list
#[derive(Debug, Clone, Default)]
pub struct EmployeeFilter {
    pub status: Option<EmployeeStatus>,
    pub department_id: Option<i32>,
    /// Case-insensitive match against first name, last name and email
    pub search: Option<String>,
}

impl EmployeeFilter {
    fn condition(&self) -> Condition {
        let mut cond = Condition::all();
        if let Some(status) = self.status {
            cond = cond.add(employee::Column::Status.eq(status));
        }
        if let Some(department_id) = self.department_id {
            cond = cond.add(employee::Column::DepartmentId.eq(department_id));
        }
        if let Some(q) = self.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            cond = cond.add(
                Condition::any()
                    .add(icontains::<employee::Entity>(employee::Column::FirstName, q))
                    .add(icontains::<employee::Entity>(employee::Column::LastName, q))
                    .add(icontains::<employee::Entity>(employee::Column::Email, q)),
            );
        }
        cond
    }
}

/// One page of the employee list
#[derive(Debug)]
pub struct EmployeePage {
    pub rows: Vec<EmployeeRow>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub num_pages: u64,
}

/// Fields supplied when hiring
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department_id: Option<i32>,
    pub position: String,
    pub hire_date: NaiveDate,
    pub status: EmployeeStatus,
    pub salary: Decimal,
}

/// Editable fields; the hire date is fixed once recorded
#[derive(Debug, Clone)]
pub struct EmployeeChanges {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department_id: Option<i32>,
    pub position: String,
    pub status: EmployeeStatus,
    pub salary: Decimal,
}

pub struct EmployeeRepository;

impl EmployeeRepository {
    pub async fn find_by_id(
        db: &DatabaseConnection,
        id: i32,
    ) -> Result<Option<employee::Model>, DbErr> {
        employee::Entity::find_by_id(id).one(db).await
    }

    pub async fn find_with_department(
        db: &DatabaseConnection,
        id: i32,
    ) -> Result<Option<EmployeeRow>, DbErr> {
        employee::Entity::find_by_id(id)
            .find_also_related(department::Entity)
            .one(db)
            .await
    }

    /// Fetch a 1-based page. Returns `None` when `page` is past the last page;
    /// page 1 always exists, even when empty.
    pub async fn list_page(
        db: &DatabaseConnection,
        filter: &EmployeeFilter,
        page: u64,
        page_size: u64,
    ) -> Result<Option<EmployeePage>, DbErr> {
        let paginator = employee::Entity::find()
            .filter(filter.condition())
            .find_also_related(department::Entity)
            .order_by_asc(employee::Column::Id)
            .paginate(db, page_size);

        let total = paginator.num_items().await?;
        let num_pages = total.div_ceil(page_size).max(1);
        if page == 0 || page > num_pages {
            return Ok(None);
        }

        let rows = paginator.fetch_page(page - 1).await?;
        Ok(Some(EmployeePage {
            rows,
            page,
            page_size,
            total,
            num_pages,
        }))
    }

    /// Every employee with its department, ordered by id
    pub async fn all_with_departments(db: &DatabaseConnection) -> Result<Vec<EmployeeRow>, DbErr> {
        employee::Entity::find()
            .find_also_related(department::Entity)
            .order_by_asc(employee::Column::Id)
            .all(db)
            .await
    }

    /// Whether another employee already uses `email`
    pub async fn email_taken(
        db: &DatabaseConnection,
        email: &str,
        exclude_id: Option<i32>,
    ) -> Result<bool, DbErr> {
        let mut select = employee::Entity::find().filter(employee::Column::Email.eq(email));
        if let Some(id) = exclude_id {
            select = select.filter(employee::Column::Id.ne(id));
        }
        Ok(select.count(db).await? > 0)
    }

    /// Insert a new employee. A duplicate email fails with a unique-constraint error.
    pub async fn create(
        db: &DatabaseConnection,
        new: NewEmployee,
    ) -> Result<employee::Model, DbErr> {
        employee::ActiveModel {
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            email: Set(new.email),
            department_id: Set(new.department_id),
            position: Set(new.position),
            hire_date: Set(new.hire_date),
            status: Set(new.status),
            salary: Set(new.salary),
            last_report_generated: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        changes: EmployeeChanges,
    ) -> Result<Option<employee::Model>, DbErr> {
        let Some(existing) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };
        let mut active: employee::ActiveModel = existing.into();
        active.first_name = Set(changes.first_name);
        active.last_name = Set(changes.last_name);
        active.email = Set(changes.email);
        active.department_id = Set(changes.department_id);
        active.position = Set(changes.position);
        active.status = Set(changes.status);
        active.salary = Set(changes.salary);
        active.update(db).await.map(Some)
    }

    /// Returns whether a row was deleted
    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, DbErr> {
        let res = employee::Entity::delete_by_id(id).exec(db).await?;
        Ok(res.rows_affected > 0)
    }

    /// Stamp `last_report_generated`; `None` when the employee is gone
    pub async fn mark_report_generated(
        db: &DatabaseConnection,
        id: i32,
        at: DateTime<Utc>,
    ) -> Result<Option<employee::Model>, DbErr> {
        let Some(existing) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };
        let mut active: employee::ActiveModel = existing.into();
        active.last_report_generated = Set(Some(at));
        active.update(db).await.map(Some)
    }

    pub async fn count_all(db: &DatabaseConnection) -> Result<u64, DbErr> {
        employee::Entity::find().count(db).await
    }

    pub async fn count_by_status(
        db: &DatabaseConnection,
        status: EmployeeStatus,
    ) -> Result<u64, DbErr> {
        employee::Entity::find()
            .filter(employee::Column::Status.eq(status))
            .count(db)
            .await
    }

    pub async fn count_by_department_and_status(
        db: &DatabaseConnection,
        department_id: i32,
        status: EmployeeStatus,
    ) -> Result<u64, DbErr> {
        employee::Entity::find()
            .filter(employee::Column::DepartmentId.eq(department_id))
            .filter(employee::Column::Status.eq(status))
            .count(db)
            .await
    }

    /// Salary total and head count for one department and status
    pub async fn sum_salary_by_department(
        db: &DatabaseConnection,
        department_id: i32,
        status: EmployeeStatus,
    ) -> Result<(Decimal, u64), DbErr> {
        let employees = employee::Entity::find()
            .filter(employee::Column::DepartmentId.eq(department_id))
            .filter(employee::Column::Status.eq(status))
            .all(db)
            .await?;
        let total = employees.iter().map(|e| e.salary).sum();
        Ok((total, employees.len() as u64))
    }
}
