use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};

use super::icontains;
use crate::entity::{department, employee};

pub struct DepartmentRepository;

impl DepartmentRepository {
    pub async fn all(db: &DatabaseConnection) -> Result<Vec<department::Model>, DbErr> {
        department::Entity::find()
            .order_by_asc(department::Column::Id)
            .all(db)
            .await
    }

    /// Departments whose name contains `query`, ignoring case; all of them when `query` is empty
    pub async fn search(
        db: &DatabaseConnection,
        query: Option<&str>,
    ) -> Result<Vec<department::Model>, DbErr> {
        let mut select = department::Entity::find();
        if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
            select = select.filter(icontains::<department::Entity>(department::Column::Name, q));
        }
        select.order_by_asc(department::Column::Name).all(db).await
    }

    pub async fn find_by_id(
        db: &DatabaseConnection,
        id: i32,
    ) -> Result<Option<department::Model>, DbErr> {
        department::Entity::find_by_id(id).one(db).await
    }

    pub async fn create(
        db: &DatabaseConnection,
        name: &str,
        description: &str,
    ) -> Result<department::Model, DbErr> {
        department::ActiveModel {
            name: Set(name.to_string()),
            description: Set(description.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        name: &str,
        description: &str,
    ) -> Result<Option<department::Model>, DbErr> {
        let Some(existing) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };
        let mut active: department::ActiveModel = existing.into();
        active.name = Set(name.to_string());
        active.description = Set(description.to_string());
        active.update(db).await.map(Some)
    }

    /// Delete a department, detaching its employees first.
    ///
    /// Returns `None` when the department does not exist, otherwise the number
    /// of employees whose department was cleared.
    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<Option<u64>, DbErr> {
        let txn = db.begin().await?;

        if department::Entity::find_by_id(id).one(&txn).await?.is_none() {
            txn.rollback().await?;
            return Ok(None);
        }

        let detached = employee::Entity::update_many()
            .col_expr(employee::Column::DepartmentId, Expr::value(Option::<i32>::None))
            .filter(employee::Column::DepartmentId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;

        department::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        Ok(Some(detached))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::repository::test_support::{insert_employee, seed_department};
    use crate::entity::employee::EmployeeStatus;

    #[tokio::test]
    async fn test_create_update_and_search() {
        let db = test_db().await;
        let eng = DepartmentRepository::create(&db, "Engineering", "Builds things").await.unwrap();
        DepartmentRepository::create(&db, "Sales", "").await.unwrap();

        let updated = DepartmentRepository::update(&db, eng.id, "Platform Engineering", "Infra")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Platform Engineering");
        assert_eq!(updated.description, "Infra");

        let found = DepartmentRepository::search(&db, Some("Engin")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, eng.id);

        assert_eq!(DepartmentRepository::search(&db, Some("  ")).await.unwrap().len(), 2);
        assert!(DepartmentRepository::update(&db, 999, "x", "").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_ignores_case_and_wildcards() {
        let db = test_db().await;
        let promo = DepartmentRepository::create(&db, "Sales 50%_Off", "").await.unwrap();
        DepartmentRepository::create(&db, "Operations", "").await.unwrap();

        let found = DepartmentRepository::search(&db, Some("sales")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, promo.id);

        for q in ["%", "_", "50%_"] {
            let found = DepartmentRepository::search(&db, Some(q)).await.unwrap();
            assert_eq!(found.len(), 1, "query {:?}", q);
            assert_eq!(found[0].id, promo.id);
        }
        assert!(DepartmentRepository::search(&db, Some("s_l")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_sets_employee_department_to_null() {
        let db = test_db().await;
        let dept = seed_department(&db, "Support").await;
        let other = seed_department(&db, "Finance").await;
        let a = insert_employee(&db, "a@example.com", Some(dept.id), EmployeeStatus::Active).await;
        let b = insert_employee(&db, "b@example.com", Some(dept.id), EmployeeStatus::OnLeave).await;
        let c = insert_employee(&db, "c@example.com", Some(other.id), EmployeeStatus::Active).await;

        let detached = DepartmentRepository::delete(&db, dept.id).await.unwrap();
        assert_eq!(detached, Some(2));

        assert!(DepartmentRepository::find_by_id(&db, dept.id).await.unwrap().is_none());
        for id in [a.id, b.id] {
            let emp = employee::Entity::find_by_id(id).one(&db).await.unwrap().unwrap();
            assert_eq!(emp.department_id, None);
        }
        let untouched = employee::Entity::find_by_id(c.id).one(&db).await.unwrap().unwrap();
        assert_eq!(untouched.department_id, Some(other.id));
    }

    #[tokio::test]
    async fn test_delete_missing_department() {
        let db = test_db().await;
        assert_eq!(DepartmentRepository::delete(&db, 42).await.unwrap(), None);
    }
}
