//! Repository module - explicit persistence operations
//!
//! Every query returns concrete values; nothing is deferred to the caller.

use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::EntityTrait;

pub mod department;
pub mod employee;

pub use department::DepartmentRepository;
pub use employee::{
    EmployeeChanges, EmployeeFilter, EmployeePage, EmployeeRepository, EmployeeRow, NewEmployee,
};

/// Case-insensitive substring match on `column`. `%`, `_` and `\` in
/// `needle` match literally.
pub(crate) fn icontains<E: EntityTrait>(column: E::Column, needle: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
    Expr::expr(Func::lower(Expr::col((E::default(), column)))).like(LikeExpr::new(pattern).escape('\\'))
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
