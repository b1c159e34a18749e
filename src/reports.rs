//! Report builders
//!
//! Pure functions turning persisted rows into report values. The jobs in
//! `jobs::tasks` do the querying and hand the results here.

use std::borrow::Cow;
use std::fmt::Write as _;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::repository::EmployeeRow;

/// Column order of the employee export
pub const CSV_HEADER: [&str; 9] = [
    "ID",
    "First Name",
    "Last Name",
    "Email",
    "Department",
    "Position",
    "Hire Date",
    "Status",
    "Salary",
];

const CSV_LINE_END: &str = "\r\n";

/// Daily headcount for one department
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentHeadcount {
    pub department: String,
    pub active_employees: u64,
    pub on_leave_employees: u64,
    pub total_employees: u64,
}

impl DepartmentHeadcount {
    /// Terminated employees are not part of the total
    pub fn new(department: impl Into<String>, active: u64, on_leave: u64) -> Self {
        Self {
            department: department.into(),
            active_employees: active,
            on_leave_employees: on_leave,
            total_employees: active + on_leave,
        }
    }
}

/// Weekly salary figures for one department, active employees only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentSalary {
    pub department: String,
    pub total_salary: Decimal,
    pub average_salary: Decimal,
    pub employee_count: u64,
}

impl DepartmentSalary {
    /// Average is rounded to cents and is zero for an empty department.
    pub fn new(department: impl Into<String>, total_salary: Decimal, employee_count: u64) -> Self {
        let average_salary = if employee_count == 0 {
            Decimal::ZERO
        } else {
            (total_salary / Decimal::from(employee_count)).round_dp(2)
        };
        Self {
            department: department.into(),
            total_salary,
            average_salary,
            employee_count,
        }
    }
}

/// Render employees as CSV: header plus one line per row, CRLF terminated.
pub fn employees_csv(rows: &[EmployeeRow]) -> String {
    let mut out = String::new();
    write_record(&mut out, CSV_HEADER.iter().copied());

    for (emp, dept) in rows {
        let id = emp.id.to_string();
        let hire_date = emp.hire_date.format("%Y-%m-%d").to_string();
        let salary = format!("{:.2}", emp.salary);
        let department = dept.as_ref().map(|d| d.name.as_str()).unwrap_or("");
        write_record(
            &mut out,
            [
                id.as_str(),
                emp.first_name.as_str(),
                emp.last_name.as_str(),
                emp.email.as_str(),
                department,
                emp.position.as_str(),
                hire_date.as_str(),
                emp.status.as_str(),
                salary.as_str(),
            ],
        );
    }

    out
}

fn write_record<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}", escape_field(field));
    }
    out.push_str(CSV_LINE_END);
}

/// Quote a field only when it contains a delimiter, quote or line break
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
