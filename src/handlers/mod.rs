//! Request handlers module

pub mod dashboard;
pub mod department;
pub mod employee;
pub mod job;
