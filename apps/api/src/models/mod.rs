pub mod employee;
pub mod outreach;

pub use employee::{CompanyBatch, EmployeeProfile};
pub use outreach::{EmployeeScore, MessageVariant, OutreachResult, SelectedMessage};
