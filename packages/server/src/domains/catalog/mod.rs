// Tenants, staff, and the service catalog.
//
// Onboarding and catalog CRUD live in the admin surface outside this crate;
// the engine only needs the rows for scoping, matching, and message copy.

pub mod models;

pub use models::{NewService, NewStaff, Service, Staff, Tenant};
