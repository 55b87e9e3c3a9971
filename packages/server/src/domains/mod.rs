// Domain layers - business logic organized per entity cluster
//
// Each domain holds its models (row structs + status enums) and its actions
// (free async functions over EngineDeps). Infrastructure stays in kernel/.

pub mod audit;
pub mod calendar;
pub mod catalog;
pub mod confirmation;
pub mod notifications;
pub mod scheduling;
pub mod waitlist;
