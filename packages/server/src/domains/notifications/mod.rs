// Notification domain: the offer rows and the dispatcher that delivers them.

pub mod dispatcher;
pub mod models;

pub use dispatcher::{dispatch_hold_offer, DispatchOutcome, HoldOffer};
pub use models::{
    NewNotification, Notification, NotificationChannel, NotificationResponse, NotificationStatus,
};
