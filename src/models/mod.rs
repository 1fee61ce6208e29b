mod question;
mod settings;
mod tracking;

pub use question::{Question, WrongAnswer};
pub use settings::{Settings, StoredUser, TrackedDomain};
pub use tracking::{DomainTimeRecord, TimeTrackingMap};
