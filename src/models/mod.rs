// Models module - Database entity representations

pub mod access_code;
pub mod attendee;
pub mod booth;
pub mod email_log;
pub mod event;
pub mod registration;
pub mod scan;
pub mod session;

pub use access_code::AccessCode;
pub use attendee::Attendee;
pub use booth::Booth;
pub use email_log::EmailLog;
pub use event::Event;
pub use registration::{RegistrationStatus, SessionRegistration};
pub use scan::ScanRecord;
pub use session::{BoothRestriction, ScanningContext, Session};
