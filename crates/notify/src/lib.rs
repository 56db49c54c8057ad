pub mod mailer;
pub mod template;

pub use mailer::{Notification, Notifier, NotifyError, SmtpNotifier};
