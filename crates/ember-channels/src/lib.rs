pub mod email;
pub mod traits;

pub use email::SmtpMailer;
pub use traits::Notifier;
