pub mod access_log;
pub mod notifications;
pub mod settings;

pub use access_log::AccessLogService;
pub use notifications::NotificationService;
pub use settings::SettingsService;
