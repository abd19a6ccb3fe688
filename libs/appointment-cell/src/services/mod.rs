pub mod blocks;
pub mod history;
pub mod lifecycle;
pub mod scheduling;
pub mod slots;

pub use blocks::ScheduleBlockService;
pub use history::AppointmentHistoryService;
pub use lifecycle::AppointmentLifecycleService;
pub use scheduling::SchedulingService;
