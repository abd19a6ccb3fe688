pub mod doctor;
pub mod working_hours;

pub use doctor::DoctorService;
pub use working_hours::WorkingHoursService;
