pub mod clinic;
pub mod specialty;
pub mod exam;

pub use clinic::ClinicService;
pub use specialty::SpecialtyService;
pub use exam::ExamService;
