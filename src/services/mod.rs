pub mod attempt_service;
pub mod autosave_service;
pub mod completion_service;
pub mod grading_service;
pub mod quiz_service;
pub mod violation_service;
