pub mod course_access;
pub mod file_access;
pub mod login_codes;
pub mod notifications;
pub mod review;
pub mod role_audit;
pub mod sessions;
pub mod users;
