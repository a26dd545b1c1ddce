pub mod activate;
pub mod class_report;
pub mod init;
pub mod score;
pub mod submit;
pub mod validate;
