pub mod check_log;
pub mod posting;
pub mod settings;
