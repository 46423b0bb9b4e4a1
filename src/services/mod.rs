pub mod attempt_api;
pub mod countdown;
pub mod integrity;
pub mod navigator;
pub mod session;
