pub mod app;
pub mod install;
pub mod sign;
