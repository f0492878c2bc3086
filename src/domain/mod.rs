pub mod access;
pub mod models;
pub mod progress;
pub mod quiz;
pub mod throttle;
pub mod widgets;
