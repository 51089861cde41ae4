pub mod assign;
pub mod batch;
pub mod doctor;
pub mod onboard;
pub mod status;

mod report;
mod roster_file;
mod wiring;
