pub mod remote;
pub mod supervisor;
pub mod ui;
