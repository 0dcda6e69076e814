pub mod desktop;

pub use desktop::DesktopUserInterface;
