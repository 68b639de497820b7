pub mod builder;
pub mod control_loop;
pub mod core;
pub mod tasks;
pub mod trigger;

pub use builder::ApplicationBuilder;
pub use control_loop::ControlLoop;
pub use core::Application;
pub use trigger::CycleTrigger;
