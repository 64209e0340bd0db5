mod presenter;
#[cfg(test)]
mod tests;
mod timer;

pub use presenter::{render, DisplayPresenter};
pub use timer::{CountdownKind, DisplayTimer, TimerTick};
