mod handler;

pub use handler::TouchInputHandler;
