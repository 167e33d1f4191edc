//! Request handlers.

pub mod blur;
pub mod health;

pub use blur::blur_eyes;
pub use health::health;
