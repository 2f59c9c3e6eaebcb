pub mod clock;
pub mod frame;

pub use clock::{Clock, ManualClock, SystemClock};
pub use frame::{Frame, PixelFormat};
