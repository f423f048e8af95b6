//! # nhapp-shared
//!
//! Types shared by the NHAPP store and server: identifier newtypes, the
//! lifecycle enums for chats, messages and status posts, email
//! normalisation, the [`Clock`](clock::Clock) abstraction and the handful of
//! constants that pin down expiry windows and page sizes.

pub mod clock;
pub mod constants;
pub mod error;
pub mod media;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ParseError;
