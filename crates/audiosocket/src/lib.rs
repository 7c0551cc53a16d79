//! Raw PCM streaming to audio output devices.
//!
//! [`StreamScheduler`] cycles a small pool of buffers between a [`ByteSource`]
//! and an [`OutputDevice`], sleeping one buffer's playback time between status
//! checks so that idle CPU stays near zero without leaving gaps.

pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod format;
pub mod report;
pub mod scheduler;
pub mod slot;
pub mod source;
pub mod wav;

pub use clock::{Sleeper, ThreadSleeper};
pub use config::SchedulerConfig;
pub use device::{AudioBackend, BufferStatus, OutputDevice};
pub use error::{PlayError, Result};
pub use format::AudioFormat;
pub use report::PlaybackReport;
pub use scheduler::{StreamScheduler, StreamState};
pub use slot::SlotState;
pub use source::{ByteSource, ReadSource, StoppableSource};
