//! # segfetch
//!
//! `segfetch` is a library for concurrent, resumable, segmented downloads.
//! A resource is split into fragments, either fixed-size byte ranges of one
//! file or the segments of a media playlist, which are fetched in parallel by
//! a bounded worker pool into scratch files and then merged in index order.
//!
//! - Fragments already present in scratch storage with the expected length
//!   are reused instead of fetched again.
//! - The first failing fragment aborts the session and cancels the other
//!   workers; scratch files stay on disk for the next attempt.
//! - Progress is reported through a caller-supplied [`ProgressObserver`].
//!
//! ## Example Usage
//!
//! ```no_run
//! # async fn run() -> segfetch::Result<()> {
//! use segfetch::{DownloadSession, FetchTarget};
//!
//! let target = FetchTarget::byte_range("https://example.com/video.mp4", 10_000_000);
//! let bytes = DownloadSession::builder(target, "video.mp4")
//!     .workers(4)
//!     .build()?
//!     .run()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod merge;
pub mod observer;
pub mod plan;
pub mod playlist;
pub mod resume;
pub mod session;
pub mod store;
pub mod utils;
pub mod worker;

pub use error::{FetchError, MergeError, Result, TransferError};
pub use observer::{ConsoleObserver, NoopObserver, ProgressObserver};
pub use plan::{FetchTarget, Fragment, FragmentSource, Segment};
pub use resume::{ResumePolicy, SizeMatch};
pub use session::{DownloadSession, SessionBuilder};
pub use store::{FragmentStore, ScratchFile};
