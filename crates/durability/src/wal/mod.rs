//! Segmented trace log
//!
//! - `config`: log configuration (WalConfig, WalConfigError)
//! - `mode`: durability modes (Always, Standard)
//! - `writer`: segmented writer (WalWriter)
//! - `reader`: segmented reader (WalReader)

pub mod config;
pub mod mode;
pub mod reader;
pub mod writer;

pub use config::{WalConfig, WalConfigError};
pub use mode::DurabilityMode;
pub use reader::{ReadStopReason, SegmentRead, TruncateInfo, WalReadResult, WalReader, WalReaderError};
pub use writer::{list_segment_numbers, WalCounters, WalWriter};
