//! Driver for ST2205U based USB photo frames
//!
//! Frames running the hacked firmware show up as a USB mass-storage disk.
//! This library talks to the frame through fixed sectors of that disk and
//! pushes RGBA or RGB frames to its LCD, sending only what changed when asked
//! to.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │         Caller (setpic, C programs via the c_api)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                   RGBA / RGB frames, rectangles
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         St2205                              │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │ codec       │  │ region      │  │ protocol + packet   │ │
//! │  │ (RGBA->RGB) │  │ (shadow,    │  │ (window cmd, bpp    │ │
//! │  │             │  │  diffing)   │  │  packing, framing)  │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                 transport (positioned sector I/O)
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │        BlockDevice: /dev/sdX (O_DIRECT) or EmulatedFrame    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use st2205::St2205;
//!
//! let mut frame = St2205::open("/dev/sdb")?;
//! let rgba = vec![0u8; frame.width() as usize * frame.height() as usize * 4];
//! frame.update_full(&rgba)?;
//! frame.backlight(false)?;
//! ```

pub mod aligned;
pub mod c_api;
pub mod codec;
pub mod descriptor;
pub mod device;
pub mod emulator;
pub mod error;
pub mod geometry;
pub mod packet;
pub mod protocol;
pub mod region;
pub mod transport;

pub use descriptor::{DescriptorSource, PanelDescriptor};
pub use device::{OpenOptions, St2205, TransferReport};
pub use emulator::{EmulatedFrame, Fault};
pub use error::{Error, ErrorKind};
pub use geometry::Rect;
pub use protocol::{ControlCommand, PanelOffset, PixelFormat, ProtocolId};
pub use region::{RegionBuffer, ShadowBuffer};
pub use transport::BlockDevice;

/// Result type for this crate
pub type Result<T> = std::result::Result<T, Error>;
