//! # webcall-sdp-core
//!
//! Session Description Protocol model used by the webcall call controller.
//!
//! ```
//! use webcall_sdp_core::{parse_sdp, MediaKind};
//!
//! let sdp = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\n";
//! let session = parse_sdp(sdp).unwrap();
//! assert_eq!(session.media[0].kind, MediaKind::Audio);
//! assert!(session.to_string().contains("a=rtpmap:111 opus/48000/2\r\n"));
//! ```

pub mod error;
pub mod parser;
pub mod types;
mod writer;

pub use error::{SdpError, SdpResult};
pub use parser::{parse_sdp, parse_sdp_line};
pub use types::*;
