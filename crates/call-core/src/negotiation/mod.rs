//! SDP negotiation engine
//!
//! Every description exchanged during a call passes through the
//! [`SdpMunger`] once: codec policy, bandwidth shaping, ICE fixups and
//! protocol pinning are applied to a parsed
//! [`SessionDescription`](webcall_sdp_core::SessionDescription) and the
//! result is written back as text. The helpers in [`content`] read the
//! content channel state from any description.

pub mod bandwidth;
pub mod candidates;
pub mod codecs;
pub mod content;
pub mod legacy;
pub mod munger;

pub use bandwidth::shape_bandwidth;
pub use candidates::{CandidateAddress, CandidatePair, resolve_candidates, selected_candidate_pair};
pub use content::{ContentState, content_state, is_audio_only};
pub use legacy::LegacyTranslator;
pub use munger::{Munged, SdpMunger};
