//! Rewrites every SDP exchanged between the signaling layer and the
//! transport so both ends accept it.

use tracing::{debug, warn};
use webcall_sdp_core::{
    Connection, Direction, MediaDescription, MediaKind, SessionDescription, Source, SsrcGroup,
};

use super::bandwidth::shape_bandwidth;
use super::candidates::CandidatePair;
use super::codecs::{raise_h264_limits, remove_h264, remove_telephone_event, repair_h264_profile};
use super::content::{content_line_index, tag_content};
use super::legacy::LegacyTranslator;
use crate::config::{BandwidthPolicy, CallConfig};
use crate::error::{NegotiationError, NegotiationResult};
use crate::media::MediaPresence;
use crate::signaling::{Originator, SdpDescription, SdpKind};
use crate::transport::TransportCapabilities;

const UDP_PROTOCOL: &str = "UDP/TLS/RTP/SAVPF";
const TCP_PROTOCOL: &str = "TCP/DTLS/RTP/SAVPF";
const FAKE_CNAME: &str = "fake";

/// Result of a munging pass
#[derive(Debug, Clone)]
pub struct Munged {
    /// What to hand on, in the layout of the receiving side
    pub description: SdpDescription,
    /// The rewritten description in the one-stream-per-line layout
    pub canonical: SessionDescription,
}

/// Per-call SDP rewriting state.
///
/// Besides the policies from [`CallConfig`], the munger remembers the
/// protocols of the last offer in each direction so every answer repeats
/// them line by line, and the candidate pair once ICE has settled.
#[derive(Debug)]
pub struct SdpMunger {
    allow_h264: bool,
    config_allows_h264: bool,
    log_sdp: bool,
    policy: BandwidthPolicy,
    capabilities: TransportCapabilities,
    local_media: MediaPresence,
    local_offer_protocols: Vec<String>,
    remote_offer_protocols: Vec<String>,
    candidates: Option<CandidatePair>,
    legacy: Option<LegacyTranslator>,
}

impl SdpMunger {
    pub fn new(config: &CallConfig, capabilities: &TransportCapabilities) -> Self {
        let mut munger = Self {
            allow_h264: false,
            config_allows_h264: config.allow_h264,
            log_sdp: config.log_sdp,
            policy: config.bandwidth.clone(),
            capabilities: TransportCapabilities::default(),
            local_media: MediaPresence::default(),
            local_offer_protocols: Vec::new(),
            remote_offer_protocols: Vec::new(),
            candidates: None,
            legacy: None,
        };
        munger.set_capabilities(capabilities.clone());
        munger
    }

    /// Apply the capabilities of the transport created for the session
    pub fn set_capabilities(&mut self, capabilities: TransportCapabilities) {
        self.allow_h264 = self.config_allows_h264 && capabilities.allows_h264;
        self.legacy = if capabilities.supports_unified_plan {
            None
        } else {
            debug!("Transport lacks unified plan, translating descriptions");
            Some(self.legacy.take().unwrap_or_default())
        };
        self.capabilities = capabilities;
    }

    pub fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    pub fn set_local_media(&mut self, presence: MediaPresence) {
        self.local_media = presence;
    }

    pub fn set_candidates(&mut self, candidates: Option<CandidatePair>) {
        self.candidates = candidates;
    }

    pub fn candidates(&self) -> Option<&CandidatePair> {
        self.candidates.as_ref()
    }

    fn is_legacy(&self) -> bool {
        self.legacy.is_some()
    }

    fn log_body(&self, label: &str, body: &str) {
        if self.log_sdp {
            debug!("{}:\n{}", label, body);
        }
    }

    /// Dispatch on the originator of the description
    pub fn munge(&mut self, description: &SdpDescription) -> NegotiationResult<Munged> {
        match description.originator {
            Originator::Local => self.munge_local(description),
            Originator::Remote => self.munge_remote(description),
        }
    }

    /// Rewrite a description received from the far end before it is
    /// applied to the transport
    pub fn munge_remote(&mut self, description: &SdpDescription) -> NegotiationResult<Munged> {
        if description.originator != Originator::Remote {
            return Err(NegotiationError::WrongOriginator {
                expected: Originator::Remote,
                actual: description.originator,
            });
        }
        self.log_body("recv unified", &description.body);

        let mut session = SessionDescription::parse(&description.body)?;
        let is_offer = description.is_offer();
        if is_offer {
            self.remote_offer_protocols.clear();
        }

        let line_count = session.media.len();
        for index in 0..line_count {
            let (before, rest) = session.media.split_at_mut(index);
            let media = &mut rest[0];

            if is_offer {
                self.remote_offer_protocols.push(media.protocol.clone());
                if let Some(protocol) = self.local_offer_protocols.get(index) {
                    media.protocol = protocol.clone();
                }
            } else if let Some(protocol) = self.local_offer_protocols.get(index) {
                media.protocol = protocol.clone();
            }

            if media.is_disabled() {
                media.direction = Some(Direction::Inactive);
                continue;
            }

            // Browsers end the call when a bundled line lacks ICE credentials
            if let Some(previous) = before.last() {
                if media.ice_pwd.is_none() {
                    media.ice_pwd = previous.ice_pwd.clone();
                }
                if media.ice_ufrag.is_none() {
                    media.ice_ufrag = previous.ice_ufrag.clone();
                }
            }

            if media.is_video() {
                if self.allow_h264 {
                    repair_h264_profile(media)?;
                } else {
                    remove_h264(media);
                }
                if self.is_legacy()
                    && !self.local_media.video
                    && index == 1
                    && line_count > 2
                    && media.direction == Some(Direction::SendOnly)
                {
                    media.direction = None;
                }
            }
        }

        shape_bandwidth(
            &mut session,
            &self.policy,
            self.is_legacy(),
            self.capabilities.converts_tias_to_as,
        );

        let canonical = session.clone();
        let body = match self.legacy.as_mut() {
            Some(translator) => translator.to_legacy(&session).to_string(),
            None => session.to_string(),
        };
        if self.is_legacy() {
            self.log_body("recv legacy", &body);
        }

        Ok(Munged {
            description: SdpDescription::new(Originator::Remote, description.kind, body),
            canonical,
        })
    }

    /// Rewrite a description produced by the transport before it is sent
    pub fn munge_local(&mut self, description: &SdpDescription) -> NegotiationResult<Munged> {
        if description.originator != Originator::Local {
            return Err(NegotiationError::WrongOriginator {
                expected: Originator::Local,
                actual: description.originator,
            });
        }

        let mut session = SessionDescription::parse(&description.body)?;
        let legacy = self.is_legacy();

        for (index, media) in session.media.iter_mut().enumerate() {
            if media.is_disabled() {
                media.rtcp_mux = false;
                media.direction = None;
            } else if let Some(pair) = &self.candidates {
                media.remote_candidates =
                    Some(format!("1 {} {}", pair.remote.ip, pair.remote.port));
                media.connection = Some(Connection::ip4(pair.local.ip.clone()));
                media.port = pair.local.port;
            }

            remove_telephone_event(media);

            if media.is_video() {
                if self.allow_h264 {
                    raise_h264_limits(media);
                } else {
                    remove_h264(media);
                }
            }

            let has_local = match media.kind {
                MediaKind::Audio => self.local_media.audio,
                MediaKind::Video => self.local_media.video,
                _ => true,
            };
            if legacy && !has_local && index < 2 {
                if media.ssrc_groups.len() > 1 {
                    warn!("Transport now has ssrcs for recvonly streams");
                } else {
                    add_placeholder_sources(media, index);
                }
            }
        }

        if legacy {
            self.log_body("send legacy", &session.to_string());
        }
        if let Some(translator) = self.legacy.as_mut() {
            session = translator.to_unified(&session);
        }

        if description.is_offer() {
            self.local_offer_protocols.clear();
        }
        let tcp = self.candidates.as_ref().is_some_and(|pair| pair.tcp);
        for (index, media) in session.media.iter_mut().enumerate() {
            if description.is_offer() {
                self.local_offer_protocols.push(media.protocol.clone());
                media.protocol = if tcp { TCP_PROTOCOL } else { UDP_PROTOCOL }.to_string();
            } else if let Some(protocol) = self.remote_offer_protocols.get(index) {
                media.protocol = protocol.clone();
            }
        }
        tag_content(&mut session, self.local_media.video);

        let body = session.to_string();
        self.log_body("send unified", &body);
        Ok(Munged {
            description: SdpDescription::new(Originator::Local, description.kind, body),
            canonical: session,
        })
    }

    /// The remote offer with its content line disabled, for transports that
    /// must tear the content line down before receiving content
    pub fn content_restart_description(
        &mut self,
        remote: &SdpDescription,
    ) -> NegotiationResult<SdpDescription> {
        let mut session = SessionDescription::parse(&remote.body)?;
        let index = content_line_index(&session);
        if let Some(media) = session.media.get_mut(index) {
            media.port = 0;
        }
        let restart = SdpDescription::new(remote.originator, SdpKind::Offer, session.to_string());
        Ok(self.munge_remote(&restart)?.description)
    }
}

/// Give a line without local media a placeholder retransmission pair so
/// the legacy-to-unified split keeps the streams on their lines
fn add_placeholder_sources(media: &mut MediaDescription, index: usize) {
    let primary = (index * 2 + 1) as u32;
    let retransmission = (index * 2 + 2) as u32;
    media
        .sources
        .push(Source::new(primary).with_attribute("cname", FAKE_CNAME));
    media
        .sources
        .push(Source::new(retransmission).with_attribute("cname", FAKE_CNAME));
    if media.kind == MediaKind::Audio {
        media.direction = None;
    }
    media.ssrc_groups.insert(
        0,
        SsrcGroup {
            semantics: "FID".to_string(),
            ssrcs: vec![primary, retransmission],
        },
    );
}
