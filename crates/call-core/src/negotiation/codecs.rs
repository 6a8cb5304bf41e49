//! Codec policy passes over a single m-line.

use tracing::debug;
use webcall_sdp_core::MediaDescription;

use crate::error::{NegotiationError, NegotiationResult};

pub const H264: &str = "H264";
pub const TELEPHONE_EVENT: &str = "telephone-event";

/// Decoder limits forced into local H.264 fmtp lines. The defaults a browser
/// leaves unspecified are too low for 1080p content.
const H264_LIMITS: [(&str, u32); 3] = [
    ("max-fs", 8192),
    ("max-mbps", 245_000),
    ("max-dpb", 32_768),
];

/// Constrained-baseline bits of profile_idc/profile-iop
const BASELINE_MASK: u32 = 0x42_0000;
const CONSTRAINT_SET1: u32 = 0x00_4000;

/// Payloads whose fmtp carries `apt=<pt>` for one of `primaries` (RFC 4588)
fn retransmission_payloads(media: &MediaDescription, primaries: &[u8]) -> Vec<u8> {
    media
        .fmtp
        .iter()
        .filter(|fmtp| {
            fmtp.config.split(';').any(|param| {
                param
                    .trim()
                    .strip_prefix("apt=")
                    .and_then(|pt| pt.parse::<u8>().ok())
                    .is_some_and(|pt| primaries.contains(&pt))
            })
        })
        .map(|fmtp| fmtp.payload)
        .collect()
}

/// Strip every H.264 payload and the retransmission payloads bound to them
pub fn remove_h264(media: &mut MediaDescription) {
    let h264 = media.codec_payloads(H264);
    if h264.is_empty() {
        return;
    }
    let mut removed = retransmission_payloads(media, &h264);
    removed.extend_from_slice(&h264);
    debug!("Removing H.264 payloads {:?} from m-line", removed);
    media.remove_payloads(&removed);
}

/// Remove DTMF payloads, which are not supported on this path
pub fn remove_telephone_event(media: &mut MediaDescription) {
    let payloads = media.codec_payloads(TELEPHONE_EVENT);
    media.remove_payloads(&payloads);
}

/// Set the constraint_set1 bit of a baseline profile-level-id.
///
/// The far end sends baseline H.264 that already obeys the constrained
/// baseline limits. Any other profile is rejected.
pub fn repair_h264_profile(media: &mut MediaDescription) -> NegotiationResult<()> {
    for payload in media.codec_payloads(H264) {
        let Some(fmtp) = media.fmtp_for_mut(payload) else {
            continue;
        };

        let mut params: Vec<String> = fmtp.config.split(';').map(str::to_string).collect();
        for param in params.iter_mut() {
            let Some(value) = param.trim().strip_prefix("profile-level-id=") else {
                continue;
            };
            let hex: String = value.chars().take(6).collect();
            let profile = u32::from_str_radix(&hex, 16).map_err(|_| {
                NegotiationError::MalformedProfile {
                    profile: value.to_string(),
                }
            })?;
            if profile & BASELINE_MASK == 0 {
                return Err(NegotiationError::ProfileNotBaseline {
                    profile: value.to_string(),
                });
            }
            *param = format!("profile-level-id={:06x}", profile | CONSTRAINT_SET1);
            debug!("Repaired H.264 profile level for payload {}", payload);
        }
        fmtp.config = params.join(";");
    }
    Ok(())
}

/// Force the decoder limits into every local H.264 fmtp line
pub fn raise_h264_limits(media: &mut MediaDescription) {
    for payload in media.codec_payloads(H264) {
        let Some(fmtp) = media.fmtp_for_mut(payload) else {
            continue;
        };

        let mut params: Vec<(String, Option<String>)> = fmtp
            .config
            .split(';')
            .filter(|p| !p.trim().is_empty())
            .map(|p| match p.split_once('=') {
                Some((key, value)) => (key.trim().to_string(), Some(value.to_string())),
                None => (p.trim().to_string(), None),
            })
            .collect();

        for (key, value) in H264_LIMITS {
            match params.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = Some(value.to_string()),
                None => params.push((key.to_string(), Some(value.to_string()))),
            }
        }

        fmtp.config = params
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => format!("{}={}", key, value),
                None => key,
            })
            .collect::<Vec<_>>()
            .join(";");
        debug!("Raised H.264 limits for payload {}: {}", payload, fmtp.config);
    }
}
