use pretty_assertions::assert_eq;
use webcall_sdp_core::{Direction, MediaKind, SessionDescription, parse_sdp};

const CHROME_OFFER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0 1 2\r\n\
a=msid-semantic: WMS stream\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 126\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:abcd\r\n\
a=ice-pwd:0123456789abcdef01234567\r\n\
a=fingerprint:sha-256 AA:BB\r\n\
a=setup:actpass\r\n\
a=mid:0\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=rtpmap:126 telephone-event/8000\r\n\
a=ssrc:1001 cname:user\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96 97 100\r\n\
c=IN IP4 0.0.0.0\r\n\
b=TIAS:1000000\r\n\
a=mid:1\r\n\
a=content:main\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=rtcp-fb:96 goog-remb\r\n\
a=rtcp-fb:96 nack pli\r\n\
a=rtpmap:97 rtx/90000\r\n\
a=fmtp:97 apt=96\r\n\
a=rtpmap:100 H264/90000\r\n\
a=fmtp:100 profile-level-id=42e01f;packetization-mode=1\r\n\
a=ssrc-group:FID 2001 2002\r\n\
a=ssrc:2001 cname:user\r\n\
a=ssrc:2002 cname:user\r\n\
m=video 0 UDP/TLS/RTP/SAVPF 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:2\r\n\
a=bundle-only\r\n\
a=content:slides\r\n\
a=inactive\r\n\
a=rtpmap:96 VP8/90000\r\n";

#[test]
fn test_parse_browser_offer() {
    let session = parse_sdp(CHROME_OFFER).unwrap();

    assert_eq!(session.bundle_group().unwrap().mids, vec!["0", "1", "2"]);
    assert_eq!(session.msid_semantic.as_deref(), Some("WMS stream"));
    assert_eq!(session.media.len(), 3);

    let audio = &session.media[0];
    assert_eq!(audio.kind, MediaKind::Audio);
    assert_eq!(audio.ice_ufrag.as_deref(), Some("abcd"));
    assert_eq!(audio.codec_payloads("telephone-event"), vec![126]);
    assert_eq!(audio.primary_ssrc(), Some(1001));
    // Unknown attributes are kept
    assert!(audio.attribute("setup").is_some());
    assert!(audio.attribute("fingerprint").is_some());

    let video = &session.media[1];
    assert_eq!(video.bandwidth[0].limit, 1_000_000);
    assert_eq!(video.content.as_deref(), Some("main"));
    assert!(video.has_goog_remb());
    assert_eq!(video.primary_ssrc(), Some(2001));
    assert_eq!(video.fmtp_for(97).map(|f| f.config.as_str()), Some("apt=96"));

    let slides = &session.media[2];
    assert!(slides.is_disabled());
    assert!(slides.bundle_only);
    assert_eq!(slides.direction, Some(Direction::Inactive));
}

#[test]
fn test_written_sdp_reads_back_identically() {
    let session = parse_sdp(CHROME_OFFER).unwrap();
    let text = session.to_string();

    assert!(text.ends_with("\r\n"));
    assert!(text.lines().all(|l| !l.is_empty()));
    assert!(text.contains("a=ssrc-group:FID 2001 2002\r\n"));
    assert!(text.contains("b=TIAS:1000000\r\n"));

    let reparsed: SessionDescription = text.parse().unwrap();
    assert_eq!(reparsed, session);
}

#[test]
fn test_model_serializes_to_json() {
    let session = parse_sdp(CHROME_OFFER).unwrap();
    let json = serde_json::to_value(&session).unwrap();
    assert_eq!(json["media"][1]["content"], "main");
}
