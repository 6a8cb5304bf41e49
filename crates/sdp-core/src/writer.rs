//! SDP text output. Every line is terminated with CRLF.

use std::fmt::{self, Write};

use crate::types::{MediaDescription, SessionDescription};

fn line(f: &mut fmt::Formatter<'_>, args: fmt::Arguments<'_>) -> fmt::Result {
    f.write_fmt(args)?;
    f.write_str("\r\n")
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        line(f, format_args!("v={}", self.version))?;
        let o = &self.origin;
        line(
            f,
            format_args!(
                "o={} {} {} {} {} {}",
                o.username, o.session_id, o.session_version, o.net_type, o.addr_type, o.address
            ),
        )?;
        line(f, format_args!("s={}", self.session_name))?;
        if let Some(c) = &self.connection {
            line(f, format_args!("c={} {} {}", c.net_type, c.addr_type, c.address))?;
        }
        for bw in &self.bandwidth {
            line(f, format_args!("b={}:{}", bw.bw_type, bw.limit))?;
        }
        line(f, format_args!("t={} {}", self.timing.start, self.timing.stop))?;

        for group in &self.groups {
            let mut value = group.semantics.clone();
            for mid in &group.mids {
                let _ = write!(value, " {}", mid);
            }
            line(f, format_args!("a=group:{}", value))?;
        }
        if let Some(semantic) = &self.msid_semantic {
            line(f, format_args!("a=msid-semantic: {}", semantic))?;
        }
        if let Some(ufrag) = &self.ice_ufrag {
            line(f, format_args!("a=ice-ufrag:{}", ufrag))?;
        }
        if let Some(pwd) = &self.ice_pwd {
            line(f, format_args!("a=ice-pwd:{}", pwd))?;
        }
        if let Some(options) = &self.ice_options {
            line(f, format_args!("a=ice-options:{}", options))?;
        }
        if let Some(fingerprint) = &self.fingerprint {
            line(f, format_args!("a=fingerprint:{}", fingerprint))?;
        }
        for attribute in &self.attributes {
            line(f, format_args!("a={}", attribute))?;
        }

        for media in &self.media {
            write_media(f, media)?;
        }
        Ok(())
    }
}

fn write_media(f: &mut fmt::Formatter<'_>, media: &MediaDescription) -> fmt::Result {
    let port = match media.port_count {
        Some(count) => format!("{}/{}", media.port, count),
        None => media.port.to_string(),
    };
    let mut m_line = format!("m={} {} {}", media.kind, port, media.protocol);
    for format in &media.formats {
        let _ = write!(m_line, " {}", format);
    }
    line(f, format_args!("{}", m_line))?;

    if let Some(c) = &media.connection {
        line(f, format_args!("c={} {} {}", c.net_type, c.addr_type, c.address))?;
    }
    for bw in &media.bandwidth {
        line(f, format_args!("b={}:{}", bw.bw_type, bw.limit))?;
    }
    if let Some(ufrag) = &media.ice_ufrag {
        line(f, format_args!("a=ice-ufrag:{}", ufrag))?;
    }
    if let Some(pwd) = &media.ice_pwd {
        line(f, format_args!("a=ice-pwd:{}", pwd))?;
    }
    for candidate in &media.candidates {
        line(f, format_args!("a=candidate:{}", candidate))?;
    }
    if let Some(remote) = &media.remote_candidates {
        line(f, format_args!("a=remote-candidates:{}", remote))?;
    }
    if media.end_of_candidates {
        line(f, format_args!("a=end-of-candidates"))?;
    }
    for attribute in &media.attributes {
        line(f, format_args!("a={}", attribute))?;
    }
    if let Some(mid) = &media.mid {
        line(f, format_args!("a=mid:{}", mid))?;
    }
    if let Some(content) = &media.content {
        line(f, format_args!("a=content:{}", content))?;
    }
    if media.bundle_only {
        line(f, format_args!("a=bundle-only"))?;
    }
    if let Some(direction) = media.direction {
        line(f, format_args!("a={}", direction))?;
    }
    if media.rtcp_mux {
        line(f, format_args!("a=rtcp-mux"))?;
    }
    if media.rtcp_rsize {
        line(f, format_args!("a=rtcp-rsize"))?;
    }

    for map in &media.rtp {
        match &map.encoding {
            Some(encoding) => line(
                f,
                format_args!("a=rtpmap:{} {}/{}/{}", map.payload, map.codec, map.rate, encoding),
            )?,
            None => line(
                f,
                format_args!("a=rtpmap:{} {}/{}", map.payload, map.codec, map.rate),
            )?,
        }
        for fb in media
            .rtcp_fb
            .iter()
            .filter(|fb| fb.payload.parse::<u8>().ok() == Some(map.payload))
        {
            write_rtcp_fb(f, &fb.payload, &fb.fb_type, fb.subtype.as_deref())?;
        }
        if let Some(fmtp) = media.fmtp_for(map.payload) {
            line(f, format_args!("a=fmtp:{} {}", fmtp.payload, fmtp.config))?;
        }
    }

    // Feedback and parameters not tied to a mapped payload, including `*`
    let mapped = |payload: u8| media.rtp.iter().any(|m| m.payload == payload);
    for fb in media
        .rtcp_fb
        .iter()
        .filter(|fb| fb.payload.parse::<u8>().map_or(true, |pt| !mapped(pt)))
    {
        write_rtcp_fb(f, &fb.payload, &fb.fb_type, fb.subtype.as_deref())?;
    }
    for fmtp in media.fmtp.iter().filter(|fmtp| !mapped(fmtp.payload)) {
        line(f, format_args!("a=fmtp:{} {}", fmtp.payload, fmtp.config))?;
    }

    for group in &media.ssrc_groups {
        let mut value = group.semantics.clone();
        for ssrc in &group.ssrcs {
            let _ = write!(value, " {}", ssrc);
        }
        line(f, format_args!("a=ssrc-group:{}", value))?;
    }
    for source in &media.sources {
        if source.attributes.is_empty() {
            line(f, format_args!("a=ssrc:{}", source.ssrc))?;
        }
        for attribute in &source.attributes {
            line(f, format_args!("a=ssrc:{} {}", source.ssrc, attribute))?;
        }
    }
    Ok(())
}

fn write_rtcp_fb(
    f: &mut fmt::Formatter<'_>,
    payload: &str,
    fb_type: &str,
    subtype: Option<&str>,
) -> fmt::Result {
    match subtype {
        Some(subtype) => line(f, format_args!("a=rtcp-fb:{} {} {}", payload, fb_type, subtype)),
        None => line(f, format_args!("a=rtcp-fb:{} {}", payload, fb_type)),
    }
}
