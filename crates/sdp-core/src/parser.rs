//! SDP text parser.
//!
//! Lines have the form `<type>=<value>`. The grammar of the individual
//! values that the call layer needs is written with `nom`; everything else
//! is kept verbatim as a generic attribute.

use nom::{
    IResult,
    bytes::complete::take_till1,
    character::complete::{anychar, char, digit1, space1},
    combinator::{map_res, opt, rest},
    multi::{many0, many1},
    sequence::{preceded, tuple},
};
use tracing::trace;

use crate::error::{SdpError, SdpResult};
use crate::types::{
    Attribute, Bandwidth, Connection, Direction, Fmtp, Group, MediaDescription, MediaKind, Origin,
    RtcpFeedback, RtpMap, SessionDescription, Source, SsrcGroup, Timing,
};

/// Split one SDP line into its type character and value
pub fn parse_sdp_line(input: &str) -> IResult<&str, (char, &str)> {
    let (input, key) = anychar(input)?;
    let (input, _) = char('=')(input)?;
    let (input, value) = rest(input)?;
    Ok((input, (key, value.trim())))
}

fn token(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c == ' ' || c == '\t')(input)
}

fn number<T: std::str::FromStr>(input: &str) -> IResult<&str, T> {
    map_res(digit1, |s: &str| s.parse::<T>())(input)
}

/// m=<media> <port>[/<count>] <proto> <fmt>*
fn media_line(input: &str) -> IResult<&str, MediaDescription> {
    let (input, (kind, _, port, port_count, _, protocol)) = tuple((
        token,
        space1,
        number::<u16>,
        opt(preceded(char('/'), number::<u16>)),
        space1,
        token,
    ))(input)?;
    let (input, formats) = many0(preceded(space1, token))(input)?;

    let mut media = MediaDescription::new(MediaKind::from_token(kind), port, protocol);
    media.port_count = port_count;
    media.formats = formats.into_iter().map(str::to_string).collect();
    Ok((input, media))
}

fn origin_line(input: &str) -> IResult<&str, Origin> {
    let (input, (username, _, session_id, _, session_version, _, net_type, _, addr_type, _, address)) =
        tuple((token, space1, token, space1, token, space1, token, space1, token, space1, token))(input)?;
    Ok((
        input,
        Origin {
            username: username.to_string(),
            session_id: session_id.to_string(),
            session_version: session_version.to_string(),
            net_type: net_type.to_string(),
            addr_type: addr_type.to_string(),
            address: address.to_string(),
        },
    ))
}

fn connection_line(input: &str) -> IResult<&str, Connection> {
    let (input, (net_type, _, addr_type, _, address)) =
        tuple((token, space1, token, space1, token))(input)?;
    Ok((
        input,
        Connection {
            net_type: net_type.to_string(),
            addr_type: addr_type.to_string(),
            address: address.to_string(),
        },
    ))
}

fn timing_line(input: &str) -> IResult<&str, Timing> {
    let (input, (start, _, stop)) = tuple((number::<u64>, space1, number::<u64>))(input)?;
    Ok((input, Timing { start, stop }))
}

/// b=<type>:<limit>
fn bandwidth_line(input: &str) -> IResult<&str, Bandwidth> {
    let (input, (bw_type, _, limit)) =
        tuple((take_till1(|c: char| c == ':'), char(':'), number::<u64>))(input)?;
    Ok((input, Bandwidth::new(bw_type, limit)))
}

/// <pt> <codec>/<rate>[/<encoding>]
fn rtpmap_value(input: &str) -> IResult<&str, RtpMap> {
    let (input, (payload, _, codec, _, rate)) = tuple((
        number::<u8>,
        space1,
        take_till1(|c: char| c == '/'),
        char('/'),
        number::<u32>,
    ))(input)?;
    let (input, encoding) = opt(preceded(char('/'), rest))(input)?;
    Ok((
        input,
        RtpMap {
            payload,
            codec: codec.to_string(),
            rate,
            encoding: encoding.map(str::to_string),
        },
    ))
}

fn fmtp_value(input: &str) -> IResult<&str, Fmtp> {
    let (input, (payload, _, config)) = tuple((number::<u8>, space1, rest))(input)?;
    Ok((
        input,
        Fmtp {
            payload,
            config: config.to_string(),
        },
    ))
}

/// <pt|*> <type>[ <subtype>]
fn rtcp_fb_value(input: &str) -> IResult<&str, RtcpFeedback> {
    let (input, (payload, _, fb_type)) = tuple((token, space1, token))(input)?;
    let (input, subtype) = opt(preceded(space1, rest))(input)?;
    Ok((
        input,
        RtcpFeedback {
            payload: payload.to_string(),
            fb_type: fb_type.to_string(),
            subtype: subtype.map(str::to_string),
        },
    ))
}

/// <ssrc> <attribute>[:<value>]
fn ssrc_value(input: &str) -> IResult<&str, (u32, Option<&str>)> {
    let (input, ssrc) = number::<u32>(input)?;
    let (input, attribute) = opt(preceded(space1, rest))(input)?;
    Ok((input, (ssrc, attribute)))
}

fn ssrc_group_value(input: &str) -> IResult<&str, SsrcGroup> {
    let (input, semantics) = token(input)?;
    let (input, ssrcs) = many1(preceded(space1, number::<u32>))(input)?;
    Ok((
        input,
        SsrcGroup {
            semantics: semantics.to_string(),
            ssrcs,
        },
    ))
}

fn group_value(input: &str) -> IResult<&str, Group> {
    let (input, semantics) = token(input)?;
    let (input, mids) = many0(preceded(space1, token))(input)?;
    Ok((
        input,
        Group {
            semantics: semantics.to_string(),
            mids: mids.into_iter().map(str::to_string).collect(),
        },
    ))
}

fn finish_attribute<O>(parsed: IResult<&str, O>, name: &str, value: &str) -> SdpResult<O> {
    parsed
        .map(|(_, out)| out)
        .map_err(|err| SdpError::attribute(name, value, err.to_string()))
}

fn finish_line<O>(parsed: IResult<&str, O>, line: &str) -> SdpResult<O> {
    parsed
        .map(|(_, out)| out)
        .map_err(|err| SdpError::parse(line, err.to_string()))
}

fn split_attribute(value: &str) -> (&str, Option<&str>) {
    match value.split_once(':') {
        Some((name, rest)) => (name, Some(rest)),
        None => (value, None),
    }
}

fn apply_media_attribute(
    media: &mut MediaDescription,
    name: &str,
    value: Option<&str>,
) -> SdpResult<()> {
    if let Some(direction) = Direction::from_attribute(name) {
        media.direction = Some(direction);
        return Ok(());
    }

    let text = value.unwrap_or_default();
    match name {
        "mid" => media.mid = Some(text.to_string()),
        "rtcp-mux" => media.rtcp_mux = true,
        "rtcp-rsize" => media.rtcp_rsize = true,
        "ice-ufrag" => media.ice_ufrag = Some(text.to_string()),
        "ice-pwd" => media.ice_pwd = Some(text.to_string()),
        "content" => media.content = Some(text.to_string()),
        "bundle-only" => media.bundle_only = true,
        "candidate" => media.candidates.push(text.to_string()),
        "remote-candidates" => media.remote_candidates = Some(text.to_string()),
        "end-of-candidates" => media.end_of_candidates = true,
        "rtpmap" => media.rtp.push(finish_attribute(rtpmap_value(text), name, text)?),
        "fmtp" => media.fmtp.push(finish_attribute(fmtp_value(text), name, text)?),
        "rtcp-fb" => media
            .rtcp_fb
            .push(finish_attribute(rtcp_fb_value(text), name, text)?),
        "ssrc-group" => media
            .ssrc_groups
            .push(finish_attribute(ssrc_group_value(text), name, text)?),
        "ssrc" => {
            let (ssrc, attribute) = finish_attribute(ssrc_value(text), name, text)?;
            let position = match media.sources.iter().position(|s| s.ssrc == ssrc) {
                Some(position) => position,
                None => {
                    media.sources.push(Source::new(ssrc));
                    media.sources.len() - 1
                }
            };
            if let Some(attribute) = attribute {
                let (attr_name, attr_value) = split_attribute(attribute);
                media.sources[position]
                    .attributes
                    .push(Attribute::new(attr_name, attr_value.map(str::to_string)));
            }
        }
        _ => media
            .attributes
            .push(Attribute::new(name, value.map(str::to_string))),
    }
    Ok(())
}

fn apply_session_attribute(
    session: &mut SessionDescription,
    name: &str,
    value: Option<&str>,
) -> SdpResult<()> {
    let text = value.unwrap_or_default();
    match name {
        "group" => session
            .groups
            .push(finish_attribute(group_value(text), name, text)?),
        "msid-semantic" => session.msid_semantic = Some(text.trim().to_string()),
        "ice-ufrag" => session.ice_ufrag = Some(text.to_string()),
        "ice-pwd" => session.ice_pwd = Some(text.to_string()),
        "ice-options" => session.ice_options = Some(text.to_string()),
        "fingerprint" => session.fingerprint = Some(text.to_string()),
        _ => session
            .attributes
            .push(Attribute::new(name, value.map(str::to_string))),
    }
    Ok(())
}

/// Parse a complete session description
pub fn parse_sdp(text: &str) -> SdpResult<SessionDescription> {
    let mut session = SessionDescription::default();
    let mut current: Option<MediaDescription> = None;
    let mut saw_version = false;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let (_, (kind, value)) = parse_sdp_line(line)
            .map_err(|_| SdpError::parse(line, "expected <type>=<value>"))?;

        if !saw_version {
            if kind != 'v' {
                return Err(SdpError::MissingVersion);
            }
            saw_version = true;
            session.version = value
                .parse()
                .map_err(|_| SdpError::parse(line, "version is not a number"))?;
            continue;
        }

        match kind {
            'o' => session.origin = finish_line(origin_line(value), line)?,
            's' => session.session_name = value.to_string(),
            't' => session.timing = finish_line(timing_line(value), line)?,
            'c' => {
                let connection = finish_line(connection_line(value), line)?;
                match current.as_mut() {
                    Some(media) => media.connection = Some(connection),
                    None => session.connection = Some(connection),
                }
            }
            'b' => {
                let bandwidth = finish_line(bandwidth_line(value), line)?;
                match current.as_mut() {
                    Some(media) => media.bandwidth.push(bandwidth),
                    None => session.bandwidth.push(bandwidth),
                }
            }
            'm' => {
                let media = media_line(value)
                    .map(|(_, media)| media)
                    .map_err(|err| SdpError::media_line(line, err.to_string()))?;
                if let Some(done) = current.replace(media) {
                    session.media.push(done);
                }
            }
            'a' => {
                let (name, attr_value) = split_attribute(value);
                match current.as_mut() {
                    Some(media) => apply_media_attribute(media, name, attr_value)?,
                    None => apply_session_attribute(&mut session, name, attr_value)?,
                }
            }
            other => trace!("Skipping SDP line of type '{}': {}", other, line),
        }
    }

    if !saw_version {
        return Err(SdpError::MissingVersion);
    }
    if let Some(done) = current {
        session.media.push(done);
    }
    Ok(session)
}

impl SessionDescription {
    /// Parse SDP text, see [`parse_sdp`]
    pub fn parse(text: &str) -> SdpResult<Self> {
        parse_sdp(text)
    }
}

impl std::str::FromStr for SessionDescription {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_sdp(s)
    }
}
