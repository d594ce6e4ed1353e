//! XMLTV document builder.
//!
//! Output is deterministic: channels are sorted by id, programmes by
//! `(channel, start, stop, title)`, and times are rendered in the
//! configured timezone at each instant.

use std::collections::HashMap;
use std::io::Write;

use anyhow::Result;
use chrono::TimeZone;
use chrono_tz::Tz;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::model::{Channel, Programme};
use crate::text::clean_description;

/// Value of the root `generator-info-name` attribute.
pub const GENERATOR_INFO_NAME: &str = "freeview-epg";

/// Value of the root `generator-info-url` attribute.
pub const GENERATOR_INFO_URL: &str = "https://github.com/dp247/Freeview-EPG";

/// XMLTV time format.
const TIME_FORMAT: &str = "%Y%m%d%H%M%S %z";

/// Formats an epoch instant as `YYYYMMDDHHMMSS ±HHMM` in `tz`.
#[must_use]
pub fn format_timestamp(epoch: i64, tz: Tz) -> Option<String> {
    tz.timestamp_opt(epoch, 0)
        .single()
        .map(|dt| dt.format(TIME_FORMAT).to_string())
}

/// Drops characters that XML 1.0 cannot carry.
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r')
                || !(c.is_control() || matches!(c, '\u{FFFE}' | '\u{FFFF}'))
        })
        .collect()
}

/// Adds an attribute with its value made XML-safe.
fn push_safe_attribute(element: &mut BytesStart<'_>, key: &str, value: &str) {
    element.push_attribute((key, xml_safe(value).as_str()));
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    for (key, value) in attributes {
        push_safe_attribute(&mut start, key, value);
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(&xml_safe(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_channel<W: Write>(writer: &mut Writer<W>, channel: &Channel) -> Result<()> {
    let mut start = BytesStart::new("channel");
    push_safe_attribute(&mut start, "id", &channel.xmltv_id);
    writer.write_event(Event::Start(start))?;
    write_text_element(
        writer,
        "display-name",
        &[("lang", channel.lang.as_str())],
        channel.display_name(),
    )?;
    if let Some(icon) = channel.icon_url.as_deref().filter(|i| !i.trim().is_empty()) {
        let mut icon_el = BytesStart::new("icon");
        push_safe_attribute(&mut icon_el, "src", icon);
        writer.write_event(Event::Empty(icon_el))?;
    }
    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    Ok(())
}

/// A programme ready to be written, with its rendered times.
#[derive(Debug)]
struct Entry<'a> {
    programme: &'a Programme,
    lang: &'a str,
    start: String,
    stop: String,
}

fn write_programme<W: Write>(writer: &mut Writer<W>, entry: &Entry<'_>) -> Result<()> {
    let programme = entry.programme;
    let lang = entry.lang;

    let mut start = BytesStart::new("programme");
    push_safe_attribute(&mut start, "channel", programme.channel());
    push_safe_attribute(&mut start, "start", &entry.start);
    push_safe_attribute(&mut start, "stop", &entry.stop);
    writer.write_event(Event::Start(start))?;

    write_text_element(writer, "title", &[("lang", lang)], programme.title())?;

    let description = programme.description().map(clean_description);
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        write_text_element(writer, "desc", &[("lang", lang)], &description)?;
    }

    if let Some(icon) = programme.icon() {
        let mut icon_el = BytesStart::new("icon");
        push_safe_attribute(&mut icon_el, "src", icon);
        writer.write_event(Event::Empty(icon_el))?;
    }

    if programme.is_premiere() {
        writer.write_event(Event::Empty(BytesStart::new("premiere")))?;
    }

    if let Some((season, episode)) = programme.episode_numbers() {
        // xmltv_ns is zero-based.
        let xmltv_ns = format!(
            "{}.{}.0",
            season.saturating_sub(1),
            episode.saturating_sub(1)
        );
        write_text_element(
            writer,
            "episode-num",
            &[("system", "xmltv_ns")],
            &xmltv_ns,
        )?;
        write_text_element(
            writer,
            "episode-num",
            &[("system", "onscreen")],
            &format!("S{season}E{episode}"),
        )?;
    }

    writer.write_event(Event::End(BytesEnd::new("programme")))?;
    Ok(())
}

/// Serializes channels and (deduplicated) programmes to an XMLTV document.
///
/// A repeated channel id keeps its first definition. Programmes referencing
/// a channel id that is not configured, or whose times cannot be rendered in
/// `tz`, are dropped with a warning.
///
/// # Errors
///
/// Returns an error if writing an XML event fails.
pub fn build_xmltv(channels: &[Channel], programmes: &[Programme], tz: Tz) -> Result<Vec<u8>> {
    let mut langs: HashMap<&str, &str> = HashMap::with_capacity(channels.len());
    let mut sorted_channels: Vec<&Channel> = Vec::with_capacity(channels.len());
    for channel in channels {
        if langs.contains_key(channel.xmltv_id.as_str()) {
            tracing::warn!(channel = %channel.xmltv_id, "Ignoring repeated channel id");
            continue;
        }
        langs.insert(channel.xmltv_id.as_str(), channel.lang.as_str());
        sorted_channels.push(channel);
    }
    sorted_channels.sort_by(|a, b| a.xmltv_id.cmp(&b.xmltv_id));

    let mut entries: Vec<Entry<'_>> = Vec::with_capacity(programmes.len());
    for programme in programmes {
        let Some(&lang) = langs.get(programme.channel()) else {
            tracing::warn!(
                channel = programme.channel(),
                title = programme.title(),
                "Dropping programme for unconfigured channel"
            );
            continue;
        };
        let (Some(start), Some(stop)) = (
            format_timestamp(programme.start(), tz),
            format_timestamp(programme.stop(), tz),
        ) else {
            tracing::warn!(
                channel = programme.channel(),
                title = programme.title(),
                start = programme.start(),
                "Dropping programme with out-of-range time"
            );
            continue;
        };
        entries.push(Entry {
            programme,
            lang,
            start,
            stop,
        });
    }
    entries.sort_by(|a, b| {
        let (a, b) = (a.programme, b.programme);
        (a.channel(), a.start(), a.stop(), a.title()).cmp(&(
            b.channel(),
            b.start(),
            b.stop(),
            b.title(),
        ))
    });

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("tv");
    root.push_attribute(("generator-info-name", GENERATOR_INFO_NAME));
    root.push_attribute(("generator-info-url", GENERATOR_INFO_URL));
    writer.write_event(Event::Start(root))?;

    for channel in sorted_channels {
        write_channel(&mut writer, channel)?;
    }
    for entry in &entries {
        write_programme(&mut writer, entry)?;
    }

    writer.write_event(Event::End(BytesEnd::new("tv")))?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    tracing::debug!(bytes = out.len(), "Built XMLTV document");
    Ok(out)
}
