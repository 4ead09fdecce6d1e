//! Post-processing of the config.xml written by `syncthing generate`.
//!
//! Three edits inside the `<gui>` element: bind to loopback, set the admin
//! user and bcrypt password hash, and skip the Host header check so the
//! onion address is accepted. [`missing_gui_settings`] re-reads the result.

use crate::emit::tor::SYNCTHING_GUI_PORT;
use thiserror::Error;

pub const GUI_USER: &str = "admin";

const INDENT: &str = "        ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncthingXmlError {
    #[error("config.xml has no <gui> element")]
    NoGuiElement,
    #[error("password hash is not a bcrypt hash")]
    NotBcrypt,
}

/// Byte range of the `<gui>` element's body (between the open and close tags).
fn gui_body(xml: &str) -> Option<(usize, usize)> {
    let start = xml
        .match_indices("<gui")
        .map(|(i, _)| i)
        .find(|&i| matches!(xml.as_bytes().get(i + 4), Some(b' ') | Some(b'>')))?;
    let body_start = start + xml[start..].find('>')? + 1;
    let body_end = body_start + xml[body_start..].find("</gui>")?;
    Some((body_start, body_end))
}

/// Drop every single-line `<tag>…</tag>` (or `<tag …/>`) from `body`.
fn strip_element(body: &str, tag: &str) -> String {
    let open = format!("<{}>", tag);
    let open_attr = format!("<{} ", tag);
    let empty = format!("<{}/>", tag);
    body.lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.starts_with(&open) || t.starts_with(&open_attr) || t.starts_with(&empty))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_bcrypt(hash: &str) -> bool {
    hash.starts_with("$2a$") || hash.starts_with("$2b$")
}

/// Apply the loopback bind, admin credentials and host-check skip.
pub fn secure_gui(xml: &str, password_hash: &str) -> Result<String, SyncthingXmlError> {
    if !is_bcrypt(password_hash) {
        return Err(SyncthingXmlError::NotBcrypt);
    }
    let (start, end) = gui_body(xml).ok_or(SyncthingXmlError::NoGuiElement)?;

    let mut body = xml[start..end].to_string();
    for tag in ["address", "user", "password", "insecureSkipHostcheck"] {
        body = strip_element(&body, tag);
    }

    let mut new_body = body.trim_end().to_string();
    new_body.push_str(&format!(
        "\n{INDENT}<address>127.0.0.1:{SYNCTHING_GUI_PORT}</address>"
    ));
    new_body.push_str(&format!("\n{INDENT}<user>{GUI_USER}</user>"));
    new_body.push_str(&format!("\n{INDENT}<password>{password_hash}</password>"));
    new_body.push_str(&format!(
        "\n{INDENT}<insecureSkipHostcheck>true</insecureSkipHostcheck>"
    ));
    new_body.push_str("\n    ");

    Ok(format!("{}{}{}", &xml[..start], new_body, &xml[end..]))
}

/// Settings `secure_gui` should have produced that are absent from `xml`.
/// Empty means the file passed verification.
pub fn missing_gui_settings(xml: &str) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !xml.contains(&format!("<address>127.0.0.1:{}</address>", SYNCTHING_GUI_PORT)) {
        missing.push("loopback GUI bind");
    }
    if !xml.contains(&format!("<user>{}</user>", GUI_USER)) {
        missing.push("GUI user");
    }
    if !(xml.contains("<password>$2a$") || xml.contains("<password>$2b$")) {
        missing.push("bcrypt password hash");
    }
    if !xml.contains("<insecureSkipHostcheck>true</insecureSkipHostcheck>") {
        missing.push("host check skip");
    }
    missing
}
