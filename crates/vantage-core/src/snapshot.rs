//! Offline snapshot loader for Design Center backup files.
//!
//! A backup is one XML document. Objects live under
//! `Project/Objects/Object`, each wrapping a single element named after
//! its Vantage type:
//!
//! ```xml
//! <Project>
//!   <ProjectInfo>
//!     <Controller1Info>
//!       <IPAddress>192.168.0.200</IPAddress>
//!       <MACAddress>00:01:02:03:04:05</MACAddress>
//!       <Firmware>3.9.1</Firmware>
//!     </Controller1Info>
//!   </ProjectInfo>
//!   <Objects>
//!     <Object>
//!       <Button VID="447" Master="1">
//!         <Name>Kitchen Scene</Name>
//!         <Parent Position="3">442</Parent>
//!       </Button>
//!     </Object>
//!   </Objects>
//! </Project>
//! ```
//!
//! Types missing from the [`TypeRegistry`] (wire links, ethernet links,
//! ...) and records that fail to parse are skipped, so partial or newer
//! files stay usable. Only a document that is not well-formed XML fails.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{ObjectRecord, Vid};
use crate::registry::TypeRegistry;

/// Network details of one controller, from `ProjectInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerInfo {
    pub vid: Vid,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub firmware: Option<String>,
}

/// Read every recognized object from the backup at `path`.
pub async fn read_objects(
    path: &Path,
    registry: &TypeRegistry,
) -> Result<Vec<ObjectRecord>, CoreError> {
    let xml = read(path).await?;
    let root = parse_tree(&xml).map_err(|message| snapshot_error(path, message))?;
    Ok(objects_in(&root, registry))
}

/// Read per-controller network details from the backup at `path`.
pub async fn read_controller_infos(path: &Path) -> Result<Vec<ControllerInfo>, CoreError> {
    let xml = read(path).await?;
    let root = parse_tree(&xml).map_err(|message| snapshot_error(path, message))?;
    Ok(controller_infos_in(&root))
}

/// Parse objects from an in-memory document.
pub fn parse_objects(xml: &str, registry: &TypeRegistry) -> Result<Vec<ObjectRecord>, CoreError> {
    let root = parse_tree(xml).map_err(|message| snapshot_error(Path::new("<inline>"), message))?;
    Ok(objects_in(&root, registry))
}

async fn read(path: &Path) -> Result<String, CoreError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| snapshot_error(path, e.to_string()))
}

fn snapshot_error(path: &Path, message: String) -> CoreError {
    CoreError::Snapshot {
        path: path.display().to_string(),
        message,
    }
}

// ── Document model ──────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
    /// An attribute or text node could not be decoded.
    malformed: bool,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Self {
        let mut element = Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Self::default()
        };
        for attribute in start.attributes() {
            let decoded = attribute.ok().and_then(|a| {
                let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
                a.unescape_value().ok().map(|v| (key, v.into_owned()))
            });
            match decoded {
                Some(pair) => element.attributes.push(pair),
                None => element.malformed = true,
            }
        }
        element
    }

    fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed text content, `None` when blank.
    fn text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }
}

fn parse_tree(xml: &str) -> Result<Element, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // Index 0 is the document itself.
    let mut stack = vec![Element::default()];
    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => return Err(format!("at byte {}: {e}", reader.error_position())),
        };
        match event {
            Event::Start(start) => stack.push(Element::open(&start)),
            Event::Empty(start) => attach(&mut stack, Element::open(&start)),
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    match text.unescape() {
                        Ok(text) => top.text.push_str(&text),
                        Err(_) => top.malformed = true,
                    }
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err("unbalanced closing tag".into());
                }
                if let Some(element) = stack.pop() {
                    attach(&mut stack, element);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err("unexpected end of document".into());
    }
    stack.pop().ok_or_else(|| "empty document".to_owned())
}

fn attach(stack: &mut [Element], element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    }
}

// ── Extraction ──────────────────────────────────────────────────────

fn objects_in(document: &Element, registry: &TypeRegistry) -> Vec<ObjectRecord> {
    let Some(objects) = document.child("Project").and_then(|p| p.child("Objects")) else {
        debug!("snapshot has no Objects section");
        return Vec::new();
    };

    let mut records = Vec::new();
    for wrapper in objects.children.iter().filter(|c| c.name == "Object") {
        let Some(typed) = wrapper.children.first() else {
            continue;
        };
        if !registry.is_known(&typed.name) {
            continue;
        }
        match record_from(typed) {
            Ok(record) => records.push(record),
            Err(message) => warn!(type_name = %typed.name, %message, "skipping snapshot record"),
        }
    }
    debug!(count = records.len(), "loaded snapshot objects");
    records
}

fn record_from(element: &Element) -> Result<ObjectRecord, String> {
    if element.malformed {
        return Err("undecodable attribute".into());
    }
    let vid: Vid = element
        .attribute("VID")
        .ok_or("missing VID")?
        .parse()
        .map_err(|e| format!("invalid VID: {e}"))?;

    let mut record = ObjectRecord::new(vid, element.name.clone());
    for (key, value) in element.attributes.iter().filter(|(k, _)| k != "VID") {
        record.attributes.insert(key.clone(), value.clone());
    }

    for child in &element.children {
        match child.name.as_str() {
            "Name" => record.name = child.text().unwrap_or_default().to_owned(),
            "Parent" => {
                if let Some(text) = child.text() {
                    let parent: Vid = text.parse().map_err(|e| format!("invalid Parent: {e}"))?;
                    // 0 means "no parent".
                    record.parent = (parent.get() != 0).then_some(parent);
                }
            }
            _ => {
                if let (true, Some(text)) = (child.children.is_empty(), child.text()) {
                    record.attributes.insert(child.name.clone(), text.to_owned());
                }
            }
        }
    }
    Ok(record)
}

fn controller_infos_in(document: &Element) -> Vec<ControllerInfo> {
    let Some(info) = document.child("Project").and_then(|p| p.child("ProjectInfo")) else {
        return Vec::new();
    };

    let field = |element: &Element, tag: &str| {
        element
            .child(tag)
            .and_then(Element::text)
            .map(ToOwned::to_owned)
    };

    info.children
        .iter()
        .filter_map(|element| {
            let vid = element
                .name
                .strip_prefix("Controller")?
                .strip_suffix("Info")?
                .parse()
                .ok()?;
            Some(ControllerInfo {
                vid,
                ip_address: field(element, "IPAddress"),
                mac_address: field(element, "MACAddress"),
                firmware: field(element, "Firmware"),
            })
        })
        .collect()
}
