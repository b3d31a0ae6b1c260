use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use sonolink_frame::{encode, frame_hex, Reading, FRAME_SIZE};
use sonolink_node::LedZone;
use sonolink_transport::{PortInfo, PortKind};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReadingOutput {
    distance_cm: f32,
    light_level: i32,
    zone: &'static str,
    frame: String,
    timestamp_ms: u64,
}

impl ReadingOutput {
    fn new(reading: &Reading, zone: LedZone) -> Self {
        Self {
            distance_cm: reading.distance_cm,
            light_level: reading.light_level,
            zone: zone.as_str(),
            frame: hex::encode(encode(reading)),
            timestamp_ms: now_unix_millis(),
        }
    }
}

pub fn print_reading(reading: &Reading, zone: LedZone, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ReadingOutput::new(reading, zone)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DISTANCE (cm)", "LIGHT", "ZONE"])
                .add_row(vec![
                    format!("{:.2}", reading.distance_cm),
                    reading.light_level.to_string(),
                    zone.as_str().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "distance={:.2}cm light={} zone={} leds={}",
                reading.distance_cm,
                reading.light_level,
                zone.as_str(),
                led_row(zone)
            );
        }
        OutputFormat::Raw => print_raw(&encode(reading)),
    }
}

#[derive(Serialize)]
struct FrameOutput {
    frame: String,
    hex: String,
    distance_cm: f32,
    light_level: i32,
    checksum: String,
}

/// Print an encoded frame with the reading it carries.
pub fn print_frame(frame: &[u8; FRAME_SIZE], reading: &Reading, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&FrameOutput {
            frame: frame_hex(frame),
            hex: hex::encode(frame),
            distance_cm: reading.distance_cm,
            light_level: reading.light_level,
            checksum: format!("{:02X}", frame[FRAME_SIZE - 2]),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "DISTANCE (cm)", "LIGHT"])
                .add_row(vec![
                    frame_hex(frame),
                    reading.distance_cm.to_string(),
                    reading.light_level.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", frame_hex(frame)),
        OutputFormat::Raw => print_raw(frame),
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    product: Option<&'a str>,
}

impl<'a> From<&'a PortInfo> for PortOutput<'a> {
    fn from(port: &'a PortInfo) -> Self {
        let (vid, pid, product) = match &port.kind {
            PortKind::Usb { vid, pid, product } => (
                Some(format!("{vid:04x}")),
                Some(format!("{pid:04x}")),
                product.as_deref(),
            ),
            _ => (None, None, None),
        };
        Self {
            name: &port.name,
            kind: port.kind.as_str(),
            vid,
            pid,
            product,
        }
    }
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    let rows: Vec<PortOutput<'_>> = ports.iter().map(PortOutput::from).collect();
    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "KIND", "VID:PID", "PRODUCT"]);
            for row in &rows {
                table.add_row(vec![
                    row.name.to_string(),
                    row.kind.to_string(),
                    usb_id(row),
                    row.product.unwrap_or("").to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if rows.is_empty() {
                println!("no serial ports found");
            }
            for row in &rows {
                println!("{} ({}) {}", row.name, row.kind, usb_id(row));
            }
        }
        OutputFormat::Raw => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Three LEDs, nearest first.
fn led_row(zone: LedZone) -> String {
    zone.leds()
        .iter()
        .map(|on| if *on { '*' } else { '.' })
        .collect()
}

fn usb_id(row: &PortOutput<'_>) -> String {
    match (&row.vid, &row.pid) {
        (Some(vid), Some(pid)) => format!("{vid}:{pid}"),
        _ => String::new(),
    }
}

fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_json_shape() {
        let reading = Reading::new(12.5, 300);
        let value = serde_json::to_value(ReadingOutput::new(&reading, LedZone::Mid)).unwrap();

        assert_eq!(value["distance_cm"], 12.5);
        assert_eq!(value["light_level"], 300);
        assert_eq!(value["zone"], "mid");
        assert_eq!(value["frame"], "55000048412c01000071aa");
        assert!(value["timestamp_ms"].as_u64().unwrap() > 0);
    }

    #[test]
    fn usb_port_row_carries_ids() {
        let port = PortInfo {
            name: "/dev/ttyACM0".to_string(),
            kind: PortKind::Usb {
                vid: 0x2341,
                pid: 0x0043,
                product: Some("Uno".to_string()),
            },
        };
        let row = PortOutput::from(&port);

        assert_eq!(row.kind, "usb");
        assert_eq!(usb_id(&row), "2341:0043");
        assert_eq!(row.product, Some("Uno"));
    }

    #[test]
    fn non_usb_port_omits_ids() {
        let port = PortInfo {
            name: "/dev/ttyS0".to_string(),
            kind: PortKind::Unknown,
        };
        let value = serde_json::to_value(PortOutput::from(&port)).unwrap();

        assert_eq!(value["name"], "/dev/ttyS0");
        assert!(value.get("vid").is_none());
    }

    #[test]
    fn led_row_marks_lit_leds() {
        assert_eq!(led_row(LedZone::Off), "...");
        assert_eq!(led_row(LedZone::Near).chars().filter(|c| *c == '*').count(), 1);
    }
}
