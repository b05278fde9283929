//! Command execution.

use crate::config::Config;
use crate::Commands;
use bytes::Bytes;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use tup_protocol::{frame_len, RawFields, UniPacket, Version};

type CommandResult = Result<String, Box<dyn std::error::Error>>;

/// Executes a command and returns the formatted output.
pub fn execute(cmd: Commands, config: &Config) -> CommandResult {
    match cmd {
        Commands::Inspect { input, hex, pretty } => {
            let bytes = read_input(&input, hex)?;
            let packet = UniPacket::from_bytes(&bytes)?;
            let summary = PacketSummary::from_packet(&packet);
            if pretty {
                Ok(summary.render())
            } else {
                Ok(serde_json::to_string_pretty(&summary)?)
            }
        }

        Commands::Encode {
            servant,
            func,
            version,
            request_id,
            params,
            raw,
        } => {
            let version = match version {
                Some(v) => Version::try_from(v)?,
                None => config.packet_version(),
            };

            let mut packet = UniPacket::with_version(version);
            packet.set_servant_name(servant);
            packet.set_func_name(func);
            packet.set_request_id(request_id);
            packet.set_packet_type(config.packet_type);
            packet.set_message_type(config.message_type);
            packet.set_timeout(config.timeout_ms);
            packet.set_context(config.context.clone());

            for arg in &params {
                let param = Param::parse(arg)?;
                param.put_into(&mut packet)?;
            }

            let bytes = packet.encode()?;
            if raw {
                std::io::stdout().write_all(&bytes)?;
                Ok(String::new())
            } else {
                Ok(hex::encode(&bytes))
            }
        }

        Commands::FrameLen { input, hex } => {
            let bytes = read_input(&input, hex)?;
            match frame_len(&bytes) {
                Some(declared) if declared as usize == bytes.len() => Ok(format!(
                    "{} declared {} bytes, read {} bytes",
                    "OK".green(),
                    declared,
                    bytes.len()
                )),
                Some(declared) => Ok(format!(
                    "{} declared {} bytes, read {} bytes",
                    "Mismatch".yellow(),
                    declared,
                    bytes.len()
                )),
                None => Err(format!("input too short: {} bytes", bytes.len()).into()),
            }
        }
    }
}

/// Reads packet bytes from a file or stdin, decoding hex text if asked to.
fn read_input(input: &str, is_hex: bool) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut data = Vec::new();
    if input == "-" {
        std::io::stdin().read_to_end(&mut data)?;
    } else {
        data = std::fs::read(input)?;
    }

    if is_hex {
        let text: String = String::from_utf8(data)?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        Ok(hex::decode(text)?)
    } else {
        Ok(data)
    }
}

/// A `name:type=value` parameter given on the command line.
#[derive(Debug, PartialEq)]
enum Param {
    I32(String, i32),
    I64(String, i64),
    Bool(String, bool),
    Str(String, String),
    Bytes(String, Bytes),
}

impl Param {
    fn parse(arg: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (left, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected name:type=value, got '{}'", arg))?;
        let (name, ty) = left
            .rsplit_once(':')
            .ok_or_else(|| format!("missing type in '{}'", arg))?;
        let name = name.to_string();

        let param = match ty {
            "i32" => Param::I32(name, value.parse()?),
            "i64" => Param::I64(name, value.parse()?),
            "bool" => Param::Bool(name, value.parse()?),
            "string" => Param::Str(name, value.to_string()),
            "bytes" => Param::Bytes(name, Bytes::from(hex::decode(value)?)),
            other => return Err(format!("unknown parameter type '{}'", other).into()),
        };
        Ok(param)
    }

    fn put_into(&self, packet: &mut UniPacket) -> Result<(), tup_protocol::TupError> {
        match self {
            Param::I32(name, v) => packet.put(name, v),
            Param::I64(name, v) => packet.put(name, v),
            Param::Bool(name, v) => packet.put(name, v),
            Param::Str(name, v) => packet.put(name, v),
            Param::Bytes(name, v) => packet.put(name, v),
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldSummary {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    type_name: Option<String>,
    size: usize,
    hex: String,
}

#[derive(Debug, Serialize)]
struct PacketSummary {
    version: i16,
    packet_type: i8,
    message_type: i32,
    request_id: i32,
    servant_name: String,
    func_name: String,
    timeout: i32,
    context: BTreeMap<String, String>,
    status: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_value: Option<i32>,
    fields: Vec<FieldSummary>,
}

impl PacketSummary {
    fn from_packet(packet: &UniPacket) -> Self {
        let mut fields = Vec::new();
        match packet.buffer().raw_data() {
            RawFields::Legacy(by_name) => {
                for (name, by_type) in by_name {
                    for (type_name, blob) in by_type {
                        fields.push(FieldSummary {
                            name: name.clone(),
                            type_name: Some(type_name.clone()),
                            size: blob.len(),
                            hex: hex::encode(blob),
                        });
                    }
                }
            }
            RawFields::Flat(by_name) => {
                for (name, blob) in by_name {
                    fields.push(FieldSummary {
                        name: name.clone(),
                        type_name: None,
                        size: blob.len(),
                        hex: hex::encode(blob),
                    });
                }
            }
        }

        Self {
            version: packet.version().as_i16(),
            packet_type: packet.packet_type(),
            message_type: packet.message_type(),
            request_id: packet.request_id(),
            servant_name: packet.servant_name().to_string(),
            func_name: packet.func_name().to_string(),
            timeout: packet.timeout(),
            context: packet.context().clone().into_iter().collect(),
            status: packet.status().clone().into_iter().collect(),
            return_value: packet.return_value(),
            fields,
        }
    }

    fn render(&self) -> String {
        let mut out = format!(
            "{} {}.{} (v{}, request {}, timeout {} ms)\n",
            "Packet".bold(),
            self.servant_name.cyan(),
            self.func_name.cyan(),
            self.version,
            self.request_id,
            self.timeout
        );
        if let Some(ret) = self.return_value {
            out.push_str(&format!("  {} {}\n", "return".yellow(), ret));
        }
        for (k, v) in &self.context {
            out.push_str(&format!("  {} {}={}\n", "context".dimmed(), k, v));
        }
        for (k, v) in &self.status {
            out.push_str(&format!("  {} {}={}\n", "status".dimmed(), k, v));
        }
        for field in &self.fields {
            let label = match &field.type_name {
                Some(t) => format!("{} <{}>", field.name, t),
                None => field.name.clone(),
            };
            out.push_str(&format!(
                "  {} {} ({} B) {}\n",
                "field".green(),
                label,
                field.size,
                field.hex
            ));
        }
        out.trim_end().to_string()
    }
}
