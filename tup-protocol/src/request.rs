//! Outer request structure carried inside every framed packet.
//!
//! Field tags:
//!
//! ```text
//!  1 version       int16
//!  2 packet_type   int8
//!  3 message_type  int32
//!  4 request_id    int32
//!  5 servant_name  string
//!  6 func_name     string
//!  7 buffer        bytes
//!  8 timeout       int32
//!  9 context       map<string,string>
//! 10 status        map<string,string>
//! ```

use bytes::Bytes;
use std::collections::HashMap;
use tup_codec::{CodecError, TarsReader, TarsWriter};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestPacket {
    pub version: i16,
    pub packet_type: i8,
    pub message_type: i32,
    pub request_id: i32,
    pub servant_name: String,
    pub func_name: String,
    /// Encoded field buffer.
    pub buffer: Bytes,
    pub timeout: i32,
    pub context: HashMap<String, String>,
    pub status: HashMap<String, String>,
}

impl RequestPacket {
    pub fn write_to(&self, writer: &mut TarsWriter) {
        writer.write_i16(self.version, 1);
        writer.write_i8(self.packet_type, 2);
        writer.write_i32(self.message_type, 3);
        writer.write_i32(self.request_id, 4);
        writer.write_string(&self.servant_name, 5);
        writer.write_string(&self.func_name, 6);
        writer.write_bytes(&self.buffer, 7);
        writer.write_i32(self.timeout, 8);
        writer.write_string_map(&self.context, 9);
        writer.write_string_map(&self.status, 10);
    }

    /// Reads every field; all of them are required.
    pub fn read_from(reader: &mut TarsReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            version: reader.read_i16(1)?,
            packet_type: reader.read_i8(2)?,
            message_type: reader.read_i32(3)?,
            request_id: reader.read_i32(4)?,
            servant_name: reader.read_string(5)?,
            func_name: reader.read_string(6)?,
            buffer: Bytes::from(reader.read_bytes(7)?),
            timeout: reader.read_i32(8)?,
            context: reader.read_string_map(9)?,
            status: reader.read_string_map(10)?,
        })
    }
}
