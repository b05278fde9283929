//! Length-prefixed packet envelope.
//!
//! Wire layout:
//!
//! ```text
//! +--------------+-----------------------------------------------+
//! | total_len    | RequestPacket (tagged codec)                  |
//! | 4 bytes, BE  | buffer field holds the encoded FieldBuffer    |
//! +--------------+-----------------------------------------------+
//! ```
//!
//! `total_len` counts itself.

use crate::buffer::{FieldBuffer, Version};
use crate::error::TupError;
use crate::request::RequestPacket;
use crate::value::Marshal;
use crate::HEADER_LEN;
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use tup_codec::{CodecError, TarsReader, TarsWriter};

/// Reads the declared total length from the front of a framed packet.
///
/// Returns `None` when fewer than [`HEADER_LEN`] bytes are available.
pub fn frame_len(buf: &[u8]) -> Option<u32> {
    let prefix: [u8; HEADER_LEN] = buf.get(..HEADER_LEN)?.try_into().ok()?;
    Some(u32::from_be_bytes(prefix))
}

/// Request/response envelope: routing metadata plus one field buffer.
///
/// The layout version lives in the embedded buffer only, so the envelope and
/// its buffer can never disagree about it.
#[derive(Debug, Clone, Default)]
pub struct UniPacket {
    packet_type: i8,
    message_type: i32,
    request_id: i32,
    servant_name: String,
    func_name: String,
    timeout: i32,
    context: HashMap<String, String>,
    status: HashMap<String, String>,
    buffer: FieldBuffer,
}

impl UniPacket {
    /// Creates an empty envelope using the legacy (version 2) layout.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(version: Version) -> Self {
        Self {
            buffer: FieldBuffer::new(version),
            ..Self::default()
        }
    }

    /// Decodes a complete framed packet into a new envelope.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, TupError> {
        let mut packet = Self::new();
        packet.decode(buf)?;
        Ok(packet)
    }

    pub fn version(&self) -> Version {
        self.buffer.version()
    }

    pub fn set_version(&mut self, version: Version) {
        self.buffer.set_version(version);
    }

    pub fn packet_type(&self) -> i8 {
        self.packet_type
    }

    pub fn set_packet_type(&mut self, packet_type: i8) {
        self.packet_type = packet_type;
    }

    pub fn message_type(&self) -> i32 {
        self.message_type
    }

    pub fn set_message_type(&mut self, message_type: i32) {
        self.message_type = message_type;
    }

    pub fn request_id(&self) -> i32 {
        self.request_id
    }

    pub fn set_request_id(&mut self, request_id: i32) {
        self.request_id = request_id;
    }

    pub fn servant_name(&self) -> &str {
        &self.servant_name
    }

    pub fn set_servant_name(&mut self, name: impl Into<String>) {
        self.servant_name = name.into();
    }

    pub fn func_name(&self) -> &str {
        &self.func_name
    }

    pub fn set_func_name(&mut self, name: impl Into<String>) {
        self.func_name = name.into();
    }

    /// Timeout in milliseconds. Carried as metadata, never enforced here.
    pub fn timeout(&self) -> i32 {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: i32) {
        self.timeout = timeout;
    }

    /// Request-side context entries.
    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn set_context(&mut self, context: HashMap<String, String>) {
        self.context = context;
    }

    /// Response-side status entries.
    pub fn status(&self) -> &HashMap<String, String> {
        &self.status
    }

    pub fn set_status(&mut self, status: HashMap<String, String>) {
        self.status = status;
    }

    pub fn buffer(&self) -> &FieldBuffer {
        &self.buffer
    }

    pub fn put<T: Marshal + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), TupError> {
        self.buffer.put(name, value)
    }

    /// See [`FieldBuffer::get`]: an absent field yields `Ok(false)`.
    pub fn get<T: Marshal + ?Sized>(&self, name: &str, value: &mut T) -> Result<bool, TupError> {
        self.buffer.get(name, value)
    }

    pub fn return_value(&self) -> Option<i32> {
        self.buffer.return_value()
    }

    pub fn set_return_value(&mut self, value: i32) {
        self.buffer.set_return_value(value);
    }

    /// Encodes the envelope into a framed packet.
    pub fn encode(&self) -> Result<Bytes, TupError> {
        if self.servant_name.is_empty() || self.func_name.is_empty() {
            return Err(TupError::EmptyServantOrFunction);
        }

        let mut fields = TarsWriter::new();
        self.buffer.encode(&mut fields)?;

        let request = RequestPacket {
            version: self.version().as_i16(),
            packet_type: self.packet_type,
            message_type: self.message_type,
            request_id: self.request_id,
            servant_name: self.servant_name.clone(),
            func_name: self.func_name.clone(),
            buffer: fields.into_bytes(),
            timeout: self.timeout,
            context: self.context.clone(),
            status: self.status.clone(),
        };

        let mut body = TarsWriter::with_capacity(request.buffer.len() + 64);
        request.write_to(&mut body);

        let total_len = HEADER_LEN + body.len();
        let mut out = BytesMut::with_capacity(total_len);
        out.put_u32(total_len as u32);
        out.put_slice(body.as_bytes());

        tracing::debug!(
            servant = %self.servant_name,
            func = %self.func_name,
            request_id = self.request_id,
            fields = self.buffer.len(),
            bytes = total_len,
            "encoded packet"
        );
        Ok(out.freeze())
    }

    /// Decodes one framed packet into this envelope.
    ///
    /// The length prefix is skipped, not checked against `buf.len()`.
    /// On error the envelope may be partially populated and should be
    /// discarded.
    pub fn decode(&mut self, buf: &[u8]) -> Result<(), TupError> {
        let body = buf.get(HEADER_LEN..).ok_or(CodecError::UnexpectedEof {
            needed: HEADER_LEN,
            remaining: buf.len(),
        })?;

        let request = RequestPacket::read_from(&mut TarsReader::new(body))?;
        let version = Version::try_from(request.version)?;

        self.packet_type = request.packet_type;
        self.message_type = request.message_type;
        self.request_id = request.request_id;
        self.servant_name = request.servant_name;
        self.func_name = request.func_name;
        self.timeout = request.timeout;
        self.context = request.context;
        self.status = request.status;

        self.buffer
            .decode(&mut TarsReader::new(&request.buffer), version)?;

        tracing::debug!(
            servant = %self.servant_name,
            func = %self.func_name,
            request_id = self.request_id,
            fields = self.buffer.len(),
            bytes = buf.len(),
            "decoded packet"
        );
        Ok(())
    }
}
