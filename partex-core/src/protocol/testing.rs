//! Test-only message used to exercise the cursors.

use std::any::Any;

use bytes::{Buf, BufMut};
use uuid::Uuid;

use super::message::DirectMessage;
use super::reader::MessageReader;
use super::writer::MessageWriter;
use crate::error::Result;

pub(crate) const PROBE_DIRECT_TYPE: i16 = -100;

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Probe {
    pub seq: i64,
    pub origin: Option<Uuid>,
    pub urgent: bool,
    pub weight: i32,
}

impl Probe {
    pub fn sample() -> Self {
        Self {
            seq: 0x0102_0304_0506_0708,
            origin: Some(Uuid::from_u64_pair(0xAAAA, 0xBBBB)),
            urgent: true,
            weight: -5,
        }
    }
}

impl DirectMessage for Probe {
    fn direct_type(&self) -> i16 {
        PROBE_DIRECT_TYPE
    }

    fn fields_count(&self) -> u8 {
        4
    }

    fn write_fields(&self, writer: &mut MessageWriter, buf: &mut dyn BufMut) -> bool {
        if writer.state() == 0 && !writer.write_field(buf, &self.seq) {
            return false;
        }
        if writer.state() == 1 && !writer.write_field(buf, &self.origin) {
            return false;
        }
        if writer.state() == 2 && !writer.write_field(buf, &self.urgent) {
            return false;
        }
        if writer.state() == 3 && !writer.write_field(buf, &self.weight) {
            return false;
        }
        true
    }

    fn read_fields(&mut self, reader: &mut MessageReader, buf: &mut dyn Buf) -> Result<bool> {
        if reader.state() == 0 && !reader.read_field(buf, &mut self.seq)? {
            return Ok(false);
        }
        if reader.state() == 1 && !reader.read_field(buf, &mut self.origin)? {
            return Ok(false);
        }
        if reader.state() == 2 && !reader.read_field(buf, &mut self.urgent)? {
            return Ok(false);
        }
        if reader.state() == 3 && !reader.read_field(buf, &mut self.weight)? {
            return Ok(false);
        }
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) fn encode_whole(msg: &dyn DirectMessage) -> Vec<u8> {
    let mut writer = MessageWriter::new();
    let mut out = Vec::new();
    assert!(writer.write(msg, &mut out).is_complete());
    out
}
