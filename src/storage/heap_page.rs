use bit_vec::BitVec;

use super::{
    page_id::HeapPageID,
    schema::Schema,
    tuple::{RecordId, Tuple},
};
use crate::{
    buffer_pool::BufferPool,
    error::{DbError, DbResult},
    transaction::TransactionID,
};

/// A slotted page: a used-slot bitmap followed by `slot_count` fixed-size
/// tuple slots, zero-padded up to the page size.
///
/// On disk the header uses little-bit order: slot `i` maps to bit `i % 8`
/// of byte `i / 8`. In memory the bitmap lives in a `BitVec` indexed by
/// slot, so the conversion happens only at the serialization boundary.
pub struct HeapPage {
    pid: HeapPageID,
    schema: Schema,

    slot_count: usize,

    // indicate slots' status: true means occupied, false means empty
    header: BitVec,

    // all slots, including the unused ones (their content is unspecified)
    tuples: Vec<Tuple>,

    // id of the transaction that last dirtied the page, if any
    dirty: Option<TransactionID>,
}

impl HeapPage {
    pub fn new(pid: &HeapPageID, bytes: &[u8], schema: &Schema) -> DbResult<Self> {
        let page_size = BufferPool::get_page_size();
        if bytes.len() != page_size {
            return Err(DbError::db(format!(
                "page buffer is {} bytes, expect {}",
                bytes.len(),
                page_size
            )));
        }

        let slot_count = Self::calculate_slots_count(schema);
        let header_size = Self::calculate_header_size(slot_count);
        let tuple_size = schema.get_size();

        let mut header = BitVec::from_elem(slot_count, false);
        for i in 0..slot_count {
            if bytes[i / 8] >> (i % 8) & 1 == 1 {
                header.set(i, true);
            }
        }

        let mut tuples = Vec::with_capacity(slot_count);
        for i in 0..slot_count {
            let start = header_size + i * tuple_size;
            let mut tuple = Tuple::decode(schema, &bytes[start..start + tuple_size]);
            if header[i] {
                tuple.set_record_id(Some(RecordId::new(*pid, i)));
            }
            tuples.push(tuple);
        }

        Ok(Self {
            pid: *pid,
            schema: schema.clone(),
            slot_count,
            header,
            tuples,
            dirty: None,
        })
    }

    /// Buffer for a page with every slot empty.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0; BufferPool::get_page_size()]
    }

    /// The number of tuples a page can hold: one bit of header plus one
    /// slot per tuple have to fit in the page.
    pub fn calculate_slots_count(schema: &Schema) -> usize {
        BufferPool::get_page_size() * 8 / (schema.get_size() * 8 + 1)
    }

    pub fn calculate_header_size(slot_count: usize) -> usize {
        (slot_count + 7) / 8
    }

    pub fn get_pid(&self) -> HeapPageID {
        self.pid
    }

    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get_slots_count(&self) -> usize {
        self.slot_count
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.header[slot]
    }

    pub fn empty_slots_count(&self) -> usize {
        self.header.iter().filter(|used| !used).count()
    }

    pub fn tuples_count(&self) -> usize {
        self.slot_count - self.empty_slots_count()
    }

    pub fn mark_dirty(&mut self, tid: Option<TransactionID>) {
        self.dirty = tid;
    }

    pub fn is_dirty(&self) -> Option<TransactionID> {
        self.dirty
    }

    /// Place the tuple into the lowest empty slot and stamp its record id.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> DbResult<RecordId> {
        if tuple.get_schema() != &self.schema {
            return Err(DbError::db("tuple schema does not match the page"));
        }

        let slot = (0..self.slot_count)
            .find(|&i| !self.header[i])
            .ok_or_else(|| DbError::db(format!("no empty slot on {}", self.pid)))?;

        let record_id = RecordId::new(self.pid, slot);
        let mut tuple = tuple.clone();
        tuple.set_record_id(Some(record_id));

        self.header.set(slot, true);
        self.tuples[slot] = tuple;
        Ok(record_id)
    }

    /// Clear the slot named by the record id. The slot bytes stay in place;
    /// readers skip unused slots.
    pub fn delete_tuple(&mut self, record_id: &RecordId) -> DbResult<()> {
        if record_id.pid != self.pid {
            return Err(DbError::db(format!(
                "record id {:?} does not belong to {}",
                record_id, self.pid
            )));
        }
        if record_id.slot >= self.slot_count || !self.header[record_id.slot] {
            return Err(DbError::db(format!(
                "slot {} of {} holds no tuple",
                record_id.slot, self.pid
            )));
        }

        self.header.set(record_id.slot, false);
        self.tuples[record_id.slot].set_record_id(None);
        Ok(())
    }

    /// Used tuples in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Tuple> + '_ {
        (0..self.slot_count)
            .filter(|&i| self.header[i])
            .map(|i| self.tuples[i].clone())
    }

    /// Serialize back to exactly one page worth of bytes.
    pub fn get_page_data(&self) -> Vec<u8> {
        let page_size = BufferPool::get_page_size();
        let header_size = Self::calculate_header_size(self.slot_count);

        let mut buf = vec![0u8; header_size];
        for i in 0..self.slot_count {
            if self.header[i] {
                buf[i / 8] |= 1 << (i % 8);
            }
        }

        for tuple in &self.tuples {
            tuple.encode(&mut buf);
        }

        buf.resize(page_size, 0);
        buf
    }
}
