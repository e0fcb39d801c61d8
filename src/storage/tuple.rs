use std::fmt;

use super::{
    field::{Field, Type},
    page_id::HeapPageID,
    schema::Schema,
};
use crate::error::{DbError, DbResult};

/// Physical location of a tuple: the page it lives on and the slot inside
/// that page. Meaningless after the tuple is deleted.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub struct RecordId {
    pub pid: HeapPageID,
    pub slot: usize,
}

impl RecordId {
    pub fn new(pid: HeapPageID, slot: usize) -> Self {
        Self { pid, slot }
    }
}

/// A row of typed values, optionally stamped with the location it occupies
/// on disk.
#[derive(Clone)]
pub struct Tuple {
    schema: Schema,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(schema: Schema, fields: Vec<Field>) -> DbResult<Self> {
        if fields.len() != schema.field_count() {
            return Err(DbError::db(format!(
                "tuple has {} fields, schema wants {}",
                fields.len(),
                schema.field_count()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            if field.get_type() != schema.get_field_type(i) {
                return Err(DbError::db(format!(
                    "field {} has type {:?}, schema wants {:?}",
                    i,
                    field.get_type(),
                    schema.get_field_type(i)
                )));
            }
        }
        Ok(Self {
            schema,
            fields,
            record_id: None,
        })
    }

    /// A `width`-column int tuple holding `value` in every column.
    pub fn new_int_tuple(value: i32, width: usize) -> Self {
        Self {
            schema: Schema::small_int_schema(width, ""),
            fields: vec![Field::Int32(value); width],
            record_id: None,
        }
    }

    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get_field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn set_field(&mut self, i: usize, field: Field) {
        self.fields[i] = field;
    }

    pub fn get_record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Concatenate two tuples, used for join output. The result carries no
    /// record id since it does not live on any page.
    pub fn merge(left: &Tuple, right: &Tuple) -> Tuple {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        Tuple {
            schema: Schema::merge(&left.schema, &right.schema),
            fields,
            record_id: None,
        }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        for field in &self.fields {
            field.encode(buf);
        }
    }

    pub(crate) fn decode(schema: &Schema, bytes: &[u8]) -> Tuple {
        let mut fields = Vec::with_capacity(schema.field_count());
        let mut offset = 0;
        for i in 0..schema.field_count() {
            let t = schema.get_field_type(i);
            fields.push(Field::decode(t, &bytes[offset..offset + t.get_len()]));
            offset += t.get_len();
        }
        Tuple {
            schema: schema.clone(),
            fields,
            record_id: None,
        }
    }
}

/// Record ids are deliberately ignored: a scanned tuple equals the tuple
/// that was inserted.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.fields == other.fields
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let depiction: Vec<String> = self.fields.iter().map(|c| format!("{}", c)).collect();
        write!(f, "{{{}}}", depiction.join(", "))
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FieldItem;

    #[test]
    fn test_codec_identity() {
        let schema = Schema::new(vec![
            FieldItem::new(Type::Int32, "id"),
            FieldItem::new(Type::String, "name"),
        ]);
        let tuple = Tuple::new(
            schema.clone(),
            vec![Field::Int32(42), Field::String("ada".to_string())],
        )
        .unwrap();

        let mut buf = Vec::new();
        tuple.encode(&mut buf);
        assert_eq!(buf.len(), schema.get_size());
        assert_eq!(Tuple::decode(&schema, &buf), tuple);
    }

    #[test]
    fn test_malformed_tuple_is_rejected() {
        let schema = Schema::small_int_schema(2, "");
        assert!(Tuple::new(schema.clone(), vec![Field::Int32(1)]).is_err());
        assert!(Tuple::new(
            schema,
            vec![Field::Int32(1), Field::String("x".to_string())]
        )
        .is_err());
    }

    #[test]
    fn test_merge() {
        let left = Tuple::new_int_tuple(1, 2);
        let right = Tuple::new_int_tuple(2, 1);
        let merged = Tuple::merge(&left, &right);
        assert_eq!(merged.get_schema().field_count(), 3);
        assert_eq!(merged.get_field(0), &Field::Int32(1));
        assert_eq!(merged.get_field(2), &Field::Int32(2));
        assert!(merged.get_record_id().is_none());
    }
}
