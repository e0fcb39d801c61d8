use std::fmt;

use super::field::Type;
use crate::error::{DbError, DbResult};

#[derive(Clone, Debug)]
pub struct FieldItem {
    pub field_type: Type,
    pub field_name: Option<String>,
}

impl FieldItem {
    pub fn new(field_type: Type, field_name: &str) -> Self {
        Self {
            field_type,
            field_name: Some(field_name.to_string()),
        }
    }

    pub fn anonymous(field_type: Type) -> Self {
        Self {
            field_type,
            field_name: None,
        }
    }
}

/// An ordered, non-empty description of the fields of a tuple.
#[derive(Clone, Debug)]
pub struct Schema {
    fields: Vec<FieldItem>,
}

impl Schema {
    pub fn new(fields: Vec<FieldItem>) -> Self {
        assert!(!fields.is_empty(), "a schema must have at least one field");
        Self { fields }
    }

    /// Schema of `width` int columns named `{prefix}-{i}`.
    pub fn small_int_schema(width: usize, name_prefix: &str) -> Self {
        let fields = (0..width)
            .map(|i| FieldItem::new(Type::Int32, &format!("{}-{}", name_prefix, i)))
            .collect();
        Self::new(fields)
    }

    pub fn get_fields(&self) -> &[FieldItem] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn get_field_type(&self, i: usize) -> Type {
        self.fields[i].field_type
    }

    pub fn get_field_name(&self, i: usize) -> Option<&str> {
        self.fields[i].field_name.as_deref()
    }

    /// Index of the first field with the given name.
    pub fn name_to_index(&self, name: &str) -> DbResult<usize> {
        self.fields
            .iter()
            .position(|f| f.field_name.as_deref() == Some(name))
            .ok_or_else(|| DbError::no_such_element(format!("no field named {:?}", name)))
    }

    /// Size in bytes of a serialized tuple of this schema.
    pub fn get_size(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.get_len()).sum()
    }

    /// Concatenation of `a` and `b`, used for join output.
    pub fn merge(a: &Schema, b: &Schema) -> Schema {
        let mut fields = a.fields.clone();
        fields.extend(b.fields.iter().cloned());
        Schema::new(fields)
    }
}

/// Two schemas are equal iff their type sequences are equal; field names do
/// not participate.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let depiction: Vec<String> = self
            .fields
            .iter()
            .map(|item| {
                format!(
                    "{:?}({})",
                    item.field_type,
                    item.field_name.as_deref().unwrap_or("")
                )
            })
            .collect();
        write!(f, "{}", depiction.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MAX_STRING_LEN;

    #[test]
    fn test_name_to_index_returns_first_match() {
        let schema = Schema::new(vec![
            FieldItem::new(Type::Int32, "a"),
            FieldItem::new(Type::Int32, "b"),
            FieldItem::new(Type::Int32, "a"),
        ]);
        assert_eq!(schema.name_to_index("a").unwrap(), 0);
        assert_eq!(schema.name_to_index("b").unwrap(), 1);
        assert!(matches!(
            schema.name_to_index("c"),
            Err(DbError::NoSuchElement(_))
        ));
    }

    #[test]
    fn test_equality_ignores_names() {
        let a = Schema::small_int_schema(2, "left");
        let b = Schema::small_int_schema(2, "right");
        assert_eq!(a, b);

        let c = Schema::new(vec![
            FieldItem::new(Type::Int32, "left-0"),
            FieldItem::new(Type::String, "left-1"),
        ]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_size_and_merge() {
        let a = Schema::small_int_schema(2, "");
        assert_eq!(a.get_size(), 8);

        let b = Schema::new(vec![FieldItem::new(Type::String, "s")]);
        assert_eq!(b.get_size(), 4 + MAX_STRING_LEN);

        let merged = Schema::merge(&a, &b);
        assert_eq!(merged.field_count(), 3);
        assert_eq!(merged.get_size(), 8 + 4 + MAX_STRING_LEN);
        assert_eq!(merged.get_field_type(2), Type::String);
    }
}
