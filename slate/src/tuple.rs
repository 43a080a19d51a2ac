use crate::error::{Error, Result};
use crate::RecordId;
use bytes::{Buf, BufMut};
use std::fmt;
use std::sync::Arc;

/// A column type. Strings have a fixed capacity; shorter values are
/// zero-padded on disk and longer values are truncated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    String(usize),
}

impl Type {
    /// The serialized width in bytes: 4 for an integer, a 4-byte length
    /// prefix plus the capacity for a string.
    pub fn width(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::String(cap) => 4 + cap,
        }
    }
}

/// One typed value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    /// Whether this value inhabits the given column type.
    pub fn matches(&self, ty: Type) -> bool {
        matches!(
            (self, ty),
            (Field::Int(_), Type::Int) | (Field::Str(_), Type::String(_))
        )
    }

    /// Serializes the field as the column stores it: INT32 is 4 big-endian
    /// bytes, STRING(L) is a big-endian i32 length followed by L payload
    /// bytes (zero-padded, truncated at L).
    pub fn write_to(&self, ty: Type, buf: &mut impl BufMut) {
        match (self, ty) {
            (Field::Int(v), Type::Int) => buf.put_i32(*v),
            (Field::Str(s), Type::String(cap)) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(cap);
                buf.put_i32(len as i32);
                buf.put_slice(&bytes[..len]);
                buf.put_bytes(0, cap - len);
            }
            _ => panic!("field value does not match column type"),
        }
    }

    /// Reads one field of the given type.
    pub fn read_from(ty: Type, buf: &mut impl Buf) -> Result<Field> {
        match ty {
            Type::Int => Ok(Field::Int(buf.get_i32())),
            Type::String(cap) => {
                let len = buf.get_i32();
                if len < 0 || len as usize > cap {
                    return Err(Error::Db(format!("corrupt string length {len}")));
                }
                let mut payload = vec![0u8; cap];
                buf.copy_to_slice(&mut payload);
                payload.truncate(len as usize);
                String::from_utf8(payload)
                    .map(Field::Str)
                    .map_err(|_| Error::Db("string field is not valid utf-8".to_string()))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{v}"),
            Field::Str(s) => write!(f, "{s}"),
        }
    }
}

/// A typed, optionally named column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: Option<String>,
    pub ty: Type,
}

/// An ordered schema: one column per field of a tuple. Descriptors are
/// created once per table and shared through an `Arc`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TupleDesc {
    columns: Vec<Column>,
}

impl TupleDesc {
    pub fn new(columns: Vec<Column>) -> TupleDesc {
        TupleDesc { columns }
    }

    /// A descriptor with unnamed columns of the given types.
    pub fn unnamed(types: &[Type]) -> TupleDesc {
        TupleDesc {
            columns: types.iter().map(|&ty| Column { name: None, ty }).collect(),
        }
    }

    /// A descriptor with named columns.
    pub fn named(columns: &[(Type, &str)]) -> TupleDesc {
        TupleDesc {
            columns: columns
                .iter()
                .map(|&(ty, name)| Column {
                    name: Some(name.to_string()),
                    ty,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The serialized width of one tuple in bytes.
    pub fn width(&self) -> usize {
        self.columns.iter().map(|c| c.ty.width()).sum()
    }

    pub fn type_of(&self, i: usize) -> Type {
        self.columns[i].ty
    }

    pub fn name_of(&self, i: usize) -> Option<&str> {
        self.columns[i].name.as_deref()
    }

    /// The index of the column with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.as_deref() == Some(name))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The concatenation of two descriptors, for join outputs.
    pub fn combine(left: &TupleDesc, right: &TupleDesc) -> TupleDesc {
        let mut columns = left.columns.clone();
        columns.extend(right.columns.iter().cloned());
        TupleDesc { columns }
    }

    /// The same types with every field name qualified as `alias.name`.
    /// Unnamed columns stay unnamed.
    pub fn with_alias(&self, alias: &str) -> TupleDesc {
        TupleDesc {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.as_ref().map(|n| format!("{alias}.{n}")),
                    ty: c.ty,
                })
                .collect(),
        }
    }
}

/// One row: a field per column of its descriptor, plus the slot the row
/// occupies once it is stored on a page.
#[derive(Clone, Debug, PartialEq)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    rid: Option<RecordId>,
}

impl Tuple {
    /// A new, unplaced tuple. Fails when the fields do not conform to the
    /// descriptor.
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Result<Tuple> {
        if fields.len() != desc.len() {
            return Err(Error::Db(format!(
                "tuple has {} fields, schema has {}",
                fields.len(),
                desc.len()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            if !field.matches(desc.type_of(i)) {
                return Err(Error::Db(format!("field {i} does not match its column type")));
            }
        }
        Ok(Tuple {
            desc,
            fields,
            rid: None,
        })
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn set_field(&mut self, i: usize, field: Field) {
        assert!(
            field.matches(self.desc.type_of(i)),
            "field value does not match column {i}"
        );
        self.fields[i] = field;
    }

    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    /// A join output: the left tuple's fields followed by the right's.
    pub fn combine(desc: Arc<TupleDesc>, left: &Tuple, right: &Tuple) -> Tuple {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        debug_assert_eq!(fields.len(), desc.len());
        Tuple {
            desc,
            fields,
            rid: None,
        }
    }

    /// Serializes the fields in column order.
    pub fn write_to(&self, buf: &mut impl BufMut) {
        for (i, field) in self.fields.iter().enumerate() {
            field.write_to(self.desc.type_of(i), buf);
        }
    }

    /// Reads one tuple conforming to the descriptor.
    pub fn read_from(desc: &Arc<TupleDesc>, buf: &mut impl Buf) -> Result<Tuple> {
        let mut fields = Vec::with_capacity(desc.len());
        for i in 0..desc.len() {
            fields.push(Field::read_from(desc.type_of(i), buf)?);
        }
        Ok(Tuple {
            desc: desc.clone(),
            fields,
            rid: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_the_fixed_layout() {
        assert_eq!(Type::Int.width(), 4);
        assert_eq!(Type::String(16).width(), 20);
        let desc = TupleDesc::unnamed(&[Type::Int, Type::String(8), Type::Int]);
        assert_eq!(desc.width(), 4 + 12 + 4);
    }

    #[test]
    fn field_codec_round_trips() {
        let mut buf = Vec::new();
        Field::Int(-7).write_to(Type::Int, &mut buf);
        Field::Str("ab".to_string()).write_to(Type::String(4), &mut buf);
        assert_eq!(buf.len(), 4 + 8);
        // Big-endian int, then length prefix 2 and zero-padded payload.
        assert_eq!(&buf[..4], (-7i32).to_be_bytes());
        assert_eq!(&buf[4..8], 2i32.to_be_bytes());
        assert_eq!(&buf[8..12], b"ab\0\0");

        let mut cursor = &buf[..];
        assert_eq!(Field::read_from(Type::Int, &mut cursor).unwrap(), Field::Int(-7));
        assert_eq!(
            Field::read_from(Type::String(4), &mut cursor).unwrap(),
            Field::Str("ab".to_string())
        );
    }

    #[test]
    fn overlong_strings_are_truncated_to_capacity() {
        let mut buf = Vec::new();
        Field::Str("abcdef".to_string()).write_to(Type::String(4), &mut buf);
        let mut cursor = &buf[..];
        assert_eq!(
            Field::read_from(Type::String(4), &mut cursor).unwrap(),
            Field::Str("abcd".to_string())
        );
    }

    #[test]
    fn tuple_construction_checks_the_schema() {
        let desc = Arc::new(TupleDesc::unnamed(&[Type::Int, Type::Int]));
        assert!(Tuple::new(desc.clone(), vec![Field::Int(1)]).is_err());
        assert!(Tuple::new(
            desc.clone(),
            vec![Field::Int(1), Field::Str("x".to_string())]
        )
        .is_err());
        assert!(Tuple::new(desc, vec![Field::Int(1), Field::Int(2)]).is_ok());
    }

    #[test]
    fn combine_concatenates_schemas_and_fields() {
        let left_desc = Arc::new(TupleDesc::named(&[(Type::Int, "a")]));
        let right_desc = Arc::new(TupleDesc::named(&[(Type::Int, "b")]));
        let joined = Arc::new(TupleDesc::combine(&left_desc, &right_desc));
        let left = Tuple::new(left_desc, vec![Field::Int(1)]).unwrap();
        let right = Tuple::new(right_desc, vec![Field::Int(2)]).unwrap();
        let out = Tuple::combine(joined.clone(), &left, &right);
        assert_eq!(out.fields(), &[Field::Int(1), Field::Int(2)]);
        assert_eq!(joined.index_of("b"), Some(1));
    }

    #[test]
    fn alias_qualifies_field_names() {
        let desc = TupleDesc::named(&[(Type::Int, "id"), (Type::Int, "score")]);
        let aliased = desc.with_alias("t");
        assert_eq!(aliased.index_of("t.id"), Some(0));
        assert_eq!(aliased.index_of("id"), None);
        assert_eq!(aliased.width(), desc.width());
    }
}
