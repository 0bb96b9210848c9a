use std::collections::BTreeMap;
use crate::{Address, BoxKind, Identifier};
use crate::address::FieldKey;
use crate::encoding::bufparser::BufParser;
use crate::encoding::ParseError;
use crate::encoding::tools::{push_i32, push_str};
use crate::field::*;
use crate::graph::GraphError;
use crate::pointer::{PointerRules, PointerType};
use crate::primitive::PrimitiveValue;

/// A box in the graph: a typed bundle of fields. Vertices are owned by the
/// [`BoxGraph`](crate::BoxGraph); everything outside the graph refers to them by [`Identifier`].
///
/// Edges are not stored here. The graph keeps them in its edge index.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    id: Identifier,
    kind: BoxKind,
    creation_index: i32,
    fields: BTreeMap<FieldKey, Field>,
}

/// What an address resolved to.
#[derive(Debug, Clone, Copy)]
pub enum Resolved<'a> {
    Box(&'a Vertex),
    Field(&'a Vertex, &'a Field),
}

impl<'a> Resolved<'a> {
    pub fn vertex(&self) -> &'a Vertex {
        match self {
            Resolved::Box(v) | Resolved::Field(v, _) => *v,
        }
    }

    pub fn rules(&self) -> PointerRules {
        match self {
            Resolved::Box(v) => v.kind.rules(),
            Resolved::Field(_, f) => f.rules(),
        }
    }
}

impl Vertex {
    pub(crate) fn new(kind: BoxKind, id: Identifier, creation_index: i32) -> Self {
        Vertex { id, kind, creation_index, fields: fields_from_specs(kind.fields()) }
    }

    pub fn id(&self) -> Identifier {
        self.id
    }

    pub fn kind(&self) -> BoxKind {
        self.kind
    }

    pub fn creation_index(&self) -> i32 {
        self.creation_index
    }

    pub fn address(&self) -> Address {
        Address::box_of(self.id)
    }

    pub fn fields(&self) -> impl Iterator<Item=&Field> {
        self.fields.values()
    }

    pub fn field(&self, keys: &[FieldKey]) -> Option<&Field> {
        find_field(&self.fields, keys)
    }

    pub fn primitive(&self, keys: &[FieldKey]) -> Option<&PrimitiveValue> {
        self.field(keys)?.as_primitive().map(|f| f.value())
    }

    /// The target of a pointer field. `None` if the pointer is empty or there's no such pointer.
    pub fn pointer_target(&self, keys: &[FieldKey]) -> Option<&Address> {
        self.field(keys)?.as_pointer()?.target()
    }

    /// All pointer fields of this box with their addresses, in key order.
    pub fn pointers(&self) -> Vec<(Address, &PointerField)> {
        let mut result = Vec::new();
        for_each_pointer(&self.fields, &self.address(), &mut |addr, p| result.push((addr, p)));
        result
    }

    /// Every address inside this box which may be pointed at, with its rules. The box itself comes
    /// first.
    pub fn targets(&self) -> Vec<(Address, PointerRules)> {
        let mut result = vec![(self.address(), self.kind.rules())];
        for_each_hook(&self.fields, &self.address(), &mut |addr, rules| result.push((addr, rules)));
        result
    }

    fn address_of(&self, keys: &[FieldKey]) -> Address {
        Address::new(self.id, keys)
    }

    /// Writes a primitive field, returning the previous value. The value must match the declared
    /// primitive type.
    ///
    /// Inside the graph this is only reachable through [`BoxGraph`](crate::BoxGraph), which
    /// records the write. Callers only see a `&mut Vertex` while initializing a new box.
    pub fn set_primitive(&mut self, keys: &[FieldKey], value: PrimitiveValue) -> Result<PrimitiveValue, GraphError> {
        let addr = self.address_of(keys);
        let field = match find_field_mut(&mut self.fields, keys) {
            Some(Field::Primitive(f)) => f,
            Some(_) => return Err(GraphError::FieldTypeMismatch(addr)),
            None => return Err(GraphError::UnknownField(addr)),
        };
        if field.primitive_type() != value.primitive_type() {
            return Err(GraphError::FieldTypeMismatch(addr));
        }
        Ok(std::mem::replace(&mut field.value, value))
    }

    pub fn set_pointer(&mut self, keys: &[FieldKey], target: Option<Address>) -> Result<Option<Address>, GraphError> {
        let field = self.pointer_field_mut(keys)?;
        Ok(std::mem::replace(&mut field.target, target))
    }

    pub(crate) fn pointer_type(&self, keys: &[FieldKey]) -> Result<PointerType, GraphError> {
        match self.field(keys) {
            Some(Field::Pointer(p)) => Ok(p.pointer_type()),
            Some(_) => Err(GraphError::FieldTypeMismatch(self.address_of(keys))),
            None => Err(GraphError::UnknownField(self.address_of(keys))),
        }
    }

    fn pointer_field_mut(&mut self, keys: &[FieldKey]) -> Result<&mut PointerField, GraphError> {
        let addr = self.address_of(keys);
        match find_field_mut(&mut self.fields, keys) {
            Some(Field::Pointer(p)) => Ok(p),
            Some(_) => Err(GraphError::FieldTypeMismatch(addr)),
            None => Err(GraphError::UnknownField(addr)),
        }
    }

    /// The serialized field values of this box. This is what `New` and `Delete` updates carry.
    pub fn settings(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_fields(&self.fields, &mut out);
        out
    }

    pub(crate) fn read_settings(&mut self, settings: &[u8]) -> Result<(), ParseError> {
        let mut parser = BufParser(settings);
        read_fields(&mut self.fields, &mut parser)?;
        parser.expect_empty()
    }

    /// Full box record: creation index, type tag, identifier and fields.
    pub(crate) fn write_record(&self, into: &mut Vec<u8>) {
        push_i32(into, self.creation_index);
        push_str(into, self.kind.name());
        self.id.write(into);
        write_fields(&self.fields, into);
    }

    pub(crate) fn read_record(parser: &mut BufParser) -> Result<Vertex, ParseError> {
        let creation_index = parser.next_i32_le()?;
        let kind = BoxKind::from_name(parser.next_str()?).ok_or(ParseError::UnknownTypeTag)?;
        let id = Identifier::read(parser)?;
        let mut vertex = Vertex::new(kind, id, creation_index);
        read_fields(&mut vertex.fields, parser)?;
        Ok(vertex)
    }
}
