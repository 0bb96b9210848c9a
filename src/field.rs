use std::collections::BTreeMap;
use crate::address::{Address, FieldKey};
use crate::encoding::bufparser::BufParser;
use crate::encoding::ParseError;
use crate::encoding::tools::{push_bool, push_i16};
use crate::pointer::{PointerRules, PointerType};
use crate::primitive::{PrimitiveDefault, PrimitiveType, PrimitiveValue};

/// One entry in a box layout.
#[derive(Debug, PartialEq)]
pub struct FieldSpec {
    pub key: FieldKey,
    pub name: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, PartialEq)]
pub enum FieldKind {
    Primitive(PrimitiveDefault),
    Pointer { pointer_type: PointerType, mandatory: bool },
    /// A field with no value. It only exists so pointers have somewhere to point.
    Hook(PointerRules),
    Object(&'static [FieldSpec]),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Primitive(PrimitiveField),
    Pointer(PointerField),
    Hook(&'static FieldSpec),
    Object(ObjectField),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveField {
    spec: &'static FieldSpec,
    pub(crate) value: PrimitiveValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerField {
    spec: &'static FieldSpec,
    pointer_type: PointerType,
    mandatory: bool,
    pub(crate) target: Option<Address>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    spec: &'static FieldSpec,
    pub(crate) fields: BTreeMap<FieldKey, Field>,
}

impl PrimitiveField {
    pub fn value(&self) -> &PrimitiveValue {
        &self.value
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        match self.spec.kind {
            FieldKind::Primitive(default) => default.primitive_type(),
            _ => unreachable!("primitive field built from a non-primitive spec"),
        }
    }

    /// The value the field was created with. `reset` writes this back.
    pub fn initial(&self) -> PrimitiveValue {
        match self.spec.kind {
            FieldKind::Primitive(default) => default.to_value(),
            _ => unreachable!("primitive field built from a non-primitive spec"),
        }
    }
}

impl PointerField {
    pub fn pointer_type(&self) -> PointerType {
        self.pointer_type
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn target(&self) -> Option<&Address> {
        self.target.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_none()
    }
}

impl ObjectField {
    pub fn fields(&self) -> impl Iterator<Item=&Field> {
        self.fields.values()
    }
}

pub(crate) fn fields_from_specs(specs: &'static [FieldSpec]) -> BTreeMap<FieldKey, Field> {
    specs.iter().map(|spec| (spec.key, Field::from_spec(spec))).collect()
}

impl Field {
    pub(crate) fn from_spec(spec: &'static FieldSpec) -> Field {
        match spec.kind {
            FieldKind::Primitive(default) => Field::Primitive(PrimitiveField {
                spec,
                value: default.to_value(),
            }),
            FieldKind::Pointer { pointer_type, mandatory } => Field::Pointer(PointerField {
                spec,
                pointer_type,
                mandatory,
                target: None,
            }),
            FieldKind::Hook(_) => Field::Hook(spec),
            FieldKind::Object(specs) => Field::Object(ObjectField {
                spec,
                fields: fields_from_specs(specs),
            }),
        }
    }

    pub fn spec(&self) -> &'static FieldSpec {
        match self {
            Field::Primitive(f) => f.spec,
            Field::Pointer(f) => f.spec,
            Field::Hook(spec) => *spec,
            Field::Object(f) => f.spec,
        }
    }

    pub fn key(&self) -> FieldKey {
        self.spec().key
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    /// Incoming pointer rules. Only hooks accept pointers.
    pub fn rules(&self) -> PointerRules {
        match self.spec().kind {
            FieldKind::Hook(rules) => rules,
            _ => PointerRules::NONE,
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveField> {
        if let Field::Primitive(f) = self { Some(f) } else { None }
    }

    pub fn as_pointer(&self) -> Option<&PointerField> {
        if let Field::Pointer(f) = self { Some(f) } else { None }
    }

    pub fn as_object(&self) -> Option<&ObjectField> {
        if let Field::Object(f) = self { Some(f) } else { None }
    }

    /// Hooks carry no state, so they aren't written.
    fn is_persistent(&self) -> bool {
        !matches!(self, Field::Hook(_))
    }

    fn write_value(&self, into: &mut Vec<u8>) {
        match self {
            Field::Primitive(f) => f.value.write(into),
            Field::Pointer(f) => {
                push_bool(into, f.target.is_some());
                if let Some(target) = &f.target {
                    target.write(into);
                }
            }
            Field::Object(f) => write_fields(&f.fields, into),
            Field::Hook(_) => {}
        }
    }

    fn read_value(&mut self, parser: &mut BufParser) -> Result<(), ParseError> {
        match self {
            Field::Primitive(f) => {
                f.value = PrimitiveValue::read(f.primitive_type(), parser)?;
            }
            Field::Pointer(f) => {
                f.target = if parser.next_bool()? { Some(Address::read(parser)?) } else { None };
            }
            Field::Object(f) => read_fields(&mut f.fields, parser)?,
            Field::Hook(_) => return Err(ParseError::InvalidContent),
        }
        Ok(())
    }
}

pub(crate) fn find_field<'a>(fields: &'a BTreeMap<FieldKey, Field>, keys: &[FieldKey]) -> Option<&'a Field> {
    let (first, rest) = keys.split_first()?;
    let field = fields.get(first)?;
    if rest.is_empty() { return Some(field); }
    match field {
        Field::Object(obj) => find_field(&obj.fields, rest),
        _ => None,
    }
}

pub(crate) fn find_field_mut<'a>(fields: &'a mut BTreeMap<FieldKey, Field>, keys: &[FieldKey]) -> Option<&'a mut Field> {
    let (first, rest) = keys.split_first()?;
    let field = fields.get_mut(first)?;
    if rest.is_empty() { return Some(field); }
    match field {
        Field::Object(obj) => find_field_mut(&mut obj.fields, rest),
        _ => None,
    }
}

/// Calls `f` for every pointer field, depth first in key order. `base` is the address of the
/// map's owner.
pub(crate) fn for_each_pointer<'a, F>(fields: &'a BTreeMap<FieldKey, Field>, base: &Address, f: &mut F)
    where F: FnMut(Address, &'a PointerField)
{
    for field in fields.values() {
        match field {
            Field::Pointer(p) => f(base.append(field.key()), p),
            Field::Object(obj) => for_each_pointer(&obj.fields, &base.append(field.key()), f),
            _ => {}
        }
    }
}

/// Like [`for_each_pointer`] but for anything which can be pointed at.
pub(crate) fn for_each_hook<F>(fields: &BTreeMap<FieldKey, Field>, base: &Address, f: &mut F)
    where F: FnMut(Address, PointerRules)
{
    for field in fields.values() {
        match field {
            Field::Hook(spec) => if let FieldKind::Hook(rules) = spec.kind {
                f(base.append(field.key()), rules)
            },
            Field::Object(obj) => for_each_hook(&obj.fields, &base.append(field.key()), f),
            _ => {}
        }
    }
}

pub(crate) fn write_fields(fields: &BTreeMap<FieldKey, Field>, into: &mut Vec<u8>) {
    let count = fields.values().filter(|f| f.is_persistent()).count();
    debug_assert!(count <= i16::MAX as usize);
    push_i16(into, count as i16);
    for field in fields.values().filter(|f| f.is_persistent()) {
        push_i16(into, field.key());
        field.write_value(into);
    }
}

pub(crate) fn read_fields(fields: &mut BTreeMap<FieldKey, Field>, parser: &mut BufParser) -> Result<(), ParseError> {
    let count = parser.next_i16_le()?;
    if count < 0 { return Err(ParseError::InvalidLength); }
    for _ in 0..count {
        let key = parser.next_i16_le()?;
        let field = fields.get_mut(&key).ok_or(ParseError::UnknownField)?;
        field.read_value(parser)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Identifier;

    static INNER: [FieldSpec; 2] = [
        FieldSpec { key: 1, name: "from", kind: FieldKind::Primitive(PrimitiveDefault::Int32(0)) },
        FieldSpec { key: 2, name: "owner", kind: FieldKind::Pointer { pointer_type: PointerType::Tracks, mandatory: false } },
    ];

    static SPECS: [FieldSpec; 4] = [
        FieldSpec { key: 1, name: "label", kind: FieldKind::Primitive(PrimitiveDefault::String("x")) },
        FieldSpec { key: 2, name: "target", kind: FieldKind::Pointer { pointer_type: PointerType::AudioOutput, mandatory: true } },
        FieldSpec { key: 3, name: "input", kind: FieldKind::Hook(PointerRules::accepting(&[PointerType::AudioOutput])) },
        FieldSpec { key: 4, name: "area", kind: FieldKind::Object(&INNER) },
    ];

    #[test]
    fn lookup_nested() {
        let fields = fields_from_specs(&SPECS);
        assert_eq!(find_field(&fields, &[4, 1]).unwrap().name(), "from");
        assert!(find_field(&fields, &[1, 1]).is_none());
        assert!(find_field(&fields, &[]).is_none());
        assert!(find_field(&fields, &[9]).is_none());
        assert!(find_field(&fields, &[3]).unwrap().rules().accepts(PointerType::AudioOutput));
    }

    #[test]
    fn hooks_are_not_written() {
        let mut fields = fields_from_specs(&SPECS);
        let target = Address::new(Identifier::from_int(5), &[3]);
        if let Some(Field::Pointer(p)) = find_field_mut(&mut fields, &[2]) {
            p.target = Some(target.clone());
        }
        if let Some(Field::Primitive(p)) = find_field_mut(&mut fields, &[4, 1]) {
            p.value = PrimitiveValue::Int32(99);
        }

        let mut out = vec![];
        write_fields(&fields, &mut out);
        // 3 persistent fields at the top level.
        assert_eq!(&out[..2], &3i16.to_le_bytes());

        let mut read = fields_from_specs(&SPECS);
        let mut p = BufParser(&out);
        read_fields(&mut read, &mut p).unwrap();
        p.expect_empty().unwrap();
        assert_eq!(read, fields);
    }

    #[test]
    fn pointers_are_visited_depth_first() {
        let fields = fields_from_specs(&SPECS);
        let base = Address::box_of(Identifier::from_int(1));
        let mut seen = vec![];
        for_each_pointer(&fields, &base, &mut |addr, p| seen.push((addr, p.pointer_type())));
        assert_eq!(seen, vec![
            (base.append(2), PointerType::AudioOutput),
            (base.append(4).append(2), PointerType::Tracks),
        ]);
    }

    #[test]
    fn unknown_key_fails() {
        let mut out = vec![];
        push_i16(&mut out, 1);
        push_i16(&mut out, 42);
        let mut fields = fields_from_specs(&SPECS);
        assert_eq!(read_fields(&mut fields, &mut BufParser(&out)), Err(ParseError::UnknownField));
    }
}
