use crate::error::{Error, Result};
use crate::opcode::Opcode;
use crate::read::{Num, Reader, Record};

/// Deserializes borrowed values from a parsed JSONB record stream.
///
/// The format is self-describing, so every `deserialize_*` hint funnels
/// into the opcode dispatch; only options, enums and newtypes need their
/// own handling. Strings and blobs are borrowed straight out of the
/// decoded buffer.
pub struct Deserializer<'de, 'a> {
    reader: &'a mut Reader<'de>,
    peeked: Option<Record<'de>>,
}

impl<'de, 'a> Deserializer<'de, 'a> {
    pub fn new(reader: &'a mut Reader<'de>) -> Self {
        Self {
            reader,
            peeked: None,
        }
    }

    fn next_record(&mut self) -> Result<Record<'de>> {
        match self.peeked.take() {
            Some(record) => Ok(record),
            None => self.reader.next()?.ok_or(Error::Truncated),
        }
    }

    fn peek_opcode(&mut self) -> Result<Opcode> {
        if self.peeked.is_none() {
            self.peeked = Some(self.reader.next()?.ok_or(Error::Truncated)?);
        }
        match &self.peeked {
            Some(record) => Ok(record.opcode),
            None => Err(Error::Truncated),
        }
    }

    fn expect(&mut self, opcode: Opcode) -> Result<()> {
        let record = self.next_record()?;
        if record.opcode == opcode {
            Ok(())
        } else {
            Err(Error::Invalid(format!(
                "record {:?} where {:?} was expected",
                record.opcode, opcode
            )))
        }
    }

    fn record_str(record: &Record<'de>) -> Result<&'de str> {
        ::std::str::from_utf8(record.payload).map_err(|_| Error::Invalid("utf-8".into()))
    }

    fn dispatch<V>(&mut self, record: Record<'de>, v: V) -> Result<V::Value>
    where
        V: ::serde::de::Visitor<'de>,
    {
        match record.opcode {
            Opcode::Null => v.visit_unit(),
            Opcode::True => v.visit_bool(true),
            Opcode::False => v.visit_bool(false),
            Opcode::String => v.visit_borrowed_str(Self::record_str(&record)?),
            Opcode::Bin8 | Opcode::Bin16 | Opcode::Bin24 | Opcode::Bin32 => {
                v.visit_borrowed_bytes(record.payload)
            }
            Opcode::BeginArray => {
                let value = v.visit_seq(SeqAccess { de: self })?;
                // Fixed-arity visitors (tuples) stop before the closing
                // record; anything left over is a length mismatch.
                self.expect(Opcode::EndArray)?;
                Ok(value)
            }
            Opcode::BeginObject => {
                let value = v.visit_map(MapAccess { de: self })?;
                self.expect(Opcode::EndObject)?;
                Ok(value)
            }
            Opcode::EndObject | Opcode::EndArray | Opcode::Item => {
                Err(Error::Invalid("record outside its container".into()))
            }
            _ => match crate::read::decode_num(record.opcode, record.payload) {
                Some(Num::Signed(x)) => v.visit_i64(x),
                Some(Num::Unsigned(x)) => v.visit_u64(x),
                Some(Num::Real(x)) => v.visit_f64(x),
                None => Err(Error::Truncated),
            },
        }
    }
}

struct SeqAccess<'de, 'a, 'b> {
    de: &'b mut Deserializer<'de, 'a>,
}

impl<'de, 'a, 'b> ::serde::de::SeqAccess<'de> for SeqAccess<'de, 'a, 'b> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: serde::de::DeserializeSeed<'de>,
    {
        if self.de.peek_opcode()? == Opcode::EndArray {
            // Left in place; whoever opened the array closes it.
            return Ok(None);
        }
        seed.deserialize(&mut *self.de).map(Some)
    }
}

struct MapAccess<'de, 'a, 'b> {
    de: &'b mut Deserializer<'de, 'a>,
}

impl<'de, 'a, 'b> ::serde::de::MapAccess<'de> for MapAccess<'de, 'a, 'b> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: serde::de::DeserializeSeed<'de>,
    {
        if self.de.peek_opcode()? == Opcode::EndObject {
            return Ok(None);
        }
        let mut record = self.de.next_record()?;
        let Some(key) = record.key.take() else {
            return Err(Error::Invalid("object member without a name".into()));
        };
        // The value rides in the same record; leave it for the value seed.
        self.de.peeked = Some(record);
        seed.deserialize(::serde::de::value::BorrowedStrDeserializer::new(key))
            .map(Some)
    }

    fn next_value_seed<S>(&mut self, seed: S) -> Result<S::Value>
    where
        S: serde::de::DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.de)
    }
}

struct EnumAccess<'de, 'a, 'b> {
    de: &'b mut Deserializer<'de, 'a>,
}

impl<'de, 'a, 'b> ::serde::de::EnumAccess<'de> for EnumAccess<'de, 'a, 'b> {
    type Error = Error;

    type Variant = VariantAccess<'de, 'a, 'b>;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: serde::de::DeserializeSeed<'de>,
    {
        let mut record = self.de.next_record()?;
        let Some(variant) = record.key.take() else {
            return Err(Error::Invalid("enum object without a member name".into()));
        };
        self.de.peeked = Some(record);
        let value = seed.deserialize(::serde::de::value::BorrowedStrDeserializer::new(variant))?;
        Ok((value, VariantAccess { de: self.de }))
    }
}

struct VariantAccess<'de, 'a, 'b> {
    de: &'b mut Deserializer<'de, 'a>,
}

impl<'de, 'a, 'b> ::serde::de::VariantAccess<'de> for VariantAccess<'de, 'a, 'b> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        self.de.expect(Opcode::Null)?;
        self.de.expect(Opcode::EndObject)
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: serde::de::DeserializeSeed<'de>,
    {
        let value = seed.deserialize(&mut *self.de)?;
        self.de.expect(Opcode::EndObject)?;
        Ok(value)
    }

    fn tuple_variant<V>(self, _: usize, v: V) -> Result<V::Value>
    where
        V: serde::de::Visitor<'de>,
    {
        self.de.expect(Opcode::BeginArray)?;
        let value = v.visit_seq(SeqAccess { de: &mut *self.de })?;
        self.de.expect(Opcode::EndArray)?;
        self.de.expect(Opcode::EndObject)?;
        Ok(value)
    }

    fn struct_variant<V>(self, _: &'static [&'static str], v: V) -> Result<V::Value>
    where
        V: serde::de::Visitor<'de>,
    {
        self.de.expect(Opcode::BeginObject)?;
        let value = v.visit_map(MapAccess { de: &mut *self.de })?;
        self.de.expect(Opcode::EndObject)?;
        self.de.expect(Opcode::EndObject)?;
        Ok(value)
    }
}

impl<'de, 'a, 'b> ::serde::Deserializer<'de> for &'b mut Deserializer<'de, 'a> {
    type Error = Error;

    fn deserialize_any<V>(self, v: V) -> Result<V::Value>
    where
        V: serde::de::Visitor<'de>,
    {
        let record = self.next_record()?;
        self.dispatch(record, v)
    }

    fn deserialize_option<V>(self, v: V) -> Result<V::Value>
    where
        V: serde::de::Visitor<'de>,
    {
        if self.peek_opcode()? == Opcode::Null {
            self.peeked = None;
            v.visit_none()
        } else {
            v.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V>(self, _: &'static str, v: V) -> Result<V::Value>
    where
        V: serde::de::Visitor<'de>,
    {
        v.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _: &'static str,
        _: &'static [&'static str],
        v: V,
    ) -> Result<V::Value>
    where
        V: serde::de::Visitor<'de>,
    {
        match self.peek_opcode()? {
            Opcode::String => {
                let record = self.next_record()?;
                let variant = Deserializer::record_str(&record)?;
                v.visit_enum(::serde::de::value::BorrowedStrDeserializer::new(variant))
            }
            Opcode::BeginObject => {
                self.peeked = None;
                v.visit_enum(EnumAccess { de: self })
            }
            other => Err(Error::Invalid(format!("enum record {other:?}"))),
        }
    }

    ::serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}
