use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::write::Writer;

/// Serializes any [`serde::Serialize`] value into JSONB records through a
/// [`Writer`]. Structs and string-keyed maps become objects, sequences and
/// tuples become arrays, unit variants become strings and data-carrying
/// variants become single-member objects.
pub struct Serializer<'w, B> {
    writer: &'w mut Writer<B>,
}

impl<'w, B> Serializer<'w, B> {
    pub fn new(writer: &'w mut Writer<B>) -> Self {
        Self { writer }
    }
}

pub struct CollectionSerializer<'s, 'w, B> {
    ser: &'s mut Serializer<'w, B>,
    // A variant's array is wrapped in the single-member object that names
    // the variant; `end` must close both.
    wrapped: bool,
}

impl<'s, 'w, B> ::serde::ser::SerializeSeq for CollectionSerializer<'s, 'w, B>
where
    B: Buffer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<Self::Ok> {
        self.ser.writer.end_array();
        if self.wrapped {
            self.ser.writer.end_object();
        }
        Ok(())
    }
}

impl<'s, 'w, B> ::serde::ser::SerializeTuple for CollectionSerializer<'s, 'w, B>
where
    B: Buffer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        ::serde::ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok> {
        ::serde::ser::SerializeSeq::end(self)
    }
}

impl<'s, 'w, B> ::serde::ser::SerializeTupleStruct for CollectionSerializer<'s, 'w, B>
where
    B: Buffer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        ::serde::ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok> {
        ::serde::ser::SerializeSeq::end(self)
    }
}

impl<'s, 'w, B> ::serde::ser::SerializeTupleVariant for CollectionSerializer<'s, 'w, B>
where
    B: Buffer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        ::serde::ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok> {
        ::serde::ser::SerializeSeq::end(self)
    }
}

pub struct MapSerializer<'s, 'w, B> {
    ser: &'s mut Serializer<'w, B>,
    wrapped: bool,
}

impl<'s, 'w, B> ::serde::ser::SerializeMap for MapSerializer<'s, 'w, B>
where
    B: Buffer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized>(&mut self, key: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        key.serialize(KeySerializer {
            ser: &mut *self.ser,
        })
    }

    fn serialize_value<T: ?Sized>(&mut self, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<Self::Ok> {
        self.ser.writer.end_object();
        if self.wrapped {
            self.ser.writer.end_object();
        }
        Ok(())
    }
}

impl<'s, 'w, B> ::serde::ser::SerializeStruct for MapSerializer<'s, 'w, B>
where
    B: Buffer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, name: &'static str, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        self.ser.writer.add_item(name);
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<Self::Ok> {
        ::serde::ser::SerializeMap::end(self)
    }
}

impl<'s, 'w, B> ::serde::ser::SerializeStructVariant for MapSerializer<'s, 'w, B>
where
    B: Buffer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, name: &'static str, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        ::serde::ser::SerializeStruct::serialize_field(self, name, value)
    }

    fn end(self) -> Result<Self::Ok> {
        ::serde::ser::SerializeMap::end(self)
    }
}

/// Map keys have to land in ITEM records, so only strings are accepted.
struct KeySerializer<'s, 'w, B> {
    ser: &'s mut Serializer<'w, B>,
}

fn key_error() -> Error {
    Error::Invalid("object key (must be a string)".into())
}

macro_rules! key_unsupported {
    ($($fn_name:ident: $ty:ty,)*) => {
        $(
            fn $fn_name(self, _: $ty) -> Result<Self::Ok> {
                Err(key_error())
            }
        )*
    };
}

impl<'s, 'w, B> ::serde::ser::Serializer for KeySerializer<'s, 'w, B>
where
    B: Buffer,
{
    type Ok = ();
    type Error = Error;

    type SerializeSeq = ::serde::ser::Impossible<(), Error>;
    type SerializeTuple = ::serde::ser::Impossible<(), Error>;
    type SerializeTupleStruct = ::serde::ser::Impossible<(), Error>;
    type SerializeTupleVariant = ::serde::ser::Impossible<(), Error>;
    type SerializeMap = ::serde::ser::Impossible<(), Error>;
    type SerializeStruct = ::serde::ser::Impossible<(), Error>;
    type SerializeStructVariant = ::serde::ser::Impossible<(), Error>;

    fn serialize_str(self, v: &str) -> Result<Self::Ok> {
        if v.as_bytes().contains(&0) {
            return Err(Error::Invalid("string containing NUL".into()));
        }
        self.ser.writer.add_item(v);
        Ok(())
    }

    key_unsupported! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_f32: f32,
        serialize_f64: f64,
        serialize_char: char,
        serialize_bytes: &[u8],
    }

    fn serialize_none(self) -> Result<Self::Ok> {
        Err(key_error())
    }

    fn serialize_some<T: ?Sized>(self, _: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        Err(key_error())
    }

    fn serialize_unit(self) -> Result<Self::Ok> {
        Err(key_error())
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Self::Ok> {
        Err(key_error())
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<Self::Ok> {
        self.ser.writer.add_item(variant);
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized>(self, _: &'static str, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        Err(key_error())
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(key_error())
    }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple> {
        Err(key_error())
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(key_error())
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(key_error())
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Err(key_error())
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self::SerializeStruct> {
        Err(key_error())
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(key_error())
    }
}

impl<'a, 'w, B> ::serde::ser::Serializer for &'a mut Serializer<'w, B>
where
    B: Buffer,
{
    type Error = Error;
    type Ok = ();

    type SerializeSeq = CollectionSerializer<'a, 'w, B>;

    type SerializeTuple = CollectionSerializer<'a, 'w, B>;

    type SerializeTupleStruct = CollectionSerializer<'a, 'w, B>;

    type SerializeTupleVariant = CollectionSerializer<'a, 'w, B>;

    type SerializeMap = MapSerializer<'a, 'w, B>;

    type SerializeStruct = MapSerializer<'a, 'w, B>;

    type SerializeStructVariant = MapSerializer<'a, 'w, B>;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok> {
        self.writer.add_bool(v);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok> {
        self.writer.add_i8(v);
        Ok(())
    }

    fn serialize_i16(self, v: i16) -> Result<Self::Ok> {
        self.writer.add_i16(v);
        Ok(())
    }

    fn serialize_i32(self, v: i32) -> Result<Self::Ok> {
        self.writer.add_i32(v);
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> Result<Self::Ok> {
        self.writer.add_i64(v);
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<Self::Ok> {
        self.writer.add_u8(v);
        Ok(())
    }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok> {
        self.writer.add_u16(v);
        Ok(())
    }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok> {
        self.writer.add_u32(v);
        Ok(())
    }

    fn serialize_u64(self, v: u64) -> Result<Self::Ok> {
        self.writer.add_u64(v);
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<Self::Ok> {
        self.writer.add_f32(v);
        Ok(())
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok> {
        self.writer.add_f64(v);
        Ok(())
    }

    fn serialize_char(self, _: char) -> Result<Self::Ok> {
        Err(Error::Unsupported("serialize char".into()))
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok> {
        if v.as_bytes().contains(&0) {
            return Err(Error::Invalid("string containing NUL".into()));
        }
        self.writer.add_string(v);
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok> {
        self.writer.add_bin(v);
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok> {
        self.writer.add_null();
        Ok(())
    }

    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok> {
        self.writer.add_null();
        Ok(())
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Self::Ok> {
        self.writer.add_null();
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<Self::Ok> {
        self.writer.add_string(variant);
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized>(self, _: &'static str, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        self.writer.begin_object();
        self.writer.add_item(variant);
        value.serialize(&mut *self)?;
        self.writer.end_object();
        Ok(())
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq> {
        self.writer.begin_array();
        Ok(CollectionSerializer {
            ser: self,
            wrapped: false,
        })
    }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple> {
        self.writer.begin_array();
        Ok(CollectionSerializer {
            ser: self,
            wrapped: false,
        })
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.writer.begin_array();
        Ok(CollectionSerializer {
            ser: self,
            wrapped: false,
        })
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.writer.begin_object();
        self.writer.add_item(variant);
        self.writer.begin_array();
        Ok(CollectionSerializer {
            ser: self,
            wrapped: true,
        })
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        self.writer.begin_object();
        Ok(MapSerializer {
            ser: self,
            wrapped: false,
        })
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self::SerializeStruct> {
        self.writer.begin_object();
        Ok(MapSerializer {
            ser: self,
            wrapped: false,
        })
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.writer.begin_object();
        self.writer.add_item(variant);
        self.writer.begin_object();
        Ok(MapSerializer {
            ser: self,
            wrapped: true,
        })
    }
}
