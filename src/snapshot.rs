/// # Reference snapshot
///
/// Decoded form of a schema + data XML pair: an ordered list of tables,
/// each with its column side table and the rows in document order.
///
/// Row values are stored in column order, so `rows[i][j]` belongs to
/// `columns[j]`.

use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use snafu::OptionExt;

use crate::{
    Error,
    MissingColumnSnafu,
    MissingTableSnafu,
    UnexpectedValueSnafu,
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column data type, named after the `System.*` types the web service declares
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ColumnType {
    String,
    Char,
    Guid,
    Boolean,
    Byte,
    SByte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Decimal,
    Single,
    Double,
    DateTime,
}

impl ColumnType {

    /// Returns the column type of an XML schema type, without namespace prefix.
    ///
    /// # Arguments
    ///
    /// * `xsd_type` - Local name, e.g. `decimal` from `xs:decimal`
    pub fn from_xsd ( xsd_type: &str ) -> Option<Self> {
        match xsd_type {
            "string" | "anyURI" | "QName" | "token" | "normalizedString" => Some ( ColumnType::String ),
            "boolean" => Some ( ColumnType::Boolean ),
            "unsignedByte" => Some ( ColumnType::Byte ),
            "byte" => Some ( ColumnType::SByte ),
            "short" => Some ( ColumnType::Int16 ),
            "unsignedShort" => Some ( ColumnType::UInt16 ),
            "int" => Some ( ColumnType::Int32 ),
            "unsignedInt" => Some ( ColumnType::UInt32 ),
            "long" | "integer" => Some ( ColumnType::Int64 ),
            "unsignedLong" => Some ( ColumnType::UInt64 ),
            "decimal" => Some ( ColumnType::Decimal ),
            "float" => Some ( ColumnType::Single ),
            "double" => Some ( ColumnType::Double ),
            "dateTime" | "date" => Some ( ColumnType::DateTime ),
            _ => None,
        }
    }

    /// Returns the column type of a `System.*` type name, without the namespace.
    pub fn from_clr ( clr_type: &str ) -> Option<Self> {
        match clr_type {
            "String" => Some ( ColumnType::String ),
            "Char" => Some ( ColumnType::Char ),
            "Guid" => Some ( ColumnType::Guid ),
            "Boolean" => Some ( ColumnType::Boolean ),
            "Byte" => Some ( ColumnType::Byte ),
            "SByte" => Some ( ColumnType::SByte ),
            "Int16" => Some ( ColumnType::Int16 ),
            "UInt16" => Some ( ColumnType::UInt16 ),
            "Int32" => Some ( ColumnType::Int32 ),
            "UInt32" => Some ( ColumnType::UInt32 ),
            "Int64" => Some ( ColumnType::Int64 ),
            "UInt64" => Some ( ColumnType::UInt64 ),
            "Decimal" => Some ( ColumnType::Decimal ),
            "Single" => Some ( ColumnType::Single ),
            "Double" => Some ( ColumnType::Double ),
            "DateTime" => Some ( ColumnType::DateTime ),
            _ => None,
        }
    }

    pub fn name ( &self ) -> &'static str {
        match self {
            ColumnType::String => "String",
            ColumnType::Char => "Char",
            ColumnType::Guid => "Guid",
            ColumnType::Boolean => "Boolean",
            ColumnType::Byte => "Byte",
            ColumnType::SByte => "SByte",
            ColumnType::Int16 => "Int16",
            ColumnType::UInt16 => "UInt16",
            ColumnType::Int32 => "Int32",
            ColumnType::UInt32 => "UInt32",
            ColumnType::Int64 => "Int64",
            ColumnType::UInt64 => "UInt64",
            ColumnType::Decimal => "Decimal",
            ColumnType::Single => "Single",
            ColumnType::Double => "Double",
            ColumnType::DateTime => "DateTime",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt ( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str ( self.name ( ) )
    }
}

/// Single field value. [ScalarValue::Null] is the "no value" marker.
#[derive(PartialEq, Clone, Debug)]
pub enum ScalarValue {
    Null,
    String(String),
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
    Timestamp(NaiveDateTime),
}

impl ScalarValue {
    pub fn is_null ( &self ) -> bool {
        *self == ScalarValue::Null
    }

    /// Returns the value as decimal, for decimal and integer values only
    pub fn as_decimal ( &self ) -> Option<Decimal> {
        match self {
            ScalarValue::Decimal ( d ) => Some ( *d ),
            ScalarValue::Integer ( i ) => Some ( Decimal::from ( *i ) ),
            _ => None,
        }
    }

    pub fn as_str ( &self ) -> Option<&str> {
        match self {
            ScalarValue::String ( s ) => Some ( s.as_str ( ) ),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt ( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        match self {
            ScalarValue::Null => Ok ( ( ) ),
            ScalarValue::String ( s ) => f.write_str ( s ),
            ScalarValue::Boolean ( b ) => write ! ( f, "{}", if *b { "True" } else { "False" } ),
            ScalarValue::Integer ( i ) => write ! ( f, "{}", i ),
            ScalarValue::Decimal ( d ) => write ! ( f, "{}", d ),
            ScalarValue::Double ( v ) => write ! ( f, "{}", v ),
            ScalarValue::Timestamp ( t ) => write ! ( f, "{}", t.format ( TIMESTAMP_FORMAT ) ),
        }
    }
}

#[derive(PartialEq, Clone, Debug)]
pub struct Column {
    pub name: Box<str>,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new ( name: &str, column_type: ColumnType ) -> Self {
        Column {
            name: name.to_owned ( ).into_boxed_str ( ),
            column_type,
        }
    }
}

#[derive(PartialEq, Clone, Debug)]
pub struct Table {
    pub name: Box<str>,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<ScalarValue>>,
}

impl Table {
    pub fn new ( name: &str, columns: Vec<Column> ) -> Self {
        Table {
            name: name.to_owned ( ).into_boxed_str ( ),
            columns,
            rows: Vec::new ( ),
        }
    }

    pub fn column_index ( &self, column: &str ) -> Option<usize> {
        self.columns.iter ( )
            .position ( |c| &*c.name == column )
    }

    /// Appends a row. Missing trailing values are filled with [ScalarValue::Null].
    pub fn push_row ( &mut self, mut values: Vec<ScalarValue> ) {
        values.resize ( self.columns.len ( ), ScalarValue::Null );
        self.rows.push ( values );
    }

    pub fn records ( &self ) -> impl Iterator<Item = Record<'_>> + '_ {
        self.rows.iter ( )
            .map ( move |values| Record {
                table: self,
                values: values.as_slice ( ),
            } )
    }
}

/// Borrowed row with by-name access to its fields
#[derive(Clone, Copy, Debug)]
pub struct Record <'a> {
    table: &'a Table,
    values: &'a [ScalarValue],
}

impl <'a> Record <'a> {
    pub fn get ( &self, column: &str ) -> Result<&'a ScalarValue, Error> {
        let index = self.table.column_index ( column )
            .context ( MissingColumnSnafu {
                table: &*self.table.name,
                column,
            } )?;

        Ok ( &self.values [ index ] )
    }

    /// Returns the decimal value of [column]. Null is an error here.
    pub fn decimal ( &self, column: &str ) -> Result<Decimal, Error> {
        let value = self.get ( column )?;
        value.as_decimal ( )
            .context ( UnexpectedValueSnafu {
                table: &*self.table.name,
                column,
                expected: "decimal",
                value: value.clone ( ),
            } )
    }

    pub fn string ( &self, column: &str ) -> Result<&'a str, Error> {
        let value = self.get ( column )?;
        value.as_str ( )
            .context ( UnexpectedValueSnafu {
                table: &*self.table.name,
                column,
                expected: "string",
                value: value.clone ( ),
            } )
    }
}

#[derive(PartialEq, Clone, Debug, Default)]
pub struct Snapshot {
    pub tables: Vec<Table>,
}

impl Snapshot {
    pub fn len ( &self ) -> usize {
        self.tables.len ( )
    }

    pub fn is_empty ( &self ) -> bool {
        self.tables.is_empty ( )
    }

    pub fn table_names ( &self ) -> Vec<&str> {
        self.tables.iter ( )
            .map ( |t| &*t.name )
            .collect ( )
    }

    pub fn table ( &self, name: &str ) -> Option<&Table> {
        self.tables.iter ( )
            .find ( |t| &*t.name == name )
    }

    pub fn require_table ( &self, name: &str ) -> Result<&Table, Error> {
        self.table ( name )
            .context ( MissingTableSnafu { table: name } )
    }
}
