/// # Schema + data decoder
///
/// The web service answers `GetTables` and `GetCustomReport` with two XML
/// fragments: an XML schema of the data set, then the rows (usually wrapped
/// in a diffgram). [decode] turns the pair into a [Snapshot].
///
/// Only the data set layout is understood: tables are the elements nested in
/// the outer data set element, columns are the elements (or attributes)
/// nested in a table.

use std::str::FromStr;

use chrono::{
    NaiveDate,
    NaiveDateTime,
};

use log::debug;

use quick_xml::{
    events::{
        BytesStart,
        Event,
    },
    Reader,
};

use regex::{
    Regex,
    RegexBuilder,
};

use lazy_static::lazy_static;

use rust_decimal::Decimal;

use snafu::ensure;

use crate::{
    Error,
    MalformedXmlSnafu,
    SchemaMismatchSnafu,
    service::XmlPayload,
    snapshot::{
        Column,
        ColumnType,
        ScalarValue,
        Snapshot,
        Table,
    },
};

lazy_static ! {
    static ref RE_QUALIFIED_NAME : Regex = Regex::new ( r#"^(?:[^:]+:)?([^:]+)$"# )
        .expect ( "Failed to create Regex pattern of the qualified type name." );
    static ref RE_CLR_TYPE : Regex = RegexBuilder::new ( r#"^\s*System\.(\w+)"# )
        .case_insensitive ( true )
        .build ( )
        .expect ( "Failed to create Regex pattern of the System type name." );
    static ref RE_GUID : Regex = Regex::new ( r#"^\{?[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}\}?$"# )
        .expect ( "Failed to create Regex pattern of the GUID." );
    static ref RE_UTC_OFFSET : Regex = Regex::new ( r#"(Z|[+-]\d{2}:\d{2})$"# )
        .expect ( "Failed to create Regex pattern of the UTC offset." );
}

const SCHEMA: &str = "schema";
const DATA: &str = "data";

/// Returns the snapshot decoded from a schema + data pair.
///
/// # Arguments
///
/// * `payload` - Schema and data fragments, as returned by the web service
pub fn decode ( payload: &XmlPayload ) -> Result<Snapshot, Error> {
    let mut snapshot = read_schema ( &payload.schema )?;
    read_data ( &payload.data, &mut snapshot )?;

    debug ! ( "Decoded tables: {:?}", snapshot.tables.iter ( )
        .map ( |t| ( &*t.name, t.rows.len ( ) ) )
        .collect::<Vec<_>> ( ) );

    Ok ( snapshot )
}

/// Returns empty tables as declared by the schema fragment.
pub fn read_schema ( xml: &str ) -> Result<Snapshot, Error> {
    let mut reader = Reader::from_str ( xml );
    reader.config_mut ( ).trim_text ( true );

    let mut tables = Vec::<Table>::new ( );

    // open `element` declarations: 0 data set, 1 table, 2 column
    let mut element_depth = 0usize;
    // column whose type may still come from an inline restriction
    let mut open_column: Option<usize> = None;

    loop {
        match reader.read_event ( ) {
            Ok ( Event::Start ( e ) ) => {
                match e.local_name ( ).as_ref ( ) {
                    b"element" => {
                        let column = declare_element ( &e, element_depth, &mut tables )?;
                        if element_depth == 2 {
                            open_column = column;
                        }
                        element_depth += 1;
                    },
                    b"attribute" if element_depth == 2 => {
                        open_column = declare_column ( &e, &mut tables )?;
                    },
                    b"restriction" => restrict_column ( &e, open_column, &mut tables )?,
                    _ => ( ),
                }
            },
            Ok ( Event::Empty ( e ) ) => {
                match e.local_name ( ).as_ref ( ) {
                    b"element" => {
                        declare_element ( &e, element_depth, &mut tables )?;
                    },
                    b"attribute" if element_depth == 2 => {
                        declare_column ( &e, &mut tables )?;
                    },
                    b"restriction" => restrict_column ( &e, open_column, &mut tables )?,
                    _ => ( ),
                }
            },
            Ok ( Event::End ( e ) ) => {
                match e.local_name ( ).as_ref ( ) {
                    b"element" => {
                        element_depth = element_depth.saturating_sub ( 1 );
                        if element_depth == 2 {
                            open_column = None;
                        }
                    },
                    b"attribute" => open_column = None,
                    _ => ( ),
                }
            },
            Ok ( Event::Eof ) => break,
            Err ( e ) => return MalformedXmlSnafu { part: SCHEMA, info: e.to_string ( ) }.fail ( ),
            _ => ( ),
        }
    }

    ensure ! ( ! tables.is_empty ( ), MalformedXmlSnafu { part: SCHEMA, info: "no table is declared" } );

    Ok ( Snapshot { tables } )
}

/// Handles an `element` declaration at [depth]. Returns the index of the new column, if any.
fn declare_element ( e: &BytesStart, depth: usize, tables: &mut Vec<Table> ) -> Result<Option<usize>, Error> {
    match depth {
        1 => {
            let name = required_attribute ( e, b"name", SCHEMA )?;
            tables.push ( Table::new ( &name, Vec::new ( ) ) );
            Ok ( None )
        },
        2 => declare_column ( e, tables ),
        // the data set itself, or nested content of a column
        _ => Ok ( None ),
    }
}

fn declare_column ( e: &BytesStart, tables: &mut Vec<Table> ) -> Result<Option<usize>, Error> {
    let name = required_attribute ( e, b"name", SCHEMA )?;

    let column_type = match attribute ( e, b"DataType", SCHEMA )? {
        Some ( clr_type ) => clr_column_type ( &clr_type ),
        None => None,
    }.or ( match attribute ( e, b"type", SCHEMA )? {
        Some ( xsd_type ) => xsd_column_type ( &xsd_type ),
        None => None,
    } )
    .unwrap_or ( ColumnType::String );

    match tables.last_mut ( ) {
        Some ( table ) => {
            table.columns.push ( Column::new ( &name, column_type ) );
            Ok ( Some ( table.columns.len ( ) - 1 ) )
        },
        None => MalformedXmlSnafu { part: SCHEMA, info: format ! ( "column {} outside of a table", name ) }.fail ( ),
    }
}

fn restrict_column ( e: &BytesStart, open_column: Option<usize>, tables: &mut Vec<Table> ) -> Result<( ), Error> {
    if let ( Some ( index ), Some ( table ) ) = ( open_column, tables.last_mut ( ) ) {
        if let Some ( base ) = attribute ( e, b"base", SCHEMA )? {
            if let Some ( column_type ) = xsd_column_type ( &base ) {
                table.columns [ index ].column_type = column_type;
            }
        }
    }
    Ok ( ( ) )
}

fn xsd_column_type ( qualified_name: &str ) -> Option<ColumnType> {
    RE_QUALIFIED_NAME.captures ( qualified_name.trim ( ) )
        .and_then ( |c| c.get ( 1 ) )
        .and_then ( |m| ColumnType::from_xsd ( m.as_str ( ) ) )
}

fn clr_column_type ( clr_name: &str ) -> Option<ColumnType> {
    RE_CLR_TYPE.captures ( clr_name )
        .and_then ( |c| c.get ( 1 ) )
        .and_then ( |m| ColumnType::from_clr ( m.as_str ( ) ) )
}

/// Fills the tables of [snapshot] with the rows of the data fragment.
///
/// The fragment is either a diffgram wrapping the data set element, or the
/// data set element itself.
pub fn read_data ( xml: &str, snapshot: &mut Snapshot ) -> Result<( ), Error> {
    let mut reader = Reader::from_str ( xml );
    // values keep their whitespace
    reader.config_mut ( ).trim_text ( false );

    let mut depth = 0usize;
    let mut row_depth = 1usize;
    let mut row: Option<PendingRow> = None;
    let mut field: Option<PendingField> = None;

    loop {
        match reader.read_event ( ) {
            Ok ( Event::Start ( e ) ) => {
                if depth == 0 {
                    if e.local_name ( ).as_ref ( ) == b"diffgram" {
                        row_depth = 2;
                    }
                } else if depth == 1 && row_depth == 2 && is_diffgram_section ( &e ) {
                    // previous versions and row errors
                    reader.read_to_end ( e.name ( ) )
                        .map_err ( |err| MalformedXmlSnafu { part: DATA, info: err.to_string ( ) }.build ( ) )?;
                    continue;
                } else if depth == row_depth {
                    row = Some ( start_row ( &e, snapshot )? );
                } else if depth == row_depth + 1 {
                    field = match &row {
                        Some ( row ) => Some ( start_field ( &e, row, snapshot )? ),
                        None => None,
                    };
                } else if depth > row_depth + 1 {
                    let table = row.as_ref ( )
                        .map ( |r| table_name ( snapshot, r.table ) )
                        .unwrap_or_default ( );
                    return SchemaMismatchSnafu {
                        table,
                        info: format ! ( "nested element {} inside a field", local_name ( &e ) ),
                    }.fail ( );
                }
                depth += 1;
            },
            Ok ( Event::Empty ( e ) ) => {
                if depth == row_depth {
                    let pending = start_row ( &e, snapshot )?;
                    finish_row ( pending, snapshot );
                } else if depth == row_depth + 1 {
                    if let Some ( row ) = row.as_mut ( ) {
                        let pending = start_field ( &e, row, snapshot )?;
                        finish_field ( pending, row, snapshot )?;
                    }
                }
            },
            Ok ( Event::Text ( e ) ) => {
                if let Some ( field ) = field.as_mut ( ) {
                    let text = e.unescape ( )
                        .map_err ( |err| MalformedXmlSnafu { part: DATA, info: err.to_string ( ) }.build ( ) )?;
                    field.text.push_str ( &text );
                }
            },
            Ok ( Event::CData ( e ) ) => {
                if let Some ( field ) = field.as_mut ( ) {
                    let text = std::str::from_utf8 ( &e )
                        .map_err ( |err| MalformedXmlSnafu { part: DATA, info: err.to_string ( ) }.build ( ) )?;
                    field.text.push_str ( text );
                }
            },
            Ok ( Event::End ( _ ) ) => {
                depth = depth.saturating_sub ( 1 );
                if depth == row_depth + 1 {
                    if let ( Some ( pending ), Some ( row ) ) = ( field.take ( ), row.as_mut ( ) ) {
                        finish_field ( pending, row, snapshot )?;
                    }
                } else if depth == row_depth {
                    if let Some ( pending ) = row.take ( ) {
                        finish_row ( pending, snapshot );
                    }
                }
            },
            Ok ( Event::Eof ) => break,
            Err ( e ) => return MalformedXmlSnafu { part: DATA, info: e.to_string ( ) }.fail ( ),
            _ => ( ),
        }
    }

    ensure ! ( depth == 0, MalformedXmlSnafu { part: DATA, info: "unexpected end of data" } );

    Ok ( ( ) )
}

struct PendingRow {
    table: usize,
    values: Vec<ScalarValue>,
}

struct PendingField {
    column: usize,
    nil: bool,
    text: String,
}

fn is_diffgram_section ( e: &BytesStart ) -> bool {
    matches ! ( e.local_name ( ).as_ref ( ), b"before" | b"errors" )
}

fn local_name ( e: &BytesStart ) -> String {
    String::from_utf8_lossy ( e.local_name ( ).as_ref ( ) ).into_owned ( )
}

fn table_name ( snapshot: &Snapshot, table: usize ) -> String {
    snapshot.tables [ table ].name.to_string ( )
}

fn start_row ( e: &BytesStart, snapshot: &Snapshot ) -> Result<PendingRow, Error> {
    let name = local_name ( e );
    let table = snapshot.tables.iter ( )
        .position ( |t| *t.name == *name );

    let table = match table {
        Some ( table ) => table,
        None => return SchemaMismatchSnafu { table: name, info: "table is not declared in the schema" }.fail ( ),
    };

    let mut row = PendingRow {
        table,
        values: vec ! [ ScalarValue::Null; snapshot.tables [ table ].columns.len ( ) ],
    };

    // columns mapped to attributes; prefixed ones are diffgram bookkeeping
    for attr in e.attributes ( ) {
        let attr = attr.map_err ( |err| MalformedXmlSnafu { part: DATA, info: err.to_string ( ) }.build ( ) )?;
        if attr.key.prefix ( ).is_some ( ) || attr.key.as_ref ( ) == b"xmlns" {
            continue;
        }
        let column_name = String::from_utf8_lossy ( attr.key.local_name ( ).as_ref ( ) ).into_owned ( );
        let value = attr.unescape_value ( )
            .map_err ( |err| MalformedXmlSnafu { part: DATA, info: err.to_string ( ) }.build ( ) )?;
        let pending = PendingField {
            column: column_index ( snapshot, table, &column_name )?,
            nil: false,
            text: value.into_owned ( ),
        };
        finish_field ( pending, &mut row, snapshot )?;
    }

    Ok ( row )
}

fn finish_row ( row: PendingRow, snapshot: &mut Snapshot ) {
    snapshot.tables [ row.table ].push_row ( row.values );
}

fn start_field ( e: &BytesStart, row: &PendingRow, snapshot: &Snapshot ) -> Result<PendingField, Error> {
    let column = column_index ( snapshot, row.table, &local_name ( e ) )?;
    let nil = attribute ( e, b"nil", DATA )?
        .map ( |v| v.trim ( ) == "true" )
        .unwrap_or ( false );

    Ok ( PendingField {
        column,
        nil,
        text: String::new ( ),
    } )
}

fn finish_field ( field: PendingField, row: &mut PendingRow, snapshot: &Snapshot ) -> Result<( ), Error> {
    let table = &snapshot.tables [ row.table ];
    let column = &table.columns [ field.column ];

    row.values [ field.column ] = if field.nil {
        ScalarValue::Null
    } else {
        match parse_value ( column.column_type, &field.text ) {
            Some ( value ) => value,
            None => return SchemaMismatchSnafu {
                table: &*table.name,
                info: format ! ( "{:?} is not a valid {} for column {}", field.text, column.column_type, column.name ),
            }.fail ( ),
        }
    };

    Ok ( ( ) )
}

fn column_index ( snapshot: &Snapshot, table: usize, column: &str ) -> Result<usize, Error> {
    let table = &snapshot.tables [ table ];
    match table.column_index ( column ) {
        Some ( index ) => Ok ( index ),
        None => SchemaMismatchSnafu {
            table: &*table.name,
            info: format ! ( "column {} is not declared in the schema", column ),
        }.fail ( ),
    }
}

/// Returns the typed value of [text], or None if it does not fit [column_type].
pub fn parse_value ( column_type: ColumnType, text: &str ) -> Option<ScalarValue> {
    match column_type {
        ColumnType::String => return Some ( ScalarValue::String ( text.to_owned ( ) ) ),
        ColumnType::Char => {
            let mut chars = text.chars ( );
            return match ( chars.next ( ), chars.next ( ) ) {
                ( Some ( c ), None ) => Some ( ScalarValue::String ( c.to_string ( ) ) ),
                _ => None,
            };
        },
        _ => ( ),
    }

    let text = text.trim ( );

    match column_type {
        ColumnType::String | ColumnType::Char => None,
        ColumnType::Guid => if RE_GUID.is_match ( text ) {
            Some ( ScalarValue::String ( text.to_owned ( ) ) )
        } else {
            None
        },
        ColumnType::Boolean => match text {
            "true" | "1" => Some ( ScalarValue::Boolean ( true ) ),
            "false" | "0" => Some ( ScalarValue::Boolean ( false ) ),
            _ => None,
        },
        ColumnType::Byte => text.parse::<u8> ( ).ok ( ).map ( |v| ScalarValue::Integer ( v.into ( ) ) ),
        ColumnType::SByte => text.parse::<i8> ( ).ok ( ).map ( |v| ScalarValue::Integer ( v.into ( ) ) ),
        ColumnType::Int16 => text.parse::<i16> ( ).ok ( ).map ( |v| ScalarValue::Integer ( v.into ( ) ) ),
        ColumnType::UInt16 => text.parse::<u16> ( ).ok ( ).map ( |v| ScalarValue::Integer ( v.into ( ) ) ),
        ColumnType::Int32 => text.parse::<i32> ( ).ok ( ).map ( |v| ScalarValue::Integer ( v.into ( ) ) ),
        ColumnType::UInt32 => text.parse::<u32> ( ).ok ( ).map ( |v| ScalarValue::Integer ( v.into ( ) ) ),
        ColumnType::Int64 => text.parse::<i64> ( ).ok ( ).map ( ScalarValue::Integer ),
        // may not fit i64
        ColumnType::UInt64 => text.parse::<u64> ( ).ok ( ).map ( |v| ScalarValue::Decimal ( Decimal::from ( v ) ) ),
        ColumnType::Decimal => Decimal::from_str ( text )
            .or_else ( |_| Decimal::from_scientific ( text ) )
            .ok ( )
            .map ( ScalarValue::Decimal ),
        ColumnType::Single => parse_float ( text )
            .filter ( |v| v.is_infinite ( ) || ( *v as f32 ).is_finite ( ) )
            .map ( |v| ScalarValue::Double ( f64::from ( v as f32 ) ) ),
        ColumnType::Double => parse_float ( text ).map ( ScalarValue::Double ),
        ColumnType::DateTime => parse_timestamp ( text ).map ( ScalarValue::Timestamp ),
    }
}

fn parse_float ( text: &str ) -> Option<f64> {
    match text {
        "INF" => Some ( f64::INFINITY ),
        "-INF" => Some ( f64::NEG_INFINITY ),
        _ => text.parse::<f64> ( ).ok ( ),
    }
}

/// Returns the wall-clock date/time of an XML `dateTime` or `date`; the UTC offset is dropped.
pub fn parse_timestamp ( text: &str ) -> Option<NaiveDateTime> {
    let local = match RE_UTC_OFFSET.find ( text ) {
        Some ( offset ) => &text [ ..offset.start ( ) ],
        None => text,
    };

    NaiveDateTime::parse_from_str ( local, "%Y-%m-%dT%H:%M:%S%.f" )
        .or_else ( |_| NaiveDateTime::parse_from_str ( local, "%Y-%m-%dT%H:%M:%S" ) )
        .ok ( )
        .or_else ( || NaiveDate::parse_from_str ( local, "%Y-%m-%d" )
            .ok ( )
            .and_then ( |d| d.and_hms_opt ( 0, 0, 0 ) ) )
}

fn attribute ( e: &BytesStart, local: &[u8], part: &'static str ) -> Result<Option<String>, Error> {
    for attr in e.attributes ( ) {
        let attr = attr.map_err ( |err| MalformedXmlSnafu { part, info: err.to_string ( ) }.build ( ) )?;
        if attr.key.local_name ( ).as_ref ( ) == local {
            let value = attr.unescape_value ( )
                .map_err ( |err| MalformedXmlSnafu { part, info: err.to_string ( ) }.build ( ) )?;
            return Ok ( Some ( value.into_owned ( ) ) );
        }
    }
    Ok ( None )
}

fn required_attribute ( e: &BytesStart, local: &[u8], part: &'static str ) -> Result<String, Error> {
    match attribute ( e, local, part )? {
        Some ( value ) => Ok ( value ),
        None => MalformedXmlSnafu {
            part,
            info: format ! ( "{} without {} attribute", local_name ( e ), String::from_utf8_lossy ( local ) ),
        }.fail ( ),
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn givenReferenceTables_whenDecode_thenTablesFollowSchemaOrder ( ) {
        setup ( );
        let snapshot = decode ( &reference_payload ( ) ).unwrap ( );

        assert_eq ! ( snapshot.table_names ( ), vec ! [ "V_CODE", "V_QUOTE", "V_TIMESTAMP" ] );

        let codes = snapshot.table ( "V_CODE" ).unwrap ( );
        let columns: Vec<_> = codes.columns.iter ( )
            .map ( |c| ( &*c.name, c.column_type ) )
            .collect ( );
        assert_eq ! ( columns, vec ! [
            ( "CODE_ID", ColumnType::Decimal ),
            ( "DESCRIPTION", ColumnType::String ),
            ( "ENDDATE", ColumnType::DateTime ),
        ] );
        assert_eq ! ( codes.rows.len ( ), 3 );
        assert_eq ! ( snapshot.table ( "V_QUOTE" ).unwrap ( ).rows.len ( ), 4 );
        assert_eq ! ( snapshot.table ( "V_TIMESTAMP" ).unwrap ( ).rows.len ( ), 2 );
    }

    #[test]
    fn givenMissingElement_whenDecode_thenNull ( ) {
        let snapshot = decode ( &reference_payload ( ) ).unwrap ( );
        let codes = snapshot.table ( "V_CODE" ).unwrap ( );

        assert_eq ! ( codes.rows [ 0 ] [ 2 ], ScalarValue::Null );
        assert_eq ! (
            codes.rows [ 2 ] [ 2 ],
            ScalarValue::Timestamp ( parse_timestamp ( "2019-12-31T00:00:00" ).unwrap ( ) )
        );
    }

    #[test]
    fn givenDiffgramBeforeSection_whenDecode_thenIgnored ( ) {
        let payload = XmlPayload {
            schema: target_xml ! ( "dataset/report_schema.xml" ),
            data: r#"<diffgr:diffgram xmlns:msdata="urn:schemas-microsoft-com:xml-msdata" xmlns:diffgr="urn:schemas-microsoft-com:xml-diffgram-v1">
                <NewDataSet>
                    <V_REPO diffgr:id="V_REPO1" msdata:rowOrder="0">
                        <QUOTE_ID>42</QUOTE_ID>
                        <CODE_ID>5</CODE_ID>
                        <TIMESTAMP_ID>2</TIMESTAMP_ID>
                    </V_REPO>
                </NewDataSet>
                <diffgr:before>
                    <V_REPO diffgr:id="V_REPO1" msdata:rowOrder="0">
                        <QUOTE_ID>41</QUOTE_ID>
                    </V_REPO>
                </diffgr:before>
            </diffgr:diffgram>"#.to_owned ( ),
        };

        let snapshot = decode ( &payload ).unwrap ( );
        let report = snapshot.table ( "V_REPO" ).unwrap ( );

        assert_eq ! ( report.rows.len ( ), 1 );
        assert_eq ! ( report.rows [ 0 ] [ 0 ], ScalarValue::Decimal ( Decimal::from ( 42 ) ) );
    }

    #[test]
    fn givenBareDataSet_whenDecode_thenRowsRead ( ) {
        let payload = XmlPayload {
            schema: target_xml ! ( "dataset/report_schema.xml" ),
            data: "<NewDataSet><V_REPO><QUOTE_ID>42</QUOTE_ID><VALUE>81.25</VALUE></V_REPO></NewDataSet>".to_owned ( ),
        };

        let snapshot = decode ( &payload ).unwrap ( );
        let report = snapshot.table ( "V_REPO" ).unwrap ( );
        let record = report.records ( ).next ( ).unwrap ( );

        assert_eq ! ( record.decimal ( "VALUE" ).unwrap ( ).to_string ( ), "81.25" );
        assert ! ( record.get ( "CODE_ID" ).unwrap ( ).is_null ( ) );
    }

    #[test]
    fn givenEmptyDiffgram_whenDecode_thenEmptyTables ( ) {
        let payload = XmlPayload {
            schema: target_xml ! ( "dataset/report_schema.xml" ),
            data: r#"<diffgr:diffgram xmlns:diffgr="urn:schemas-microsoft-com:xml-diffgram-v1" />"#.to_owned ( ),
        };

        let snapshot = decode ( &payload ).unwrap ( );

        assert_eq ! ( snapshot.table_names ( ), vec ! [ "V_REPO" ] );
        assert ! ( snapshot.tables [ 0 ].rows.is_empty ( ) );
    }

    #[test]
    fn givenInlineRestriction_whenReadSchema_thenBaseTypeUsed ( ) {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:msdata="urn:schemas-microsoft-com:xml-msdata">
            <xs:element name="NewDataSet" msdata:IsDataSet="true">
                <xs:complexType>
                    <xs:choice minOccurs="0" maxOccurs="unbounded">
                        <xs:element name="T">
                            <xs:complexType>
                                <xs:sequence>
                                    <xs:element name="NAME" minOccurs="0">
                                        <xs:simpleType>
                                            <xs:restriction base="xs:string">
                                                <xs:maxLength value="50" />
                                            </xs:restriction>
                                        </xs:simpleType>
                                    </xs:element>
                                    <xs:element name="AMOUNT" msdata:DataType="System.Int64, mscorlib" type="xs:string" minOccurs="0" />
                                    <xs:element name="FLAG" type="xs:boolean" minOccurs="0" />
                                </xs:sequence>
                                <xs:attribute name="ID" type="xs:int" />
                            </xs:complexType>
                        </xs:element>
                    </xs:choice>
                </xs:complexType>
            </xs:element>
        </xs:schema>"#;

        let snapshot = read_schema ( schema ).unwrap ( );
        let table = snapshot.table ( "T" ).unwrap ( );
        let columns: Vec<_> = table.columns.iter ( )
            .map ( |c| ( &*c.name, c.column_type ) )
            .collect ( );

        assert_eq ! ( columns, vec ! [
            ( "NAME", ColumnType::String ),
            ( "AMOUNT", ColumnType::Int64 ),
            ( "FLAG", ColumnType::Boolean ),
            ( "ID", ColumnType::Int32 ),
        ] );

        let mut snapshot = snapshot;
        read_data ( r#"<NewDataSet><T ID="7"><NAME> padded </NAME><FLAG>true</FLAG></T></NewDataSet>"#, &mut snapshot ).unwrap ( );
        assert_eq ! ( snapshot.tables [ 0 ].rows [ 0 ], vec ! [
            ScalarValue::String ( " padded ".to_owned ( ) ),
            ScalarValue::Null,
            ScalarValue::Boolean ( true ),
            ScalarValue::Integer ( 7 ),
        ] );
    }

    #[test]
    fn givenUndeclaredTable_whenDecode_thenSchemaMismatch ( ) {
        let payload = XmlPayload {
            schema: target_xml ! ( "dataset/report_schema.xml" ),
            data: "<NewDataSet><V_OTHER><QUOTE_ID>1</QUOTE_ID></V_OTHER></NewDataSet>".to_owned ( ),
        };

        match decode ( &payload ) {
            Err ( Error::SchemaMismatch { table, .. } ) => assert_eq ! ( &*table, "V_OTHER" ),
            other => panic ! ( "Unexpected result: {:?}", other ),
        }
    }

    #[test]
    fn givenUndeclaredColumn_whenDecode_thenSchemaMismatch ( ) {
        let payload = XmlPayload {
            schema: target_xml ! ( "dataset/report_schema.xml" ),
            data: "<NewDataSet><V_REPO><PRICE>1</PRICE></V_REPO></NewDataSet>".to_owned ( ),
        };

        assert ! ( matches ! ( decode ( &payload ), Err ( Error::SchemaMismatch { .. } ) ) );
    }

    #[test]
    fn givenWrongValueType_whenDecode_thenSchemaMismatch ( ) {
        let payload = XmlPayload {
            schema: target_xml ! ( "dataset/report_schema.xml" ),
            data: "<NewDataSet><V_REPO><QUOTE_ID>forty-two</QUOTE_ID></V_REPO></NewDataSet>".to_owned ( ),
        };

        assert ! ( matches ! ( decode ( &payload ), Err ( Error::SchemaMismatch { .. } ) ) );
    }

    #[test]
    fn givenEmptyDecimalElement_whenDecode_thenSchemaMismatch ( ) {
        let payload = XmlPayload {
            schema: target_xml ! ( "dataset/report_schema.xml" ),
            data: "<NewDataSet><V_REPO><QUOTE_ID /></V_REPO></NewDataSet>".to_owned ( ),
        };

        assert ! ( matches ! ( decode ( &payload ), Err ( Error::SchemaMismatch { .. } ) ) );
    }

    #[test]
    fn givenNilAttribute_whenDecode_thenNull ( ) {
        let payload = XmlPayload {
            schema: target_xml ! ( "dataset/report_schema.xml" ),
            data: r#"<NewDataSet xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><V_REPO><QUOTE_ID xsi:nil="true" /></V_REPO></NewDataSet>"#.to_owned ( ),
        };

        let snapshot = decode ( &payload ).unwrap ( );

        assert ! ( snapshot.tables [ 0 ].rows [ 0 ] [ 0 ].is_null ( ) );
    }

    #[test]
    fn givenUnclosedData_whenDecode_thenMalformedXml ( ) {
        let payload = XmlPayload {
            schema: target_xml ! ( "dataset/report_schema.xml" ),
            data: "<NewDataSet><V_REPO><QUOTE_ID>42</QUOTE_ID>".to_owned ( ),
        };

        assert ! ( matches ! ( decode ( &payload ), Err ( Error::MalformedXml { .. } ) ) );
    }

    #[test]
    fn givenSchemaWithoutTables_whenReadSchema_thenMalformedXml ( ) {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"><xs:element name="NewDataSet" /></xs:schema>"#;

        match read_schema ( schema ) {
            Err ( Error::MalformedXml { part, .. } ) => assert_eq ! ( part, "schema" ),
            other => panic ! ( "Unexpected result: {:?}", other ),
        }
    }

    #[test]
    fn givenMismatchedTags_whenReadSchema_thenMalformedXml ( ) {
        assert ! ( matches ! ( read_schema ( "<xs:schema><xs:element></xs:schema>" ), Err ( Error::MalformedXml { .. } ) ) );
    }

    #[test]
    fn test_parse_timestamp ( ) {
        let expected = NaiveDate::from_ymd_opt ( 2024, 7, 4 ).unwrap ( ).and_hms_opt ( 12, 0, 0 ).unwrap ( );

        assert_eq ! ( parse_timestamp ( "2024-07-04T12:00:00" ), Some ( expected ) );
        assert_eq ! ( parse_timestamp ( "2024-07-04T12:00:00+07:00" ), Some ( expected ) );
        assert_eq ! ( parse_timestamp ( "2024-07-04T12:00:00.000Z" ), Some ( expected ) );
        assert_eq ! ( parse_timestamp ( "2024-07-04" ).unwrap ( ).date ( ), expected.date ( ) );
        assert_eq ! ( parse_timestamp ( "04/07/2024" ), None );
    }

    #[test]
    fn test_parse_value ( ) {
        assert_eq ! ( parse_value ( ColumnType::Decimal, " 1.5E2 " ), Some ( ScalarValue::Decimal ( Decimal::from ( 150 ) ) ) );
        assert_eq ! ( parse_value ( ColumnType::Int16, "70000" ), None );
        assert_eq ! ( parse_value ( ColumnType::Double, "-INF" ), Some ( ScalarValue::Double ( f64::NEG_INFINITY ) ) );
        assert_eq ! ( parse_value ( ColumnType::String, "" ), Some ( ScalarValue::String ( String::new ( ) ) ) );
        assert_eq ! ( parse_value ( ColumnType::DateTime, "" ), None );
    }

    #[test]
    fn givenNarrowTypes_whenParseValue_thenRangeChecked ( ) {
        assert_eq ! ( parse_value ( ColumnType::Byte, "255" ), Some ( ScalarValue::Integer ( 255 ) ) );
        assert_eq ! ( parse_value ( ColumnType::Byte, "-1" ), None );
        assert_eq ! ( parse_value ( ColumnType::SByte, "-128" ), Some ( ScalarValue::Integer ( -128 ) ) );
        assert_eq ! ( parse_value ( ColumnType::UInt16, "65535" ), Some ( ScalarValue::Integer ( 65535 ) ) );
        assert_eq ! ( parse_value ( ColumnType::UInt32, "4294967296" ), None );
        assert_eq ! (
            parse_value ( ColumnType::UInt64, "18446744073709551615" ).map ( |v| v.to_string ( ) ),
            Some ( "18446744073709551615".to_owned ( ) )
        );
        assert_eq ! ( parse_value ( ColumnType::Single, "1.5" ), Some ( ScalarValue::Double ( 1.5 ) ) );
        assert_eq ! ( parse_value ( ColumnType::Single, "1e300" ), None );
        assert_eq ! ( parse_value ( ColumnType::Char, " " ), Some ( ScalarValue::String ( " ".to_owned ( ) ) ) );
        assert_eq ! ( parse_value ( ColumnType::Char, "ab" ), None );
        assert ! ( parse_value ( ColumnType::Guid, "3F2504E0-4F89-11D3-9A0C-0305E82C3301" ).is_some ( ) );
        assert_eq ! ( parse_value ( ColumnType::Guid, "not-a-guid" ), None );
    }

    #[test]
    fn givenClrByteColumn_whenReadSchema_thenByteTypeKept ( ) {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:msdata="urn:schemas-microsoft-com:xml-msdata">
            <xs:element name="NewDataSet" msdata:IsDataSet="true">
                <xs:complexType>
                    <xs:choice minOccurs="0" maxOccurs="unbounded">
                        <xs:element name="T">
                            <xs:complexType>
                                <xs:sequence>
                                    <xs:element name="LEVEL" type="xs:unsignedByte" minOccurs="0" />
                                    <xs:element name="RATIO" type="xs:float" minOccurs="0" />
                                    <xs:element name="KEY" msdata:DataType="System.Guid, mscorlib" type="xs:string" minOccurs="0" />
                                </xs:sequence>
                            </xs:complexType>
                        </xs:element>
                    </xs:choice>
                </xs:complexType>
            </xs:element>
        </xs:schema>"#;

        let snapshot = read_schema ( schema ).unwrap ( );
        let names: Vec<_> = snapshot.tables [ 0 ].columns.iter ( )
            .map ( |c| c.column_type.to_string ( ) )
            .collect ( );

        assert_eq ! ( names, vec ! [ "Byte", "Single", "Guid" ] );
    }
}
