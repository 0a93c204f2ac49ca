/// # Custom price report
///
/// Lookups over the meta tables and the `GetCustomReport` request built from them.

use std::collections::HashMap;

use chrono::{
    NaiveDate,
    NaiveDateTime,
};

use lazy_static::lazy_static;

use rust_decimal::Decimal;

use serde::{
    Serialize,
    Serializer,
};

use snafu::OptionExt;

use crate::{
    DuplicateKeySnafu,
    Error,
    MissingLookupSnafu,
    snapshot::Snapshot,
};

pub const CODE_TABLE: &str = "V_CODE";
pub const QUOTE_TABLE: &str = "V_QUOTE";
pub const TIMESTAMP_TABLE: &str = "V_TIMESTAMP";
pub const REPORT_TABLE: &str = "V_REPO";

/// Meta tables requested by `GetTables`
pub const REFERENCE_TABLES: [&str; 3] = [ CODE_TABLE, QUOTE_TABLE, TIMESTAMP_TABLE ];

/// Discriminator value matching anything
pub const WILDCARD: i32 = -1;

/// Upper bound of quotes in one report request
pub const MAX_REPORT_ITEMS: usize = 10;

pub const XML_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

lazy_static ! {
    /// Start and end date meaning "the latest values available"
    pub static ref LATEST_AVAILABLE : NaiveDateTime = NaiveDate::from_ymd_opt ( 1, 1, 1 )
        .and_then ( |d| d.and_hms_opt ( 0, 0, 0 ) )
        .expect ( "Failed to create the minimum date." );
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Periodicity {
    Daily,
}

impl Periodicity {
    pub fn as_str ( &self ) -> &'static str {
        match self {
            Periodicity::Daily => "Daily",
        }
    }
}

impl Serialize for Periodicity {
    fn serialize<S> ( &self, serializer: S ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str ( self.as_str ( ) )
    }
}

/// One line of the report request
#[derive(Serialize, PartialEq, Clone, Debug)]
pub struct PriceReportItem {
    #[serde(rename = "PriceReportItemID")]
    pub price_report_item_id: i32,
    #[serde(rename = "QuoteId")]
    pub quote_id: Decimal,
    #[serde(rename = "PriceTypeId")]
    pub price_type_id: i32,
    #[serde(rename = "TimestampId")]
    pub timestamp_id: i32,
    #[serde(rename = "ForwardPeriod")]
    pub forward_period: i32,
    #[serde(rename = "ForwardYear")]
    pub forward_year: i32,
    #[serde(rename = "CurrencyUnit")]
    pub currency_unit: i32,
    #[serde(rename = "MeasureUnit")]
    pub measure_unit: i32,
}

impl PriceReportItem {

    /// Returns the item of [quote_id] with every discriminator set to [WILDCARD].
    pub fn wildcard ( price_report_item_id: i32, quote_id: Decimal ) -> Self {
        PriceReportItem {
            price_report_item_id,
            quote_id,
            price_type_id: WILDCARD,
            timestamp_id: WILDCARD,
            forward_period: WILDCARD,
            forward_year: WILDCARD,
            currency_unit: WILDCARD,
            measure_unit: WILDCARD,
        }
    }
}

#[derive(Serialize, PartialEq, Clone, Debug, Default)]
pub struct ItemList {
    #[serde(rename = "PriceReportItem")]
    pub items: Vec<PriceReportItem>,
}

/// Body of the `GetCustomReport` request
#[derive(Serialize, PartialEq, Clone, Debug)]
#[serde(rename = "parameters")]
pub struct PriceReportParams {
    #[serde(rename = "StartDate", serialize_with = "serialize_xml_date_time")]
    pub start_date: NaiveDateTime,
    #[serde(rename = "EndDate", serialize_with = "serialize_xml_date_time")]
    pub end_date: NaiveDateTime,
    #[serde(rename = "Periodicity")]
    pub periodicity: Periodicity,
    #[serde(rename = "ItemList")]
    pub item_list: ItemList,
}

fn serialize_xml_date_time<S> ( date_time: &NaiveDateTime, serializer: S ) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str ( &date_time.format ( XML_DATE_TIME_FORMAT ).to_string ( ) )
}

/// Descriptions of current codes and timestamps, by id
#[derive(PartialEq, Clone, Debug, Default)]
pub struct ReferenceLookups {
    pub current_codes: HashMap<Decimal, String>,
    pub timestamps: HashMap<Decimal, String>,
}

impl ReferenceLookups {
    pub fn from_snapshot ( snapshot: &Snapshot ) -> Result<Self, Error> {
        Ok ( ReferenceLookups {
            current_codes: current_codes ( snapshot )?,
            timestamps: timestamps ( snapshot )?,
        } )
    }

    pub fn is_current_code ( &self, code_id: Decimal ) -> bool {
        self.current_codes.contains_key ( &code_id.normalize ( ) )
    }

    pub fn code_description ( &self, code_id: Decimal ) -> Result<&str, Error> {
        self.current_codes.get ( &code_id.normalize ( ) )
            .map ( |s| s.as_str ( ) )
            .context ( MissingLookupSnafu { lookup: "code", id: code_id } )
    }

    pub fn timestamp_description ( &self, timestamp_id: Decimal ) -> Result<&str, Error> {
        self.timestamps.get ( &timestamp_id.normalize ( ) )
            .map ( |s| s.as_str ( ) )
            .context ( MissingLookupSnafu { lookup: "timestamp", id: timestamp_id } )
    }
}

/// Returns descriptions of the codes with current data, i.e. `ENDDATE` is empty.
///
/// Two current codes with the same id are an error.
pub fn current_codes ( snapshot: &Snapshot ) -> Result<HashMap<Decimal, String>, Error> {
    let mut codes = HashMap::new ( );

    for record in snapshot.require_table ( CODE_TABLE )?.records ( ) {
        if record.get ( "ENDDATE" )?.is_null ( ) {
            insert_unique ( &mut codes, CODE_TABLE, record.decimal ( "CODE_ID" )?, record.string ( "DESCRIPTION" )? )?;
        }
    }

    Ok ( codes )
}

pub fn timestamps ( snapshot: &Snapshot ) -> Result<HashMap<Decimal, String>, Error> {
    let mut timestamps = HashMap::new ( );

    for record in snapshot.require_table ( TIMESTAMP_TABLE )?.records ( ) {
        insert_unique ( &mut timestamps, TIMESTAMP_TABLE, record.decimal ( "TIME_STAMP_ID" )?, record.string ( "DESCRIPTION" )? )?;
    }

    Ok ( timestamps )
}

fn insert_unique ( map: &mut HashMap<Decimal, String>, table: &str, id: Decimal, description: &str ) -> Result<( ), Error> {
    if map.insert ( id.normalize ( ), description.to_owned ( ) ).is_some ( ) {
        return DuplicateKeySnafu { table, id }.fail ( );
    }
    Ok ( ( ) )
}

/// Returns up to [MAX_REPORT_ITEMS] quote ids whose code has current data, in table order.
pub fn select_quotes ( snapshot: &Snapshot, lookups: &ReferenceLookups ) -> Result<Vec<Decimal>, Error> {
    let mut quote_ids = Vec::with_capacity ( MAX_REPORT_ITEMS );

    for record in snapshot.require_table ( QUOTE_TABLE )?.records ( ) {
        if quote_ids.len ( ) >= MAX_REPORT_ITEMS {
            break;
        }
        if lookups.is_current_code ( record.decimal ( "CODE_ID" )? ) {
            quote_ids.push ( record.decimal ( "QUOTE_ID" )? );
        }
    }

    Ok ( quote_ids )
}

/// Returns the request of the latest daily values of [quote_ids], one wildcard item per quote.
pub fn build_report_params ( quote_ids: &[Decimal] ) -> PriceReportParams {
    PriceReportParams {
        start_date: *LATEST_AVAILABLE,
        end_date: *LATEST_AVAILABLE,
        periodicity: Periodicity::Daily,
        item_list: ItemList {
            items: quote_ids.iter ( )
                .zip ( 0i32.. )
                .map ( |( quote_id, item_id )| PriceReportItem::wildcard ( item_id, *quote_id ) )
                .collect ( ),
        },
    }
}
