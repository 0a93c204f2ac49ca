/// # Argus Online Console Client
///
/// Console walk-through of the Argus Online market-data web service.
///
/// 1. Authenticate with user name and password.
/// 2. Load the meta tables `V_CODE`, `V_QUOTE` and `V_TIMESTAMP`.
/// 3. Build a custom price report for a few quotes with current data.
/// 4. Print what the web service returned.
///
/// ## Web service
///
/// | Operation | Result |
/// | ---- | ---- |
/// | Authenticate | LoginResult, AuthToken |
/// | GetTables | schema + data XML pair |
/// | GetCustomReport | schema + data XML pair |
///

#[cfg(test)]
mod reqwest_mock;
#[cfg(test)]
mod testing;

use std::io::{
    BufRead,
    Write,
};

use log::{
    debug,
    info,
};

use rust_decimal::Decimal;

use snafu::Snafu;

pub mod snapshot;
pub mod dataset;
pub mod report;
pub mod console;
pub mod service;
pub mod soap;

use crate::{
    snapshot::ScalarValue,
    service::ArgusService,
    report::ReferenceLookups,
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to reach {}: {}", endpoint, info))]
    Transport{endpoint: Box<str>, info: String},

    #[snafu(display("Unexpected HTTP status {} from {}", status, endpoint))]
    HttpStatus{endpoint: Box<str>, status: u16},

    #[snafu(display("SOAP fault {}: {}", code, message))]
    SoapFault{code: String, message: String},

    #[snafu(display("Malformed XML in {}: {}", part, info))]
    MalformedXml{part: &'static str, info: String},

    #[snafu(display("Data does not match the schema of table {}: {}", table, info))]
    SchemaMismatch{table: Box<str>, info: String},

    #[snafu(display("Table not found: {}", table))]
    MissingTable{table: Box<str>},

    #[snafu(display("Column not found: {}.{}", table, column))]
    MissingColumn{table: Box<str>, column: Box<str>},

    #[snafu(display("Expected {} in {}.{}, got {:?}", expected, table, column, value))]
    UnexpectedValue{table: Box<str>, column: Box<str>, expected: &'static str, value: ScalarValue},

    #[snafu(display("Duplicate id {} in table {}", id, table))]
    DuplicateKey{table: Box<str>, id: Decimal},

    #[snafu(display("No {} description for id {}", lookup, id))]
    MissingLookup{lookup: &'static str, id: Decimal},

    #[snafu(display("Console I/O failed: {}", source))]
    Console{source: std::io::Error},
}

/// How a console run ended without an error
#[derive(PartialEq, Clone, Debug)]
pub enum RunOutcome {
    /// User name or password was empty, nothing was sent
    EmptyCredentials,
    /// The web service refused the credentials
    AuthenticationRejected{login_result: i32},
    Completed,
}

/// Runs the whole console session against [service].
///
/// Prompts and results go to [output], credentials are read from [input].
/// Every call to the web service is awaited before the next one starts.
///
/// # Arguments
///
/// * `service` - Argus Online operations, see [ArgusService]
/// * `input` - Source of the user name and password lines
/// * `output` - Console output
pub async fn run <S, R, W> ( service: &S, input: &mut R, output: &mut W ) -> Result<RunOutcome, Error>
where
    S: ArgusService + ?Sized,
    R: BufRead,
    W: Write,
{
    //
    // Authentication
    //

    let credentials = match console::read_credentials ( input, output )? {
        Some ( credentials ) => credentials,
        None => {
            console::write_line ( output, "Entered an empty user name or password, please try again" )?;
            return Ok ( RunOutcome::EmptyCredentials );
        }
    };

    console::write_line ( output, "Authenticating ..." )?;

    let authentication = service.authenticate ( &credentials.username, &credentials.password )
        .await?;

    console::write_line ( output, &format ! (
        "LoginResult = {}, AuthToken = {}",
        authentication.login_result,
        authentication.auth_token,
    ) )?;
    console::write_line ( output, "" )?;

    if ! authentication.is_success ( ) {
        console::write_line ( output, "Invalid user name or password, please try again" )?;
        return Ok ( RunOutcome::AuthenticationRejected {
            login_result: authentication.login_result,
        } );
    }

    let token = authentication.auth_token;

    //
    // Meta tables
    //

    console::write_line ( output, "Loading tables ..." )?;

    let tables_xml = service.get_tables ( &token, &report::REFERENCE_TABLES )
        .await?;
    let tables = dataset::decode ( &tables_xml )?;
    info ! ( "Loaded {} reference tables", tables.len ( ) );

    console::write_snapshot_sample ( output, &tables )?;

    //
    // Custom price report
    //

    let lookups = ReferenceLookups::from_snapshot ( &tables )?;
    let quote_ids = report::select_quotes ( &tables, &lookups )?;
    debug ! ( "Selected quotes: {:?}", quote_ids );

    let parameters = report::build_report_params ( &quote_ids );

    console::write_line ( output, "Loading customPriceReport ..." )?;

    let report_xml = service.get_custom_report ( &token, &parameters )
        .await?;
    let price_report = dataset::decode ( &report_xml )?;

    console::write_snapshot_sample ( output, &price_report )?;
    console::write_report_detail ( output, &price_report, &lookups )?;

    output.flush ( )
        .map_err ( |source| Error::Console { source } )?;

    Ok ( RunOutcome::Completed )
}
