/// # Console input and output

use std::io::{
    BufRead,
    Write,
};

use snafu::ResultExt;

use crate::{
    ConsoleSnafu,
    Error,
    report::{
        ReferenceLookups,
        REPORT_TABLE,
    },
    snapshot::Snapshot,
};

/// Rows printed per table
pub const SAMPLE_ROW_COUNT: usize = 10;

#[derive(PartialEq, Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub fn write_line <W: Write> ( output: &mut W, line: &str ) -> Result<( ), Error> {
    writeln ! ( output, "{}", line ).context ( ConsoleSnafu )
}

/// Prints [prompt] and returns the next line without its line break.
///
/// End of input reads as an empty line.
fn prompt <R: BufRead, W: Write> ( input: &mut R, output: &mut W, prompt: &str ) -> Result<String, Error> {
    write ! ( output, "{}", prompt ).context ( ConsoleSnafu )?;
    output.flush ( ).context ( ConsoleSnafu )?;

    let mut line = String::new ( );
    input.read_line ( &mut line ).context ( ConsoleSnafu )?;

    if line.ends_with ( '\n' ) {
        line.pop ( );
        if line.ends_with ( '\r' ) {
            line.pop ( );
        }
    }

    Ok ( line )
}

/// Returns the user name and password typed in, or None if either one is blank.
pub fn read_credentials <R: BufRead, W: Write> ( input: &mut R, output: &mut W ) -> Result<Option<Credentials>, Error> {
    let username = prompt ( input, output, "User name: " )?;
    let password = prompt ( input, output, "Password: " )?;

    if username.trim ( ).is_empty ( ) || password.trim ( ).is_empty ( ) {
        return Ok ( None );
    }

    Ok ( Some ( Credentials {
        username,
        password,
    } ) )
}

/// Prints table names, row counts, columns and a few rows of every table.
pub fn write_snapshot_sample <W: Write> ( output: &mut W, snapshot: &Snapshot ) -> Result<( ), Error> {
    writeln ! ( output, "Got {} tables", snapshot.len ( ) ).context ( ConsoleSnafu )?;
    writeln ! ( output ).context ( ConsoleSnafu )?;

    for table in snapshot.tables.iter ( ) {
        writeln ! ( output, "Table {}", table.name ).context ( ConsoleSnafu )?;

        writeln ! ( output, "  Row count = {}\n", table.rows.len ( ) ).context ( ConsoleSnafu )?;

        writeln ! ( output, "  Columns:" ).context ( ConsoleSnafu )?;
        for column in table.columns.iter ( ) {
            writeln ! ( output, "  {}\t{}", column.name, column.column_type ).context ( ConsoleSnafu )?;
        }
        writeln ! ( output ).context ( ConsoleSnafu )?;

        writeln ! ( output, "  Data sample:" ).context ( ConsoleSnafu )?;
        for row in table.rows.iter ( ).take ( SAMPLE_ROW_COUNT ) {
            for value in row.iter ( ) {
                write ! ( output, "  {}\t", value ).context ( ConsoleSnafu )?;
            }
            writeln ! ( output ).context ( ConsoleSnafu )?;
        }
        writeln ! ( output ).context ( ConsoleSnafu )?;
    }

    Ok ( ( ) )
}

/// Prints code and timestamp descriptions of the first report row, if there is one.
pub fn write_report_detail <W: Write> ( output: &mut W, report: &Snapshot, lookups: &ReferenceLookups ) -> Result<( ), Error> {
    let first_row = report.require_table ( REPORT_TABLE )?
        .records ( )
        .next ( );

    if let Some ( row ) = first_row {
        write_line ( output, "First line of the report in more detail:" )?;
        writeln ! ( output, "Code description = {}", lookups.code_description ( row.decimal ( "CODE_ID" )? )? )
            .context ( ConsoleSnafu )?;
        writeln ! ( output, "Timestamp description = {}", lookups.timestamp_description ( row.decimal ( "TIMESTAMP_ID" )? )? )
            .context ( ConsoleSnafu )?;
    }

    Ok ( ( ) )
}
