/// # SOAP client of ArgusOnline.asmx
///
/// SOAP 1.1 over HTTPS. Requests are plain envelopes, responses are read
/// with quick-xml and the table results are handed over as the raw
/// schema and data fragments.

use std::collections::HashMap;

use async_trait::async_trait;

use log::{
    debug,
    info,
};

use quick_xml::{
    escape::escape,
    events::Event,
    Reader,
};

use crate::{
    Error,
    HttpStatusSnafu,
    MalformedXmlSnafu,
    SoapFaultSnafu,
    TransportSnafu,
    report::PriceReportParams,
    service::{
        ArgusService,
        AuthToken,
        AuthenticationResult,
        XmlPayload,
    },
};

macro_rules! SERVICE_URL {
    () => {
        if cfg!(not(feature = "stub-server")) {
            "https://www.argusmedia.com/ArgusWSVSTO/ArgusOnline.asmx"
        } else {
            "http://localhost:54040/mock/argus"
        }
    };
}

/// Target namespace of the web service operations
pub const SERVICE_NAMESPACE: &str = "http://tempuri.org/";

/// Wraps [body] into a SOAP 1.1 envelope
pub fn envelope ( body: &str ) -> String {
    format ! (
        r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>{}</soap:Body></soap:Envelope>"#,
        body,
    )
}

const AUTHENTICATE: &str = "Authenticate";
const GET_TABLES: &str = "GetTables";
const GET_CUSTOM_REPORT: &str = "GetCustomReport";

pub struct SoapClient {
    endpoint: Box<str>,
    namespace: Box<str>,
}

impl Default for SoapClient {
    fn default ( ) -> Self {
        SoapClient::with_endpoint ( SERVICE_URL!(), SERVICE_NAMESPACE )
    }
}

impl SoapClient {
    pub fn new ( ) -> Self {
        SoapClient::default ( )
    }

    pub fn with_endpoint ( endpoint: &str, namespace: &str ) -> Self {
        SoapClient {
            endpoint: endpoint.to_owned ( ).into_boxed_str ( ),
            namespace: namespace.to_owned ( ).into_boxed_str ( ),
        }
    }

    fn soap_action ( &self, operation: &str ) -> String {
        format ! ( "{}{}", self.namespace, operation )
    }

    /// Posts [body] of [operation] and returns the response envelope.
    async fn call ( &self, operation: &str, body: String ) -> Result<String, Error> {
        let action = self.soap_action ( operation );
        info ! ( "Calling {} at {}", operation, self.endpoint );

        let response = client_post ( &self.endpoint, &action, envelope ( &body ) )
            .await?;
        debug ! ( "{} response: {} bytes", operation, response.len ( ) );

        if let Some ( ( code, message ) ) = parse_fault ( &response )? {
            return SoapFaultSnafu { code, message }.fail ( );
        }

        Ok ( response )
    }
}

#[async_trait(?Send)]
impl ArgusService for SoapClient {
    async fn authenticate ( &self, username: &str, password: &str ) -> Result<AuthenticationResult, Error> {
        let response = self.call ( AUTHENTICATE, authenticate_body ( &self.namespace, username, password ) )
            .await?;
        parse_authenticate_response ( &response )
    }

    async fn get_tables ( &self, token: &AuthToken, table_names: &[&str] ) -> Result<XmlPayload, Error> {
        let response = self.call ( GET_TABLES, get_tables_body ( &self.namespace, token, table_names ) )
            .await?;
        parse_payload_response ( &response, GET_TABLES )
    }

    async fn get_custom_report ( &self, token: &AuthToken, parameters: &PriceReportParams ) -> Result<XmlPayload, Error> {
        let response = self.call ( GET_CUSTOM_REPORT, get_custom_report_body ( &self.namespace, token, parameters )? )
            .await?;
        parse_payload_response ( &response, GET_CUSTOM_REPORT )
    }
}

pub fn authenticate_body ( namespace: &str, username: &str, password: &str ) -> String {
    format ! (
        r#"<{op} xmlns="{ns}"><username>{username}</username><password>{password}</password></{op}>"#,
        op = AUTHENTICATE,
        ns = escape ( namespace ),
        username = escape ( username ),
        password = escape ( password ),
    )
}

pub fn get_tables_body ( namespace: &str, token: &AuthToken, table_names: &[&str] ) -> String {
    let names: String = table_names.iter ( )
        .map ( |name| format ! ( "<string>{}</string>", escape ( *name ) ) )
        .collect ( );

    format ! (
        r#"<{op} xmlns="{ns}"><authToken>{token}</authToken><tableNames>{names}</tableNames></{op}>"#,
        op = GET_TABLES,
        ns = escape ( namespace ),
        token = escape ( token.as_str ( ) ),
        names = names,
    )
}

pub fn get_custom_report_body ( namespace: &str, token: &AuthToken, parameters: &PriceReportParams ) -> Result<String, Error> {
    let parameters = quick_xml::se::to_string ( parameters )
        .map_err ( |e| MalformedXmlSnafu { part: "report request", info: e.to_string ( ) }.build ( ) )?;

    Ok ( format ! (
        r#"<{op} xmlns="{ns}"><authToken>{token}</authToken>{parameters}</{op}>"#,
        op = GET_CUSTOM_REPORT,
        ns = escape ( namespace ),
        token = escape ( token.as_str ( ) ),
        parameters = parameters,
    ) )
}

/// Returns the text of the first element of each local name in [names].
///
/// Names that never show up are missing from the map; empty elements map to "".
fn first_texts ( xml: &str, part: &'static str, names: &[&'static str] ) -> Result<HashMap<&'static str, String>, Error> {
    let mut reader = Reader::from_str ( xml );
    reader.config_mut ( ).trim_text ( true );

    let mut texts = HashMap::<&'static str, String>::new ( );
    // capturing name of each open element
    let mut open = Vec::<Option<&'static str>>::new ( );

    loop {
        match reader.read_event ( ) {
            Ok ( Event::Start ( e ) ) => {
                let name = names.iter ( )
                    .find ( |name| e.local_name ( ).as_ref ( ) == name.as_bytes ( ) )
                    .filter ( |name| ! texts.contains_key ( *name ) )
                    .copied ( );
                if let Some ( name ) = name {
                    texts.insert ( name, String::new ( ) );
                }
                open.push ( name );
            },
            Ok ( Event::Empty ( e ) ) => {
                if let Some ( name ) = names.iter ( ).find ( |name| e.local_name ( ).as_ref ( ) == name.as_bytes ( ) ) {
                    texts.entry ( *name ).or_insert_with ( String::new );
                }
            },
            Ok ( Event::Text ( e ) ) => {
                if let Some ( Some ( name ) ) = open.last ( ) {
                    let text = e.unescape ( )
                        .map_err ( |err| MalformedXmlSnafu { part, info: err.to_string ( ) }.build ( ) )?;
                    if let Some ( captured ) = texts.get_mut ( name ) {
                        captured.push_str ( &text );
                    }
                }
            },
            Ok ( Event::End ( _ ) ) => {
                open.pop ( );
            },
            Ok ( Event::Eof ) => break,
            Err ( e ) => return MalformedXmlSnafu { part, info: e.to_string ( ) }.fail ( ),
            _ => ( ),
        }
    }

    Ok ( texts )
}

/// Returns the fault code and message if [xml] is a SOAP fault.
///
/// Only a `Fault` directly inside `Body` counts; the first element in `Body`
/// decides.
pub fn parse_fault ( xml: &str ) -> Result<Option<( String, String )>, Error> {
    const PART: &str = "response";
    let mut reader = Reader::from_str ( xml );
    reader.config_mut ( ).trim_text ( true );

    // local names of the open elements
    let mut open = Vec::<Vec<u8>>::new ( );
    let mut fault_depth: Option<usize> = None;
    let mut code = String::new ( );
    let mut message = String::new ( );

    loop {
        match reader.read_event ( ) {
            Ok ( Event::Start ( e ) ) => {
                let name = e.local_name ( ).as_ref ( ).to_vec ( );
                if fault_depth.is_none ( ) && is_body ( open.last ( ) ) {
                    if name != b"Fault" {
                        return Ok ( None );
                    }
                    fault_depth = Some ( open.len ( ) );
                }
                open.push ( name );
            },
            Ok ( Event::Empty ( e ) ) => {
                if fault_depth.is_none ( ) && is_body ( open.last ( ) ) {
                    return Ok ( if e.local_name ( ).as_ref ( ) == b"Fault" {
                        Some ( ( code, message ) )
                    } else {
                        None
                    } );
                }
            },
            Ok ( Event::Text ( e ) ) => {
                if let Some ( depth ) = fault_depth {
                    // faultcode and faultstring are children of Fault
                    if open.len ( ) == depth + 2 {
                        let target = match open.last ( ).map ( |n| n.as_slice ( ) ) {
                            Some ( b"faultcode" ) => Some ( &mut code ),
                            Some ( b"faultstring" ) => Some ( &mut message ),
                            _ => None,
                        };
                        if let Some ( target ) = target {
                            let text = e.unescape ( )
                                .map_err ( |err| MalformedXmlSnafu { part: PART, info: err.to_string ( ) }.build ( ) )?;
                            target.push_str ( &text );
                        }
                    }
                }
            },
            Ok ( Event::End ( _ ) ) => {
                open.pop ( );
                if fault_depth == Some ( open.len ( ) ) {
                    return Ok ( Some ( ( code, message ) ) );
                }
            },
            Ok ( Event::Eof ) => break,
            Err ( e ) => return MalformedXmlSnafu { part: PART, info: e.to_string ( ) }.fail ( ),
            _ => ( ),
        }
    }

    Ok ( None )
}

fn is_body ( name: Option<&Vec<u8>> ) -> bool {
    name.map ( |n| n.as_slice ( ) == b"Body" ).unwrap_or ( false )
}

pub fn parse_authenticate_response ( xml: &str ) -> Result<AuthenticationResult, Error> {
    const PART: &str = "authenticate response";
    let texts = first_texts ( xml, PART, &[ "LoginResult", "AuthenticateResult", "AuthToken" ] )?;

    let login_result = match texts.get ( "LoginResult" ).or ( texts.get ( "AuthenticateResult" ) ) {
        Some ( code ) => code.trim ( ).parse::<i32> ( )
            .map_err ( |e| MalformedXmlSnafu { part: PART, info: format ! ( "LoginResult {:?}: {}", code, e ) }.build ( ) )?,
        None => return MalformedXmlSnafu { part: PART, info: "no LoginResult" }.fail ( ),
    };

    Ok ( AuthenticationResult {
        login_result,
        auth_token: AuthToken::new ( texts.get ( "AuthToken" ).map ( |s| s.as_str ( ) ).unwrap_or_default ( ) ),
    } )
}

/// Returns the first two child elements of `{operation}Result`, verbatim.
pub fn parse_payload_response ( xml: &str, operation: &str ) -> Result<XmlPayload, Error> {
    const PART: &str = "table response";
    let result_element = format ! ( "{}Result", operation );

    let mut reader = Reader::from_str ( xml );
    reader.config_mut ( ).trim_text ( false );

    let mut depth = 0usize;
    let mut result_depth: Option<usize> = None;
    let mut fragment_start = 0usize;
    let mut fragments = Vec::<String>::with_capacity ( 2 );

    loop {
        let position = reader.buffer_position ( ) as usize;
        match reader.read_event ( ) {
            Ok ( Event::Start ( e ) ) => {
                match result_depth {
                    None if e.local_name ( ).as_ref ( ) == result_element.as_bytes ( ) => result_depth = Some ( depth ),
                    Some ( d ) if depth == d + 1 => fragment_start = position,
                    _ => ( ),
                }
                depth += 1;
            },
            Ok ( Event::Empty ( e ) ) => {
                match result_depth {
                    None if e.local_name ( ).as_ref ( ) == result_element.as_bytes ( ) => break,
                    Some ( d ) if depth == d + 1 => fragments.push ( xml [ position..reader.buffer_position ( ) as usize ].to_owned ( ) ),
                    _ => ( ),
                }
            },
            Ok ( Event::End ( _ ) ) => {
                depth = depth.saturating_sub ( 1 );
                match result_depth {
                    Some ( d ) if depth == d + 1 => fragments.push ( xml [ fragment_start..reader.buffer_position ( ) as usize ].to_owned ( ) ),
                    Some ( d ) if depth == d => break,
                    _ => ( ),
                }
            },
            Ok ( Event::Eof ) => break,
            Err ( e ) => return MalformedXmlSnafu { part: PART, info: e.to_string ( ) }.fail ( ),
            _ => ( ),
        }
    }

    if fragments.len ( ) < 2 {
        return MalformedXmlSnafu {
            part: PART,
            info: format ! ( "expected schema and data in {}, found {} element(s)", result_element, fragments.len ( ) ),
        }.fail ( );
    }

    let mut fragments = fragments.into_iter ( );
    Ok ( XmlPayload {
        schema: fragments.next ( ).unwrap_or_default ( ),
        data: fragments.next ( ).unwrap_or_default ( ),
    } )
}

/// Returns the text of a response body.
///
/// A `br` body is decompressed first. Faults come back as 500 with a readable
/// envelope, so a non-2xx status is only an error when the body is not a fault.
pub fn decode_response ( url: &str, status: u16, content_encoding: Option<&str>, bytes: &[u8] ) -> Result<String, Error> {
    use brotli::Decompressor;
    use std::io::Read;

    let transport_error = |info: String| TransportSnafu { endpoint: url, info }.build ( );

    let bytes = if content_encoding.map ( |e| e.trim ( ).eq_ignore_ascii_case ( "br" ) ).unwrap_or ( false ) {
        let mut decompressor = Decompressor::new ( bytes, 4096 );
        let mut dec = Vec::new ( );
        decompressor.read_to_end ( &mut dec )
            .map_err ( |e| transport_error ( format ! ( "Failed to decompress the response: {}", e ) ) )?;
        dec
    } else {
        bytes.to_vec ( )
    };

    let text = String::from_utf8 ( bytes )
        .map_err ( |e| transport_error ( format ! ( "Response is not UTF-8: {}", e ) ) )?;

    let is_success = ( 200..300 ).contains ( &status );
    if ! is_success && ! matches ! ( parse_fault ( &text ), Ok ( Some ( _ ) ) ) {
        return HttpStatusSnafu { endpoint: url, status }.fail ( );
    }

    Ok ( text )
}

#[cfg(not(test))]
async fn client_post ( url: &str, action: &str, envelope: String ) -> Result<String, Error> {
    use reqwest::{
        header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, CONTENT_TYPE},
        redirect,
        Client,
    };

    let transport_error = |info: String| TransportSnafu { endpoint: url, info }.build ( );

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml; charset=utf-8"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("br"));

    let resp = Client::builder()
        .default_headers(headers)
        .use_rustls_tls()
        .redirect(redirect::Policy::limited(10))
        .cookie_store(true)
        .build()
        .map_err(|e| transport_error(e.to_string()))?
        .post(url)
        .header("SOAPAction", format!("\"{}\"", action))
        .body(envelope)
        .send()
        .await
        .map_err(|e| transport_error(e.to_string()))?
        ;
    let status = resp.status();
    debug!("RES.status(): {:?}", status);
    debug!("RES.headers(): {:?}", resp.headers());

    let content_encoding = resp.headers().get("content-encoding")
        .and_then(|h| h.to_str().ok())
        .map(|h| h.to_owned())
        ;

    let bytes = resp.bytes().await
        .map_err(|e| transport_error(e.to_string()))?;

    decode_response(url, status.as_u16(), content_encoding.as_deref(), &bytes)
}

#[cfg(test)]
async fn client_post ( url: &str, action: &str, envelope: String ) -> Result<String, Error> {
    use crate::reqwest_mock::Client;

    let transport_error = |info: String| TransportSnafu { endpoint: url, info }.build ( );

    let resp = Client::new ( )
        .post ( url )
        .header ( "SOAPAction", &format ! ( "\"{}\"", action ) )
        .body ( envelope )
        .send ( )
        .await
        .map_err ( |e| transport_error ( e.to_string ( ) ) )?;
    let status = resp.status ( );
    let content_encoding = resp.content_encoding ( ).map ( |e| e.to_owned ( ) );

    let bytes = resp.bytes ( )
        .await
        .map_err ( |e| transport_error ( e.to_string ( ) ) )?;

    decode_response ( url, status, content_encoding.as_deref ( ), &bytes )
}
