//#[cfg(test)]
use std::io::Error;
use std::collections::HashMap;
use log::debug;
use std::thread_local;
use std::cell::RefCell;

thread_local ! {
    /// SOAPAction-to-XML-result map for internet mock
    pub static XML_MAP : RefCell<HashMap<Box<str>, String>> = RefCell::new ( HashMap::<Box<str>, String>::new ( ) );

    /// SOAPAction-to-raw-response map, checked before [XML_MAP]
    pub static RAW_MAP : RefCell<HashMap<Box<str>, MockResponse>> = RefCell::new ( HashMap::<Box<str>, MockResponse>::new ( ) );

    /// Requests sent through the mock, oldest first
    pub static SENT : RefCell<Vec<SentRequest>> = RefCell::new ( Vec::new ( ) );
}

#[derive(Clone, Debug)]
pub struct SentRequest {
    pub url: String,
    pub action: String,
    pub body: String,
}

/// Response with its own status and encoding
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub content_encoding: Option<Box<str>>,
    pub body: Vec<u8>,
}

/// Returns the requests sent so far and forgets them
pub fn take_sent ( ) -> Vec<SentRequest> {
    SENT.with ( |sent| sent.borrow_mut ( ).drain ( .. ).collect ( ) )
}

pub struct Client {
}

impl Default for Client {
    fn default ( ) -> Self {
        Client {
        }
    }
}

impl Client {
    pub fn new ( ) -> Self {
        debug ! ( "reqwest_mock::Client::new()" );
        Client::default ( )
    }

    pub fn post ( self, url: &str ) -> RequestBuilder {
        debug ! ( "reqwest_mock::Client.post({})", url );
        RequestBuilder {
            url: url.to_string(),
            action: String::new ( ),
            body: String::new ( ),
        }
    }
}

pub struct RequestBuilder {
    url: String,
    action: String,
    body: String,
}

impl RequestBuilder {
    pub fn header ( mut self, key: &str, value: &str ) -> Self {
        debug ! ( "reqwest_mock::RequestBuilder.header({})", key );
        if key.eq_ignore_ascii_case ( "SOAPAction" ) {
            self.action = value.trim_matches ( '"' ).to_string ( );
        }
        self
    }

    pub fn body ( mut self, body: String ) -> Self {
        self.body = body;
        self
    }

    pub async fn send ( self ) -> Result<Response, std::io::Error> {
        debug ! ( "reqwest_mock::RequestBuilder.send(): {}", self.action );
        SENT.with ( |sent| sent.borrow_mut ( ).push ( SentRequest {
            url: self.url.clone ( ),
            action: self.action.clone ( ),
            body: self.body.clone ( ),
        } ) );
        let raw = RAW_MAP.with ( |raw_map| raw_map.borrow ( ).get ( self.action.as_str ( ) ).cloned ( ) );
        if let Some ( raw ) = raw {
            debug ! ( "reqwest_mock::RequestBuilder.send(): Found raw action: {} status {}", self.action, raw.status );
            return Ok ( Response {
                status: raw.status,
                content_encoding: raw.content_encoding,
                body: raw.body,
            } );
        }
        XML_MAP.with ( |static_xml_map| {
            let xml_map = static_xml_map.borrow ( );
            if let Some ( result ) = xml_map.get ( self.action.as_str ( ) ) {
                debug ! ( "reqwest_mock::RequestBuilder.send(): Found action: {}\nreqwest_mock::RequestBuilder.send(): Matching return: {}[..]", self.action, if result.len() > 32 { &result[..32] } else { result });
                Ok ( Response::ok ( result ) )
            } else if let Some ( result ) = xml_map.get ( "" ) {
                // default
                debug ! ( "reqwest_mock::RequestBuilder.send(): Not found action: {}\nreqwest_mock::RequestBuilder.send(): Default return: {}[..]", self.action, if result.len() > 32 { &result[..32] } else { result });
                Ok ( Response::ok ( result ) )
            } else {
                Err ( Error::new ( std::io::ErrorKind::Other, format ! ( "Mock 404: {} {}", self.url, self.action ) ) )
            }
        } )
    }
}

pub struct Response {
    status: u16,
    content_encoding: Option<Box<str>>,
    body: Vec<u8>,
}

impl Response {
    fn ok ( text: &str ) -> Self {
        Response {
            status: 200,
            content_encoding: None,
            body: text.as_bytes ( ).to_vec ( ),
        }
    }

    pub fn status ( &self ) -> u16 {
        self.status
    }

    pub fn content_encoding ( &self ) -> Option<&str> {
        self.content_encoding.as_deref ( )
    }

    pub async fn bytes ( self ) -> Result<Vec<u8>, std::io::Error> {
        debug ! ( "reqwest_mock::Response.bytes(): {} bytes", self.body.len ( ) );
        Ok ( self.body )
    }
}
