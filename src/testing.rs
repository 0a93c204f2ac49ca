use std::cell::RefCell;
use std::sync::Once;

use async_trait::async_trait;

use crate::{
    Error,
    report::PriceReportParams,
    service::{
        ArgusService,
        AuthToken,
        AuthenticationResult,
        XmlPayload,
    },
};

pub static BEFORE_ALL: Once = Once::new ( );

pub fn setup ( ) {
    if ! BEFORE_ALL.is_completed() {
        BEFORE_ALL.call_once( || {
            let _ = env_logger::try_init ( );
        } );
    }
}

/// Reads a fixture under `tests/`
macro_rules! target_xml {
    ( $path:expr ) => {
        std::fs::read_to_string ( format ! ( "{}/tests/{}", env ! ( "CARGO_MANIFEST_DIR" ), $path ) )
            .expect ( "Failed to open file" )
    };
}

pub(crate) use target_xml;

pub fn reference_payload ( ) -> XmlPayload {
    XmlPayload {
        schema: target_xml ! ( "dataset/reference_schema.xml" ),
        data: target_xml ! ( "dataset/reference_data.xml" ),
    }
}

pub fn report_payload ( ) -> XmlPayload {
    XmlPayload {
        schema: target_xml ! ( "dataset/report_schema.xml" ),
        data: target_xml ! ( "dataset/report_data.xml" ),
    }
}

/// Report whose first row points to [code_id] instead of Brent
pub fn report_payload_with_code ( code_id: &str ) -> XmlPayload {
    let mut payload = report_payload ( );
    payload.data = payload.data.replacen ( "<CODE_ID>5</CODE_ID>", &format ! ( "<CODE_ID>{}</CODE_ID>", code_id ), 1 );
    payload
}

#[derive(PartialEq, Clone, Debug)]
pub enum Call {
    Authenticate { username: String, password: String },
    GetTables { token: AuthToken, table_names: Vec<String> },
    GetCustomReport { token: AuthToken, parameters: PriceReportParams },
}

/// Answers from fixtures and remembers every call
pub struct RecordingService {
    pub login_result: i32,
    pub token: AuthToken,
    pub tables: XmlPayload,
    pub report: XmlPayload,
    calls: RefCell<Vec<Call>>,
}

impl RecordingService {
    pub fn accepting ( token: &str ) -> Self {
        RecordingService {
            login_result: 0,
            token: AuthToken::new ( token ),
            tables: reference_payload ( ),
            report: report_payload ( ),
            calls: RefCell::new ( Vec::new ( ) ),
        }
    }

    pub fn calls ( &self ) -> Vec<Call> {
        self.calls.borrow ( ).clone ( )
    }
}

#[async_trait(?Send)]
impl ArgusService for RecordingService {
    async fn authenticate ( &self, username: &str, password: &str ) -> Result<AuthenticationResult, Error> {
        self.calls.borrow_mut ( ).push ( Call::Authenticate {
            username: username.to_owned ( ),
            password: password.to_owned ( ),
        } );
        Ok ( AuthenticationResult {
            login_result: self.login_result,
            auth_token: self.token.clone ( ),
        } )
    }

    async fn get_tables ( &self, token: &AuthToken, table_names: &[&str] ) -> Result<XmlPayload, Error> {
        self.calls.borrow_mut ( ).push ( Call::GetTables {
            token: token.clone ( ),
            table_names: table_names.iter ( ).map ( |name| name.to_string ( ) ).collect ( ),
        } );
        Ok ( self.tables.clone ( ) )
    }

    async fn get_custom_report ( &self, token: &AuthToken, parameters: &PriceReportParams ) -> Result<XmlPayload, Error> {
        self.calls.borrow_mut ( ).push ( Call::GetCustomReport {
            token: token.clone ( ),
            parameters: parameters.clone ( ),
        } );
        Ok ( self.report.clone ( ) )
    }
}
