/// # Argus Online operations
///
/// The three remote operations the console needs. [crate::soap::SoapClient]
/// talks to the real web service; tests plug in their own implementation.

use std::fmt;

use async_trait::async_trait;

use crate::{
    Error,
    report::PriceReportParams,
};

/// Authentication token, forwarded as is to every call after `Authenticate`
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct AuthToken ( Box<str> );

impl AuthToken {
    pub fn new ( token: &str ) -> Self {
        AuthToken ( token.to_owned ( ).into_boxed_str ( ) )
    }

    pub fn as_str ( &self ) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthToken {
    fn fmt ( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str ( &self.0 )
    }
}

#[derive(PartialEq, Clone, Debug)]
pub struct AuthenticationResult {
    /// 0 on success
    pub login_result: i32,
    pub auth_token: AuthToken,
}

impl AuthenticationResult {
    pub fn is_success ( &self ) -> bool {
        self.login_result == 0
    }
}

/// Schema and data fragments of a table result, in this order
#[derive(PartialEq, Clone, Debug, Default)]
pub struct XmlPayload {
    pub schema: String,
    pub data: String,
}

#[async_trait(?Send)]
pub trait ArgusService {
    async fn authenticate ( &self, username: &str, password: &str ) -> Result<AuthenticationResult, Error>;

    /// Returns the schema and rows of [table_names]
    async fn get_tables ( &self, token: &AuthToken, table_names: &[&str] ) -> Result<XmlPayload, Error>;

    /// Returns the schema and rows of the custom price report
    async fn get_custom_report ( &self, token: &AuthToken, parameters: &PriceReportParams ) -> Result<XmlPayload, Error>;
}
