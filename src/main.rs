use std::io;
use std::process;

use log::error;

use argus_online::{
    run,
    soap::SoapClient,
};

#[tokio::main(flavor = "current_thread")]
async fn main ( ) {
    env_logger::init ( );

    let service = SoapClient::new ( );
    let stdin = io::stdin ( );
    let stdout = io::stdout ( );

    if let Err ( e ) = run ( &service, &mut stdin.lock ( ), &mut stdout.lock ( ) ).await {
        error ! ( "{:?}", e );
        eprintln ! ( "{}", e );
        process::exit ( 1 );
    }
}
