//! Translation of driver errors into [`DbError`].
//!
//! Failures that mean the server could not be reached or the session could not be
//! established become connection errors. Failures the server reported for a specific command
//! keep their numeric code as operation errors. Everything else is an operation error
//! without a code.

use mongodb::error::{CommandError, Error, ErrorKind, WriteConcernError, WriteError, WriteFailure};

use labstore_core::error::DbError;

pub fn translate(error: Error) -> DbError {
    let message = error.to_string();

    match *error.kind {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Authentication { .. }
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::InvalidTlsConfig { .. } => DbError::connection(None, message),
        ErrorKind::Command(CommandError { code, .. }) => DbError::operation(Some(code), message),
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code, .. })) => {
            DbError::operation(Some(code), message)
        }
        ErrorKind::Write(WriteFailure::WriteConcernError(WriteConcernError { code, .. })) => {
            DbError::operation(Some(code), message)
        }
        _ => DbError::operation(None, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labstore_core::error::ConnectionError;
    use mongodb::options::ClientOptions;

    #[test]
    fn io_failures_become_connection_errors() {
        let error = Error::from(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"));

        assert!(matches!(
            translate(error),
            DbError::Connection(ConnectionError::Failed { code: None, .. })
        ));
    }

    #[tokio::test]
    async fn invalid_arguments_become_operation_errors_without_code() {
        let error = ClientOptions::parse("not-a-uri").await.unwrap_err();

        assert!(matches!(translate(error), DbError::Operation { code: None, .. }));
    }
}
