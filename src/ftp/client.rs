use super::{Credential, FtpConnector, FtpEndpoint, FtpSession};
use crate::error::TransferError;
use std::io::{Read, Write};
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::debug;

/// Plain-FTP connector backed by `suppaftp`
#[derive(Debug, Default, Clone, Copy)]
pub struct SuppaFtpConnector;

impl FtpConnector for SuppaFtpConnector {
    fn connect(
        &self,
        endpoint: &FtpEndpoint,
        credential: &Credential,
    ) -> Result<Box<dyn FtpSession>, TransferError> {
        debug!(endpoint = %endpoint, user = %credential.username, "Connecting");

        let mut stream = FtpStream::connect(endpoint.address())?;
        stream
            .login(&credential.username, &credential.password)
            .map_err(|e| TransferError::Connection(format!("Login to {} failed: {}", endpoint, e)))?;
        stream.transfer_type(FileType::Binary)?;

        Ok(Box::new(SuppaFtpSession { stream }))
    }
}

struct SuppaFtpSession {
    stream: FtpStream,
}

impl FtpSession for SuppaFtpSession {
    fn start_upload(&mut self, remote_path: &str) -> Result<Box<dyn Write + Send>, TransferError> {
        let data = self.stream.put_with_stream(remote_path)?;
        Ok(Box::new(data))
    }

    fn finish_upload(&mut self, stream: Box<dyn Write + Send>) -> Result<(), TransferError> {
        self.stream.finalize_put_stream(stream)?;
        Ok(())
    }

    fn start_download(&mut self, remote_path: &str) -> Result<Box<dyn Read + Send>, TransferError> {
        let data = self.stream.retr_as_stream(remote_path)?;
        Ok(Box::new(data))
    }

    fn finish_download(&mut self, stream: Box<dyn Read + Send>) -> Result<(), TransferError> {
        self.stream.finalize_retr_stream(stream)?;
        Ok(())
    }

    fn quit(&mut self) -> Result<(), TransferError> {
        self.stream.quit()?;
        Ok(())
    }
}
