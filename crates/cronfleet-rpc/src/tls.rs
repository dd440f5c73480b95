use std::path::Path;

use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};

use crate::{RpcError, TlsFiles};

fn read_pem(path: &Path) -> Result<Vec<u8>, RpcError> {
    std::fs::read(path).map_err(|e| RpcError::Tls(format!("{}: {e}", path.display())))
}

fn load(files: &TlsFiles) -> Result<(Identity, Certificate), RpcError> {
    let cert = read_pem(&files.cert_file)?;
    let key = read_pem(&files.key_file)?;
    let ca = read_pem(&files.ca_file)?;
    Ok((Identity::from_pem(cert, key), Certificate::from_pem(ca)))
}

/// Server side: present our identity and require clients signed by the CA.
pub(crate) fn server_config(files: &TlsFiles) -> Result<ServerTlsConfig, RpcError> {
    let (identity, ca) = load(files)?;
    Ok(ServerTlsConfig::new().identity(identity).client_ca_root(ca))
}

pub(crate) fn client_config(
    files: &TlsFiles,
    domain: Option<&str>,
) -> Result<ClientTlsConfig, RpcError> {
    let (identity, ca) = load(files)?;
    let mut cfg = ClientTlsConfig::new().ca_certificate(ca).identity(identity);
    if let Some(domain) = domain {
        cfg = cfg.domain_name(domain);
    }
    Ok(cfg)
}
