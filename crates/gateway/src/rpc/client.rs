use tonic::{
    client::Grpc,
    codec::ProstCodec,
    codegen::http::uri::PathAndQuery,
    transport::{Channel, ClientTlsConfig, Endpoint, Uri},
};
use tracing::debug;

use super::{
    proto::{GitRequest, GitResponse},
    tls::{resolve_endpoint, ResolvedEndpoint, TransportSecurity, UnverifiedTlsConnector},
    GitMethod, GitRpcError,
};
use crate::git_config::GitConfig;

/// Issue one unary call on a fresh connection. Connecting and the call
/// itself share the configured deadline; the connection is dropped on
/// every return path.
pub async fn call(
    config: &GitConfig,
    method: GitMethod,
    request: GitRequest,
) -> Result<GitResponse, GitRpcError> {
    let deadline = config.rpc_timeout;
    match tokio::time::timeout(deadline, call_once(config, method, request)).await {
        Ok(result) => result,
        Err(_) => Err(GitRpcError::Timeout(deadline)),
    }
}

async fn call_once(
    config: &GitConfig,
    method: GitMethod,
    request: GitRequest,
) -> Result<GitResponse, GitRpcError> {
    let endpoint = resolve_endpoint(&config.service_endpoint, config.insecure_skip_verify)?;
    let channel = connect(&endpoint, config).await?;
    debug!(method = method.as_str(), origin = %endpoint.origin, "connected to git service");

    let mut grpc = Grpc::new(channel);
    grpc.ready().await.map_err(|error| GitRpcError::Connect(error.to_string()))?;

    let mut request = tonic::Request::new(request);
    request.set_timeout(config.rpc_timeout);
    let codec: ProstCodec<GitRequest, GitResponse> = ProstCodec::default();

    let response = grpc.unary(request, PathAndQuery::from_static(method.path()), codec).await?;
    Ok(response.into_inner())
}

async fn connect(endpoint: &ResolvedEndpoint, config: &GitConfig) -> Result<Channel, GitRpcError> {
    let connect_error = |error: tonic::transport::Error| GitRpcError::Connect(error.to_string());

    match endpoint.security {
        TransportSecurity::Plaintext => {
            configure(endpoint.origin.clone(), config)?.connect().await.map_err(connect_error)
        }
        TransportSecurity::Verified => {
            let tls = ClientTlsConfig::new().with_webpki_roots();
            configure(endpoint.origin.clone(), config)?
                .tls_config(tls)
                .map_err(|error| GitRpcError::Tls(error.to_string()))?
                .connect()
                .await
                .map_err(connect_error)
        }
        TransportSecurity::Unverified => {
            let origin: Uri = endpoint.origin.parse().map_err(|_| GitRpcError::InvalidEndpoint {
                endpoint: endpoint.origin.clone(),
                reason: "not a valid URI".to_owned(),
            })?;
            let connector = UnverifiedTlsConnector::new(endpoint)?;
            configure(endpoint.dial_uri(), config)?
                .origin(origin)
                .connect_with_connector(connector)
                .await
                .map_err(connect_error)
        }
    }
}

fn configure(uri: String, config: &GitConfig) -> Result<Endpoint, GitRpcError> {
    let endpoint = Endpoint::from_shared(uri).map_err(|error| GitRpcError::InvalidEndpoint {
        endpoint: config.service_endpoint.clone(),
        reason: error.to_string(),
    })?;

    // The call deadline is enforced once, around connect and call, in `call`.
    Ok(endpoint.connect_timeout(config.rpc_timeout))
}
