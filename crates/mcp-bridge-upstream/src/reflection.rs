//! Descriptor discovery over gRPC server reflection.
//!
//! The walk runs over a single multiplexed bidirectional
//! `ServerReflectionInfo` stream, with sends and receives strictly
//! alternated: list the advertised services, fetch the file containing each
//! non-built-in service symbol, then breadth-first fetch any still-missing
//! dependencies by filename. Individual dependency misses are logged and
//! skipped — servers routinely omit the well-known types. The whole walk is
//! bounded by [`REFLECTION_DEADLINE`] independent of the caller's context,
//! and aborts earlier on caller cancellation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use hyper_util::rt::TokioIo;
use mcp_bridge_core::descriptor::{FileDescriptorProto, FileDescriptorSet};
use mcp_bridge_pool::{normalize_address, SafeDialer};
use prost::Message as _;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Endpoint;
use tonic::Streaming;
use tonic_reflection::pb::v1::server_reflection_client::ServerReflectionClient;
use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1::{ServerReflectionRequest, ServerReflectionResponse};
use tower::service_fn;

use crate::error::{Error, Result};

/// Hard bound on one reflection walk.
pub const REFLECTION_DEADLINE: Duration = Duration::from_secs(10);

/// Services every gRPC server may advertise that are not upstream surface.
const BUILTIN_SERVICES: &[&str] = &["grpc.reflection.v1.ServerReflection", "grpc.health.v1.Health"];

fn unavailable(address: &str, message: impl ToString) -> Error {
    Error::ReflectionUnavailable {
        address: address.to_string(),
        message: message.to_string(),
    }
}

/// Discover a closed descriptor set from a reflecting server.
///
/// # Errors
///
/// - [`Error::ReflectionUnavailable`] when the stream cannot be opened,
///   breaks mid-walk, or the deadline elapses;
/// - [`Error::NoServices`] when nothing remains after filtering built-ins;
/// - [`Error::MissingDescriptor`] / [`Error::Decode`] on empty or
///   malformed descriptor responses;
/// - [`Error::Cancelled`] when the caller's token fires first.
pub async fn discover(
    address: &str,
    dialer: Option<&SafeDialer>,
    cancel: &CancellationToken,
) -> Result<FileDescriptorSet> {
    tokio::select! {
        () = cancel.cancelled() => Err(Error::Cancelled),
        bounded = tokio::time::timeout(REFLECTION_DEADLINE, walk(address, dialer)) => {
            bounded.map_err(|_| unavailable(address, "deadline exceeded"))?
        }
    }
}

async fn walk(address: &str, dialer: Option<&SafeDialer>) -> Result<FileDescriptorSet> {
    let endpoint = normalize_address(address);
    let builder = Endpoint::from_shared(format!("http://{endpoint}"))
        .map_err(|err| unavailable(address, err))?;
    let channel = match dialer {
        Some(dialer) => {
            let dial = Arc::clone(dialer);
            builder.connect_with_connector_lazy(service_fn(move |uri| {
                let dial = Arc::clone(&dial);
                async move { dial(uri).await.map(TokioIo::new) }
            }))
        }
        None => builder.connect_lazy(),
    };

    let mut client = ServerReflectionClient::new(channel);
    let (tx, rx) = tokio::sync::mpsc::channel::<ServerReflectionRequest>(16);
    let mut inbound = client
        .server_reflection_info(ReceiverStream::new(rx))
        .await
        .map_err(|status| unavailable(address, status.message()))?
        .into_inner();

    // Step 1: list advertised services, dropping the built-ins.
    let listing = roundtrip(
        address,
        &tx,
        &mut inbound,
        MessageRequest::ListServices(String::new()),
    )
    .await?;
    let MessageResponse::ListServicesResponse(listing) = listing else {
        return Err(unavailable(address, "unexpected response to service listing"));
    };
    let services: Vec<String> = listing
        .service
        .into_iter()
        .map(|s| s.name)
        .filter(|name| !BUILTIN_SERVICES.contains(&name.as_str()))
        .collect();
    if services.is_empty() {
        return Err(Error::NoServices {
            address: address.to_string(),
        });
    }

    let mut files: Vec<FileDescriptorProto> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    // Step 2: fetch the file containing each remaining service symbol.
    for symbol in services {
        let response = roundtrip(
            address,
            &tx,
            &mut inbound,
            MessageRequest::FileContainingSymbol(symbol.clone()),
        )
        .await?;
        let MessageResponse::FileDescriptorResponse(descriptor) = response else {
            return Err(Error::MissingDescriptor { symbol });
        };
        if descriptor.file_descriptor_proto.is_empty() {
            return Err(Error::MissingDescriptor { symbol });
        }
        for bytes in &descriptor.file_descriptor_proto {
            let file = FileDescriptorProto::decode(bytes.as_slice())?;
            collect(&mut files, &mut seen, file);
        }
    }

    // Step 3: chase dependencies breadth-first; individual misses are
    // skipped (well-known types may be absent).
    let mut cursor = 0;
    while cursor < files.len() {
        let dependencies = files[cursor].dependency.clone();
        cursor += 1;

        for dependency in dependencies {
            if !seen.insert(dependency.clone()) {
                continue;
            }
            let response = roundtrip(
                address,
                &tx,
                &mut inbound,
                MessageRequest::FileByFilename(dependency.clone()),
            )
            .await?;
            match response {
                MessageResponse::FileDescriptorResponse(descriptor)
                    if !descriptor.file_descriptor_proto.is_empty() =>
                {
                    for bytes in &descriptor.file_descriptor_proto {
                        match FileDescriptorProto::decode(bytes.as_slice()) {
                            Ok(file) => collect(&mut files, &mut seen, file),
                            Err(err) => {
                                tracing::debug!(dependency = %dependency, error = %err, "skipping undecodable dependency");
                            }
                        }
                    }
                }
                _ => {
                    tracing::debug!(dependency = %dependency, "skipping unavailable dependency");
                }
            }
        }
    }

    // Step 4: close the send side and assemble the set.
    drop(tx);
    Ok(FileDescriptorSet { file: files })
}

fn collect(files: &mut Vec<FileDescriptorProto>, seen: &mut HashSet<String>, file: FileDescriptorProto) {
    let name = file.name.clone().unwrap_or_default();
    if seen.insert(name) {
        files.push(file);
    } else if files.iter().all(|f| f.name != file.name) {
        // Name was marked seen by a dependency request that answered with a
        // different file first; keep the actual descriptor.
        files.push(file);
    }
}

async fn roundtrip(
    address: &str,
    tx: &tokio::sync::mpsc::Sender<ServerReflectionRequest>,
    inbound: &mut Streaming<ServerReflectionResponse>,
    request: MessageRequest,
) -> Result<MessageResponse> {
    tx.send(ServerReflectionRequest {
        host: String::new(),
        message_request: Some(request),
    })
    .await
    .map_err(|_| unavailable(address, "reflection stream closed"))?;

    let response = inbound
        .message()
        .await
        .map_err(|status| unavailable(address, status.message()))?
        .ok_or_else(|| unavailable(address, "reflection stream ended"))?;

    response
        .message_response
        .ok_or_else(|| unavailable(address, "empty reflection response"))
}
