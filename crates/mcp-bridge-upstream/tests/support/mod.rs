//! In-process gRPC servers for registration tests.
//!
//! The reflection server here serves exact pre-encoded descriptor bytes, so
//! gateway annotation extensions survive the round trip — a production
//! server built from compiled protos would do the same.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use prost::Message as _;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};
use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1::server_reflection_server::{
    ServerReflection, ServerReflectionServer,
};
use tonic_reflection::pb::v1::{
    ErrorResponse, FileDescriptorResponse, ListServiceResponse, ServerReflectionRequest,
    ServerReflectionResponse, ServiceResponse,
};

use mcp_bridge_core::descriptor::{
    field_label, field_type, DescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    FileDescriptorSet, MethodDescriptorProto, MethodOptions, ServiceDescriptorProto,
};

/// One served proto file: encoded bytes plus the symbols it contains.
struct ServedFile {
    name: String,
    services: Vec<String>,
    bytes: Vec<u8>,
}

/// Reflection server answering from a fixed descriptor set.
#[derive(Clone)]
pub struct FixedReflection {
    files: Arc<Vec<ServedFile>>,
    service_names: Arc<Vec<String>>,
}

impl FixedReflection {
    pub fn new(set: &FileDescriptorSet) -> Self {
        let mut files = Vec::new();
        let mut service_names = Vec::new();

        for file in &set.file {
            let package = file.package.as_deref().unwrap_or("");
            let services: Vec<String> = file
                .service
                .iter()
                .filter_map(|s| s.name.as_deref())
                .map(|name| {
                    if package.is_empty() {
                        name.to_string()
                    } else {
                        format!("{package}.{name}")
                    }
                })
                .collect();
            service_names.extend(services.iter().cloned());
            files.push(ServedFile {
                name: file.name.clone().unwrap_or_default(),
                services,
                bytes: file.encode_to_vec(),
            });
        }

        Self {
            files: Arc::new(files),
            service_names: Arc::new(service_names),
        }
    }

    fn respond(&self, request: &MessageRequest) -> MessageResponse {
        match request {
            MessageRequest::ListServices(_) => MessageResponse::ListServicesResponse(
                ListServiceResponse {
                    service: self
                        .service_names
                        .iter()
                        .map(|name| ServiceResponse { name: name.clone() })
                        .collect(),
                },
            ),
            MessageRequest::FileContainingSymbol(symbol) => {
                let found = self.files.iter().find(|file| {
                    file.services
                        .iter()
                        .any(|svc| svc == symbol || symbol.starts_with(&format!("{svc}.")))
                });
                match found {
                    Some(file) => MessageResponse::FileDescriptorResponse(FileDescriptorResponse {
                        file_descriptor_proto: vec![file.bytes.clone()],
                    }),
                    None => MessageResponse::ErrorResponse(ErrorResponse {
                        error_code: tonic::Code::NotFound as i32,
                        error_message: format!("symbol '{symbol}' not found"),
                    }),
                }
            }
            MessageRequest::FileByFilename(filename) => {
                match self.files.iter().find(|file| &file.name == filename) {
                    Some(file) => MessageResponse::FileDescriptorResponse(FileDescriptorResponse {
                        file_descriptor_proto: vec![file.bytes.clone()],
                    }),
                    None => MessageResponse::ErrorResponse(ErrorResponse {
                        error_code: tonic::Code::NotFound as i32,
                        error_message: format!("file '{filename}' not found"),
                    }),
                }
            }
            _ => MessageResponse::ErrorResponse(ErrorResponse {
                error_code: tonic::Code::Unimplemented as i32,
                error_message: "unsupported reflection request".to_string(),
            }),
        }
    }
}

#[tonic::async_trait]
impl ServerReflection for FixedReflection {
    type ServerReflectionInfoStream =
        Pin<Box<dyn Stream<Item = Result<ServerReflectionResponse, Status>> + Send + 'static>>;

    async fn server_reflection_info(
        &self,
        request: Request<Streaming<ServerReflectionRequest>>,
    ) -> Result<Response<Self::ServerReflectionInfoStream>, Status> {
        let mut inbound = request.into_inner();
        let this = self.clone();
        let (tx, rx) = tokio::sync::mpsc::channel(16);

        tokio::spawn(async move {
            while let Ok(Some(message)) = inbound.message().await {
                let Some(request) = message.message_request.clone() else {
                    continue;
                };
                let response = ServerReflectionResponse {
                    valid_host: message.host.clone(),
                    original_request: Some(message),
                    message_response: Some(this.respond(&request)),
                };
                if tx.send(Ok(response)).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}

/// Serve reflection for a descriptor set on an ephemeral port.
pub async fn spawn_reflection_server(set: &FileDescriptorSet) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    let reflection = ServerReflectionServer::new(FixedReflection::new(set));
    tokio::spawn(async move {
        Server::builder()
            .add_service(reflection)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .ok();
    });

    addr
}

/// Serve reflection plus the standard health service, reporting `SERVING`.
#[allow(dead_code)]
pub async fn spawn_reflection_server_with_health(set: &FileDescriptorSet) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    let (mut reporter, health_service) = tonic_health::server::health_reporter();
    reporter
        .set_service_status("", tonic_health::ServingStatus::Serving)
        .await;

    let reflection = ServerReflectionServer::new(FixedReflection::new(set));
    tokio::spawn(async move {
        Server::builder()
            .add_service(reflection)
            .add_service(health_service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .ok();
    });

    addr
}

/// A listener that accepts TCP connections and immediately drops them.
pub async fn spawn_plain_tcp_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => drop(socket),
                Err(_) => break,
            }
        }
    });

    addr
}

fn string_field(name: &str, number: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(field_label::OPTIONAL),
        r#type: Some(field_type::STRING),
        type_name: None,
        options: None,
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

/// `examples.weather.v1.WeatherService/GetWeather`, tool-annotated.
pub fn weather_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("examples/weather/v1/weather.proto".to_string()),
        package: Some("examples.weather.v1".to_string()),
        dependency: vec![],
        message_type: vec![
            message("GetWeatherRequest", vec![string_field("location", 1)]),
            message("GetWeatherResponse", vec![string_field("weather", 1)]),
        ],
        enum_type: vec![],
        service: vec![ServiceDescriptorProto {
            name: Some("WeatherService".to_string()),
            method: vec![MethodDescriptorProto {
                name: Some("GetWeather".to_string()),
                input_type: Some(".examples.weather.v1.GetWeatherRequest".to_string()),
                output_type: Some(".examples.weather.v1.GetWeatherResponse".to_string()),
                options: Some(MethodOptions {
                    tool_name: Some("GetWeather".to_string()),
                    tool_description: Some("Fetch current weather".to_string()),
                    read_only_hint: Some(true),
                    ..Default::default()
                }),
                client_streaming: None,
                server_streaming: None,
            }],
        }],
    }
}

/// A legacy reflection service file, as real servers advertise alongside
/// their own API; its method carries no tool annotations.
pub fn reflection_v1alpha_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("grpc/reflection/v1alpha/reflection.proto".to_string()),
        package: Some("grpc.reflection.v1alpha".to_string()),
        dependency: vec![],
        message_type: vec![
            message("ServerReflectionRequest", vec![string_field("host", 1)]),
            message("ServerReflectionResponse", vec![string_field("valid_host", 1)]),
        ],
        enum_type: vec![],
        service: vec![ServiceDescriptorProto {
            name: Some("ServerReflection".to_string()),
            method: vec![MethodDescriptorProto {
                name: Some("ServerReflectionInfo".to_string()),
                input_type: Some(".grpc.reflection.v1alpha.ServerReflectionRequest".to_string()),
                output_type: Some(
                    ".grpc.reflection.v1alpha.ServerReflectionResponse".to_string(),
                ),
                options: None,
                client_streaming: Some(true),
                server_streaming: Some(true),
            }],
        }],
    }
}

/// Weather service alone.
pub fn weather_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![weather_file()],
    }
}

/// Weather service plus the legacy reflection service.
pub fn weather_with_reflection_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![weather_file(), reflection_v1alpha_file()],
    }
}

/// Quick lookup of tool keys from a registration result.
pub fn tool_keys(tools: &[mcp_bridge_core::catalog::ToolRecord]) -> Vec<&str> {
    tools.iter().map(|t| t.key.as_str()).collect()
}
