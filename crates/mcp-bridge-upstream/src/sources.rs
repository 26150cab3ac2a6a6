//! Descriptor compilation from configured proto sources.
//!
//! Inline definitions, individual files, and filtered directory trees are
//! materialized into a temporary working directory (relative paths
//! preserved), then compiled in-process. Pre-compiled descriptor blobs
//! bypass the compiler and merge into the result. Every user-supplied
//! filesystem path passes the [`PathPolicy`] check before it is read.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use mcp_bridge_core::config::{GrpcServiceConfig, ProtoCollection};
use mcp_bridge_core::descriptor::FileDescriptorSet;
use mcp_bridge_core::PathPolicy;
use prost::Message as _;
use regex::Regex;

use crate::error::{Error, Result};

/// Directories whose presence marks a project root while walking ancestors.
const ROOT_MARKERS: &[&str] = &[".git", "proto"];

/// Compile the proto sources configured for a gRPC upstream into a closed
/// descriptor set.
///
/// # Errors
///
/// - [`Error::InvalidRegex`] for a malformed collection filter;
/// - [`Error::Io`] when sources cannot be read or staged;
/// - [`Error::NoFiles`] when nothing matches;
/// - [`Error::Compile`] when the compiler rejects the sources;
/// - [`Error::Decode`] when a pre-compiled descriptor blob is malformed.
pub fn compile_sources(grpc: &GrpcServiceConfig, policy: &PathPolicy) -> Result<FileDescriptorSet> {
    let workdir = tempfile::tempdir()?;
    let mut staged: Vec<String> = Vec::new();
    let mut merged = FileDescriptorSet::default();

    for (position, definition) in grpc.proto_definitions.iter().enumerate() {
        if !definition.proto_descriptor.is_empty() {
            let set = FileDescriptorSet::decode(definition.proto_descriptor.as_slice())?;
            merge(&mut merged, set);
        }

        let Some(proto_file) = &definition.proto_file else {
            continue;
        };
        if let Some(content) = &proto_file.file_content {
            let relative = format!("inline_{position}.proto");
            std::fs::write(workdir.path().join(&relative), content)?;
            staged.push(relative);
        } else if let Some(file_path) = &proto_file.file_path {
            let source = policy.check(Path::new(file_path))?;
            let relative = source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| Error::InvalidConfig(format!("'{file_path}' is not a file")))?;
            std::fs::copy(&source, workdir.path().join(&relative))?;
            staged.push(relative);
        }
    }

    for collection in &grpc.proto_collection {
        stage_collection(collection, policy, workdir.path(), &mut staged)?;
    }

    if staged.is_empty() && merged.file.is_empty() {
        return Err(Error::NoFiles);
    }

    if !staged.is_empty() {
        let compiled = run_compiler(workdir.path(), &staged)?;
        merge(&mut merged, compiled);
    }

    Ok(merged)
}

fn stage_collection(
    collection: &ProtoCollection,
    policy: &PathPolicy,
    workdir: &Path,
    staged: &mut Vec<String>,
) -> Result<()> {
    let filter = if collection.path_match_regex.is_empty() {
        None
    } else {
        Some(
            Regex::new(&collection.path_match_regex).map_err(|source| Error::InvalidRegex {
                pattern: collection.path_match_regex.clone(),
                source,
            })?,
        )
    };

    let root = policy.check(Path::new(&collection.root_path))?;
    let max_depth = if collection.is_recursive { usize::MAX } else { 1 };

    for entry in walkdir::WalkDir::new(&root)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| {
            Error::Io(err.into_io_error().unwrap_or_else(|| {
                std::io::Error::other(format!("walk failed under '{}'", root.display()))
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("proto") {
            continue;
        }

        let relative = path
            .strip_prefix(&root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        if filter.as_ref().is_some_and(|f| !f.is_match(&relative)) {
            continue;
        }

        let destination = workdir.join(&relative);
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(path, destination)?;
        staged.push(relative);
    }

    Ok(())
}

fn run_compiler(workdir: &Path, staged: &[String]) -> Result<FileDescriptorSet> {
    let mut includes: Vec<PathBuf> = vec![workdir.to_path_buf()];
    if let Some(root) = project_root() {
        includes.push(root);
    }

    let compiled = protox::Compiler::new(includes)
        .map_err(|err| Error::Compile(err.to_string()))?
        .include_source_info(false)
        .include_imports(true)
        .open_files(staged)
        .map_err(|err| Error::Compile(err.to_string()))?
        .file_descriptor_set();

    // Re-decode through our own types so gateway annotation extensions in
    // the compiled options survive.
    let bytes = compiled.encode_to_vec();
    Ok(FileDescriptorSet::decode(bytes.as_slice())?)
}

/// Walk ancestors of the working directory until a marker directory
/// appears; that ancestor joins the compiler's search path so shared protos
/// resolve.
fn project_root() -> Option<PathBuf> {
    let start = std::env::current_dir().ok()?;
    start
        .ancestors()
        .find(|dir| {
            ROOT_MARKERS
                .iter()
                .any(|marker| dir.join(marker).is_dir())
        })
        .map(Path::to_path_buf)
}

fn merge(target: &mut FileDescriptorSet, source: FileDescriptorSet) {
    let existing: HashSet<Option<String>> =
        target.file.iter().map(|f| f.name.clone()).collect();
    for file in source.file {
        if !existing.contains(&file.name) {
            target.file.push(file);
        }
    }
}

#[cfg(test)]
mod tests {
    use mcp_bridge_core::config::{ProtoDefinition, ProtoFile};
    use pretty_assertions::assert_eq;

    use super::*;

    fn inline_config(content: &str) -> GrpcServiceConfig {
        GrpcServiceConfig {
            address: "127.0.0.1:50051".to_string(),
            proto_definitions: vec![ProtoDefinition {
                proto_file: Some(ProtoFile {
                    file_content: Some(content.to_string()),
                    file_path: None,
                }),
                proto_descriptor: Vec::new(),
            }],
            ..Default::default()
        }
    }

    const WEATHER_PROTO: &str = r#"
syntax = "proto3";
package examples.weather.v1;

message GetWeatherRequest { string location = 1; }
message GetWeatherResponse { string weather = 1; }

service WeatherService {
  rpc GetWeather(GetWeatherRequest) returns (GetWeatherResponse);
}
"#;

    #[test]
    fn compiles_inline_definitions() {
        let policy = PathPolicy::current_dir().unwrap();
        let set = compile_sources(&inline_config(WEATHER_PROTO), &policy).unwrap();

        let file = set
            .file
            .iter()
            .find(|f| f.package.as_deref() == Some("examples.weather.v1"))
            .expect("compiled file present");
        assert_eq!(file.service[0].name.as_deref(), Some("WeatherService"));
        assert_eq!(file.message_type.len(), 2);
    }

    #[test]
    fn invalid_syntax_reports_parse_failure() {
        let policy = PathPolicy::current_dir().unwrap();
        let err = compile_sources(&inline_config("syntax = \"proto3\"; invalid syntax"), &policy)
            .unwrap_err();
        assert!(
            err.to_string().contains("failed to parse proto definitions"),
            "got: {err}"
        );
    }

    #[test]
    fn empty_sources_report_no_files() {
        let policy = PathPolicy::current_dir().unwrap();
        let config = GrpcServiceConfig {
            address: "127.0.0.1:50051".to_string(),
            ..Default::default()
        };
        let err = compile_sources(&config, &policy).unwrap_err();
        assert!(matches!(err, Error::NoFiles), "got: {err}");
    }

    #[test]
    fn collection_regex_filters_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("weather.proto"), WEATHER_PROTO).unwrap();
        std::fs::write(
            dir.path().join("ignored.proto"),
            "syntax = \"proto3\"; package skip.v1;",
        )
        .unwrap();

        let policy = PathPolicy::allowing([dir.path()]).unwrap();
        let config = GrpcServiceConfig {
            address: "127.0.0.1:50051".to_string(),
            proto_collection: vec![ProtoCollection {
                root_path: dir.path().display().to_string(),
                path_match_regex: "^weather".to_string(),
                is_recursive: false,
            }],
            ..Default::default()
        };

        let set = compile_sources(&config, &policy).unwrap();
        assert!(set
            .file
            .iter()
            .any(|f| f.package.as_deref() == Some("examples.weather.v1")));
        assert!(!set.file.iter().any(|f| f.package.as_deref() == Some("skip.v1")));
    }

    #[test]
    fn non_recursive_collections_skip_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(
            dir.path().join("nested/deep.proto"),
            "syntax = \"proto3\"; package deep.v1;",
        )
        .unwrap();
        std::fs::write(dir.path().join("weather.proto"), WEATHER_PROTO).unwrap();

        let policy = PathPolicy::allowing([dir.path()]).unwrap();
        let config = GrpcServiceConfig {
            address: "127.0.0.1:50051".to_string(),
            proto_collection: vec![ProtoCollection {
                root_path: dir.path().display().to_string(),
                path_match_regex: String::new(),
                is_recursive: false,
            }],
            ..Default::default()
        };

        let set = compile_sources(&config, &policy).unwrap();
        assert!(!set.file.iter().any(|f| f.package.as_deref() == Some("deep.v1")));
    }

    #[test]
    fn collection_outside_policy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let policy = PathPolicy::allowing([dir.path()]).unwrap();

        let config = GrpcServiceConfig {
            address: "127.0.0.1:50051".to_string(),
            proto_collection: vec![ProtoCollection {
                root_path: other.path().display().to_string(),
                path_match_regex: String::new(),
                is_recursive: true,
            }],
            ..Default::default()
        };

        let err = compile_sources(&config, &policy).unwrap_err();
        assert!(matches!(err, Error::Core(_)), "got: {err}");
    }

    #[test]
    fn imports_are_collected_transitively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("common.proto"),
            "syntax = \"proto3\"; package common.v1; message Unit { string name = 1; }",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("weather.proto"),
            r#"
syntax = "proto3";
package examples.weather.v1;
import "common.proto";
message GetWeatherRequest { common.v1.Unit unit = 1; }
service WeatherService {
  rpc GetWeather(GetWeatherRequest) returns (GetWeatherRequest);
}
"#,
        )
        .unwrap();

        let policy = PathPolicy::allowing([dir.path()]).unwrap();
        let config = GrpcServiceConfig {
            address: "127.0.0.1:50051".to_string(),
            proto_collection: vec![ProtoCollection {
                root_path: dir.path().display().to_string(),
                path_match_regex: String::new(),
                is_recursive: false,
            }],
            ..Default::default()
        };

        let set = compile_sources(&config, &policy).unwrap();
        let names: Vec<&str> = set
            .file
            .iter()
            .filter_map(|f| f.name.as_deref())
            .collect();
        assert!(names.contains(&"common.proto"), "imports missing: {names:?}");
        assert!(names.contains(&"weather.proto"));
    }
}
