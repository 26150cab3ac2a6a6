//! Immutable lookup index over a descriptor set.
//!
//! Descriptor protos are tree-shaped: files own messages, messages own
//! nested messages and enums, services own methods. Resolution works on
//! fully-qualified names, so the index flattens the tree into FQN tables
//! once per loaded set. Entries are paths into the owning
//! [`FileDescriptorSet`] rather than references, keeping the index plain
//! data that can be stored next to the set it describes.

use std::collections::HashMap;

use crate::descriptor::{
    DescriptorProto, EnumDescriptorProto, FileDescriptorSet, MethodDescriptorProto,
    ServiceDescriptorProto,
};
use crate::error::{Error, Result};

/// Location of a message within a descriptor set: file index plus the chain
/// of nested-type indices from the file's top-level message table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MessagePath {
    file: usize,
    path: Vec<usize>,
}

/// Location of an enum: file index, optional enclosing message, enum index.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EnumPath {
    file: usize,
    message: Option<Vec<usize>>,
    index: usize,
}

/// Location of a service within a descriptor set.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ServicePath {
    file: usize,
    index: usize,
}

/// A resolved method: borrowed views into the owning index.
#[derive(Debug, Clone)]
pub struct MethodRef<'a> {
    /// Fully-qualified service name (no leading dot).
    pub service_fqn: String,
    /// The method descriptor.
    pub method: &'a MethodDescriptorProto,
    /// Fully-qualified input message name (no leading dot).
    pub input_fqn: String,
    /// Fully-qualified output message name (no leading dot).
    pub output_fqn: String,
    /// The input message descriptor.
    pub input: &'a DescriptorProto,
    /// The output message descriptor.
    pub output: &'a DescriptorProto,
}

impl MethodRef<'_> {
    /// The method's local name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.method.name.as_deref().unwrap_or("")
    }

    /// The canonical `service/Method` invocation path.
    #[must_use]
    pub fn full_method(&self) -> String {
        format!("{}/{}", self.service_fqn, self.name())
    }
}

/// Immutable FQN lookup tables built once per descriptor set.
#[derive(Debug)]
pub struct DescriptorIndex {
    set: FileDescriptorSet,
    messages: HashMap<String, MessagePath>,
    enums: HashMap<String, EnumPath>,
    services: HashMap<String, ServicePath>,
}

impl DescriptorIndex {
    /// Build the index for a descriptor set.
    #[must_use]
    pub fn new(set: FileDescriptorSet) -> Self {
        let mut messages = HashMap::new();
        let mut enums = HashMap::new();
        let mut services = HashMap::new();

        for (file_idx, file) in set.file.iter().enumerate() {
            let package = file.package.as_deref().unwrap_or("");

            for (msg_idx, msg) in file.message_type.iter().enumerate() {
                index_message(
                    &mut messages,
                    &mut enums,
                    file_idx,
                    package,
                    vec![msg_idx],
                    msg,
                );
            }

            for (enum_idx, enum_desc) in file.enum_type.iter().enumerate() {
                let name = enum_desc.name.as_deref().unwrap_or("");
                enums.insert(
                    qualify(package, name),
                    EnumPath {
                        file: file_idx,
                        message: None,
                        index: enum_idx,
                    },
                );
            }

            for (svc_idx, svc) in file.service.iter().enumerate() {
                let name = svc.name.as_deref().unwrap_or("");
                services.insert(
                    qualify(package, name),
                    ServicePath {
                        file: file_idx,
                        index: svc_idx,
                    },
                );
            }
        }

        Self {
            set,
            messages,
            enums,
            services,
        }
    }

    /// The underlying descriptor set.
    #[must_use]
    pub fn set(&self) -> &FileDescriptorSet {
        &self.set
    }

    /// Whether every declared dependency path is present in the set.
    ///
    /// Well-known `google/protobuf/…` imports are exempt: servers routinely
    /// omit them from reflection responses.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        let names: std::collections::HashSet<&str> = self
            .set
            .file
            .iter()
            .filter_map(|f| f.name.as_deref())
            .collect();

        self.set.file.iter().all(|file| {
            file.dependency
                .iter()
                .all(|dep| dep.starts_with("google/protobuf/") || names.contains(dep.as_str()))
        })
    }

    /// Look up a message by fully-qualified name (leading dot tolerated).
    #[must_use]
    pub fn message(&self, fqn: &str) -> Option<&DescriptorProto> {
        let path = self.messages.get(fqn.trim_start_matches('.'))?;
        let file = self.set.file.get(path.file)?;
        let mut cursor = file.message_type.get(*path.path.first()?)?;
        for &idx in &path.path[1..] {
            cursor = cursor.nested_type.get(idx)?;
        }
        Some(cursor)
    }

    /// Look up an enum by fully-qualified name (leading dot tolerated).
    #[must_use]
    pub fn enum_type(&self, fqn: &str) -> Option<&EnumDescriptorProto> {
        let path = self.enums.get(fqn.trim_start_matches('.'))?;
        let file = self.set.file.get(path.file)?;
        match &path.message {
            None => file.enum_type.get(path.index),
            Some(msg_path) => {
                let mut cursor = file.message_type.get(*msg_path.first()?)?;
                for &idx in &msg_path[1..] {
                    cursor = cursor.nested_type.get(idx)?;
                }
                cursor.enum_type.get(path.index)
            }
        }
    }

    /// Look up a service by fully-qualified name (leading dot tolerated).
    #[must_use]
    pub fn service(&self, fqn: &str) -> Option<&ServiceDescriptorProto> {
        let path = self.services.get(fqn.trim_start_matches('.'))?;
        self.set.file.get(path.file)?.service.get(path.index)
    }

    /// Iterate `(fqn, descriptor)` over every indexed service.
    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceDescriptorProto)> {
        self.services.iter().filter_map(|(fqn, path)| {
            let svc = self.set.file.get(path.file)?.service.get(path.index)?;
            Some((fqn.as_str(), svc))
        })
    }

    /// Whether an FQN names a known message or enum.
    #[must_use]
    pub fn has_type(&self, fqn: &str) -> bool {
        let fqn = fqn.trim_start_matches('.');
        self.messages.contains_key(fqn) || self.enums.contains_key(fqn)
    }

    /// Resolve a fully-qualified method name into a [`MethodRef`].
    ///
    /// Accepts `package.Service/Method` (preferred, optional leading slash)
    /// and the legacy `package.Service.Method` form; the split point is the
    /// rightmost `/`, else the rightmost `.`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidMethodName`] if no separator is present or either
    ///   half is empty;
    /// - [`Error::NotAService`] if the left half names a message or enum;
    /// - [`Error::MethodNotFound`] if the service or method is absent;
    /// - [`Error::MissingType`] if the method's input or output message is
    ///   not in the set (the set is not closed).
    pub fn resolve_method(&self, full_name: &str) -> Result<MethodRef<'_>> {
        let trimmed = full_name.trim_start_matches('/');
        let (service_fqn, method_name) = split_method(trimmed).ok_or_else(|| {
            Error::InvalidMethodName {
                name: full_name.to_string(),
            }
        })?;

        let Some(service) = self.service(service_fqn) else {
            if self.has_type(service_fqn) {
                return Err(Error::NotAService {
                    symbol: service_fqn.to_string(),
                });
            }
            return Err(Error::MethodNotFound {
                service: service_fqn.to_string(),
                method: method_name.to_string(),
            });
        };

        let method = service
            .method
            .iter()
            .find(|m| m.name.as_deref() == Some(method_name))
            .ok_or_else(|| Error::MethodNotFound {
                service: service_fqn.to_string(),
                method: method_name.to_string(),
            })?;

        let input_fqn = method
            .input_type
            .as_deref()
            .unwrap_or("")
            .trim_start_matches('.')
            .to_string();
        let output_fqn = method
            .output_type
            .as_deref()
            .unwrap_or("")
            .trim_start_matches('.')
            .to_string();

        let input = self.message(&input_fqn).ok_or_else(|| Error::MissingType {
            type_name: input_fqn.clone(),
        })?;
        let output = self
            .message(&output_fqn)
            .ok_or_else(|| Error::MissingType {
                type_name: output_fqn.clone(),
            })?;

        Ok(MethodRef {
            service_fqn: service_fqn.to_string(),
            method,
            input_fqn,
            output_fqn,
            input,
            output,
        })
    }
}

/// Split `service/Method` (rightmost `/`) or `service.Method` (rightmost `.`).
fn split_method(name: &str) -> Option<(&str, &str)> {
    let split_at = name.rfind('/').or_else(|| name.rfind('.'))?;
    let (service, method) = (&name[..split_at], &name[split_at + 1..]);
    if service.is_empty() || method.is_empty() {
        return None;
    }
    Some((service, method))
}

fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}

fn index_message(
    messages: &mut HashMap<String, MessagePath>,
    enums: &mut HashMap<String, EnumPath>,
    file: usize,
    parent_fqn: &str,
    path: Vec<usize>,
    msg: &DescriptorProto,
) {
    let name = msg.name.as_deref().unwrap_or("");
    let fqn = qualify(parent_fqn, name);

    for (enum_idx, enum_desc) in msg.enum_type.iter().enumerate() {
        let enum_name = enum_desc.name.as_deref().unwrap_or("");
        enums.insert(
            qualify(&fqn, enum_name),
            EnumPath {
                file,
                message: Some(path.clone()),
                index: enum_idx,
            },
        );
    }

    for (nested_idx, nested) in msg.nested_type.iter().enumerate() {
        let mut nested_path = path.clone();
        nested_path.push(nested_idx);
        index_message(messages, enums, file, &fqn, nested_path, nested);
    }

    messages.insert(fqn, MessagePath { file, path });
}
